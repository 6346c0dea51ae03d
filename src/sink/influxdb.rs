//! InfluxDB 1.x HTTP client.

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use super::line_protocol::encode_batch;
use super::{Point, Sink, SinkError};

/// Connection settings for [`InfluxClient`].
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    /// Skip certificate verification.
    pub insecure: bool,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
}

pub struct InfluxClient {
    http: Client,
    base_url: String,
    database: String,
    username: String,
    password: Option<String>,
}

impl InfluxClient {
    pub fn new(config: InfluxConfig) -> Result<Self, SinkError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()?;
        let scheme = if config.ssl { "https" } else { "http" };

        Ok(Self {
            http,
            base_url: format!("{}://{}:{}", scheme, config.host, config.port),
            database: config.database,
            username: config.username,
            password: config.password,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Credentials go in the query string, and only when a password is set.
    fn auth_params(&self) -> Vec<(&'static str, String)> {
        match &self.password {
            Some(password) => vec![("u", self.username.clone()), ("p", password.clone())],
            None => Vec::new(),
        }
    }
}

/// Pulls `error` out of an InfluxDB JSON error body, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|doc| doc.get("error")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

async fn check_status(response: Response) -> Result<String, SinkError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }

    let code = status.as_u16();
    let message = error_message(&body);
    if status.is_client_error() {
        Err(SinkError::Client { code, message })
    } else {
        Err(SinkError::Server { code, message })
    }
}

/// Statement errors come back with status 200 inside `results[].error`.
fn statement_error(body: &str) -> Option<String> {
    let doc: serde_json::Value = serde_json::from_str(body).ok()?;
    doc.get("results")?
        .as_array()?
        .iter()
        .find_map(|r| r.get("error")?.as_str().map(str::to_string))
}

#[async_trait]
impl Sink for InfluxClient {
    async fn create_database(&self, database: &str) -> Result<(), SinkError> {
        let statement = format!("CREATE DATABASE \"{}\"", database.replace('"', "\\\""));
        let mut params = self.auth_params();
        params.push(("q", statement));

        let response = self
            .http
            .post(format!("{}/query", self.base_url))
            .query(&params)
            .send()
            .await?;
        let body = check_status(response).await?;

        if let Some(message) = statement_error(&body) {
            return Err(SinkError::Client { code: 400, message });
        }
        debug!("Database {} ready", database);
        Ok(())
    }

    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        let body = encode_batch(points);
        if body.is_empty() {
            debug!("Nothing to write");
            return Ok(());
        }

        let mut params = vec![
            ("db", self.database.clone()),
            ("precision", "ns".to_string()),
        ];
        params.extend(self.auth_params());

        let response = self
            .http
            .post(format!("{}/write", self.base_url))
            .query(&params)
            .body(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Value;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accepts one connection, answers with `status` and `body`, and returns
    /// the raw request it received.
    async fn one_shot_server(status: &'static str, body: &'static str) -> (u16, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (port, handle)
    }

    fn client(port: u16, password: Option<&str>) -> InfluxClient {
        InfluxClient::new(InfluxConfig {
            host: "127.0.0.1".to_string(),
            port,
            ssl: false,
            insecure: false,
            database: "sysinfo".to_string(),
            username: "root".to_string(),
            password: password.map(str::to_string),
        })
        .unwrap()
    }

    fn sample_point() -> Point {
        let mut fields = BTreeMap::new();
        fields.insert("load1".to_string(), Value::Float(0.5));
        Point {
            measurement: "load".to_string(),
            time: Utc::now(),
            tags: BTreeMap::new(),
            fields,
        }
    }

    #[test]
    fn test_base_url() {
        let c = InfluxClient::new(InfluxConfig {
            host: "influx.local".to_string(),
            port: 8086,
            ssl: true,
            insecure: true,
            database: "db".to_string(),
            username: "root".to_string(),
            password: None,
        })
        .unwrap();
        assert_eq!(c.base_url(), "https://influx.local:8086");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"database not found"}"#), "database not found");
        assert_eq!(error_message("plain text\n"), "plain text");
    }

    #[tokio::test]
    async fn test_write_points_sends_line_protocol() {
        let (port, server) = one_shot_server("204 No Content", "").await;
        client(port, Some("secret"))
            .write_points(&[sample_point()])
            .await
            .unwrap();

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("POST /write?"));
        assert!(request_line.contains("db=sysinfo"));
        assert!(request_line.contains("precision=ns"));
        assert!(request_line.contains("u=root"));
        assert!(request_line.contains("p=secret"));
        assert!(request.contains("load load1=0.5 "));
    }

    #[tokio::test]
    async fn test_client_error_is_reported_with_code() {
        let (port, server) =
            one_shot_server("401 Unauthorized", r#"{"error":"authorization failed"}"#).await;
        let err = client(port, None)
            .write_points(&[sample_point()])
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, SinkError::Client { code: 401, .. }));
        assert_eq!(err.to_string(), "401 authorization failed");
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let (port, server) = one_shot_server("500 Internal Server Error", "boom").await;
        let err = client(port, None)
            .write_points(&[sample_point()])
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, SinkError::Server { code: 500, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_create_database() {
        let (port, server) = one_shot_server("200 OK", r#"{"results":[{"statement_id":0}]}"#).await;
        client(port, None).create_database("sysinfo").await.unwrap();

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("POST /query?"));
        assert!(request_line.contains("q=CREATE+DATABASE"));
        assert!(!request_line.contains("u=root"));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        // nothing listens on this port; a request would fail
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        client(port, None).write_points(&[]).await.unwrap();
    }
}
