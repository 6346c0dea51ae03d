//! Configuration management for send-sysinfo-influx.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use tracing::level_filters::LevelFilter;

use crate::cli::{Args, ConfigFormat};
use crate::sink::influxdb::InfluxConfig;

// Default configuration constants
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8086;
pub const DEFAULT_DATABASE: &str = "sysinfo";
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Loop intervals must be strictly greater than this many seconds.
pub const MIN_LOOP_SECONDS: f64 = 0.1;

const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/sysinfo-influxdb/config.yaml",
    "./sysinfo-influxdb.yaml",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid extra tags: {0}")]
    ExtraTags(String),

    #[error("{0}")]
    Invalid(String),

    #[error("failed to render config: {0}")]
    Render(String),
}

/// Settings that can come from a config file. Unset fields fall back to the
/// built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Destination
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ssl: Option<bool>,
    pub insecure: Option<bool>,
    pub database: Option<String>,
    #[serde(alias = "create-database")]
    pub create_database: Option<bool>,
    pub user: Option<String>,
    pub password: Option<String>,

    // Loop
    #[serde(alias = "loop")]
    pub loop_seconds: Option<f64>,
    #[serde(alias = "ignore-errors")]
    pub ignore_errors: Option<bool>,
    pub count: Option<u64>,

    // Containers
    pub docker: Option<bool>,
    #[serde(alias = "docker-extra")]
    pub docker_extra: Option<bool>,
    #[serde(alias = "docker-binary")]
    pub docker_binary: Option<PathBuf>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    /// Tags added to every point. Defaults to `{"hostname": <host name>}`.
    /// Kept last: TOML needs tables after plain values.
    #[serde(alias = "extra-tags")]
    pub extra_tags: Option<BTreeMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Some(DEFAULT_HOST.to_string()),
            port: Some(DEFAULT_PORT),
            ssl: Some(false),
            insecure: Some(false),
            database: Some(DEFAULT_DATABASE.to_string()),
            create_database: Some(false),
            user: Some(DEFAULT_USER.to_string()),
            password: None,
            loop_seconds: None,
            ignore_errors: Some(false),
            count: None,
            docker: Some(false),
            docker_extra: Some(false),
            docker_binary: Some(PathBuf::from(DEFAULT_DOCKER_BINARY)),
            log_level: None,
            extra_tags: None,
        }
    }
}

impl Config {
    /// Fills every unset field from [`Config::default`].
    pub fn with_defaults(self) -> Self {
        let d = Config::default();
        Self {
            host: self.host.or(d.host),
            port: self.port.or(d.port),
            ssl: self.ssl.or(d.ssl),
            insecure: self.insecure.or(d.insecure),
            database: self.database.or(d.database),
            create_database: self.create_database.or(d.create_database),
            user: self.user.or(d.user),
            password: self.password.or(d.password),
            loop_seconds: self.loop_seconds.or(d.loop_seconds),
            ignore_errors: self.ignore_errors.or(d.ignore_errors),
            count: self.count.or(d.count),
            docker: self.docker.or(d.docker),
            docker_extra: self.docker_extra.or(d.docker_extra),
            docker_binary: self.docker_binary.or(d.docker_binary),
            log_level: self.log_level.or(d.log_level),
            extra_tags: self.extra_tags.or(d.extra_tags),
        }
    }

    /// Pause between ticks; `None` for a single shot.
    pub fn interval(&self) -> Option<Duration> {
        self.loop_seconds
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    pub fn docker_binary(&self) -> &Path {
        self.docker_binary
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_DOCKER_BINARY))
    }

    /// Whether container stats are collected, and whether with state tags.
    pub fn containers(&self) -> Option<bool> {
        let extra = self.docker_extra.unwrap_or(false);
        (self.docker.unwrap_or(false) || extra).then_some(extra)
    }

    /// Configured extra tags, or the hostname tag when none are set.
    pub fn effective_extra_tags(&self, hostname: &str) -> BTreeMap<String, String> {
        self.extra_tags.clone().unwrap_or_else(|| {
            BTreeMap::from([("hostname".to_string(), hostname.to_string())])
        })
    }

    pub fn influx(&self) -> InfluxConfig {
        InfluxConfig {
            host: self.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            ssl: self.ssl.unwrap_or(false),
            insecure: self.insecure.unwrap_or(false),
            database: self.database().to_string(),
            username: self.user.clone().unwrap_or_else(|| DEFAULT_USER.to_string()),
            password: self.password.clone(),
        }
    }
}

/// Parses `--extra-tags`: a JSON object whose values are scalars.
pub fn parse_extra_tags(json: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ConfigError::ExtraTags(e.to_string()))?;
    let serde_json::Value::Object(map) = value else {
        return Err(ConfigError::ExtraTags(format!(
            "expected a JSON object, got {json}"
        )));
    };

    map.into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(ConfigError::ExtraTags(format!(
                        "tag '{key}' must be a string, number or boolean, got {other}"
                    )))
                }
            };
            Ok((key, text))
        })
        .collect()
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(secs) = cfg.loop_seconds {
        if !secs.is_finite() || secs <= MIN_LOOP_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "loop interval must be greater than {MIN_LOOP_SECONDS} seconds, got {secs}"
            )));
        }
    }

    if cfg.ignore_errors.unwrap_or(false) && cfg.loop_seconds.is_none() {
        return Err(ConfigError::Invalid(
            "ignore-errors requires a loop interval".into(),
        ));
    }

    if cfg.port == Some(0) {
        return Err(ConfigError::Invalid("port must not be 0".into()));
    }

    if cfg.database().is_empty() {
        return Err(ConfigError::Invalid("database name must not be empty".into()));
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if LevelFilter::from_str(level).is_err() {
            return Err(ConfigError::Invalid(format!("invalid log_level '{level}'")));
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(host) = &args.host {
        config.host = Some(host.clone());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(database) = &args.database {
        config.database = Some(database.clone());
    }
    if let Some(user) = &args.user {
        config.user = Some(user.clone());
    }
    if let Some(password) = &args.password {
        config.password = Some(password.clone());
    }
    if let Some(json) = &args.extra_tags {
        config.extra_tags = Some(parse_extra_tags(json)?);
    }
    if let Some(secs) = args.loop_seconds {
        config.loop_seconds = Some(secs);
    }
    if let Some(count) = args.count {
        config.count = Some(count);
    }
    if let Some(binary) = &args.docker_binary {
        config.docker_binary = Some(binary.clone());
    }

    // Switches can only turn things on
    if args.ssl {
        config.ssl = Some(true);
    }
    if args.insecure {
        config.insecure = Some(true);
    }
    if args.create_database {
        config.create_database = Some(true);
    }
    if args.ignore_errors {
        config.ignore_errors = Some(true);
    }
    if args.docker {
        config.docker = Some(true);
    }
    if args.docker_extra {
        config.docker_extra = Some(true);
    }

    Ok(config)
}

/// Log level: CLI verbosity flags, then the config file, then warn.
pub fn effective_log_level(args: &Args, cfg: &Config) -> LevelFilter {
    if args.silent {
        LevelFilter::OFF
    } else if args.debug {
        LevelFilter::DEBUG
    } else if args.verbose {
        LevelFilter::INFO
    } else {
        cfg.log_level
            .as_deref()
            .and_then(|level| LevelFilter::from_str(level).ok())
            .unwrap_or(LevelFilter::WARN)
    }
}

/// Loads a config file, or the first default location that exists.
/// Without any file the built-in defaults are returned.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS.iter().map(Path::new).find(|p| p.exists()) {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.clone(),
            source,
        })?,
        Some("toml") => toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.clone(),
            source,
        })?,
        _ => serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.clone(),
            source,
        })?,
    };

    info!("Loaded configuration from: {}", path.display());
    Ok(config.with_defaults())
}

/// Renders the configuration with the password masked.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, ConfigError> {
    let mut shown = config.clone();
    if shown.password.is_some() {
        shown.password = Some("********".to_string());
    }

    match format {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(&shown).map_err(|e| ConfigError::Render(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::to_string_pretty(&shown).map_err(|e| ConfigError::Render(e.to_string()))
        }
        ConfigFormat::Yaml => {
            serde_yaml::to_string(&shown).map_err(|e| ConfigError::Render(e.to_string()))
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), ConfigError> {
    println!("{}", render_config(config, format)?);
    Ok(())
}
