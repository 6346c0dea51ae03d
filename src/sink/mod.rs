//! Time-series sink.
//!
//! The send loop hands each tick's batch of [`Point`]s to a [`Sink`]. The
//! production sink is [`influxdb::InfluxClient`], which speaks the InfluxDB
//! 1.x HTTP API.

pub mod influxdb;
pub mod line_protocol;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::point::Value;

/// One point of an outgoing batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub time: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Error)]
pub enum SinkError {
    /// The server rejected the request (bad request, auth, schema). Retrying
    /// the same batch will not help.
    #[error("{code} {message}")]
    Client { code: u16, message: String },

    #[error("server error {code}: {message}")]
    Server { code: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SinkError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SinkError::Client { .. })
    }
}

#[async_trait]
pub trait Sink: Send + Sync {
    /// Creates the destination database; a no-op if it already exists.
    async fn create_database(&self, database: &str) -> Result<(), SinkError>;

    /// Writes one batch.
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError>;
}
