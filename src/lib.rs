//! Host and container metrics collector for InfluxDB.
//!
//! Every tick the [`StatAggregator`] reads load, CPU, memory, swap, disk and
//! network I/O, fan speeds and optionally docker container usage from a
//! [`SnapshotSource`], normalizes each record into a [`MetricPoint`] and turns
//! cumulative counters into per-interval deltas with a [`DeltaTracker`]. The
//! [`Sender`] stamps the result with a timestamp and common tags and writes it
//! to a [`Sink`], retrying after a cooldown when configured to.
//!
//! # Usage
//!
//! ```rust
//! use sysinfo_influxdb::{DeltaTracker, MetricPoint, Value};
//!
//! let mut tracker = DeltaTracker::new();
//!
//! // The first reading only establishes the baseline
//! let first = tracker.delta("disk_sda", MetricPoint::new().with_field("read_bytes", 1000u64));
//! assert_eq!(first.field("read_bytes"), Some(&Value::Integer(0)));
//!
//! let second = tracker.delta("disk_sda", MetricPoint::new().with_field("read_bytes", 1500u64));
//! assert_eq!(second.field("read_bytes"), Some(&Value::Integer(500)));
//! ```

pub mod aggregator;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod credentials;
pub mod delta;
pub mod docker;
pub mod normalize;
pub mod point;
pub mod sender;
pub mod sink;
pub mod system;

// Re-export main types for convenience
pub use aggregator::{CollectError, StatAggregator};
pub use collectors::{ProcfsSource, SnapshotSource, SourceError};
pub use delta::DeltaTracker;
pub use docker::{ContainerCollector, ContainerError, ContainerTool, DockerCli};
pub use point::{MeasurementKey, Measurements, MetricPoint, Value};
pub use sender::{SendError, SendOptions, SendStats, Sender};
pub use sink::{Point, Sink, SinkError};
