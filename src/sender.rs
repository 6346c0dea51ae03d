//! The send loop.
//!
//! Each tick collects every measurement, turns the map into a timestamped
//! batch and writes it to the sink. With an interval the loop repeats until
//! the tick budget runs out or the process is stopped; with
//! `ignore_errors` a failed tick is logged and retried after
//! [`ERROR_COOLDOWN`].

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::{CollectError, StatAggregator};
use crate::collectors::SnapshotSource;
use crate::docker::ContainerTool;
use crate::point::Measurements;
use crate::sink::{Point, Sink, SinkError};

/// Pause after a failed tick before trying again.
pub const ERROR_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SendError {
    #[error("collecting stats failed: {0}")]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl SendError {
    /// False when the sink rejected the request itself (bad credentials,
    /// missing database); repeating the same tick will not help.
    pub fn is_retryable(&self) -> bool {
        match self {
            SendError::Collect(_) => true,
            SendError::Sink(e) => e.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Pretty-print every batch as JSON on stdout.
    pub print_points: bool,
    pub database: String,
    pub create_database: bool,
    /// Merged into the tags of every point, overriding same-named tags.
    pub extra_tags: BTreeMap<String, String>,
    /// Repeat with this pause between ticks; single shot when `None`.
    pub interval: Option<Duration>,
    /// Keep looping after a failed tick. Only honored with an interval.
    pub ignore_errors: bool,
    /// Stop after this many ticks, failed ones included.
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub ticks: u64,
    pub sent_batches: u64,
    pub failures: u64,
}

/// What one successful tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub points: usize,
    /// `false` in dry-run mode.
    pub sent: bool,
}

/// Stamps every measurement with `time` and the extra tags.
pub fn build_batch(
    measurements: Measurements,
    time: DateTime<Utc>,
    extra_tags: &BTreeMap<String, String>,
) -> Vec<Point> {
    measurements
        .into_iter()
        .map(|(measurement, point)| {
            let mut tags = point.tags;
            tags.extend(extra_tags.iter().map(|(k, v)| (k.clone(), v.clone())));
            Point {
                measurement,
                time,
                tags,
                fields: point.fields,
            }
        })
        .collect()
}

pub struct Sender<S, T, K> {
    aggregator: StatAggregator<S, T>,
    /// `None` runs dry: collect and print, never send.
    sink: Option<K>,
    options: SendOptions,
    create_attempted: bool,
    stats: SendStats,
}

impl<S, T, K> Sender<S, T, K>
where
    S: SnapshotSource,
    T: ContainerTool,
    K: Sink,
{
    pub fn new(aggregator: StatAggregator<S, T>, sink: Option<K>, options: SendOptions) -> Self {
        Self {
            aggregator,
            sink,
            options,
            create_attempted: false,
            stats: SendStats::default(),
        }
    }

    pub fn stats(&self) -> SendStats {
        self.stats
    }

    /// One collect-and-send cycle.
    #[instrument(skip(self))]
    pub async fn tick(&mut self) -> Result<TickReport, SendError> {
        debug!("Getting stats...");
        let measurements = self.aggregator.collect_all()?;
        let points = build_batch(measurements, Utc::now(), &self.options.extra_tags);

        if self.options.print_points {
            match serde_json::to_string_pretty(&points) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!("Failed to render points as JSON: {}", e),
            }
        }

        let Some(sink) = &self.sink else {
            debug!("Dry run, not sending {} points", points.len());
            return Ok(TickReport {
                points: points.len(),
                sent: false,
            });
        };

        if self.options.create_database && !self.create_attempted {
            self.create_attempted = true;
            debug!("Creating database {}", self.options.database);
            sink.create_database(&self.options.database).await?;
        }

        debug!("Sending {} points...", points.len());
        sink.write_points(&points).await?;
        debug!("Send successful");

        Ok(TickReport {
            points: points.len(),
            sent: true,
        })
    }

    /// Ticks until done. Returns the first error unless errors are ignored.
    pub async fn run(&mut self) -> Result<SendStats, SendError> {
        loop {
            let result = self.tick().await;
            self.stats.ticks += 1;

            let pause = match result {
                Ok(report) => {
                    if report.sent {
                        self.stats.sent_batches += 1;
                    }
                    info!(
                        "Tick {} done, {} points{}",
                        self.stats.ticks,
                        report.points,
                        if report.sent { " sent" } else { "" }
                    );
                    match self.options.interval {
                        Some(interval) => interval,
                        None => break,
                    }
                }
                Err(e) => {
                    self.stats.failures += 1;
                    if self.options.interval.is_none() || !self.options.ignore_errors {
                        return Err(e);
                    }
                    if e.is_retryable() {
                        warn!(
                            "Tick {} failed: {}; retrying in {}s",
                            self.stats.ticks,
                            e,
                            ERROR_COOLDOWN.as_secs()
                        );
                    } else {
                        error!(
                            "Tick {} rejected by the database: {}; check credentials and database, retrying in {}s",
                            self.stats.ticks,
                            e,
                            ERROR_COOLDOWN.as_secs()
                        );
                    }
                    ERROR_COOLDOWN
                }
            };

            if self.budget_spent() {
                break;
            }
            tokio::time::sleep(pause).await;
        }

        Ok(self.stats)
    }

    fn budget_spent(&self) -> bool {
        self.options
            .count
            .is_some_and(|count| self.stats.ticks >= count)
    }
}
