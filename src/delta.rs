//! Cumulative counter tracking.
//!
//! Disk and network counters only ever grow. [`DeltaTracker`] remembers the
//! last absolute reading per measurement key and turns each new reading into
//! the increase since the previous tick.

use ahash::AHashMap as HashMap;
use std::collections::BTreeMap;
use tracing::debug;

use crate::point::{MeasurementKey, MetricPoint, Value};

/// Last-seen absolute readings, keyed by measurement.
///
/// Baselines are never pruned. A device that disappears keeps its entry, and
/// if it comes back the next delta is taken against that stale reading.
///
/// Not synchronized: call [`DeltaTracker::delta`] once per key per tick from
/// the collection task only.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    previous: HashMap<MeasurementKey, BTreeMap<String, Value>>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a point of absolute counters into a point of per-tick deltas.
    ///
    /// The first reading for a key becomes the baseline and is reported as all
    /// zeros. Later readings report `current - baseline` per field and replace
    /// the baseline. Tags pass through unchanged. Negative deltas (counter
    /// resets) are not corrected.
    pub fn delta(&mut self, key: &str, point: MetricPoint) -> MetricPoint {
        let MetricPoint { fields, tags } = point;

        let deltas = match self.previous.get(key) {
            Some(baseline) => fields
                .iter()
                .map(|(name, current)| {
                    let delta = match baseline.get(name) {
                        Some(previous) => current.minus(previous),
                        None => current.zeroed(),
                    };
                    (name.clone(), delta)
                })
                .collect(),
            None => {
                debug!("New cumulative series '{}', recording baseline", key);
                fields
                    .iter()
                    .map(|(name, current)| (name.clone(), current.zeroed()))
                    .collect()
            }
        };

        self.previous.insert(key.to_string(), fields);

        MetricPoint {
            fields: deltas,
            tags,
        }
    }

    /// Number of series with a recorded baseline.
    pub fn tracked_series(&self) -> usize {
        self.previous.len()
    }

    pub fn baseline(&self, key: &str) -> Option<&BTreeMap<String, Value>> {
        self.previous.get(key)
    }
}
