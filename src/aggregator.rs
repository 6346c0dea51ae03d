//! Stat aggregation across all metric families.
//!
//! [`StatAggregator`] asks the snapshot source for every family, normalizes
//! the records into points, routes the cumulative disk and network counters
//! through the [`DeltaTracker`] and merges everything into one map keyed by
//! measurement name. Families use distinct prefixes; should two of them ever
//! emit the same name, the family merged later wins.
//!
//! A failing container tool only costs that tick's `docker_*` points; the
//! host families are still reported.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::collectors::{SnapshotSource, SourceError};
use crate::delta::DeltaTracker;
use crate::docker::{ContainerCollector, ContainerTool, DockerCli};
use crate::normalize::{items_from_list, items_from_map, parse, prefixed, split_tags_and_fields};
use crate::point::Measurements;

/// Fan sensor points carry the sensor label as a tag.
const FAN_TAGS: &[&str] = &["label"];

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Source(#[from] SourceError),
}

pub struct StatAggregator<S, T = DockerCli> {
    source: S,
    containers: Option<ContainerCollector<T>>,
    tracker: DeltaTracker,
    /// Result of the one-time CPU frequency probe.
    cpu_supported: Option<bool>,
}

impl<S: SnapshotSource> StatAggregator<S, DockerCli> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            containers: None,
            tracker: DeltaTracker::new(),
            cpu_supported: None,
        }
    }
}

impl<S: SnapshotSource, T: ContainerTool> StatAggregator<S, T> {
    /// Adds per-container points to every collection.
    pub fn with_containers<U: ContainerTool>(
        self,
        containers: ContainerCollector<U>,
    ) -> StatAggregator<S, U> {
        StatAggregator {
            source: self.source,
            containers: Some(containers),
            tracker: self.tracker,
            cpu_supported: self.cpu_supported,
        }
    }

    pub fn tracker(&self) -> &DeltaTracker {
        &self.tracker
    }

    /// Collects every family into one measurement map.
    #[instrument(skip(self))]
    pub fn collect_all(&mut self) -> Result<Measurements, CollectError> {
        let mut all = Measurements::new();

        merge(&mut all, self.load_stats());
        merge(&mut all, self.cpu_stats()?);
        merge(&mut all, self.vm_stats()?);
        merge(&mut all, self.swap_stats()?);
        merge(&mut all, self.disk_io_stats()?);
        merge(&mut all, self.net_io_stats()?);
        merge(&mut all, self.fan_stats()?);

        if let Some(containers) = &self.containers {
            match containers.collect() {
                Ok(points) => merge(&mut all, points),
                Err(e) => warn!("Skipping container stats this tick: {}", e),
            }
        }

        debug!("Collected {} measurements", all.len());
        Ok(all)
    }

    fn load_stats(&self) -> Measurements {
        let mut points = Measurements::new();
        if let Some(load) = self.source.load_average() {
            points.insert("load".to_string(), parse(&load, "", &[]));
        }
        points
    }

    /// `cpu` plus one `cpu<i>` per core. Skipped for good when the first probe
    /// finds no frequency information.
    fn cpu_stats(&mut self) -> Result<Measurements, SourceError> {
        let mut points = Measurements::new();
        let freq = self.source.cpu_freq();

        let supported = *self.cpu_supported.get_or_insert_with(|| {
            if freq.is_none() {
                info!("CPU frequency not available, CPU stats disabled");
            }
            freq.is_some()
        });
        if !supported {
            return Ok(points);
        }

        let mut attributes = prefixed(&self.source.cpu_counts()?, "");
        if let Some(freq) = freq {
            attributes.extend(prefixed(&freq, "freq_"));
        }
        attributes.extend(prefixed(&self.source.cpu_stats()?, ""));
        points.insert("cpu".to_string(), split_tags_and_fields(attributes, &[]));

        points.extend(items_from_list(
            &self.source.cpu_freq_per_core(),
            "cpu",
            "freq_",
            &[],
        ));
        Ok(points)
    }

    fn vm_stats(&self) -> Result<Measurements, SourceError> {
        let mut points = Measurements::new();
        points.insert(
            "virtual_memory".to_string(),
            parse(&self.source.virtual_memory()?, "", &[]),
        );
        Ok(points)
    }

    fn swap_stats(&self) -> Result<Measurements, SourceError> {
        let mut points = Measurements::new();
        points.insert("swap".to_string(), parse(&self.source.swap_memory()?, "", &[]));
        Ok(points)
    }

    fn disk_io_stats(&mut self) -> Result<Measurements, SourceError> {
        let mut points = Measurements::new();
        points.insert("disk".to_string(), parse(&self.source.disk_io_total()?, "", &[]));
        points.extend(items_from_map(
            &self.source.disk_io_per_device()?,
            "disk_",
            "",
            &[],
        ));
        Ok(self.track(points))
    }

    fn net_io_stats(&mut self) -> Result<Measurements, SourceError> {
        let mut points = Measurements::new();
        points.insert("net".to_string(), parse(&self.source.net_io_total()?, "", &[]));
        points.extend(items_from_map(
            &self.source.net_io_per_interface()?,
            "net_",
            "",
            &[],
        ));
        Ok(self.track(points))
    }

    fn fan_stats(&self) -> Result<Measurements, SourceError> {
        let mut points = Measurements::new();
        for (sysname, fans) in self.source.sensors_fans()? {
            points.extend(items_from_list(
                &fans,
                &format!("fan_{sysname}_"),
                "",
                FAN_TAGS,
            ));
        }
        Ok(points)
    }

    /// Replaces absolute counters with deltas, each key tracked on its own.
    fn track(&mut self, points: Measurements) -> Measurements {
        points
            .into_iter()
            .map(|(key, point)| {
                let delta = self.tracker.delta(&key, point);
                (key, delta)
            })
            .collect()
    }
}

/// Adds one family's points; a name already present is replaced.
fn merge(all: &mut Measurements, family: Measurements) {
    for (key, point) in family {
        if all.insert(key.clone(), point).is_some() {
            debug!("Measurement {} replaced by a later family", key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::{MetricPoint, Value};

    #[test]
    fn test_later_family_wins_on_name_clash() {
        let mut all = Measurements::new();

        let mut host = Measurements::new();
        host.insert("disk".to_string(), MetricPoint::new().with_field("read_bytes", 1u64));
        host.insert("load".to_string(), MetricPoint::new().with_field("load1", 0.5));
        merge(&mut all, host);

        let mut later = Measurements::new();
        later.insert("disk".to_string(), MetricPoint::new().with_field("busy_time", 7u64));
        merge(&mut all, later);

        assert_eq!(all.len(), 2);
        assert_eq!(all["disk"].field("busy_time"), Some(&Value::Integer(7)));
        assert!(all["disk"].field("read_bytes").is_none());
        assert_eq!(all["load"].field("load1"), Some(&Value::Float(0.5)));
    }
}
