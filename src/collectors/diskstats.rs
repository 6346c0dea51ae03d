//! Disk I/O statistics collector.
//!
//! This module reads per-device counters from /proc/diskstats. All values are
//! cumulative since boot.

use std::collections::BTreeMap;
use std::path::Path;

use super::{read_file, SourceError};
use crate::normalize::Record;
use crate::point::Value;

const SECTOR_SIZE: u64 = 512;

/// Disk counters for a single device (or the sum over whole disks).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskIoCounters {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_time: u64,
    pub write_time: u64,
    pub read_merged_count: u64,
    pub write_merged_count: u64,
    pub busy_time: u64,
}

impl DiskIoCounters {
    fn accumulate(&mut self, other: &DiskIoCounters) {
        self.read_count = self.read_count.saturating_add(other.read_count);
        self.write_count = self.write_count.saturating_add(other.write_count);
        self.read_bytes = self.read_bytes.saturating_add(other.read_bytes);
        self.write_bytes = self.write_bytes.saturating_add(other.write_bytes);
        self.read_time = self.read_time.saturating_add(other.read_time);
        self.write_time = self.write_time.saturating_add(other.write_time);
        self.read_merged_count = self.read_merged_count.saturating_add(other.read_merged_count);
        self.write_merged_count = self.write_merged_count.saturating_add(other.write_merged_count);
        self.busy_time = self.busy_time.saturating_add(other.busy_time);
    }
}

impl Record for DiskIoCounters {
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("read_count", self.read_count.into()),
            ("write_count", self.write_count.into()),
            ("read_bytes", self.read_bytes.into()),
            ("write_bytes", self.write_bytes.into()),
            ("read_time", self.read_time.into()),
            ("write_time", self.write_time.into()),
            ("read_merged_count", self.read_merged_count.into()),
            ("write_merged_count", self.write_merged_count.into()),
            ("busy_time", self.busy_time.into()),
        ]
    }
}

/// Reads disk statistics from <proc>/diskstats.
///
/// Format: major minor name read_ios read_merges read_sectors read_ticks write_ios write_merges write_sectors write_ticks ios_in_progress time_in_queue weighted_time_in_queue
pub fn read_diskstats(proc_root: &Path) -> Result<BTreeMap<String, DiskIoCounters>, SourceError> {
    let content = read_file(&proc_root.join("diskstats"))?;
    Ok(parse_diskstats(&content))
}

pub fn parse_diskstats(content: &str) -> BTreeMap<String, DiskIoCounters> {
    let mut stats = BTreeMap::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue; // Skip malformed lines
        }

        let device = parts[2].to_string();

        if device.starts_with("loop") || device.starts_with("ram") {
            continue;
        }

        let field = |i: usize| parts[i].parse::<u64>().unwrap_or(0);

        stats.insert(
            device,
            DiskIoCounters {
                read_count: field(3),
                read_merged_count: field(4),
                read_bytes: field(5).saturating_mul(SECTOR_SIZE),
                read_time: field(6),
                write_count: field(7),
                write_merged_count: field(8),
                write_bytes: field(9).saturating_mul(SECTOR_SIZE),
                write_time: field(10),
                busy_time: field(12),
            },
        );
    }

    stats
}

/// Sums whole disks only, so partitions are not counted twice.
///
/// A device is a whole disk when it has an entry under <sys>/block (sysfs
/// spells '/' in device names as '!'). If <sys>/block cannot be read every
/// device is summed.
pub fn total_over_disks(
    per_device: &BTreeMap<String, DiskIoCounters>,
    sys_root: &Path,
) -> DiskIoCounters {
    let block = sys_root.join("block");
    let have_block = block.is_dir();

    let mut total = DiskIoCounters::default();
    for (device, counters) in per_device {
        if have_block && !block.join(device.replace('/', "!")).exists() {
            continue;
        }
        total.accumulate(counters);
    }
    total
}
