//! Snapshot sources for host metrics.
//!
//! [`SnapshotSource`] is the seam between the aggregator and the operating
//! system: it hands out typed records per metric family. [`ProcfsSource`] is
//! the Linux implementation backed by /proc and /sys.

pub mod diskstats;
pub mod fans;
pub mod netdev;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use diskstats::DiskIoCounters;
pub use fans::FanReading;
pub use netdev::NetIoCounters;

use crate::system::{self, CpuCounts, CpuFreq, CpuStats, LoadAverage, SwapMemory, VirtualMemory};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {detail}", path.display())]
    Parse { path: PathBuf, detail: String },
}

pub(crate) fn read_file(path: &Path) -> Result<String, SourceError> {
    fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Structured counter snapshots, one call per metric family.
///
/// Keyed collections are ordered by device, interface or sensor name.
pub trait SnapshotSource {
    /// `None` where the platform has no load average.
    fn load_average(&self) -> Option<LoadAverage>;

    fn cpu_counts(&self) -> Result<CpuCounts, SourceError>;

    /// Frequency averaged over all cores; `None` when not obtainable.
    fn cpu_freq(&self) -> Option<CpuFreq>;

    /// Per-core frequencies in core order; empty when not obtainable.
    fn cpu_freq_per_core(&self) -> Vec<CpuFreq>;

    fn cpu_stats(&self) -> Result<CpuStats, SourceError>;

    fn virtual_memory(&self) -> Result<VirtualMemory, SourceError>;

    fn swap_memory(&self) -> Result<SwapMemory, SourceError>;

    fn disk_io_total(&self) -> Result<DiskIoCounters, SourceError>;

    fn disk_io_per_device(&self) -> Result<BTreeMap<String, DiskIoCounters>, SourceError>;

    fn net_io_total(&self) -> Result<NetIoCounters, SourceError>;

    fn net_io_per_interface(&self) -> Result<BTreeMap<String, NetIoCounters>, SourceError>;

    /// Fan readings grouped by sensor chip name.
    fn sensors_fans(&self) -> Result<BTreeMap<String, Vec<FanReading>>, SourceError>;
}

/// Reads snapshots from procfs and sysfs.
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    proc_root: PathBuf,
    sys_root: PathBuf,
    page_size: u64,
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsSource {
    pub fn new() -> Self {
        Self::with_roots("/proc", "/sys")
    }

    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            page_size: system::page_size(),
        }
    }
}

impl SnapshotSource for ProcfsSource {
    fn load_average(&self) -> Option<LoadAverage> {
        system::read_load_average(&self.proc_root).ok()
    }

    fn cpu_counts(&self) -> Result<CpuCounts, SourceError> {
        system::read_cpu_counts(&self.proc_root)
    }

    fn cpu_freq(&self) -> Option<CpuFreq> {
        CpuFreq::average(&self.cpu_freq_per_core())
    }

    fn cpu_freq_per_core(&self) -> Vec<CpuFreq> {
        system::read_cpu_freqs(&self.proc_root, &self.sys_root)
    }

    fn cpu_stats(&self) -> Result<CpuStats, SourceError> {
        system::read_cpu_stats(&self.proc_root)
    }

    fn virtual_memory(&self) -> Result<VirtualMemory, SourceError> {
        system::read_virtual_memory(&self.proc_root)
    }

    fn swap_memory(&self) -> Result<SwapMemory, SourceError> {
        system::read_swap_memory(&self.proc_root, self.page_size)
    }

    fn disk_io_total(&self) -> Result<DiskIoCounters, SourceError> {
        let per_device = self.disk_io_per_device()?;
        Ok(diskstats::total_over_disks(&per_device, &self.sys_root))
    }

    fn disk_io_per_device(&self) -> Result<BTreeMap<String, DiskIoCounters>, SourceError> {
        diskstats::read_diskstats(&self.proc_root)
    }

    fn net_io_total(&self) -> Result<NetIoCounters, SourceError> {
        Ok(NetIoCounters::total(self.net_io_per_interface()?.values()))
    }

    fn net_io_per_interface(&self) -> Result<BTreeMap<String, NetIoCounters>, SourceError> {
        netdev::read_netdev_stats(&self.proc_root)
    }

    fn sensors_fans(&self) -> Result<BTreeMap<String, Vec<FanReading>>, SourceError> {
        fans::read_fans(&self.sys_root)
    }
}
