//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sysinfo_influxdb::collectors::{DiskIoCounters, FanReading, NetIoCounters};
use sysinfo_influxdb::docker::ContainerTool;
use sysinfo_influxdb::system::{CpuCounts, CpuFreq, CpuStats, LoadAverage, SwapMemory, VirtualMemory};
use sysinfo_influxdb::{ContainerError, Point, Sink, SinkError, SnapshotSource, SourceError};

/// What the fake source reports on the next collection.
#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub load: Option<LoadAverage>,
    pub freq: Option<CpuFreq>,
    pub per_core: Vec<CpuFreq>,
    pub disks: BTreeMap<String, DiskIoCounters>,
    pub nets: BTreeMap<String, NetIoCounters>,
    pub fans: BTreeMap<String, Vec<FanReading>>,
    pub fail_memory: bool,
}

/// Snapshot source whose readings the test changes between ticks.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSource {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn update(&self, change: impl FnOnce(&mut FakeState)) {
        change(&mut self.state.lock().unwrap());
    }

    fn read<R>(&self, f: impl FnOnce(&FakeState) -> R) -> R {
        f(&self.state.lock().unwrap())
    }
}

pub fn disk(read_bytes: u64) -> DiskIoCounters {
    DiskIoCounters {
        read_bytes,
        ..Default::default()
    }
}

pub fn nic(bytes_recv: u64) -> NetIoCounters {
    NetIoCounters {
        bytes_recv,
        ..Default::default()
    }
}

pub fn freq(current: f64) -> CpuFreq {
    CpuFreq {
        current,
        min: 800.0,
        max: 3600.0,
    }
}

impl SnapshotSource for FakeSource {
    fn load_average(&self) -> Option<LoadAverage> {
        self.read(|s| s.load)
    }

    fn cpu_counts(&self) -> Result<CpuCounts, SourceError> {
        Ok(CpuCounts {
            physical: 2,
            logical: 4,
        })
    }

    fn cpu_freq(&self) -> Option<CpuFreq> {
        self.read(|s| s.freq)
    }

    fn cpu_freq_per_core(&self) -> Vec<CpuFreq> {
        self.read(|s| s.per_core.clone())
    }

    fn cpu_stats(&self) -> Result<CpuStats, SourceError> {
        Ok(CpuStats {
            ctx_switches: 100,
            ..Default::default()
        })
    }

    fn virtual_memory(&self) -> Result<VirtualMemory, SourceError> {
        if self.read(|s| s.fail_memory) {
            return Err(SourceError::Parse {
                path: "/proc/meminfo".into(),
                detail: "truncated".to_string(),
            });
        }
        Ok(VirtualMemory {
            total: 1000,
            available: 600,
            percent: 40.0,
            ..Default::default()
        })
    }

    fn swap_memory(&self) -> Result<SwapMemory, SourceError> {
        Ok(SwapMemory::default())
    }

    fn disk_io_total(&self) -> Result<DiskIoCounters, SourceError> {
        Ok(disk(self.read(|s| s.disks.values().map(|d| d.read_bytes).sum())))
    }

    fn disk_io_per_device(&self) -> Result<BTreeMap<String, DiskIoCounters>, SourceError> {
        Ok(self.read(|s| s.disks.clone()))
    }

    fn net_io_total(&self) -> Result<NetIoCounters, SourceError> {
        Ok(self.read(|s| NetIoCounters::total(s.nets.values())))
    }

    fn net_io_per_interface(&self) -> Result<BTreeMap<String, NetIoCounters>, SourceError> {
        Ok(self.read(|s| s.nets.clone()))
    }

    fn sensors_fans(&self) -> Result<BTreeMap<String, Vec<FanReading>>, SourceError> {
        Ok(self.read(|s| s.fans.clone()))
    }
}

/// Container tool returning canned output and counting inspect calls.
#[derive(Debug, Default)]
pub struct FakeTool {
    pub stats_output: String,
    pub inspect_output: String,
    pub inspect_calls: Arc<AtomicUsize>,
}

impl FakeTool {
    pub fn new(stats_output: &str, inspect_output: &str) -> Self {
        Self {
            stats_output: stats_output.to_string(),
            inspect_output: inspect_output.to_string(),
            inspect_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ContainerTool for FakeTool {
    fn stats(&self) -> Result<String, ContainerError> {
        Ok(self.stats_output.clone())
    }

    fn inspect(&self, _container_id: &str) -> Result<String, ContainerError> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.inspect_output.clone())
    }
}

/// Everything a [`FakeSink`] saw.
#[derive(Debug, Default)]
pub struct SinkLog {
    /// Time of every write attempt, failed ones included.
    pub attempts: Vec<tokio::time::Instant>,
    pub batches: Vec<Vec<Point>>,
    pub created: Vec<String>,
    /// Scripted outcomes for upcoming writes; empty means success.
    pub script: VecDeque<Option<u16>>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeSink {
    pub log: Arc<Mutex<SinkLog>>,
}

impl FakeSink {
    /// The next writes fail with the given HTTP codes, in order.
    pub fn failing_with(codes: &[u16]) -> Self {
        let sink = Self::default();
        sink.log.lock().unwrap().script = codes.iter().map(|c| Some(*c)).collect();
        sink
    }
}

#[async_trait]
impl Sink for FakeSink {
    async fn create_database(&self, database: &str) -> Result<(), SinkError> {
        self.log.lock().unwrap().created.push(database.to_string());
        Ok(())
    }

    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        let mut log = self.log.lock().unwrap();
        log.attempts.push(tokio::time::Instant::now());

        match log.script.pop_front().flatten() {
            Some(code) if code < 500 => Err(SinkError::Client {
                code,
                message: "rejected".to_string(),
            }),
            Some(code) => Err(SinkError::Server {
                code,
                message: "unavailable".to_string(),
            }),
            None => {
                log.batches.push(points.to_vec());
                Ok(())
            }
        }
    }
}
