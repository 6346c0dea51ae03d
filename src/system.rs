//! System-wide metrics collection from the /proc filesystem.
//!
//! This module provides the readers for load average, CPU counts, frequencies
//! and counters, virtual memory and swap. Every reader takes the proc (and
//! where needed sys) root so tests can point it at a fake tree.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::collectors::{read_file, SourceError};
use crate::normalize::Record;
use crate::point::Value;

/// System load averages for 1, 5, and 15 minute intervals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAverage {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

impl Record for LoadAverage {
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("load1", self.load1.into()),
            ("load5", self.load5.into()),
            ("load15", self.load15.into()),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuCounts {
    pub physical: u64,
    pub logical: u64,
}

impl Record for CpuCounts {
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("count_physical", self.physical.into()),
            ("count_logical", self.logical.into()),
        ]
    }
}

/// CPU frequency in MHz.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuFreq {
    pub current: f64,
    pub min: f64,
    pub max: f64,
}

impl CpuFreq {
    /// Mean over all cores, `None` for an empty slice.
    pub fn average(cores: &[CpuFreq]) -> Option<CpuFreq> {
        if cores.is_empty() {
            return None;
        }
        let n = cores.len() as f64;
        Some(CpuFreq {
            current: cores.iter().map(|c| c.current).sum::<f64>() / n,
            min: cores.iter().map(|c| c.min).sum::<f64>() / n,
            max: cores.iter().map(|c| c.max).sum::<f64>() / n,
        })
    }
}

impl Record for CpuFreq {
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("current", self.current.into()),
            ("min", self.min.into()),
            ("max", self.max.into()),
        ]
    }
}

/// Kernel-wide CPU event counters from /proc/stat.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuStats {
    pub ctx_switches: u64,
    pub interrupts: u64,
    pub soft_interrupts: u64,
    /// Not exposed by Linux, always 0 there.
    pub syscalls: u64,
}

impl Record for CpuStats {
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("ctx_switches", self.ctx_switches.into()),
            ("interrupts", self.interrupts.into()),
            ("soft_interrupts", self.soft_interrupts.into()),
            ("syscalls", self.syscalls.into()),
        ]
    }
}

/// Virtual memory usage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VirtualMemory {
    pub total: u64,
    pub available: u64,
    pub percent: f64,
    pub used: u64,
    pub free: u64,
    pub active: u64,
    pub inactive: u64,
    pub buffers: u64,
    pub cached: u64,
    pub shared: u64,
    pub slab: u64,
}

impl Record for VirtualMemory {
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("total", self.total.into()),
            ("available", self.available.into()),
            ("percent", self.percent.into()),
            ("used", self.used.into()),
            ("free", self.free.into()),
            ("active", self.active.into()),
            ("inactive", self.inactive.into()),
            ("buffers", self.buffers.into()),
            ("cached", self.cached.into()),
            ("shared", self.shared.into()),
            ("slab", self.slab.into()),
        ]
    }
}

/// Swap usage in bytes; `sin`/`sout` are cumulative bytes swapped in/out.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SwapMemory {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
    pub sin: u64,
    pub sout: u64,
}

impl Record for SwapMemory {
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("total", self.total.into()),
            ("used", self.used.into()),
            ("free", self.free.into()),
            ("percent", self.percent.into()),
            ("sin", self.sin.into()),
            ("sout", self.sout.into()),
        ]
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64 * 1000.0).round() / 10.0
    }
}

/// Reads load average from <proc>/loadavg.
///
/// Format: "0.00 0.01 0.05 1/234 5678"
pub fn read_load_average(proc_root: &Path) -> Result<LoadAverage, SourceError> {
    let path = proc_root.join("loadavg");
    let content = read_file(&path)?;
    parse_load_average(&content).map_err(|detail| SourceError::Parse { path, detail })
}

pub fn parse_load_average(content: &str) -> Result<LoadAverage, String> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(format!(
            "expected at least 3 fields, got {}",
            parts.len()
        ));
    }

    let load1 = parts[0]
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse 1min load average: {}", e))?;
    let load5 = parts[1]
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse 5min load average: {}", e))?;
    let load15 = parts[2]
        .parse::<f64>()
        .map_err(|e| format!("Failed to parse 15min load average: {}", e))?;

    Ok(LoadAverage {
        load1,
        load5,
        load15,
    })
}

/// Logical CPUs are the `cpuN` lines of /proc/stat; physical cores are the
/// distinct (physical id, core id) pairs of /proc/cpuinfo.
pub fn read_cpu_counts(proc_root: &Path) -> Result<CpuCounts, SourceError> {
    let stat_path = proc_root.join("stat");
    let stat = read_file(&stat_path)?;
    let logical = stat
        .lines()
        .filter(|line| {
            line.strip_prefix("cpu")
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .count() as u64;

    if logical == 0 {
        return Err(SourceError::Parse {
            path: stat_path,
            detail: "no per-cpu lines".to_string(),
        });
    }

    let physical = read_file(&proc_root.join("cpuinfo"))
        .map(|cpuinfo| count_physical_cores(&cpuinfo))
        .unwrap_or(0);

    Ok(CpuCounts {
        physical: if physical == 0 { logical } else { physical },
        logical,
    })
}

fn count_physical_cores(cpuinfo: &str) -> u64 {
    let mut cores = BTreeSet::new();
    let mut physical_id: Option<&str> = None;
    for line in cpuinfo.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "physical id" => physical_id = Some(value.trim()),
            "core id" => {
                cores.insert((physical_id.unwrap_or("0"), value.trim()));
            }
            _ => {}
        }
    }
    cores.len() as u64
}

/// Reads ctxt, intr and softirq totals from /proc/stat.
pub fn read_cpu_stats(proc_root: &Path) -> Result<CpuStats, SourceError> {
    let path = proc_root.join("stat");
    let content = read_file(&path)?;

    let first_number = |rest: &str| {
        rest.split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
    };

    let mut context_switches: Option<u64> = None;
    let mut interrupts: Option<u64> = None;
    let mut soft_interrupts: Option<u64> = None;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("ctxt ") {
            context_switches = first_number(rest);
        } else if let Some(rest) = line.strip_prefix("intr ") {
            interrupts = first_number(rest);
        } else if let Some(rest) = line.strip_prefix("softirq ") {
            soft_interrupts = first_number(rest);
        }
    }

    match context_switches {
        Some(ctx_switches) => Ok(CpuStats {
            ctx_switches,
            interrupts: interrupts.unwrap_or(0),
            soft_interrupts: soft_interrupts.unwrap_or(0),
            syscalls: 0,
        }),
        None => Err(SourceError::Parse {
            path,
            detail: "missing ctxt line".to_string(),
        }),
    }
}

/// Per-core frequencies in MHz, in core order.
///
/// Prefers cpufreq in sysfs (kHz) and falls back to the "cpu MHz" lines of
/// /proc/cpuinfo, which carry no min/max. Empty when neither is available.
pub fn read_cpu_freqs(proc_root: &Path, sys_root: &Path) -> Vec<CpuFreq> {
    let from_sysfs = read_cpufreq_sysfs(sys_root);
    if !from_sysfs.is_empty() {
        return from_sysfs;
    }

    read_file(&proc_root.join("cpuinfo"))
        .map(|cpuinfo| {
            cpuinfo
                .lines()
                .filter_map(|line| {
                    let (key, value) = line.split_once(':')?;
                    if key.trim() != "cpu MHz" {
                        return None;
                    }
                    let current = value.trim().parse::<f64>().ok()?;
                    Some(CpuFreq {
                        current,
                        min: 0.0,
                        max: 0.0,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn read_cpufreq_sysfs(sys_root: &Path) -> Vec<CpuFreq> {
    let cpu_base = sys_root.join("devices/system/cpu");
    let Ok(entries) = std::fs::read_dir(&cpu_base) else {
        return Vec::new();
    };

    let mut cores: Vec<u32> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            name.to_str()?.strip_prefix("cpu")?.parse::<u32>().ok()
        })
        .collect();
    cores.sort_unstable();

    let read_khz = |path: &Path| -> Option<f64> {
        std::fs::read_to_string(path)
            .ok()?
            .trim()
            .parse::<f64>()
            .ok()
            .map(|khz| khz / 1000.0)
    };

    cores
        .into_iter()
        .filter_map(|core| {
            let dir = cpu_base.join(format!("cpu{core}/cpufreq"));
            let current = read_khz(&dir.join("scaling_cur_freq"))?;
            Some(CpuFreq {
                current,
                min: read_khz(&dir.join("cpuinfo_min_freq")).unwrap_or(0.0),
                max: read_khz(&dir.join("cpuinfo_max_freq")).unwrap_or(0.0),
            })
        })
        .collect()
}

/// Parses /proc/meminfo into a name → bytes map.
fn parse_meminfo(content: &str) -> HashMap<&str, u64> {
    content
        .lines()
        .filter_map(|line| {
            let (key, rest) = line.split_once(':')?;
            let mut parts = rest.split_whitespace();
            let value = parts.next()?.parse::<u64>().ok()?;
            let bytes = match parts.next() {
                Some("kB") => value * 1024,
                _ => value,
            };
            Some((key.trim(), bytes))
        })
        .collect()
}

/// Reads virtual memory figures from <proc>/meminfo.
pub fn read_virtual_memory(proc_root: &Path) -> Result<VirtualMemory, SourceError> {
    let path = proc_root.join("meminfo");
    let content = read_file(&path)?;
    let info = parse_meminfo(&content);
    let get = |key: &str| info.get(key).copied();

    let (Some(total), Some(free)) = (get("MemTotal"), get("MemFree")) else {
        return Err(SourceError::Parse {
            path,
            detail: "missing MemTotal or MemFree".to_string(),
        });
    };

    let buffers = get("Buffers").unwrap_or(0);
    let cached = get("Cached").unwrap_or(0) + get("SReclaimable").unwrap_or(0);
    let available = get("MemAvailable").unwrap_or(free + buffers + cached);
    let used = total
        .checked_sub(free + buffers + cached)
        .unwrap_or_else(|| total.saturating_sub(free));

    Ok(VirtualMemory {
        total,
        available,
        percent: percent(total.saturating_sub(available), total),
        used,
        free,
        active: get("Active").unwrap_or(0),
        inactive: get("Inactive").unwrap_or(0),
        buffers,
        cached,
        shared: get("Shmem").unwrap_or(0),
        slab: get("Slab").unwrap_or(0),
    })
}

/// Reads swap totals from <proc>/meminfo and swap traffic from <proc>/vmstat.
pub fn read_swap_memory(proc_root: &Path, page_size: u64) -> Result<SwapMemory, SourceError> {
    let path = proc_root.join("meminfo");
    let content = read_file(&path)?;
    let info = parse_meminfo(&content);

    let (Some(&total), Some(&free)) = (info.get("SwapTotal"), info.get("SwapFree")) else {
        return Err(SourceError::Parse {
            path,
            detail: "missing SwapTotal or SwapFree".to_string(),
        });
    };
    let used = total.saturating_sub(free);

    // vmstat is optional: containers sometimes hide it
    let (mut sin, mut sout) = (0, 0);
    if let Ok(vmstat) = read_file(&proc_root.join("vmstat")) {
        for line in vmstat.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let Ok(pages) = value.parse::<u64>() else {
                continue;
            };
            match key {
                "pswpin" => sin = pages * page_size,
                "pswpout" => sout = pages * page_size,
                _ => {}
            }
        }
    }

    Ok(SwapMemory {
        total,
        used,
        free,
        percent: percent(used, total),
        sin,
        sout,
    })
}

/// System page size in bytes.
pub fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions and only reads a constant.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

/// Local host name, `localhost` when it cannot be determined.
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load_average() {
        let load = parse_load_average("0.52 0.58 0.59 2/1190 12345").unwrap();
        assert!((load.load1 - 0.52).abs() < 0.001);
        assert!((load.load5 - 0.58).abs() < 0.001);
        assert!((load.load15 - 0.59).abs() < 0.001);
    }

    #[test]
    fn test_parse_load_average_invalid() {
        assert!(parse_load_average("0.52 0.58").is_err());
        assert!(parse_load_average("abc def ghi 1/2 3").is_err());
    }

    #[test]
    fn test_count_physical_cores() {
        let cpuinfo = "processor\t: 0\nphysical id\t: 0\ncore id\t: 0\n\n\
                       processor\t: 1\nphysical id\t: 0\ncore id\t: 0\n\n\
                       processor\t: 2\nphysical id\t: 0\ncore id\t: 1\n\n\
                       processor\t: 3\nphysical id\t: 1\ncore id\t: 0\n";
        assert_eq!(count_physical_cores(cpuinfo), 3);
    }

    #[test]
    fn test_parse_meminfo_converts_kb() {
        let info = parse_meminfo("MemTotal:       16384 kB\nHugePages_Total:       0\n");
        assert_eq!(info["MemTotal"], 16384 * 1024);
        assert_eq!(info["HugePages_Total"], 0);
    }

    #[test]
    fn test_cpu_freq_average() {
        let cores = [
            CpuFreq { current: 1000.0, min: 800.0, max: 3000.0 },
            CpuFreq { current: 2000.0, min: 800.0, max: 3000.0 },
        ];
        let avg = CpuFreq::average(&cores).unwrap();
        assert_eq!(avg.current, 1500.0);
        assert_eq!(avg.min, 800.0);
        assert!(CpuFreq::average(&[]).is_none());
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(5, 0), 0.0);
    }

    #[test]
    fn test_page_size_is_positive() {
        assert!(page_size() >= 1024);
    }
}
