//! Fan sensor collector.
//!
//! This module collects fan speeds from hardware monitoring devices in
//! <sys>/class/hwmon/hwmon*/fan*_input.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::SourceError;
use crate::normalize::Record;
use crate::point::Value;

/// One fan sensor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct FanReading {
    pub label: String,
    /// Speed in RPM.
    pub current: u64,
}

impl Record for FanReading {
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("label", self.label.as_str().into()),
            ("current", self.current.into()),
        ]
    }
}

/// Reads fans grouped by hwmon device name, each group ordered by sensor
/// index. Returns an empty map when hwmon is not available.
pub fn read_fans(sys_root: &Path) -> Result<BTreeMap<String, Vec<FanReading>>, SourceError> {
    let mut fans: BTreeMap<String, Vec<FanReading>> = BTreeMap::new();
    let hwmon_base = sys_root.join("class/hwmon");

    if !hwmon_base.exists() {
        return Ok(fans); // No hwmon devices available
    }

    let entries = fs::read_dir(&hwmon_base).map_err(|source| SourceError::Read {
        path: hwmon_base.clone(),
        source,
    })?;

    let mut hwmon_dirs: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("hwmon"))
        })
        .collect();
    hwmon_dirs.sort();

    for path in hwmon_dirs {
        let hwmon_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // Read the name file to get a more descriptive sensor name
        let device_name = fs::read_to_string(path.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or(hwmon_name);

        let dir_entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        // fan<N>_input, sorted by N
        let mut indices: Vec<u32> = dir_entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                name.to_str()?
                    .strip_prefix("fan")?
                    .strip_suffix("_input")?
                    .parse::<u32>()
                    .ok()
            })
            .collect();
        indices.sort_unstable();

        for index in indices {
            let Ok(content) = fs::read_to_string(path.join(format!("fan{index}_input"))) else {
                continue;
            };
            let Ok(current) = content.trim().parse::<u64>() else {
                continue;
            };
            let label = fs::read_to_string(path.join(format!("fan{index}_label")))
                .map(|s| s.trim().to_string())
                .unwrap_or_default();

            fans.entry(device_name.clone())
                .or_default()
                .push(FanReading { label, current });
        }
    }

    Ok(fans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_read_fans_without_hwmon() {
        let sys = tempfile::tempdir().unwrap();
        assert!(read_fans(sys.path()).unwrap().is_empty());
    }

    #[test]
    fn test_read_fans_groups_and_orders() {
        let sys = tempfile::tempdir().unwrap();
        let hwmon = sys.path().join("class/hwmon");
        write(&hwmon.join("hwmon0/name"), "coretemp\n");
        write(&hwmon.join("hwmon0/temp1_input"), "45000\n");
        write(&hwmon.join("hwmon1/name"), "it8728\n");
        write(&hwmon.join("hwmon1/fan10_input"), "900\n");
        write(&hwmon.join("hwmon1/fan2_input"), "1500\n");
        write(&hwmon.join("hwmon1/fan2_label"), "CPU Fan\n");
        write(&hwmon.join("hwmon1/fan3_input"), "garbage\n");

        let fans = read_fans(sys.path()).unwrap();
        assert_eq!(fans.len(), 1);
        let it8728 = &fans["it8728"];
        assert_eq!(
            it8728,
            &vec![
                FanReading { label: "CPU Fan".to_string(), current: 1500 },
                FanReading { label: String::new(), current: 900 },
            ]
        );
    }
}
