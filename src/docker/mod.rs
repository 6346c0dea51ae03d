//! Container statistics via the docker command line.
//!
//! `docker stats --no-stream` is asked for one `|`-separated row per running
//! container. Each row becomes a point tagged with the container id, its name
//! and a "common name" that lines up replicas of the same service across
//! hosts. With extra stats enabled each container is also inspected and its
//! `State` object is copied into tags, at the cost of one more docker call per
//! container.

pub mod units;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

use crate::normalize::{self, Record};
use crate::point::{Measurements, Value};
use units::{parse_quantity, parse_unit_pair, ParseError};

/// Go template handed to `docker stats --format`.
pub const STATS_FORMAT: &str =
    "{{.ID}}|{{.Name}}|{{.CPUPerc}}|{{.MemPerc}}|{{.MemUsage}}|{{.NetIO}}|{{.BlockIO}}|{{.PIDs}}";

const STATS_FIELDS: usize = 8;

pub const CONTAINER_TAGS: &[&str] = &["container_id", "container_name"];

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("expected 8 fields, got {fields}: {line:?}")]
    MalformedRow { line: String, fields: usize },

    #[error("bad quantity for container {container}: {source}")]
    Quantity {
        container: String,
        source: ParseError,
    },

    #[error("bad inspect output for container {container}: {detail}")]
    Inspect { container: String, detail: String },
}

/// The external container tool.
pub trait ContainerTool {
    /// One [`STATS_FORMAT`] row per running container.
    fn stats(&self) -> Result<String, ContainerError>;

    /// JSON array describing one container.
    fn inspect(&self, container_id: &str) -> Result<String, ContainerError>;
}

/// Runs the `docker` binary synchronously.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, ContainerError> {
        let command = format!("{} {}", self.binary.display(), args.join(" "));
        debug!("Running {}", command);

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|source| ContainerError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ContainerError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ContainerTool for DockerCli {
    fn stats(&self) -> Result<String, ContainerError> {
        self.run(&["stats", "--no-stream", "--format", STATS_FORMAT])
    }

    fn inspect(&self, container_id: &str) -> Result<String, ContainerError> {
        self.run(&["inspect", container_id])
    }
}

/// One parsed `docker stats` row. Sizes are in bytes, percentages as printed.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStats {
    pub id: String,
    pub name: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub mem_usage: f64,
    pub mem_limit: f64,
    pub net_in: f64,
    pub net_out: f64,
    pub block_in: f64,
    pub block_out: f64,
    pub pids: u64,
}

impl Record for ContainerStats {
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("container_id", self.id.as_str().into()),
            ("container_name", self.name.as_str().into()),
            ("cpu_percent", self.cpu_percent.into()),
            ("mem_percent", self.mem_percent.into()),
            ("mem_usage", self.mem_usage.into()),
            ("mem_limit", self.mem_limit.into()),
            ("net_in", self.net_in.into()),
            ("net_out", self.net_out.into()),
            ("block_in", self.block_in.into()),
            ("block_out", self.block_out.into()),
            ("pids", self.pids.into()),
        ]
    }
}

/// Parses one `id|name|cpu%|mem%|usage / limit|in / out|read / write|pids` row.
pub fn parse_stats_line(line: &str) -> Result<ContainerStats, ContainerError> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    if parts.len() != STATS_FIELDS {
        return Err(ContainerError::MalformedRow {
            line: line.to_string(),
            fields: parts.len(),
        });
    }

    let name = parts[1].to_string();
    let quantity_err = |source| ContainerError::Quantity {
        container: name.clone(),
        source,
    };

    let cpu_percent = parse_quantity(parts[2]).map_err(quantity_err)?;
    let mem_percent = parse_quantity(parts[3]).map_err(quantity_err)?;
    let (mem_usage, mem_limit) = parse_unit_pair(parts[4]).map_err(quantity_err)?;
    let (net_in, net_out) = parse_unit_pair(parts[5]).map_err(quantity_err)?;
    let (block_in, block_out) = parse_unit_pair(parts[6]).map_err(quantity_err)?;
    let pids = parse_quantity(parts[7]).map_err(quantity_err)?.max(0.0).round() as u64;

    Ok(ContainerStats {
        id: parts[0].to_string(),
        name,
        cpu_percent,
        mem_percent,
        mem_usage,
        mem_limit,
        net_in,
        net_out,
        block_in,
        block_out,
        pids,
    })
}

/// `<hostname>/<name up to the first '.'>`.
///
/// Swarm names replicas `service.<slot>.<task id>`; the prefix identifies the
/// service, the hostname keeps equal service names on different hosts apart.
pub fn common_name(container_name: &str, hostname: &str) -> String {
    let service = container_name
        .split_once('.')
        .map_or(container_name, |(head, _)| head);
    format!("{hostname}/{service}")
}

/// Scalar entries of the `State` object of the first inspected element,
/// keyed by lowercased name. Nested objects, arrays and nulls are skipped.
pub fn parse_inspect_state(
    container: &str,
    json: &str,
) -> Result<BTreeMap<String, String>, ContainerError> {
    let inspect_err = |detail: String| ContainerError::Inspect {
        container: container.to_string(),
        detail,
    };

    let doc: serde_json::Value =
        serde_json::from_str(json).map_err(|e| inspect_err(e.to_string()))?;
    let state = doc
        .get(0)
        .and_then(|first| first.get("State"))
        .and_then(|state| state.as_object())
        .ok_or_else(|| inspect_err("no State object in first element".to_string()))?;

    Ok(state
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((key.to_lowercase(), text))
        })
        .collect())
}

/// Collects one point per running container.
#[derive(Debug)]
pub struct ContainerCollector<T> {
    tool: T,
    hostname: String,
    inspect: bool,
}

impl<T: ContainerTool> ContainerCollector<T> {
    pub fn new(tool: T, hostname: impl Into<String>, inspect: bool) -> Self {
        Self {
            tool,
            hostname: hostname.into(),
            inspect,
        }
    }

    /// Points keyed `docker_<container name>`.
    ///
    /// Any malformed row fails the whole collection.
    pub fn collect(&self) -> Result<Measurements, ContainerError> {
        let output = self.tool.stats()?;
        let mut points = Measurements::new();

        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            let stats = parse_stats_line(line)?;
            let mut point = normalize::parse(&stats, "", CONTAINER_TAGS);
            point
                .tags
                .insert("common_name".to_string(), common_name(&stats.name, &self.hostname));

            if self.inspect {
                let json = self.tool.inspect(&stats.id)?;
                for (key, value) in parse_inspect_state(&stats.id, &json)? {
                    point.tags.insert(format!("state_{key}"), value);
                }
            }

            points.insert(format!("docker_{}", stats.name), point);
        }

        debug!("Collected stats for {} containers", points.len());
        Ok(points)
    }
}
