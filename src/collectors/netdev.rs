//! Network interface statistics collector.
//!
//! This module reads per-interface counters from /proc/net/dev. All values are
//! cumulative since the interface came up.

use std::collections::BTreeMap;
use std::path::Path;

use super::{read_file, SourceError};
use crate::normalize::Record;
use crate::point::Value;

/// Network interface counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetIoCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
}

impl NetIoCounters {
    /// Sum over all interfaces.
    pub fn total<'a, I>(interfaces: I) -> NetIoCounters
    where
        I: IntoIterator<Item = &'a NetIoCounters>,
    {
        interfaces
            .into_iter()
            .fold(NetIoCounters::default(), |mut acc, nic| {
                acc.bytes_sent = acc.bytes_sent.saturating_add(nic.bytes_sent);
                acc.bytes_recv = acc.bytes_recv.saturating_add(nic.bytes_recv);
                acc.packets_sent = acc.packets_sent.saturating_add(nic.packets_sent);
                acc.packets_recv = acc.packets_recv.saturating_add(nic.packets_recv);
                acc.errin = acc.errin.saturating_add(nic.errin);
                acc.errout = acc.errout.saturating_add(nic.errout);
                acc.dropin = acc.dropin.saturating_add(nic.dropin);
                acc.dropout = acc.dropout.saturating_add(nic.dropout);
                acc
            })
    }
}

impl Record for NetIoCounters {
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("bytes_sent", self.bytes_sent.into()),
            ("bytes_recv", self.bytes_recv.into()),
            ("packets_sent", self.packets_sent.into()),
            ("packets_recv", self.packets_recv.into()),
            ("errin", self.errin.into()),
            ("errout", self.errout.into()),
            ("dropin", self.dropin.into()),
            ("dropout", self.dropout.into()),
        ]
    }
}

/// Reads network interface statistics from <proc>/net/dev.
pub fn read_netdev_stats(proc_root: &Path) -> Result<BTreeMap<String, NetIoCounters>, SourceError> {
    let content = read_file(&proc_root.join("net/dev"))?;
    Ok(parse_netdev(&content))
}

pub fn parse_netdev(content: &str) -> BTreeMap<String, NetIoCounters> {
    let mut stats = BTreeMap::new();

    for (idx, line) in content.lines().enumerate() {
        // Skip the first two header lines
        if idx < 2 {
            continue;
        }

        // Split by ':' to separate interface name from stats
        let Some((interface, stats_str)) = line.split_once(':') else {
            continue;
        };

        let values: Vec<&str> = stats_str.split_whitespace().collect();
        if values.len() < 16 {
            continue; // Skip malformed lines
        }

        let field = |i: usize| values[i].parse::<u64>().unwrap_or(0);

        stats.insert(
            interface.trim().to_string(),
            NetIoCounters {
                bytes_recv: field(0),
                packets_recv: field(1),
                errin: field(2),
                dropin: field(3),
                bytes_sent: field(8),
                packets_sent: field(9),
                errout: field(10),
                dropout: field(11),
            },
        );
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  eth0: 500000   400    1    2    0     0          0         3   250000     300    4    5    0     0       0          0
";

    #[test]
    fn test_parse_netdev() {
        let stats = parse_netdev(SAMPLE);
        assert_eq!(stats.len(), 2);
        let eth0 = stats["eth0"];
        assert_eq!(eth0.bytes_recv, 500000);
        assert_eq!(eth0.packets_recv, 400);
        assert_eq!(eth0.errin, 1);
        assert_eq!(eth0.dropin, 2);
        assert_eq!(eth0.bytes_sent, 250000);
        assert_eq!(eth0.packets_sent, 300);
        assert_eq!(eth0.errout, 4);
        assert_eq!(eth0.dropout, 5);
    }

    #[test]
    fn test_total_sums_interfaces() {
        let stats = parse_netdev(SAMPLE);
        let total = NetIoCounters::total(stats.values());
        assert_eq!(total.bytes_recv, 501000);
        assert_eq!(total.packets_sent, 310);
    }
}
