//! Resource reporter (C12): per-container cgroup usage with a severity band, and a
//! topology view of every container's network wiring.
//!
//! Grounded on `libcgroups::stats` (`MemoryStats`/`CpuUsage` parsing style) for the
//! usage-reading shape and `youki::commands::list`'s `TabWriter`-based rendering idiom —
//! this module produces the rows, the CLI renders them.

use pakrt_cgroups::{CgroupManager, Usage};

use crate::metadata::Container;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    High,
    Critical,
}

impl Severity {
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 80.0 {
            Severity::Critical
        } else if percent >= 50.0 {
            Severity::High
        } else {
            Severity::Normal
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Normal => "normal",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct UsageReport {
    pub name: String,
    pub memory_used_bytes: i64,
    pub memory_limit_bytes: i64,
    pub memory_percent: f64,
    pub severity: Severity,
    pub cpu_usage_ns: u64,
    pub pids: Vec<(i32, String)>,
}

pub fn usage_report(name: &str, cgroups: &CgroupManager, memory_mb_limit: i64) -> UsageReport {
    let usage: Usage = cgroups.usage(name, memory_mb_limit);
    let percent = usage.memory_percent();
    let pids = cgroups
        .dirs(name)
        .into_iter()
        .flat_map(|dir| pakrt_cgroups::common::pids_in(&dir))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .map(|pid| (pid, command_name(pid)))
        .collect();

    UsageReport {
        name: name.to_string(),
        memory_used_bytes: usage.memory_used_bytes,
        memory_limit_bytes: usage.memory_limit_bytes,
        memory_percent: percent,
        severity: Severity::from_percent(percent),
        cpu_usage_ns: usage.cpu_usage_ns,
        pids,
    }
}

/// Reads `/proc/<pid>/comm` for the short command name; falls back to `?` if the process
/// has already exited or `/proc` isn't readable.
fn command_name(pid: i32) -> String {
    std::fs::read_to_string(format!("/proc/{pid}/comm"))
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| "?".to_string())
}

#[derive(Debug, Clone)]
pub struct TopologyEntry {
    pub name: String,
    pub status: String,
    pub ip: String,
    pub veth_host: String,
    pub veth_container: String,
    pub netns: String,
}

/// Renders the host/container/veth adjacency for every known container.
pub fn topology(containers: &[Container]) -> Vec<TopologyEntry> {
    containers
        .iter()
        .map(|c| TopologyEntry {
            name: c.name.clone(),
            status: c.status.to_string(),
            ip: c.network.ip_address.clone(),
            veth_host: c.network.veth_host.clone(),
            veth_container: c.network.veth_container.clone(),
            netns: c.namespaces.net.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bands_match_documented_thresholds() {
        assert_eq!(Severity::from_percent(10.0), Severity::Normal);
        assert_eq!(Severity::from_percent(49.9), Severity::Normal);
        assert_eq!(Severity::from_percent(50.0), Severity::High);
        assert_eq!(Severity::from_percent(79.9), Severity::High);
        assert_eq!(Severity::from_percent(80.0), Severity::Critical);
        assert_eq!(Severity::from_percent(100.0), Severity::Critical);
    }
}
