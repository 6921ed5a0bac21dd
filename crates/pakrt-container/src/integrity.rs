//! Integrity and recovery engine (C11): detects inconsistencies between a container's
//! metadata and the live resources it claims to own, repairs what it safely can, and
//! sweeps orphaned host-global state left behind by a killed orchestrator process.
//!
//! Grounded on `libcontainer::container::container_delete`'s tolerant, check-then-act
//! teardown style and `libcgroups::common::get_all_pids`'s directory-scan approach to
//! cgroup enumeration, generalized to a cross-subsystem consistency sweep.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;

use nix::sys::signal;
use nix::unistd::Pid;

use pakrt_net::NetworkDriver;

use crate::error::Result;
use crate::metadata::{self, Container, Paths, Status};
use crate::orchestrator::Orchestrator;
use crate::rootfs::RootfsProvisioner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inconsistency {
    MissingMetadata,
    DeadPid,
    MissingRootfs,
    CgroupWithNoLivePid,
    NetnsWithNoPidFile,
}

impl std::fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Inconsistency::MissingMetadata => "missing metadata file",
            Inconsistency::DeadPid => "pid file references a dead process",
            Inconsistency::MissingRootfs => "rootfs directory is missing",
            Inconsistency::CgroupWithNoLivePid => "cgroup directory has no live pid",
            Inconsistency::NetnsWithNoPidFile => "netns exists with no pid file",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct CorruptionReport {
    pub name: String,
    pub issues: Vec<Inconsistency>,
}

impl CorruptionReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// `check_corruption(name)`: compares the container's metadata against its pid file,
/// rootfs, and the cgroup/netns state it claims to own.
pub fn check_corruption(orchestrator: &Orchestrator, name: &str) -> CorruptionReport {
    let paths = orchestrator.paths(name);
    let mut issues = Vec::new();

    if !paths.config().is_file() {
        issues.push(Inconsistency::MissingMetadata);
        return CorruptionReport {
            name: name.to_string(),
            issues,
        };
    }

    let container = match metadata::read(&paths.config()) {
        Ok(c) => c,
        Err(_) => {
            issues.push(Inconsistency::MissingMetadata);
            return CorruptionReport {
                name: name.to_string(),
                issues,
            };
        }
    };

    if container.is_running() && !pid_alive(container.pid) {
        issues.push(Inconsistency::DeadPid);
    }

    if !paths.rootfs().is_dir() {
        issues.push(Inconsistency::MissingRootfs);
    }

    if let Ok(cgroups) = orchestrator.cgroup_manager_for_integrity() {
        let dirs = cgroups.dirs(name);
        let has_pids = dirs
            .iter()
            .any(|dir| !pakrt_cgroups::common::pids_in(dir).is_empty());
        if dirs.iter().any(|d| d.is_dir()) && !has_pids && container.is_running() {
            issues.push(Inconsistency::CgroupWithNoLivePid);
        }
    }

    if netns_exists(&container.namespaces.net) && !paths.pid_file().is_file() {
        issues.push(Inconsistency::NetnsWithNoPidFile);
    }

    CorruptionReport {
        name: name.to_string(),
        issues,
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    pub name: String,
    pub actions_taken: Vec<String>,
}

/// `recover(name)`: maps each detected inconsistency to the fix the integrity design
/// prescribes, then marks the container `recovered = true`.
pub fn recover(orchestrator: &Orchestrator, name: &str) -> Result<RecoveryReport> {
    let paths = orchestrator.paths(name);
    let report = check_corruption(orchestrator, name);
    let mut actions = Vec::new();

    if report.issues.contains(&Inconsistency::MissingMetadata) {
        let container = default_metadata(orchestrator, name, &paths)?;
        metadata::write_atomic(&paths.config(), &container)?;
        actions.push("regenerated default metadata".to_string());
    }

    if report.issues.contains(&Inconsistency::DeadPid) {
        let _ = std::fs::remove_file(paths.pid_file());
        actions.push("removed stale pid file".to_string());
    }

    if report.issues.contains(&Inconsistency::MissingRootfs) {
        let hostname = metadata::read(&paths.config())
            .map(|c| c.name)
            .unwrap_or_else(|_| name.to_string());
        RootfsProvisioner::new().provision(&paths.rootfs(), &hostname)?;
        actions.push("reprovisioned rootfs skeleton".to_string());
    }

    if report
        .issues
        .iter()
        .any(|i| matches!(i, Inconsistency::CgroupWithNoLivePid | Inconsistency::NetnsWithNoPidFile))
    {
        if let Ok(cgroups) = orchestrator.cgroup_manager_for_integrity() {
            let _ = cgroups.destroy(name);
            actions.push("tore down cgroups of dead owner".to_string());
        }
        let net_driver = NetworkDriver::new();
        if let Ok(container) = metadata::read(&paths.config()) {
            let desc = pakrt_net::NetworkDescriptor {
                ip: container.network.ip_address.parse().unwrap_or(std::net::Ipv4Addr::UNSPECIFIED),
                veth_host: container.network.veth_host,
                veth_peer: container.network.veth_container,
                netns: container.namespaces.net,
            };
            net_driver.teardown(&desc);
            actions.push("tore down netns of dead owner".to_string());
        }
    }

    if let Ok(mut container) = metadata::read(&paths.config()) {
        container.status = Status::Recovered;
        container.recovered = Some(true);
        container.recovery_timestamp = Some(chrono::Utc::now());
        metadata::write_atomic(&paths.config(), &container)?;
    }

    Ok(RecoveryReport {
        name: name.to_string(),
        actions_taken: actions,
    })
}

fn default_metadata(orchestrator: &Orchestrator, name: &str, paths: &Paths) -> Result<Container> {
    use crate::metadata::{Cgroups, Namespaces, Network, Resources};
    Ok(Container {
        name: name.to_string(),
        created: chrono::Utc::now(),
        status: Status::Recovered,
        resources: Resources {
            memory_mb: 128,
            cpu_percentage: 50,
        },
        network: Network {
            ip_address: orchestrator
                .allocator_snapshot(name)
                .map(|ip| ip.to_string())
                .unwrap_or_default(),
            veth_host: pakrt_common::naming::veth_host_name(name),
            veth_container: pakrt_common::naming::veth_peer_name(name),
        },
        namespaces: Namespaces {
            pid: "pid".to_string(),
            net: pakrt_common::naming::netns_name(name),
            mnt: "mnt".to_string(),
            uts: "uts".to_string(),
            ipc: "ipc".to_string(),
            user: "user".to_string(),
        },
        cgroups: Cgroups {
            memory: paths.cgroups_dir().join("memory"),
            cpu: paths.cgroups_dir().join("cpu"),
        },
        pid: 0,
        rootfs: paths.rootfs(),
        logs: paths.logs_dir(),
        recovered: Some(true),
        recovery_timestamp: Some(chrono::Utc::now()),
    })
}

#[derive(Debug, Clone, Default)]
pub struct OrphanSweepReport {
    pub removed_veths: Vec<String>,
    pub removed_netns: Vec<String>,
    pub removed_cgroups: Vec<PathBuf>,
    pub released_ips: Vec<String>,
}

/// `sweep_orphans()`: removes host-global state (veth pairs, netns, cgroup directories,
/// IP bindings) whose owning container directory no longer exists.
pub fn sweep_orphans(orchestrator: &mut Orchestrator) -> Result<OrphanSweepReport> {
    let known: HashSet<String> = orchestrator
        .list_containers()?
        .into_iter()
        .map(|c| c.name)
        .collect();
    let mut report = OrphanSweepReport::default();

    for iface in list_link_names() {
        if let Some(owner) = owner_of_veth(&iface, &known) {
            if !known.contains(&owner) {
                let _ = Command::new("ip").args(["link", "delete", &iface]).status();
                report.removed_veths.push(iface);
            }
        }
    }

    for ns in list_netns_names() {
        if let Some(owner) = ns.strip_prefix("container-") {
            if !known.contains(owner) {
                let _ = Command::new("ip").args(["netns", "delete", &ns]).status();
                report.removed_netns.push(ns);
            }
        }
    }

    if let Ok(cgroups) = orchestrator.cgroup_manager_for_integrity() {
        for dir in list_cgroup_container_dirs() {
            let file_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if let Some(owner) = file_name.strip_prefix("container-") {
                if !known.contains(owner) {
                    let _ = cgroups.destroy(owner);
                    report.removed_cgroups.push(dir);
                }
            }
        }
    }

    let allocator = orchestrator.allocator_mut();
    let stale_names: Vec<String> = allocator
        .held_names()
        .into_iter()
        .filter(|n| !known.contains(n))
        .collect();
    for name in stale_names {
        allocator.release(&name);
        report.released_ips.push(name);
    }

    Ok(report)
}

#[derive(Debug, Clone)]
pub struct ValidationCheck {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct SystemValidationReport {
    pub checks: Vec<ValidationCheck>,
}

impl SystemValidationReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

/// `validate_system()`: the platform probe plus disk space, cgroup writability, and
/// shell functionality checks, each reported with a remediation hint.
pub fn validate_system(orchestrator: &Orchestrator) -> SystemValidationReport {
    let mut checks = Vec::new();

    checks.push(ValidationCheck {
        name: "lifecycle_supported",
        passed: orchestrator.platform.lifecycle_supported(),
        detail: if orchestrator.platform.lifecycle_supported() {
            "platform probe passed".to_string()
        } else {
            format!(
                "missing tools: {:?}; install them and re-run",
                orchestrator.platform.missing_tools
            )
        },
    });

    let free_mb = free_disk_mb(&orchestrator.config.base_dir);
    checks.push(ValidationCheck {
        name: "disk_space",
        passed: free_mb.map(|mb| mb >= 100).unwrap_or(false),
        detail: match free_mb {
            Some(mb) if mb >= 100 => format!("{mb} MiB free"),
            Some(mb) => format!("only {mb} MiB free; need at least 100 MiB"),
            None => "could not determine free disk space".to_string(),
        },
    });

    let cgroup_writable = std::fs::metadata(pakrt_common::platform::DEFAULT_CGROUP_ROOT)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false);
    checks.push(ValidationCheck {
        name: "cgroup_writable",
        passed: cgroup_writable,
        detail: if cgroup_writable {
            "cgroup root is writable".to_string()
        } else {
            "cgroup root is not writable; run as root or enable rootless delegation".to_string()
        },
    });

    let shell_ok = Command::new("/bin/sh")
        .arg("-c")
        .arg("true")
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    checks.push(ValidationCheck {
        name: "shell_functional",
        passed: shell_ok,
        detail: if shell_ok {
            "/bin/sh executes successfully".to_string()
        } else {
            "/bin/sh is missing or not executable".to_string()
        },
    });

    SystemValidationReport { checks }
}

fn pid_alive(pid: i32) -> bool {
    pid > 0 && signal::kill(Pid::from_raw(pid), None).is_ok()
}

fn netns_exists(netns: &str) -> bool {
    list_netns_names().iter().any(|n| n == netns)
}

fn list_netns_names() -> Vec<String> {
    Command::new("ip")
        .args(["netns", "list"])
        .output()
        .map(|out| {
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .filter_map(|line| line.split_whitespace().next())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn list_link_names() -> Vec<String> {
    Command::new("ip")
        .args(["-o", "link", "show"])
        .output()
        .map(|out| {
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .filter_map(|line| line.split(": ").nth(1))
                .map(|s| s.split('@').next().unwrap_or(s).to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// An orphaned veth is recognized by the `veth-h`/`veth-c` naming convention; the owning
/// container name can't be recovered from the hash, so orphan status is decided purely by
/// whether *any* known container's derived name matches.
fn owner_of_veth(iface: &str, known: &HashSet<String>) -> Option<String> {
    if !(iface.starts_with("veth-h") || iface.starts_with("veth-c")) {
        return None;
    }
    let owned = known.iter().any(|name| {
        pakrt_common::naming::veth_host_name(name) == iface
            || pakrt_common::naming::veth_peer_name(name) == iface
    });
    if owned {
        None
    } else {
        Some(iface.to_string())
    }
}

fn list_cgroup_container_dirs() -> Vec<PathBuf> {
    let root = PathBuf::from(pakrt_common::platform::DEFAULT_CGROUP_ROOT);
    let mut dirs = Vec::new();
    for sub in ["memory", "cpu", ""] {
        let base = if sub.is_empty() { root.clone() } else { root.join(sub) };
        if let Ok(entries) = std::fs::read_dir(&base) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if name.starts_with("container-") && entry.path().is_dir() {
                        dirs.push(entry.path());
                    }
                }
            }
        }
    }
    dirs
}

/// Shells out to `df -Pm` rather than linking `nix`'s `statvfs` binding, matching the
/// network driver's preference for the host's own CLI tools over an extra raw syscall
/// wrapper for something invoked this rarely.
fn free_disk_mb(path: &std::path::Path) -> Option<u64> {
    let probe = if path.exists() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    let output = Command::new("df").arg("-Pm").arg(probe).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let data_line = text.lines().nth(1)?;
    let available = data_line.split_whitespace().nth(3)?;
    available.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_report_is_clean_when_no_issues() {
        let report = CorruptionReport {
            name: "rumah-a".to_string(),
            issues: Vec::new(),
        };
        assert!(report.is_clean());
    }

    #[test]
    fn owner_of_veth_ignores_non_veth_interfaces() {
        let known = HashSet::new();
        assert_eq!(owner_of_veth("eth0", &known), None);
    }

    #[test]
    fn owner_of_veth_recognizes_orphan_by_naming_convention() {
        let known = HashSet::new();
        let orphan = owner_of_veth("veth-habcdef", &known);
        assert_eq!(orphan, Some("veth-habcdef".to_string()));
    }

    #[test]
    fn owner_of_veth_is_not_orphan_when_a_known_container_derives_it() {
        let mut known = HashSet::new();
        known.insert("rumah-a".to_string());
        let iface = pakrt_common::naming::veth_host_name("rumah-a");
        assert_eq!(owner_of_veth(&iface, &known), None);
    }
}
