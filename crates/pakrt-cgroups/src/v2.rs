//! cgroup v2 driver: a single unified group `<root>/container-<name>`, grounded on
//! `libcgroups::v2::{memory,cpu,manager}` — same `memory.max`/`cpu.max` file names,
//! generalized to pakrt's flat `(memory_mb, cpu_percent)` pair.

use std::fs;
use std::path::{Path, PathBuf};

use pakrt_common::naming::cgroup_v2_name;

use crate::common::{self, CGROUP_PROCS};
use crate::error::Result;
use crate::usage::Usage;

const CGROUP_MEMORY_MAX: &str = "memory.max";
const CGROUP_MEMORY_SWAP_MAX: &str = "memory.swap.max";
const CGROUP_MEMORY_CURRENT: &str = "memory.current";
const CGROUP_CPU_MAX: &str = "cpu.max";
const CGROUP_CPU_WEIGHT: &str = "cpu.weight";
const CGROUP_CPU_STAT: &str = "cpu.stat";
const CGROUP_SUBTREE_CONTROL: &str = "cgroup.subtree_control";

const CFS_PERIOD_US: i64 = 100_000;
const MAX_CPU_WEIGHT: i64 = 10_000;
const BYTES_PER_MB: i64 = 1 << 20;

pub struct V2Driver {
    root: PathBuf,
}

impl V2Driver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn group_dir(&self, name: &str) -> PathBuf {
        self.root.join(cgroup_v2_name(name))
    }

    pub fn dirs(&self, name: &str) -> Vec<PathBuf> {
        vec![self.group_dir(name)]
    }

    pub fn create(&self, name: &str, memory_mb: i64, cpu_percent: i64) -> Result<()> {
        enable_controllers(&self.root)?;
        let dir = self.group_dir(name);
        common::ensure_dir(&dir)?;

        let limit_bytes = memory_mb * BYTES_PER_MB;
        common::write_and_verify(dir.join(CGROUP_MEMORY_MAX), limit_bytes)?;
        if dir.join(CGROUP_MEMORY_SWAP_MAX).exists() {
            common::write_cgroup_file(dir.join(CGROUP_MEMORY_SWAP_MAX), 0)?;
        }

        let quota = CFS_PERIOD_US * cpu_percent / 100;
        common::write_cgroup_file(dir.join(CGROUP_CPU_MAX), format!("{quota} {CFS_PERIOD_US}"))?;
        common::write_and_verify(dir.join(CGROUP_CPU_WEIGHT), MAX_CPU_WEIGHT * cpu_percent / 100)?;

        Ok(())
    }

    pub fn attach(&self, name: &str, pid: i32) -> Result<()> {
        let dir = self.group_dir(name);
        common::write_cgroup_file(dir.join(CGROUP_PROCS), pid)?;
        if !common::pids_in(&dir).contains(&pid) {
            tracing::warn!(pid, dir = %dir.display(), "pid not visible in cgroup.procs after attach");
        }
        Ok(())
    }

    pub fn destroy(&self, name: &str) -> Result<()> {
        common::terminate_and_remove(&self.dirs(name))
    }

    pub fn usage(&self, name: &str, memory_mb_limit: i64) -> Usage {
        let dir = self.group_dir(name);
        let memory_used = common::read_cgroup_file(dir.join(CGROUP_MEMORY_CURRENT))
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);

        let cpu_ns = common::read_cgroup_file(dir.join(CGROUP_CPU_STAT))
            .ok()
            .and_then(|stat| {
                stat.lines().find_map(|line| {
                    let mut parts = line.split_ascii_whitespace();
                    if parts.next()? == "usage_usec" {
                        parts.next()?.parse::<u64>().ok().map(|usec| usec * 1000)
                    } else {
                        None
                    }
                })
            })
            .unwrap_or(0);

        Usage::new(memory_used, memory_mb_limit * BYTES_PER_MB, cpu_ns)
    }
}

/// Enables the `memory` and `cpu` controllers on the parent hierarchy before a child
/// group can use them, matching v2's top-down delegation model.
fn enable_controllers(root: &Path) -> Result<()> {
    let control_file = root.join(CGROUP_SUBTREE_CONTROL);
    if !control_file.exists() {
        return Ok(());
    }
    let already = fs::read_to_string(&control_file).unwrap_or_default();
    for controller in ["memory", "cpu"] {
        if !already.contains(controller) {
            let _ = common::write_cgroup_file(&control_file, format!("+{controller}"));
        }
    }
    Ok(())
}

pub fn looks_like_v2_root(root: &Path) -> bool {
    root.join("cgroup.controllers").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn create_writes_memory_max_and_cpu_max() {
        let tmp = tempfile::tempdir().unwrap();
        let driver = V2Driver::new(tmp.path());
        let group = driver.group_dir("rumah-a");
        fs::create_dir_all(&group).unwrap();
        fixture(&group, CGROUP_MEMORY_MAX);
        fixture(&group, CGROUP_CPU_MAX);
        fixture(&group, CGROUP_CPU_WEIGHT);

        driver.create("rumah-a", 512, 25).unwrap();

        assert_eq!(
            fs::read_to_string(group.join(CGROUP_MEMORY_MAX)).unwrap(),
            (512 * BYTES_PER_MB).to_string()
        );
        assert_eq!(
            fs::read_to_string(group.join(CGROUP_CPU_MAX)).unwrap(),
            "25000 100000"
        );
        assert_eq!(
            fs::read_to_string(group.join(CGROUP_CPU_WEIGHT)).unwrap(),
            "2500"
        );
    }

    #[test]
    fn usage_parses_cpu_stat_usage_usec() {
        let tmp = tempfile::tempdir().unwrap();
        let driver = V2Driver::new(tmp.path());
        let group = driver.group_dir("rumah-a");
        fs::create_dir_all(&group).unwrap();
        fs::write(group.join(CGROUP_MEMORY_CURRENT), "1048576").unwrap();
        fs::write(
            group.join(CGROUP_CPU_STAT),
            "usage_usec 2000\nuser_usec 1500\nsystem_usec 500\n",
        )
        .unwrap();

        let usage = driver.usage("rumah-a", 64);
        assert_eq!(usage.memory_used_bytes, 1048576);
        assert_eq!(usage.cpu_usage_ns, 2_000_000);
    }
}
