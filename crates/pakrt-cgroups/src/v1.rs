//! cgroup v1 driver: two sibling hierarchies per container, `<root>/memory/container-<name>`
//! and `<root>/cpu/container-<name>`, grounded on `libcgroups::v1::{memory,cpu,manager}` —
//! same file names, generalized from `LinuxResources` to a flat `(memory_mb, cpu_percent)`
//! pair.

use std::path::{Path, PathBuf};

use pakrt_common::naming::cgroup_v1_name;

use crate::common::{self, CGROUP_PROCS};
use crate::error::Result;
use crate::usage::Usage;

const CGROUP_MEMORY_LIMIT: &str = "memory.limit_in_bytes";
const CGROUP_MEMORY_SWAP_LIMIT: &str = "memory.memsw.limit_in_bytes";
const CGROUP_MEMORY_USAGE: &str = "memory.usage_in_bytes";
const CGROUP_CPU_PERIOD: &str = "cpu.cfs_period_us";
const CGROUP_CPU_QUOTA: &str = "cpu.cfs_quota_us";
const CGROUP_CPU_SHARES: &str = "cpu.shares";
const CGROUP_CPUACCT_USAGE: &str = "cpuacct.usage";

const CFS_PERIOD_US: i64 = 100_000;
const SHARES_BASE: i64 = 1024;
const BYTES_PER_MB: i64 = 1 << 20;

pub struct V1Driver {
    root: PathBuf,
}

impl V1Driver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn memory_dir(&self, name: &str) -> PathBuf {
        self.root.join("memory").join(cgroup_v1_name(name))
    }

    fn cpu_dir(&self, name: &str) -> PathBuf {
        self.root.join("cpu").join(cgroup_v1_name(name))
    }

    pub fn dirs(&self, name: &str) -> Vec<PathBuf> {
        vec![self.memory_dir(name), self.cpu_dir(name)]
    }

    pub fn create(&self, name: &str, memory_mb: i64, cpu_percent: i64) -> Result<()> {
        let memory_dir = self.memory_dir(name);
        let cpu_dir = self.cpu_dir(name);
        common::ensure_dir(&memory_dir)?;
        common::ensure_dir(&cpu_dir)?;

        let limit_bytes = memory_mb * BYTES_PER_MB;
        common::write_and_verify(memory_dir.join(CGROUP_MEMORY_LIMIT), limit_bytes)?;
        if memory_dir.join(CGROUP_MEMORY_SWAP_LIMIT).exists() {
            common::write_and_verify(memory_dir.join(CGROUP_MEMORY_SWAP_LIMIT), limit_bytes)?;
        }

        let quota = CFS_PERIOD_US * cpu_percent / 100;
        common::write_and_verify(cpu_dir.join(CGROUP_CPU_PERIOD), CFS_PERIOD_US)?;
        common::write_and_verify(cpu_dir.join(CGROUP_CPU_QUOTA), quota)?;
        common::write_and_verify(cpu_dir.join(CGROUP_CPU_SHARES), SHARES_BASE * cpu_percent / 100)?;

        Ok(())
    }

    pub fn attach(&self, name: &str, pid: i32) -> Result<()> {
        for dir in self.dirs(name) {
            common::write_cgroup_file(dir.join(CGROUP_PROCS), pid)?;
        }
        for dir in self.dirs(name) {
            let listed = common::pids_in(&dir);
            if !listed.contains(&pid) {
                tracing::warn!(pid, dir = %dir.display(), "pid not visible in cgroup.procs after attach");
            }
        }
        Ok(())
    }

    pub fn destroy(&self, name: &str) -> Result<()> {
        common::terminate_and_remove(&self.dirs(name))
    }

    pub fn usage(&self, name: &str, memory_mb_limit: i64) -> Usage {
        let memory_dir = self.memory_dir(name);
        let cpu_dir = self.cpu_dir(name);

        let memory_used = common::read_cgroup_file(memory_dir.join(CGROUP_MEMORY_USAGE))
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);
        let cpu_ns = common::read_cgroup_file(cpu_dir.join(CGROUP_CPUACCT_USAGE))
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        Usage::new(memory_used, memory_mb_limit * BYTES_PER_MB, cpu_ns)
    }
}

pub fn looks_like_v1_root(root: &Path) -> bool {
    root.join("memory").is_dir() && root.join("cpu").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn create_writes_expected_memory_and_cpu_limits() {
        let tmp = tempfile::tempdir().unwrap();
        let driver = V1Driver::new(tmp.path());
        let memory_dir = driver.memory_dir("rumah-a");
        let cpu_dir = driver.cpu_dir("rumah-a");
        fs::create_dir_all(&memory_dir).unwrap();
        fs::create_dir_all(&cpu_dir).unwrap();
        fixture(&memory_dir, CGROUP_MEMORY_LIMIT);
        fixture(&memory_dir, CGROUP_MEMORY_SWAP_LIMIT);
        fixture(&cpu_dir, CGROUP_CPU_PERIOD);
        fixture(&cpu_dir, CGROUP_CPU_QUOTA);
        fixture(&cpu_dir, CGROUP_CPU_SHARES);

        driver.create("rumah-a", 256, 50).unwrap();

        assert_eq!(
            fs::read_to_string(memory_dir.join(CGROUP_MEMORY_LIMIT)).unwrap(),
            (256 * BYTES_PER_MB).to_string()
        );
        assert_eq!(
            fs::read_to_string(memory_dir.join(CGROUP_MEMORY_SWAP_LIMIT)).unwrap(),
            (256 * BYTES_PER_MB).to_string()
        );
        assert_eq!(
            fs::read_to_string(cpu_dir.join(CGROUP_CPU_PERIOD)).unwrap(),
            "100000"
        );
        assert_eq!(
            fs::read_to_string(cpu_dir.join(CGROUP_CPU_QUOTA)).unwrap(),
            "50000"
        );
        assert_eq!(
            fs::read_to_string(cpu_dir.join(CGROUP_CPU_SHARES)).unwrap(),
            "512"
        );
    }

    #[test]
    fn attach_writes_pid_to_both_hierarchies() {
        let tmp = tempfile::tempdir().unwrap();
        let driver = V1Driver::new(tmp.path());
        for dir in driver.dirs("rumah-a") {
            fs::create_dir_all(&dir).unwrap();
            fixture(&dir, CGROUP_PROCS);
        }

        driver.attach("rumah-a", 4242).unwrap();

        for dir in driver.dirs("rumah-a") {
            assert_eq!(
                fs::read_to_string(dir.join(CGROUP_PROCS)).unwrap(),
                "4242"
            );
        }
    }

    #[test]
    fn destroy_removes_empty_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let driver = V1Driver::new(tmp.path());
        for dir in driver.dirs("rumah-a") {
            fs::create_dir_all(&dir).unwrap();
            fixture(&dir, CGROUP_PROCS);
        }

        driver.destroy("rumah-a").unwrap();

        for dir in driver.dirs("rumah-a") {
            assert!(!dir.exists());
        }
    }
}
