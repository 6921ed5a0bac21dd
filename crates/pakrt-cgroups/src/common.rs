//! Shared cgroupfs I/O helpers used by both the v1 and v2 drivers, grounded on
//! `libcgroups::common::write_cgroup_file`/`read_cgroup_file`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::error::{CgroupError, Result};

/// Grace period between SIGTERM and SIGKILL during cgroup teardown.
pub const KILL_GRACE: Duration = Duration::from_millis(100);

pub const CGROUP_PROCS: &str = "cgroup.procs";

/// Writes `value` to `path`, classifying `EACCES` into `PermissionDenied` rather than the
/// generic `WriteFailed`.
pub fn write_cgroup_file<P: AsRef<Path>, V: ToString>(path: P, value: V) -> Result<()> {
    let path = path.as_ref();
    let value = value.to_string();
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|source| classify(path.to_path_buf(), &value, source))?;
    file.write_all(value.as_bytes())
        .map_err(|source| classify(path.to_path_buf(), &value, source))
}

/// Reads and trims a cgroupfs value file.
pub fn read_cgroup_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| CgroupError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes `value`, then reads the file back and warns (without failing) if it doesn't
/// round-trip — the kernel is free to clamp or reject values the write itself accepted,
/// e.g. a memory limit below current usage on some kernels.
pub fn write_and_verify<P: AsRef<Path>>(path: P, value: i64) -> Result<()> {
    let path = path.as_ref();
    write_cgroup_file(path, value)?;
    match read_cgroup_file(path) {
        Ok(actual) => {
            if actual.parse::<i64>() != Ok(value) {
                tracing::warn!(
                    path = %path.display(),
                    wrote = value,
                    read_back = %actual,
                    "cgroup value did not round-trip"
                );
            }
        }
        Err(err) => tracing::warn!(?err, path = %path.display(), "failed to verify cgroup write"),
    }
    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            CgroupError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            CgroupError::WriteFailed {
                path: path.to_path_buf(),
                value: "<mkdir>".to_string(),
                source,
            }
        }
    })
}

pub fn remove_dir(path: &Path) -> Result<()> {
    fs::remove_dir(path).map_err(|source| CgroupError::RemoveFailed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn pids_in(cgroup_dir: &Path) -> Vec<i32> {
    read_cgroup_file(cgroup_dir.join(CGROUP_PROCS))
        .ok()
        .map(|contents| {
            contents
                .lines()
                .filter_map(|line| line.trim().parse::<i32>().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// SIGTERM then, after [`KILL_GRACE`], SIGKILL every PID still listed in any of `dirs`,
/// then `rmdir`s each directory. If a directory refuses removal with `EBUSY` it is left
/// in place and reported via the returned error rather than silently dropped.
pub fn terminate_and_remove(dirs: &[PathBuf]) -> Result<()> {
    let remaining: Vec<i32> = dirs.iter().flat_map(|d| pids_in(d)).collect();
    for pid in &remaining {
        let _ = signal::kill(Pid::from_raw(*pid), Signal::SIGTERM);
    }
    if !remaining.is_empty() {
        thread::sleep(KILL_GRACE);
    }
    let still_alive: Vec<i32> = dirs.iter().flat_map(|d| pids_in(d)).collect();
    for pid in &still_alive {
        let _ = signal::kill(Pid::from_raw(*pid), Signal::SIGKILL);
    }
    if !still_alive.is_empty() {
        thread::sleep(KILL_GRACE);
    }

    let mut last_err = None;
    for dir in dirs {
        if !dir.exists() {
            continue;
        }
        if let Err(err) = remove_dir(dir) {
            let busy = matches!(&err, CgroupError::RemoveFailed { source, .. }
                if source.raw_os_error() == Some(libc::EBUSY));
            if busy {
                tracing::warn!(dir = %dir.display(), "cgroup directory still busy after kill, forcing cgroup.procs clear");
                let _ = write_cgroup_file(dir.join(CGROUP_PROCS), "");
            }
            last_err = Some(err);
        }
    }
    match last_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn classify(path: PathBuf, value: &str, source: std::io::Error) -> CgroupError {
    if source.kind() == std::io::ErrorKind::PermissionDenied {
        CgroupError::PermissionDenied { path }
    } else {
        CgroupError::WriteFailed {
            path,
            value: value.to_string(),
            source,
        }
    }
}
