//! The on-disk `Container` record: JSON schema, atomic rewrite, and the directory layout
//! every other module derives from a container name.
//!
//! Grounded on `libcontainer::container::state::ContainerProcessState` for the
//! serde-derived, atomically-rewritten state-file pattern (`libcontainer` persists process
//! state as JSON under the container's bundle directory the same way).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ContainerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Creating,
    Created,
    Running,
    Stopped,
    Failed,
    Recovered,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Creating => "creating",
            Status::Created => "created",
            Status::Running => "running",
            Status::Stopped => "stopped",
            Status::Failed => "failed",
            Status::Recovered => "recovered",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resources {
    pub memory_mb: i64,
    pub cpu_percentage: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub ip_address: String,
    pub veth_host: String,
    pub veth_container: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespaces {
    pub pid: String,
    pub net: String,
    pub mnt: String,
    pub uts: String,
    pub ipc: String,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cgroups {
    pub memory: PathBuf,
    pub cpu: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub created: DateTime<Utc>,
    pub status: Status,
    pub resources: Resources,
    pub network: Network,
    pub namespaces: Namespaces,
    pub cgroups: Cgroups,
    pub pid: i32,
    pub rootfs: PathBuf,
    pub logs: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_timestamp: Option<DateTime<Utc>>,
}

impl Container {
    pub fn is_running(&self) -> bool {
        self.status == Status::Running && self.pid > 0
    }
}

/// Resolves the fixed directory layout for a container name: `<base>/<name>/{config.json,
/// container.pid, rootfs, logs, namespaces, cgroups}`.
#[derive(Debug, Clone)]
pub struct Paths {
    pub root: PathBuf,
}

impl Paths {
    pub fn new(base: &Path, name: &str) -> Self {
        Self {
            root: base.join(name),
        }
    }

    pub fn config(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join("container.pid")
    }

    pub fn rootfs(&self) -> PathBuf {
        self.root.join("rootfs")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("container.log")
    }

    pub fn namespaces_dir(&self) -> PathBuf {
        self.root.join("namespaces")
    }

    pub fn cgroups_dir(&self) -> PathBuf {
        self.root.join("cgroups")
    }

    pub fn cgroups_paths_conf(&self) -> PathBuf {
        self.cgroups_dir().join("paths.conf")
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }
}

/// Writes `container` to `path` atomically: serialize to a sibling temp file, `fsync`,
/// then `rename` over the target, matching the orchestrator's "metadata is serialized
/// atomically... via a secure temp file then renamed" contract.
pub fn write_atomic(path: &Path, container: &Container) -> Result<()> {
    let dir = path.parent().ok_or_else(|| ContainerError::Metadata {
        path: path.to_path_buf(),
        reason: "config path has no parent directory".to_string(),
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| ContainerError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let json = serde_json::to_string_pretty(container)?;
    tmp.write_all(json.as_bytes())
        .map_err(|source| ContainerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.flush().map_err(|source| ContainerError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let persisted = tmp.persist(path).map_err(|e| ContainerError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = persisted.set_permissions(fs::Permissions::from_mode(0o644));
    }
    drop(persisted);

    Ok(())
}

pub fn read(path: &Path) -> Result<Container> {
    let data = fs::read_to_string(path).map_err(|source| ContainerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let container: Container = serde_json::from_str(&data)?;
    Ok(container)
}

/// Writes a config.json file or creates the file with mode 0644.
pub fn create_new(path: &Path) -> Result<File> {
    File::create(path).map_err(|source| ContainerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> Container {
        Container {
            name: name.to_string(),
            created: Utc::now(),
            status: Status::Created,
            resources: Resources {
                memory_mb: 256,
                cpu_percentage: 50,
            },
            network: Network {
                ip_address: "10.0.0.2".to_string(),
                veth_host: "veth-h123456".to_string(),
                veth_container: "veth-c123456".to_string(),
            },
            namespaces: Namespaces {
                pid: "pid".to_string(),
                net: "net".to_string(),
                mnt: "mnt".to_string(),
                uts: "uts".to_string(),
                ipc: "ipc".to_string(),
                user: "user".to_string(),
            },
            cgroups: Cgroups {
                memory: PathBuf::from("/sys/fs/cgroup/memory/container-rumah-a"),
                cpu: PathBuf::from("/sys/fs/cgroup/cpu/container-rumah-a"),
            },
            pid: 0,
            rootfs: PathBuf::from("/tmp/containers/rumah-a/rootfs"),
            logs: PathBuf::from("/tmp/containers/rumah-a/logs"),
            recovered: None,
            recovery_timestamp: None,
        }
    }

    #[test]
    fn round_trips_through_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let container = sample("rumah-a");
        write_atomic(&path, &container).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back.name, container.name);
        assert_eq!(back.status, container.status);
        assert_eq!(back.resources.memory_mb, container.resources.memory_mb);
    }

    #[test]
    fn optional_recovery_fields_are_omitted_when_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        write_atomic(&path, &sample("rumah-a")).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("recovered"));
        assert!(!raw.contains("recovery_timestamp"));
    }

    #[test]
    fn paths_derive_fixed_layout() {
        let base = Path::new("/tmp/containers");
        let paths = Paths::new(base, "rumah-a");
        assert_eq!(paths.config(), base.join("rumah-a/config.json"));
        assert_eq!(paths.pid_file(), base.join("rumah-a/container.pid"));
        assert_eq!(paths.rootfs(), base.join("rumah-a/rootfs"));
    }
}
