//! Namespace configurator (C5): declares the fixed six-namespace configuration for a
//! container and persists each as a `<type>.conf` key=value file. Does not enter
//! namespaces itself — the launcher (C9) turns the declaration into the `unshare` flag
//! set at fork time.
//!
//! Grounded on `libcontainer::namespaces::Namespaces` (the namespace-type -> `CloneFlags`
//! map), generalized from youki's OCI-spec-driven subset selection to pakrt's fixed
//! six-tuple.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use nix::sched::CloneFlags;

use crate::error::{ContainerError, Result};
use crate::metadata::Paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NamespaceType {
    Pid,
    Mnt,
    Uts,
    Ipc,
    User,
    Net,
}

pub const ORDERED_NAMESPACES: [NamespaceType; 6] = [
    NamespaceType::Pid,
    NamespaceType::Mnt,
    NamespaceType::Uts,
    NamespaceType::Ipc,
    NamespaceType::User,
    NamespaceType::Net,
];

impl NamespaceType {
    pub fn clone_flag(self) -> CloneFlags {
        match self {
            NamespaceType::Pid => CloneFlags::CLONE_NEWPID,
            NamespaceType::Mnt => CloneFlags::CLONE_NEWNS,
            NamespaceType::Uts => CloneFlags::CLONE_NEWUTS,
            NamespaceType::Ipc => CloneFlags::CLONE_NEWIPC,
            NamespaceType::User => CloneFlags::CLONE_NEWUSER,
            NamespaceType::Net => CloneFlags::CLONE_NEWNET,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            NamespaceType::Pid => "pid.conf",
            NamespaceType::Mnt => "mnt.conf",
            NamespaceType::Uts => "uts.conf",
            NamespaceType::Ipc => "ipc.conf",
            NamespaceType::User => "user.conf",
            NamespaceType::Net => "net.conf",
        }
    }

    pub fn identifier(self) -> &'static str {
        match self {
            NamespaceType::Pid => "pid",
            NamespaceType::Mnt => "mnt",
            NamespaceType::Uts => "uts",
            NamespaceType::Ipc => "ipc",
            NamespaceType::User => "user",
            NamespaceType::Net => "net",
        }
    }
}

/// All six namespace declarations for one container. Each is a flat key=value map,
/// persisted verbatim into `namespaces/<type>.conf`.
#[derive(Debug, Clone)]
pub struct NamespaceConfig {
    pub declarations: BTreeMap<NamespaceType, BTreeMap<String, String>>,
}

impl NamespaceConfig {
    /// Builds the six declarations from the inputs the orchestrator has in hand at
    /// `create` time.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        container_name: &str,
        hostname: &str,
        rootfs: &Path,
        init_command: &str,
        init_args: &[String],
        caller_uid: u32,
        caller_gid: u32,
        netns_name: &str,
    ) -> Self {
        let mut declarations = BTreeMap::new();

        let mut pid = BTreeMap::new();
        pid.insert("init_is_pid1".to_string(), "true".to_string());
        pid.insert("init_command".to_string(), init_command.to_string());
        pid.insert("init_args".to_string(), init_args.join(" "));
        declarations.insert(NamespaceType::Pid, pid);

        let mut mnt = BTreeMap::new();
        mnt.insert("rootfs".to_string(), rootfs.display().to_string());
        mnt.insert(
            "mounts".to_string(),
            "bind:self,proc:/proc,sysfs:/sys,devpts:/dev/pts,tmpfs:/tmp".to_string(),
        );
        declarations.insert(NamespaceType::Mnt, mnt);

        let mut uts = BTreeMap::new();
        uts.insert("hostname".to_string(), hostname.to_string());
        uts.insert("domainname".to_string(), "container.local".to_string());
        declarations.insert(NamespaceType::Uts, uts);

        let mut ipc = BTreeMap::new();
        ipc.insert("shm_size_mb".to_string(), "64".to_string());
        ipc.insert("msg_max".to_string(), "16".to_string());
        ipc.insert("sem_max".to_string(), "32".to_string());
        declarations.insert(NamespaceType::Ipc, ipc);

        let mut user = BTreeMap::new();
        user.insert(
            "uid_map".to_string(),
            format!("0 {caller_uid} 1"),
        );
        user.insert(
            "gid_map".to_string(),
            format!("0 {caller_gid} 1"),
        );
        declarations.insert(NamespaceType::User, user);

        let mut net = BTreeMap::new();
        net.insert("netns".to_string(), netns_name.to_string());
        net.insert("container_name".to_string(), container_name.to_string());
        declarations.insert(NamespaceType::Net, net);

        Self { declarations }
    }

    /// Writes each declaration to its `<type>.conf` file under `paths.namespaces_dir()`.
    pub fn persist(&self, paths: &Paths) -> Result<()> {
        let dir = paths.namespaces_dir();
        fs::create_dir_all(&dir).map_err(|source| ContainerError::Io {
            path: dir.clone(),
            source,
        })?;

        for (ns_type, kv) in &self.declarations {
            let path = dir.join(ns_type.file_name());
            let contents = render(kv);
            fs::write(&path, contents).map_err(|source| ContainerError::Io { path, source })?;
        }
        Ok(())
    }

    /// Reads back a previously persisted configuration (used by recovery and `run`).
    pub fn load(paths: &Paths) -> Result<Self> {
        let dir = paths.namespaces_dir();
        let mut declarations = BTreeMap::new();
        for ns_type in ORDERED_NAMESPACES {
            let path = dir.join(ns_type.file_name());
            let contents = fs::read_to_string(&path).map_err(|source| ContainerError::Io {
                path: path.clone(),
                source,
            })?;
            declarations.insert(ns_type, parse(&contents));
        }
        Ok(Self { declarations })
    }

    pub fn flags(&self) -> CloneFlags {
        ORDERED_NAMESPACES
            .iter()
            .fold(CloneFlags::empty(), |acc, ns| acc | ns.clone_flag())
    }

    pub fn hostname(&self) -> Option<&str> {
        self.declarations
            .get(&NamespaceType::Uts)
            .and_then(|kv| kv.get("hostname"))
            .map(|s| s.as_str())
    }

    pub fn rootfs(&self) -> Option<PathBuf> {
        self.declarations
            .get(&NamespaceType::Mnt)
            .and_then(|kv| kv.get("rootfs"))
            .map(PathBuf::from)
    }
}

fn render(kv: &BTreeMap<String, String>) -> String {
    kv.iter()
        .map(|(k, v)| format!("{k}={v}\n"))
        .collect::<Vec<_>>()
        .join("")
}

fn parse(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NamespaceConfig {
        NamespaceConfig::build(
            "rumah-a",
            "rumah-a",
            Path::new("/tmp/containers/rumah-a/rootfs"),
            "/bin/sh",
            &[],
            1000,
            1000,
            "container-rumah-a",
        )
    }

    #[test]
    fn declares_all_six_namespaces() {
        let config = sample();
        assert_eq!(config.declarations.len(), 6);
        assert_eq!(config.flags(), CloneFlags::CLONE_NEWPID
            | CloneFlags::CLONE_NEWNS
            | CloneFlags::CLONE_NEWUTS
            | CloneFlags::CLONE_NEWIPC
            | CloneFlags::CLONE_NEWUSER
            | CloneFlags::CLONE_NEWNET);
    }

    #[test]
    fn persists_and_reloads_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::new(tmp.path(), "rumah-a");
        let config = sample();
        config.persist(&paths).unwrap();

        let reloaded = NamespaceConfig::load(&paths).unwrap();
        assert_eq!(reloaded.hostname(), Some("rumah-a"));
        assert_eq!(
            reloaded.rootfs(),
            Some(PathBuf::from("/tmp/containers/rumah-a/rootfs"))
        );
    }

    #[test]
    fn user_namespace_maps_caller_uid_to_root() {
        let config = sample();
        let user = &config.declarations[&NamespaceType::User];
        assert_eq!(user.get("uid_map").unwrap(), "0 1000 1");
        assert_eq!(user.get("gid_map").unwrap(), "0 1000 1");
    }
}
