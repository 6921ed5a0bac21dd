//! Rootfs provisioner (C6): builds the directory skeleton, populates `/etc`, and installs
//! a minimal command set, idempotently.
//!
//! Grounded on `libcontainer::rootfs::device` (the device-node major/minor table and the
//! umask dance around `mknod`) and `libcontainer::rootfs::symlink` (symlink-farm
//! construction), generalized from OCI `LinuxDevice` entries to pakrt's fixed conventional
//! device set.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use nix::sys::stat::{umask, Mode, SFlag};

use crate::error::{ContainerError, Result};
use crate::syscall::Syscall;

const SKELETON_DIRS: &[&str] = &[
    "bin", "sbin", "usr/bin", "usr/sbin", "proc", "sys", "dev", "dev/pts", "tmp", "var", "etc",
];

/// `(name, type, major, minor, mode)` — the conventional `/dev` nodes every minimal
/// rootfs needs, matching the major/minor pairs any Linux devtmpfs assigns them.
const DEVICE_NODES: &[(&str, SFlag, u64, u64, u32)] = &[
    ("null", SFlag::S_IFCHR, 1, 3, 0o666),
    ("zero", SFlag::S_IFCHR, 1, 5, 0o666),
    ("random", SFlag::S_IFCHR, 1, 8, 0o666),
    ("urandom", SFlag::S_IFCHR, 1, 9, 0o666),
];

/// The small utility names that get symlinked at the dispatcher/busybox binary.
const LINKED_UTILITIES: &[&str] = &[
    "sh", "ls", "cat", "echo", "ps", "mount", "cp", "mv", "rm", "mkdir", "grep", "sleep",
];

/// Candidate static multi-call binaries to look for on the host; the first one found is
/// copied in as `bin/busybox` and every utility name is symlinked at it.
const STATIC_BINARY_CANDIDATES: &[&str] = &["/bin/busybox", "/usr/bin/busybox"];

pub struct RootfsProvisioner {
    syscall: Box<dyn Syscall + Send + Sync>,
}

impl Default for RootfsProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl RootfsProvisioner {
    pub fn new() -> Self {
        Self {
            syscall: crate::syscall::create_syscall(),
        }
    }

    pub fn with_syscall(syscall: Box<dyn Syscall + Send + Sync>) -> Self {
        Self { syscall }
    }

    /// Builds (or completes) the rootfs at `root`. Safe to call again over a partially or
    /// fully provisioned tree.
    pub fn provision(&self, root: &Path, hostname: &str) -> Result<()> {
        self.make_skeleton(root)?;
        self.populate_etc(root, hostname)?;
        self.install_utilities(root)?;
        self.create_device_nodes(root)?;
        Ok(())
    }

    fn make_skeleton(&self, root: &Path) -> Result<()> {
        for rel in SKELETON_DIRS {
            let dir = root.join(rel);
            if !dir.exists() {
                fs::create_dir_all(&dir).map_err(|source| ContainerError::Io {
                    path: dir,
                    source,
                })?;
            }
        }
        Ok(())
    }

    fn populate_etc(&self, root: &Path, hostname: &str) -> Result<()> {
        let etc = root.join("etc");
        write_if_absent(&etc.join("hostname"), &format!("{hostname}\n"))?;
        write_if_absent(
            &etc.join("hosts"),
            &format!("127.0.0.1\tlocalhost\n127.0.0.1\t{hostname}\n"),
        )?;
        write_if_absent(&etc.join("resolv.conf"), "nameserver 8.8.8.8\n")?;
        write_if_absent(&etc.join("passwd"), "root:x:0:0:root:/root:/bin/sh\n")?;
        write_if_absent(&etc.join("group"), "root:x:0:\n")?;
        Ok(())
    }

    /// Copies a static multi-call binary in if one exists on the host; otherwise
    /// synthesizes a dispatcher script that shells out to the matching host tool. Either
    /// way every entry in [`LINKED_UTILITIES`] ends up as a working command inside the
    /// rootfs.
    fn install_utilities(&self, root: &Path) -> Result<()> {
        let bin = root.join("bin");
        let busybox_dest = bin.join("busybox");

        let multicall = STATIC_BINARY_CANDIDATES
            .iter()
            .map(Path::new)
            .find(|p| p.is_file());

        if let Some(source) = multicall {
            if !busybox_dest.exists() {
                fs::copy(source, &busybox_dest).map_err(|source_err| ContainerError::Io {
                    path: busybox_dest.clone(),
                    source: source_err,
                })?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let _ = fs::set_permissions(&busybox_dest, fs::Permissions::from_mode(0o755));
                }
            }
            for util in LINKED_UTILITIES {
                let link = bin.join(util);
                if !link.exists() {
                    symlink("busybox", &link).map_err(|source| ContainerError::Io {
                        path: link,
                        source,
                    })?;
                }
            }
        } else {
            for util in LINKED_UTILITIES {
                let script = bin.join(util);
                if !script.exists() {
                    let body = format!("#!/bin/sh\nexec {util} \"$@\"\n");
                    fs::write(&script, body).map_err(|source| ContainerError::Io {
                        path: script.clone(),
                        source,
                    })?;
                    #[cfg(unix)]
                    {
                        use std::os::unix::fs::PermissionsExt;
                        let _ = fs::set_permissions(&script, fs::Permissions::from_mode(0o755));
                    }
                }
            }
        }
        Ok(())
    }

    fn create_device_nodes(&self, root: &Path) -> Result<()> {
        let dev = root.join("dev");
        let old_mode = umask(Mode::from_bits_truncate(0o000));
        let result = (|| -> Result<()> {
            for (name, kind, major, minor, mode) in DEVICE_NODES {
                let path = dev.join(name);
                if path.exists() {
                    continue;
                }
                let dev_t = makedev(*major, *minor);
                self.syscall
                    .mknod(&path, *kind, Mode::from_bits_truncate(*mode), dev_t)?;
            }
            Ok(())
        })();
        umask(old_mode);
        result
    }
}

fn makedev(major: u64, minor: u64) -> u64 {
    (minor & 0xff) | ((major & 0xfff) << 8) | ((minor & !0xff) << 12) | ((major & !0xfff) << 32)
}

fn write_if_absent(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::write(path, contents).map_err(|source| ContainerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn device_nodes() -> Vec<PathBuf> {
    DEVICE_NODES
        .iter()
        .map(|(name, ..)| PathBuf::from("dev").join(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::test::TestHelperSyscall;

    #[test]
    fn provision_creates_skeleton_and_etc_files() {
        let tmp = tempfile::tempdir().unwrap();
        let provisioner = RootfsProvisioner::with_syscall(Box::new(TestHelperSyscall::new()));
        provisioner.provision(tmp.path(), "rumah-a").unwrap();

        for rel in SKELETON_DIRS {
            assert!(tmp.path().join(rel).is_dir(), "missing {rel}");
        }
        assert!(tmp.path().join("etc/passwd").is_file());
        assert!(tmp.path().join("etc/hostname").is_file());
        let hostname = fs::read_to_string(tmp.path().join("etc/hostname")).unwrap();
        assert_eq!(hostname.trim(), "rumah-a");
    }

    #[test]
    fn provision_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let provisioner = RootfsProvisioner::with_syscall(Box::new(TestHelperSyscall::new()));
        provisioner.provision(tmp.path(), "rumah-a").unwrap();
        provisioner.provision(tmp.path(), "rumah-a").unwrap();
        assert!(tmp.path().join("etc/passwd").is_file());
    }

    #[test]
    fn install_utilities_falls_back_to_dispatcher_scripts_without_busybox() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("bin")).unwrap();
        let provisioner = RootfsProvisioner::with_syscall(Box::new(TestHelperSyscall::new()));
        provisioner.install_utilities(tmp.path()).unwrap();

        let sh = tmp.path().join("bin/sh");
        assert!(sh.is_file());
        let body = fs::read_to_string(&sh).unwrap();
        assert!(body.contains("exec sh"));
    }

    #[test]
    fn device_nodes_are_created_via_the_syscall_trait() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("dev")).unwrap();
        let provisioner = RootfsProvisioner::with_syscall(Box::new(TestHelperSyscall::new()));
        provisioner.create_device_nodes(tmp.path()).unwrap();

        let calls = provisioner
            .syscall
            .as_any()
            .downcast_ref::<TestHelperSyscall>()
            .unwrap()
            .calls();
        assert_eq!(calls.len(), DEVICE_NODES.len());
    }
}
