//! Interface trait so that the rest of the crate can request kernel operations without
//! caring whether they run for real or are recorded by a test fake. Mirrors
//! `libcontainer::syscall::Syscall`, trimmed to the operations the chroot-based launcher
//! actually needs (no pivot_root, no capability sets, no rlimits).

use std::any::Any;
use std::path::Path;

use nix::mount::MsFlags;
use nix::sched::CloneFlags;
use nix::sys::stat::{Mode, SFlag};
use nix::unistd::{Gid, Uid};

use super::error::Result;

pub trait Syscall {
    fn as_any(&self) -> &dyn Any;

    fn unshare(&self, flags: CloneFlags) -> Result<()>;
    fn set_ns(&self, fd: i32, nstype: CloneFlags) -> Result<()>;
    fn set_id(&self, uid: Uid, gid: Gid) -> Result<()>;
    fn set_hostname(&self, hostname: &str) -> Result<()>;
    fn set_domainname(&self, domainname: &str) -> Result<()>;
    fn chroot(&self, path: &Path) -> Result<()>;
    fn chdir(&self, path: &Path) -> Result<()>;
    #[allow(clippy::too_many_arguments)]
    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<()>;
    fn umount(&self, target: &Path) -> Result<()>;
    fn mknod(&self, path: &Path, kind: SFlag, perm: Mode, dev: u64) -> Result<()>;
    fn symlink(&self, original: &Path, link: &Path) -> Result<()>;
    fn chown(&self, path: &Path, owner: Option<Uid>, group: Option<Gid>) -> Result<()>;
}

pub fn create_syscall() -> Box<dyn Syscall + Send + Sync> {
    Box::new(super::linux::LinuxSyscall)
}
