//! In-memory fake for [`Syscall`], grounded on `libcontainer::syscall::test::TestHelperSyscall`
//! — records every call instead of touching the kernel, so namespace/rootfs/process unit
//! tests can run unprivileged and in CI.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use nix::mount::MsFlags;
use nix::sched::CloneFlags;
use nix::sys::stat::{Mode, SFlag};
use nix::unistd::{Gid, Uid};

use super::error::Result;
use super::syscall::Syscall;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Unshare(CloneFlags),
    SetNs(i32, CloneFlags),
    SetId(u32, u32),
    SetHostname(String),
    SetDomainname(String),
    Chroot(PathBuf),
    Chdir(PathBuf),
    Mount {
        source: Option<PathBuf>,
        target: PathBuf,
        fstype: Option<String>,
    },
    Umount(PathBuf),
    Mknod(PathBuf),
    Symlink(PathBuf, PathBuf),
    Chown(PathBuf),
}

#[derive(Default)]
pub struct TestHelperSyscall {
    calls: Mutex<Vec<RecordedCall>>,
}

impl TestHelperSyscall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Syscall for TestHelperSyscall {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn unshare(&self, flags: CloneFlags) -> Result<()> {
        self.record(RecordedCall::Unshare(flags));
        Ok(())
    }

    fn set_ns(&self, fd: i32, nstype: CloneFlags) -> Result<()> {
        self.record(RecordedCall::SetNs(fd, nstype));
        Ok(())
    }

    fn set_id(&self, uid: Uid, gid: Gid) -> Result<()> {
        self.record(RecordedCall::SetId(uid.as_raw(), gid.as_raw()));
        Ok(())
    }

    fn set_hostname(&self, hostname: &str) -> Result<()> {
        self.record(RecordedCall::SetHostname(hostname.to_string()));
        Ok(())
    }

    fn set_domainname(&self, domainname: &str) -> Result<()> {
        self.record(RecordedCall::SetDomainname(domainname.to_string()));
        Ok(())
    }

    fn chroot(&self, path: &Path) -> Result<()> {
        self.record(RecordedCall::Chroot(path.to_path_buf()));
        Ok(())
    }

    fn chdir(&self, path: &Path) -> Result<()> {
        self.record(RecordedCall::Chdir(path.to_path_buf()));
        Ok(())
    }

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        _flags: MsFlags,
        _data: Option<&str>,
    ) -> Result<()> {
        self.record(RecordedCall::Mount {
            source: source.map(|p| p.to_path_buf()),
            target: target.to_path_buf(),
            fstype: fstype.map(|s| s.to_string()),
        });
        Ok(())
    }

    fn umount(&self, target: &Path) -> Result<()> {
        self.record(RecordedCall::Umount(target.to_path_buf()));
        Ok(())
    }

    fn mknod(&self, path: &Path, _kind: SFlag, _perm: Mode, _dev: u64) -> Result<()> {
        self.record(RecordedCall::Mknod(path.to_path_buf()));
        Ok(())
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        self.record(RecordedCall::Symlink(
            original.to_path_buf(),
            link.to_path_buf(),
        ));
        Ok(())
    }

    fn chown(&self, path: &Path, _owner: Option<Uid>, _group: Option<Gid>) -> Result<()> {
        self.record(RecordedCall::Chown(path.to_path_buf()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let fake = TestHelperSyscall::new();
        fake.chroot(Path::new("/rootfs")).unwrap();
        fake.set_hostname("rumah-a").unwrap();
        assert_eq!(
            fake.calls(),
            vec![
                RecordedCall::Chroot(PathBuf::from("/rootfs")),
                RecordedCall::SetHostname("rumah-a".to_string()),
            ]
        );
    }
}
