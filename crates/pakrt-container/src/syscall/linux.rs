//! Real kernel-backed implementation of [`Syscall`], grounded on
//! `libcontainer::syscall::linux::LinuxSyscall` — same one-nix-call-per-method shape,
//! trimmed to chroot-based setup instead of pivot_root.

use std::any::Any;
use std::ffi::CString;
use std::path::Path;

use nix::mount::{mount, umount, MsFlags};
use nix::sched::{setns, unshare, CloneFlags};
use nix::sys::stat::{mknod, Mode, SFlag};
use nix::unistd::{chdir, chroot, sethostname, setresgid, setresuid, symlinkat, Gid, Uid};

use super::error::{Result, SyscallError};
use super::syscall::Syscall;

pub struct LinuxSyscall;

impl Syscall for LinuxSyscall {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn unshare(&self, flags: CloneFlags) -> Result<()> {
        unshare(flags).map_err(|errno| SyscallError::UnshareFailed { flags, errno })
    }

    fn set_ns(&self, fd: i32, nstype: CloneFlags) -> Result<()> {
        setns(fd, nstype).map_err(SyscallError::SetNsFailed)
    }

    fn set_id(&self, uid: Uid, gid: Gid) -> Result<()> {
        setresgid(gid, gid, gid).map_err(|errno| SyscallError::SetIdFailed { errno })?;
        setresuid(uid, uid, uid).map_err(|errno| SyscallError::SetIdFailed { errno })
    }

    fn set_hostname(&self, hostname: &str) -> Result<()> {
        sethostname(hostname).map_err(|errno| SyscallError::SetHostnameFailed {
            hostname: hostname.to_string(),
            errno,
        })
    }

    fn set_domainname(&self, domainname: &str) -> Result<()> {
        let cstr = CString::new(domainname).map_err(|_| SyscallError::SetDomainnameFailed {
            domainname: domainname.to_string(),
            errno: nix::errno::Errno::EINVAL,
        })?;
        let ret = unsafe { libc::setdomainname(cstr.as_ptr(), domainname.len() as libc::size_t) };
        if ret != 0 {
            return Err(SyscallError::SetDomainnameFailed {
                domainname: domainname.to_string(),
                errno: nix::errno::Errno::last(),
            });
        }
        Ok(())
    }

    fn chroot(&self, path: &Path) -> Result<()> {
        chroot(path).map_err(|errno| SyscallError::ChrootFailed {
            path: path.to_path_buf(),
            errno,
        })
    }

    fn chdir(&self, path: &Path) -> Result<()> {
        chdir(path).map_err(|errno| SyscallError::ChdirFailed {
            path: path.to_path_buf(),
            errno,
        })
    }

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<()> {
        mount(source, target, fstype, flags, data).map_err(|errno| SyscallError::MountFailed {
            source_path: source.map(|p| p.to_path_buf()),
            target: target.to_path_buf(),
            fstype: fstype.map(|s| s.to_string()),
            errno,
        })
    }

    fn umount(&self, target: &Path) -> Result<()> {
        umount(target).map_err(|errno| SyscallError::UmountFailed {
            target: target.to_path_buf(),
            errno,
        })
    }

    fn mknod(&self, path: &Path, kind: SFlag, perm: Mode, dev: u64) -> Result<()> {
        mknod(path, kind, perm, dev).map_err(|errno| SyscallError::MknodFailed {
            path: path.to_path_buf(),
            errno,
        })
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        symlinkat(original, None, link).map_err(|errno| SyscallError::SymlinkFailed {
            original: original.to_path_buf(),
            link: link.to_path_buf(),
            source: std::io::Error::from(errno),
        })
    }

    fn chown(&self, path: &Path, owner: Option<Uid>, group: Option<Gid>) -> Result<()> {
        nix::unistd::chown(path, owner, group).map_err(|errno| SyscallError::ChownFailed {
            path: path.to_path_buf(),
            errno,
        })
    }
}
