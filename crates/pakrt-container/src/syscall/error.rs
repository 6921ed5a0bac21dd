use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    #[error("failed to unshare {flags:?}: {errno}")]
    UnshareFailed {
        flags: nix::sched::CloneFlags,
        errno: nix::errno::Errno,
    },
    #[error("failed to setns: {0}")]
    SetNsFailed(nix::errno::Errno),
    #[error("failed to chroot to {path:?}: {errno}")]
    ChrootFailed {
        path: PathBuf,
        errno: nix::errno::Errno,
    },
    #[error("failed to chdir to {path:?}: {errno}")]
    ChdirFailed {
        path: PathBuf,
        errno: nix::errno::Errno,
    },
    #[error("failed to set hostname {hostname}: {errno}")]
    SetHostnameFailed {
        hostname: String,
        errno: nix::errno::Errno,
    },
    #[error("failed to set domainname {domainname}: {errno}")]
    SetDomainnameFailed {
        domainname: String,
        errno: nix::errno::Errno,
    },
    #[error("mount failed: source={source_path:?} target={target:?} fstype={fstype:?}: {errno}")]
    MountFailed {
        source_path: Option<PathBuf>,
        target: PathBuf,
        fstype: Option<String>,
        errno: nix::errno::Errno,
    },
    #[error("umount failed for {target:?}: {errno}")]
    UmountFailed {
        target: PathBuf,
        errno: nix::errno::Errno,
    },
    #[error("mknod failed for {path:?}: {errno}")]
    MknodFailed {
        path: PathBuf,
        errno: nix::errno::Errno,
    },
    #[error("symlink failed: {original:?} -> {link:?}: {source}")]
    SymlinkFailed {
        original: PathBuf,
        link: PathBuf,
        source: std::io::Error,
    },
    #[error("chown failed for {path:?}: {errno}")]
    ChownFailed {
        path: PathBuf,
        errno: nix::errno::Errno,
    },
    #[error("set_id failed: {errno}")]
    SetIdFailed { errno: nix::errno::Errno },
    #[error("exec failed: {0}")]
    ExecFailed(nix::errno::Errno),
    #[error("fork failed: {0}")]
    ForkFailed(nix::errno::Errno),
}

pub type Result<T> = std::result::Result<T, SyscallError>;
