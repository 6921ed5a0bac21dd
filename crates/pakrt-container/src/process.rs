//! Process launcher (C9): fork, unshare the six namespaces, populate the mount
//! namespace, chroot, and exec the init command.
//!
//! Grounded on `libcontainer::process::fork::container_fork` (the `fork` +
//! child-runs-closure-then-`exit` skeleton) and `libcontainer::syscall::linux::LinuxSyscall`
//! (the `Syscall` trait boundary this module drives), generalized: pakrt chroots instead of
//! pivot-roots and has no OCI bundle / seccomp / capability negotiation layer.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use nix::mount::MsFlags;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::error::{ContainerError, Result};
use crate::namespaces::NamespaceConfig;
use crate::syscall::Syscall;

/// Whether a launch blocks until the init process exits, or returns immediately once it
/// has started (stdio redirected to the container log file).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    Interactive,
    Detached,
}

pub struct Launcher {
    syscall: Box<dyn Syscall + Send + Sync>,
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher {
    pub fn new() -> Self {
        Self {
            syscall: crate::syscall::create_syscall(),
        }
    }

    pub fn with_syscall(syscall: Box<dyn Syscall + Send + Sync>) -> Self {
        Self { syscall }
    }

    /// Forks the init process. The child unshares the declared namespaces, sets up the
    /// mount namespace, chroots, and execs `command`; the parent returns the child's PID
    /// without waiting (the caller decides whether to block via [`wait`]).
    pub fn launch(
        &self,
        config: &NamespaceConfig,
        rootfs: &Path,
        command: &str,
        args: &[String],
        log_file: Option<&Path>,
    ) -> Result<Pid> {
        let stdio = log_file
            .map(|path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| ContainerError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
            })
            .transpose()?;

        match unsafe { unistd::fork() }.map_err(|errno| {
            ContainerError::Process(format!("fork failed: {errno}"))
        })? {
            ForkResult::Parent { child } => Ok(child),
            ForkResult::Child => {
                let code = match self.run_child(config, rootfs, command, args, stdio.as_ref()) {
                    Ok(()) => 0,
                    Err(err) => {
                        tracing::error!(?err, "container init failed");
                        1
                    }
                };
                std::process::exit(code);
            }
        }
    }

    fn run_child(
        &self,
        config: &NamespaceConfig,
        rootfs: &Path,
        command: &str,
        args: &[String],
        stdio: Option<&File>,
    ) -> Result<()> {
        if let Some(file) = stdio {
            redirect_stdio(file);
        }

        self.syscall.unshare(config.flags())?;

        if let Some(hostname) = config.hostname() {
            self.syscall.set_hostname(hostname)?;
            self.syscall.set_domainname("container.local")?;
        }

        self.setup_mounts(rootfs)?;
        self.syscall.chroot(rootfs)?;
        self.syscall.chdir(Path::new("/"))?;

        exec(command, args)
    }

    fn setup_mounts(&self, rootfs: &Path) -> Result<()> {
        self.syscall.mount(
            Some(rootfs),
            rootfs,
            None,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None,
        )?;
        self.syscall.mount(
            Some(Path::new("proc")),
            &rootfs.join("proc"),
            Some("proc"),
            MsFlags::empty(),
            None,
        )?;
        self.syscall.mount(
            Some(Path::new("sysfs")),
            &rootfs.join("sys"),
            Some("sysfs"),
            MsFlags::empty(),
            None,
        )?;
        self.syscall.mount(
            Some(Path::new("devpts")),
            &rootfs.join("dev/pts"),
            Some("devpts"),
            MsFlags::empty(),
            None,
        )?;
        self.syscall.mount(
            Some(Path::new("tmpfs")),
            &rootfs.join("tmp"),
            Some("tmpfs"),
            MsFlags::empty(),
            None,
        )?;
        Ok(())
    }
}

fn redirect_stdio(file: &File) {
    let fd = file.as_raw_fd();
    unsafe {
        libc::dup2(fd, libc::STDIN_FILENO);
        libc::dup2(fd, libc::STDOUT_FILENO);
        libc::dup2(fd, libc::STDERR_FILENO);
    }
}

fn exec(command: &str, args: &[String]) -> Result<()> {
    let program = CString::new(command)
        .map_err(|_| ContainerError::Process(format!("invalid init command {command:?}")))?;
    let mut argv = vec![program.clone()];
    for arg in args {
        argv.push(
            CString::new(arg.as_str())
                .map_err(|_| ContainerError::Process(format!("invalid argument {arg:?}")))?,
        );
    }
    unistd::execvp(&program, &argv)
        .map_err(|errno| ContainerError::Process(format!("exec {command:?} failed: {errno}")))?;
    unreachable!("execvp only returns on error")
}

/// Blocks until `pid` exits, returning its exit status. Used for interactive launches;
/// detached launches skip this and return once the PID file is written.
pub fn wait(pid: Pid) -> Result<i32> {
    match waitpid(pid, None) {
        Ok(WaitStatus::Exited(_, code)) => Ok(code),
        Ok(WaitStatus::Signaled(_, signal, _)) => Ok(128 + signal as i32),
        Ok(_) => Ok(0),
        Err(errno) => Err(ContainerError::Process(format!("waitpid failed: {errno}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::test::TestHelperSyscall;
    use std::path::PathBuf;

    #[test]
    fn setup_mounts_issues_bind_then_four_pseudo_mounts() {
        let launcher = Launcher::with_syscall(Box::new(TestHelperSyscall::new()));
        let rootfs = PathBuf::from("/tmp/containers/rumah-a/rootfs");
        launcher.setup_mounts(&rootfs).unwrap();

        let calls = launcher
            .syscall
            .as_any()
            .downcast_ref::<TestHelperSyscall>()
            .unwrap()
            .calls();
        assert_eq!(calls.len(), 5);
    }
}
