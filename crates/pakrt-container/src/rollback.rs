//! Per-operation undo stack (C3) and the interrupt flag the orchestrator polls between
//! steps.
//!
//! Grounded on `libcontainer::container::container_delete`'s "best effort, log and keep
//! going" teardown style: `unwind()` mirrors that same policy applied to a dynamically
//! grown stack of not-yet-committed mutations instead of a fixed teardown sequence.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use pakrt_cgroups::CgroupManager;
use pakrt_net::{IpAllocator, NetworkDescriptor, NetworkDriver};

/// One undoable side effect of an in-flight `create`. Each variant is the inverse of the
/// step that produced it.
#[derive(Debug, Clone)]
pub enum Action {
    RemoveDir(PathBuf),
    RemoveFile(PathBuf),
    ReleaseIp(String),
    TeardownNetwork(NetworkDescriptor),
    TeardownCgroup(String),
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::RemoveDir(p) => write!(f, "remove directory {}", p.display()),
            Action::RemoveFile(p) => write!(f, "remove file {}", p.display()),
            Action::ReleaseIp(name) => write!(f, "release IP held by {name:?}"),
            Action::TeardownNetwork(desc) => write!(f, "tear down network {}", desc.netns),
            Action::TeardownCgroup(name) => write!(f, "tear down cgroups for {name:?}"),
        }
    }
}

/// Append-only until `unwind()` or `clear()` consumes it. Lives for the duration of a
/// single orchestrator operation.
#[derive(Debug, Default)]
pub struct RollbackStack {
    actions: Vec<Action>,
}

impl RollbackStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        tracing::debug!(%action, "pushed rollback action");
        self.actions.push(action);
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Drops every pending action without running it, called after a successful
    /// operation.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Runs every pending action in LIFO order. Each failure is logged and counted; the
    /// rest still run. Returns the number of actions that failed.
    pub fn unwind(
        &mut self,
        allocator: &mut IpAllocator,
        net: &NetworkDriver,
        cgroups: Option<&CgroupManager>,
    ) -> usize {
        let mut failures = 0;
        while let Some(action) = self.actions.pop() {
            tracing::warn!(%action, "rolling back");
            let ok = match &action {
                Action::RemoveDir(path) => {
                    path.is_dir()
                        .then(|| std::fs::remove_dir_all(path).is_ok())
                        .unwrap_or(true)
                }
                Action::RemoveFile(path) => {
                    path.is_file()
                        .then(|| std::fs::remove_file(path).is_ok())
                        .unwrap_or(true)
                }
                Action::ReleaseIp(name) => {
                    allocator.release(name);
                    true
                }
                Action::TeardownNetwork(desc) => net.teardown(desc) == 0,
                Action::TeardownCgroup(name) => cgroups
                    .map(|mgr| mgr.destroy(name).is_ok())
                    .unwrap_or(true),
            };
            if !ok {
                failures += 1;
            }
        }
        failures
    }
}

/// Shared process-wide interrupt flag, set by the SIGINT/SIGTERM handlers installed by
/// `install_signal_handlers`, polled by the orchestrator between steps.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static TERM_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

pub fn term_requested() -> bool {
    TERM_REQUESTED.load(Ordering::SeqCst)
}

pub fn reset_interrupt_flags() {
    INTERRUPTED.store(false, Ordering::SeqCst);
    TERM_REQUESTED.store(false, Ordering::SeqCst);
}

extern "C" fn handle_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

extern "C" fn handle_sigterm(_: libc::c_int) {
    TERM_REQUESTED.store(true, Ordering::SeqCst);
}

/// Installs SIGINT/SIGTERM handlers that flip the polled flags instead of terminating the
/// process immediately, so the orchestrator can unwind before exiting with 130/143.
///
/// # Safety
/// Registers a signal handler via `sigaction`; the handler only performs an atomic store,
/// which is async-signal-safe.
pub fn install_signal_handlers() {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    let int_action = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    let term_action = SigAction::new(
        SigHandler::Handler(handle_sigterm),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe {
        let _ = sigaction(Signal::SIGINT, &int_action);
        let _ = sigaction(Signal::SIGTERM, &term_action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn clear_drops_actions_without_running_them() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("rumah-a");
        std::fs::create_dir(&dir).unwrap();
        let mut stack = RollbackStack::new();
        stack.push(Action::RemoveDir(dir.clone()));
        stack.clear();
        assert!(dir.is_dir());
    }

    #[test]
    fn unwind_runs_in_lifo_order_and_releases_ip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("rumah-a");
        std::fs::create_dir(&dir).unwrap();

        let mut stack = RollbackStack::new();
        let mut allocator = IpAllocator::new();
        let ip = allocator.allocate("rumah-a").unwrap();
        assert_eq!(ip, Ipv4Addr::new(10, 0, 0, 2));

        stack.push(Action::RemoveDir(dir.clone()));
        stack.push(Action::ReleaseIp("rumah-a".to_string()));

        let net = NetworkDriver::new();
        let failures = stack.unwind(&mut allocator, &net, None);

        assert_eq!(failures, 0);
        assert!(!dir.exists());
        assert!(allocator.get("rumah-a").is_none());
        assert!(stack.is_empty());
    }
}
