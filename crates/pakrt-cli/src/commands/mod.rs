//! Subcommand implementations, grouped the way `youki::commands` splits one file per OCI
//! verb — here grouped by the engine component each subcommand drives (lifecycle,
//! integrity, reporting) since pakrt's 11 subcommands are individually much smaller than
//! a full OCI command.

pub mod integrity;
pub mod lifecycle;
pub mod report;

use pakrt_container::ContainerError;

/// Exit code for a top-level failure, per the CLI surface's documented mapping. Anything
/// that isn't a recognized `ContainerError` (clap parse errors, unexpected panics caught
/// upstream) falls back to the generic code 1.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ContainerError>()
        .map(|e| e.exit_code())
        .unwrap_or(1)
}

/// A short remediation hint keyed by error kind, shown under the one-line cause.
pub fn remediation_hint(err: &anyhow::Error) -> Option<&'static str> {
    let err = err.downcast_ref::<ContainerError>()?;
    Some(match err {
        ContainerError::Validation(_) => "check the name/memory/cpu bounds and retry",
        ContainerError::AlreadyExists { .. } => "pick a different name or delete the existing one first",
        ContainerError::NotFound { .. } => "run list-containers to see what currently exists",
        ContainerError::WrongStatus { .. } => "the container isn't in the right state for this operation",
        ContainerError::RunningRefusesDelete { .. } => "pass --force to delete a running container",
        ContainerError::Io { .. } | ContainerError::Metadata { .. } | ContainerError::Json(_) => {
            "check filesystem permissions under the containers base directory"
        }
        ContainerError::Syscall(_) => "this likely requires root or additional namespace capabilities",
        ContainerError::Net(_) => "check that the `ip` command is installed and network namespaces are usable",
        ContainerError::Cgroup(_) => "check that the cgroup hierarchy is mounted and writable",
        ContainerError::Process(_) => "the init command may not exist inside the rootfs",
        ContainerError::Dependency(_) => "install the missing external tool and re-run validate-system",
        ContainerError::Interrupted => "re-run the command; state is rolled back to before it started",
        ContainerError::Terminated => "re-run the command; state is rolled back to before it started",
    })
}
