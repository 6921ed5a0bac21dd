//! Top-level error kinds shared across the pakrt crates.
//!
//! Each component crate (pakrt-net, pakrt-cgroups, pakrt-container) defines its own
//! `thiserror` enum for its internal failure modes, mirroring how `libcgroups` and
//! `libcontainer` keep a `V1MemoryControllerError` / `DeviceError` per module. This module
//! holds the coarser classification from the error handling design: the kind the
//! orchestrator and CLI need in order to pick an exit code, a remediation hint, and
//! whether the failure should trigger a rollback.

use std::path::PathBuf;

/// One of the eight error kinds from the runtime's error handling design, each mapping to
/// a distinct exit code and rollback behavior.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PakrtError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("resource unavailable: {0}")]
    Resource(String),

    #[error("filesystem operation failed: {0}")]
    Filesystem(String),

    #[error("network operation failed: {0}")]
    Network(String),

    #[error("cgroup operation failed: {0}")]
    Cgroup(String),

    #[error("process launch failed: {0}")]
    Process(String),

    #[error("missing required dependency: {0}")]
    Dependency(String),
}

impl PakrtError {
    /// Exit code per the CLI surface: 0 success, 1 generic, 2 permission/prereq, 126 not
    /// executable, 127 missing dependency, 130 interrupted (handled by the signal path,
    /// not here).
    pub fn exit_code(&self) -> i32 {
        match self {
            PakrtError::Validation(_) => 1,
            PakrtError::Permission(_) => 2,
            PakrtError::Resource(_) => 1,
            PakrtError::Filesystem(_) => 1,
            PakrtError::Network(_) => 1,
            PakrtError::Cgroup(_) => 1,
            PakrtError::Process(_) => 126,
            PakrtError::Dependency(_) => 127,
        }
    }

    /// Whether the orchestrator should unwind its rollback stack on this failure kind.
    pub fn triggers_rollback(&self) -> bool {
        matches!(
            self,
            PakrtError::Filesystem(_) | PakrtError::Network(_) | PakrtError::Cgroup(_)
        )
    }

    /// A short remediation hint selected by error kind, printed alongside the cause.
    pub fn remediation(&self) -> &'static str {
        match self {
            PakrtError::Validation(_) => {
                "check the container name, memory/cpu limits, and paths you supplied"
            }
            PakrtError::Permission(_) => {
                "re-run as root, or with --rootless if user namespaces are configured"
            }
            PakrtError::Resource(_) => {
                "free up disk space or IP addresses, or delete unused containers"
            }
            PakrtError::Filesystem(_) => "check permissions on the containers base directory",
            PakrtError::Network(_) => "check that `ip` is installed and netns are supported",
            PakrtError::Cgroup(_) => "check that the cgroup hierarchy is mounted and writable",
            PakrtError::Process(_) => "the container was marked failed; inspect its logs",
            PakrtError::Dependency(_) => "install the missing external tool and retry",
        }
    }
}

/// A validation failure, carrying the offending input so the caller can report it.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("container name {name:?} does not match ^[A-Za-z0-9][A-Za-z0-9_-]{{0,49}}$")]
    BadName { name: String },

    #[error("container name {name:?} is reserved")]
    ReservedName { name: String },

    #[error("memory_mb={value} is out of range [64, 8192]")]
    MemoryOutOfRange { value: i64 },

    #[error("cpu_percent={value} is out of range [1, 100]")]
    CpuOutOfRange { value: i64 },

    #[error("path {path:?} escapes base directory {base:?}")]
    PathTraversal { path: PathBuf, base: PathBuf },

    #[error("hostname {hostname:?} is not a valid RFC 1123 label")]
    BadHostname { hostname: String },

    #[error("input {input:?} required sanitation (contained non-digit characters)")]
    UnsanitizedInput { input: String },

    #[error("veth hash collision between {a:?} and {b:?} (hash {hash})")]
    VethHashCollision { a: String, b: String, hash: String },
}
