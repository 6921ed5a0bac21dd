use std::path::PathBuf;

use pakrt_common::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("container {name:?} already exists")]
    AlreadyExists { name: String },

    #[error("no such container {name:?}")]
    NotFound { name: String },

    #[error("container {name:?} is {status}, expected {expected}")]
    WrongStatus {
        name: String,
        status: String,
        expected: String,
    },

    #[error("container {name:?} is running; pass --force to delete anyway")]
    RunningRefusesDelete { name: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid metadata at {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    #[error("failed to (de)serialize metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Syscall(#[from] crate::syscall::SyscallError),

    #[error(transparent)]
    Net(#[from] pakrt_net::NetError),

    #[error(transparent)]
    Cgroup(#[from] pakrt_cgroups::CgroupError),

    #[error("process launch failed: {0}")]
    Process(String),

    #[error("missing required external tool: {0}")]
    Dependency(String),

    #[error("operation interrupted by SIGINT")]
    Interrupted,

    #[error("operation terminated by SIGTERM")]
    Terminated,
}

impl ContainerError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ContainerError::Validation(_) => 1,
            ContainerError::AlreadyExists { .. }
            | ContainerError::NotFound { .. }
            | ContainerError::WrongStatus { .. } => 1,
            ContainerError::RunningRefusesDelete { .. } => 1,
            ContainerError::Io { .. } | ContainerError::Metadata { .. } | ContainerError::Json(_) => 1,
            ContainerError::Syscall(_) => 1,
            ContainerError::Net(_) => 1,
            ContainerError::Cgroup(pakrt_cgroups::CgroupError::PermissionDenied { .. }) => 2,
            ContainerError::Cgroup(_) => 1,
            ContainerError::Process(_) => 126,
            ContainerError::Dependency(_) => 127,
            ContainerError::Interrupted => 130,
            ContainerError::Terminated => 143,
        }
    }

    /// Whether this error should trigger rollback of the in-flight `create` operation,
    /// per the error-handling design's Filesystem/Network/Cgroup rollback policy.
    pub fn triggers_rollback(&self) -> bool {
        matches!(
            self,
            ContainerError::Io { .. }
                | ContainerError::Net(_)
                | ContainerError::Cgroup(_)
                | ContainerError::Syscall(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
