use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CgroupError {
    #[error("no cgroup root found at any of the usual mount points")]
    NoCgroupRoot,

    #[error("cgroup version could not be determined")]
    VersionUnknown,

    #[error("permission denied writing cgroup file {path}")]
    PermissionDenied { path: PathBuf },

    #[error("failed to write {value:?} to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        value: String,
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no cgroup exists for container {name:?}")]
    NotFound { name: String },

    #[error("failed to remove cgroup directory {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CgroupError>;
