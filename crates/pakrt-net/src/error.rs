use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("subnet 10.0.0.0/24 is exhausted: no free address for {name:?}")]
    SubnetExhausted { name: String },

    #[error("no IP is held for container {name:?}")]
    NoSuchAllocation { name: String },

    #[error("failed to run `{command}`: {source}")]
    CommandFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandRejected {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("veth hash collision between {a:?} and {b:?}")]
    HashCollision { a: String, b: String },

    #[error("failed to read/write network state file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, NetError>;
