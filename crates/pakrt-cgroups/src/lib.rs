//! cgroup v1/v2 resource driver for pakrt containers: memory and CPU limits, PID
//! attachment, teardown, and usage reporting behind a single version-dispatching facade.

pub mod common;
pub mod error;
pub mod manager;
pub mod usage;

#[cfg(feature = "v1")]
pub mod v1;
#[cfg(feature = "v2")]
pub mod v2;

pub use error::{CgroupError, Result};
pub use manager::CgroupManager;
pub use usage::Usage;
