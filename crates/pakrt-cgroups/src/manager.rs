//! Version-dispatching facade, grounded on `libcgroups::common::create_cgroup_manager`
//! picking between its `v1::manager::Manager` and `v2::manager::Manager`.

use std::path::PathBuf;

use pakrt_common::platform::CgroupVersion;

use crate::error::{CgroupError, Result};
use crate::usage::Usage;
#[cfg(feature = "v1")]
use crate::v1::V1Driver;
#[cfg(feature = "v2")]
use crate::v2::V2Driver;

enum Inner {
    #[cfg(feature = "v1")]
    V1(V1Driver),
    #[cfg(feature = "v2")]
    V2(V2Driver),
}

/// The single entry point `pakrt-container` talks to; hides which cgroup version is
/// actually mounted.
pub struct CgroupManager {
    inner: Inner,
}

impl CgroupManager {
    pub fn detect(root: impl Into<PathBuf>, version: CgroupVersion) -> Result<Self> {
        let root = root.into();
        let inner = match version {
            #[cfg(feature = "v1")]
            CgroupVersion::V1 => Inner::V1(V1Driver::new(root)),
            #[cfg(not(feature = "v1"))]
            CgroupVersion::V1 => return Err(CgroupError::VersionUnknown),
            #[cfg(feature = "v2")]
            CgroupVersion::V2 => Inner::V2(V2Driver::new(root)),
            #[cfg(not(feature = "v2"))]
            CgroupVersion::V2 => return Err(CgroupError::VersionUnknown),
            CgroupVersion::Unknown => return Err(CgroupError::VersionUnknown),
        };
        Ok(Self { inner })
    }

    pub fn create(&self, name: &str, memory_mb: i64, cpu_percent: i64) -> Result<()> {
        match &self.inner {
            #[cfg(feature = "v1")]
            Inner::V1(d) => d.create(name, memory_mb, cpu_percent),
            #[cfg(feature = "v2")]
            Inner::V2(d) => d.create(name, memory_mb, cpu_percent),
        }
    }

    pub fn attach(&self, name: &str, pid: i32) -> Result<()> {
        match &self.inner {
            #[cfg(feature = "v1")]
            Inner::V1(d) => d.attach(name, pid),
            #[cfg(feature = "v2")]
            Inner::V2(d) => d.attach(name, pid),
        }
    }

    pub fn destroy(&self, name: &str) -> Result<()> {
        match &self.inner {
            #[cfg(feature = "v1")]
            Inner::V1(d) => d.destroy(name),
            #[cfg(feature = "v2")]
            Inner::V2(d) => d.destroy(name),
        }
    }

    pub fn usage(&self, name: &str, memory_mb_limit: i64) -> Usage {
        match &self.inner {
            #[cfg(feature = "v1")]
            Inner::V1(d) => d.usage(name, memory_mb_limit),
            #[cfg(feature = "v2")]
            Inner::V2(d) => d.usage(name, memory_mb_limit),
        }
    }

    pub fn dirs(&self, name: &str) -> Vec<PathBuf> {
        match &self.inner {
            #[cfg(feature = "v1")]
            Inner::V1(d) => d.dirs(name),
            #[cfg(feature = "v2")]
            Inner::V2(d) => d.dirs(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_version_is_rejected() {
        let err = CgroupManager::detect("/sys/fs/cgroup", CgroupVersion::Unknown).unwrap_err();
        assert!(matches!(err, CgroupError::VersionUnknown));
    }
}
