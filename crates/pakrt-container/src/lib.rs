//! Container lifecycle runtime: on-disk metadata, namespace declarations, rootfs
//! provisioning, process launch, cgroup/network orchestration, rollback-on-failure, and
//! the integrity/recovery engine, built on the `pakrt-net` and `pakrt-cgroups` resource
//! drivers.

pub mod config;
pub mod error;
pub mod integrity;
pub mod metadata;
pub mod namespaces;
pub mod orchestrator;
pub mod process;
pub mod report;
pub mod rollback;
pub mod rootfs;
pub mod syscall;

pub use config::Config;
pub use error::{ContainerError, Result};
pub use metadata::{Container, Paths, Status};
pub use orchestrator::Orchestrator;
