//! Container lifecycle orchestrator (C10): the create → run → delete state machine,
//! ordered multi-subsystem setup with rollback, and best-effort teardown.
//!
//! Grounded on `libcontainer::container::{container_delete, container_start,
//! builder_impl}` for the status-gated transition style (`match self.status() { ... }`),
//! generalized from a single-phase OCI delete to pakrt's ordered rollback/teardown across
//! rootfs, namespaces, network, and cgroups.

use std::fs;
use std::time::{Duration, Instant};

use chrono::Utc;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use pakrt_cgroups::CgroupManager;
use pakrt_common::naming::{cgroup_v1_name, cgroup_v2_name, netns_name, veth_host_name, veth_peer_name};
use pakrt_common::platform::{self, CgroupVersion, Platform};
use pakrt_common::validate;
use pakrt_net::{IpAllocator, NetworkDescriptor, NetworkDriver};

use crate::config::Config;
use crate::error::{ContainerError, Result};
use crate::metadata::{self, Cgroups, Container, Namespaces, Network, Paths, Resources, Status};
use crate::namespaces::NamespaceConfig;
use crate::process::{self, LaunchMode, Launcher};
use crate::rollback::{Action, RollbackStack};
use crate::rootfs::RootfsProvisioner;

const SIGTERM_GRACE: Duration = Duration::from_secs(10);

pub struct Orchestrator {
    pub config: Config,
    pub platform: Platform,
    allocator: IpAllocator,
}

impl Orchestrator {
    /// Runs the platform probe and rebuilds the IP allocator from whatever container
    /// metadata already exists under `config.base_dir`.
    pub fn new(config: Config) -> Result<Self> {
        let platform = platform::detect(config.rootless);
        let mut orchestrator = Self {
            config,
            platform,
            allocator: IpAllocator::new(),
        };
        orchestrator.rebuild_allocator()?;
        Ok(orchestrator)
    }

    fn rebuild_allocator(&mut self) -> Result<()> {
        let bindings = self
            .list_containers()?
            .into_iter()
            .filter_map(|c| c.network.ip_address.parse().ok().map(|ip| (c.name, ip)));
        self.allocator = IpAllocator::from_bindings(bindings);
        Ok(())
    }

    pub fn paths(&self, name: &str) -> Paths {
        Paths::new(&self.config.base_dir, name)
    }

    pub fn list_containers(&self) -> Result<Vec<Container>> {
        if !self.config.base_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut containers = Vec::new();
        for entry in fs::read_dir(&self.config.base_dir).map_err(|source| ContainerError::Io {
            path: self.config.base_dir.clone(),
            source,
        })? {
            let entry = entry.map_err(|source| ContainerError::Io {
                path: self.config.base_dir.clone(),
                source,
            })?;
            let config_path = entry.path().join("config.json");
            if config_path.is_file() {
                if let Ok(container) = metadata::read(&config_path) {
                    containers.push(container);
                }
            }
        }
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(containers)
    }

    pub fn load(&self, name: &str) -> Result<Container> {
        let paths = self.paths(name);
        if !paths.config().is_file() {
            return Err(ContainerError::NotFound {
                name: name.to_string(),
            });
        }
        metadata::read(&paths.config())
    }

    fn cgroup_manager(&self) -> Result<CgroupManager> {
        Ok(CgroupManager::detect(
            platform::DEFAULT_CGROUP_ROOT,
            self.platform.cgroup_version,
        )?)
    }

    /// Exposed for the integrity engine, which needs to inspect cgroup state outside the
    /// create/run/delete state machine.
    pub fn cgroup_manager_for_integrity(&self) -> Result<CgroupManager> {
        self.cgroup_manager()
    }

    pub fn allocator_snapshot(&self, name: &str) -> Option<std::net::Ipv4Addr> {
        self.allocator.get(name)
    }

    pub fn allocator_mut(&mut self) -> &mut IpAllocator {
        &mut self.allocator
    }

    /// `create(name, mem, cpu, hostname)`: directories → metadata stub → rootfs →
    /// namespaces → network → cgroups → `status = created`. Any failure unwinds every
    /// already-committed step before returning the triggering error.
    pub fn create(
        &mut self,
        name: &str,
        memory_mb: i64,
        cpu_percent: i64,
        hostname: Option<&str>,
    ) -> Result<Container> {
        validate::container_name(name)?;
        validate::memory_mb(memory_mb)?;
        validate::cpu_percent(cpu_percent)?;

        let paths = self.paths(name);
        if paths.exists() {
            return Err(ContainerError::AlreadyExists {
                name: name.to_string(),
            });
        }

        let resolved_hostname = hostname
            .and_then(|h| validate::hostname(h).ok())
            .map(|h| h.to_string())
            .unwrap_or_else(|| name.to_string());

        let mut stack = RollbackStack::new();
        let net_driver = NetworkDriver::new();

        let result = self.create_inner(
            name,
            memory_mb,
            cpu_percent,
            &resolved_hostname,
            &paths,
            &mut stack,
            &net_driver,
        );

        match result {
            Ok(container) => {
                stack.clear();
                Ok(container)
            }
            Err(err) => {
                let cgroups = self.cgroup_manager().ok();
                let failures = stack.unwind(&mut self.allocator, &net_driver, cgroups.as_ref());
                if failures > 0 {
                    tracing::warn!(failures, name, "rollback completed with errors");
                }
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn create_inner(
        &mut self,
        name: &str,
        memory_mb: i64,
        cpu_percent: i64,
        hostname: &str,
        paths: &Paths,
        stack: &mut RollbackStack,
        net_driver: &NetworkDriver,
    ) -> Result<Container> {
        // 2. container directory tree
        fs::create_dir_all(&paths.root).map_err(|source| ContainerError::Io {
            path: paths.root.clone(),
            source,
        })?;
        stack.push(Action::RemoveDir(paths.root.clone()));
        check_interrupt(stack, &mut self.allocator, net_driver, None)?;

        // 3. IP allocation
        let ip = self.allocator.allocate(name)?;
        stack.push(Action::ReleaseIp(name.to_string()));

        let netns = netns_name(name);
        let veth_host = veth_host_name(name);
        let veth_peer = veth_peer_name(name);
        let network = NetworkDescriptor {
            ip,
            veth_host: veth_host.clone(),
            veth_peer: veth_peer.clone(),
            netns: netns.clone(),
        };

        let cgroup_paths = match self.platform.cgroup_version {
            CgroupVersion::V1 => Cgroups {
                memory: std::path::Path::new(platform::DEFAULT_CGROUP_ROOT)
                    .join("memory")
                    .join(cgroup_v1_name(name)),
                cpu: std::path::Path::new(platform::DEFAULT_CGROUP_ROOT)
                    .join("cpu")
                    .join(cgroup_v1_name(name)),
            },
            _ => {
                let dir = std::path::Path::new(platform::DEFAULT_CGROUP_ROOT)
                    .join(cgroup_v2_name(name));
                Cgroups {
                    memory: dir.clone(),
                    cpu: dir,
                }
            }
        };

        // 4. initial metadata, status = creating
        let mut container = Container {
            name: name.to_string(),
            created: Utc::now(),
            status: Status::Creating,
            resources: Resources {
                memory_mb,
                cpu_percentage: cpu_percent,
            },
            network: Network {
                ip_address: ip.to_string(),
                veth_host: veth_host.clone(),
                veth_container: veth_peer.clone(),
            },
            namespaces: Namespaces {
                pid: "pid".to_string(),
                net: netns.clone(),
                mnt: "mnt".to_string(),
                uts: "uts".to_string(),
                ipc: "ipc".to_string(),
                user: "user".to_string(),
            },
            cgroups: cgroup_paths,
            pid: 0,
            rootfs: paths.rootfs(),
            logs: paths.logs_dir(),
            recovered: None,
            recovery_timestamp: None,
        };
        metadata::write_atomic(&paths.config(), &container)?;
        stack.push(Action::RemoveFile(paths.config()));
        check_interrupt(stack, &mut self.allocator, net_driver, None)?;

        // 5. rootfs
        fs::create_dir_all(paths.logs_dir()).map_err(|source| ContainerError::Io {
            path: paths.logs_dir(),
            source,
        })?;
        let provisioner = RootfsProvisioner::new();
        provisioner.provision(&paths.rootfs(), hostname)?;
        stack.push(Action::RemoveDir(paths.rootfs()));
        check_interrupt(stack, &mut self.allocator, net_driver, None)?;

        // 6. namespace declarations
        let ns_config = NamespaceConfig::build(
            name,
            hostname,
            &paths.rootfs(),
            "/bin/sh",
            &[],
            nix::unistd::getuid().as_raw(),
            nix::unistd::getgid().as_raw(),
            &netns,
        );
        ns_config.persist(paths)?;
        stack.push(Action::RemoveDir(paths.namespaces_dir()));
        check_interrupt(stack, &mut self.allocator, net_driver, None)?;

        // 7. network
        net_driver.setup(&network)?;
        stack.push(Action::TeardownNetwork(network.clone()));
        check_interrupt(stack, &mut self.allocator, net_driver, None)?;

        // 8. cgroups
        let cgroups = self.cgroup_manager()?;
        cgroups.create(name, memory_mb, cpu_percent)?;
        stack.push(Action::TeardownCgroup(name.to_string()));
        write_cgroup_paths_conf(paths, &container.cgroups)?;

        // 9. commit
        container.status = Status::Created;
        metadata::write_atomic(&paths.config(), &container)?;

        Ok(container)
    }

    /// `run(name, cmd)`: requires `status = created`, launches the init process, attaches
    /// it to the container's cgroups, and persists the PID. Launcher failure marks the
    /// container `failed` without destructive rollback.
    pub fn run(
        &mut self,
        name: &str,
        command: Option<&str>,
        args: &[String],
        mode: LaunchMode,
    ) -> Result<i32> {
        let paths = self.paths(name);
        let mut container = self.load(name)?;
        if container.status != Status::Created {
            return Err(ContainerError::WrongStatus {
                name: name.to_string(),
                status: container.status.to_string(),
                expected: Status::Created.to_string(),
            });
        }

        let ns_config = NamespaceConfig::load(&paths)?;
        let command = command.unwrap_or("/bin/sh");
        let log_file = paths.log_file();

        let launcher = Launcher::new();
        let launch_result = launcher.launch(
            &ns_config,
            &paths.rootfs(),
            command,
            args,
            (mode == LaunchMode::Detached).then_some(log_file.as_path()),
        );

        let pid = match launch_result {
            Ok(pid) => pid,
            Err(err) => {
                container.status = Status::Failed;
                let _ = metadata::write_atomic(&paths.config(), &container);
                return Err(err);
            }
        };

        let cgroups = self.cgroup_manager()?;
        if let Err(err) = cgroups.attach(name, pid.as_raw()) {
            tracing::warn!(?err, name, "failed to attach init pid to cgroups");
        }

        fs::write(paths.pid_file(), pid.as_raw().to_string()).map_err(|source| {
            ContainerError::Io {
                path: paths.pid_file(),
                source,
            }
        })?;

        container.status = Status::Running;
        container.pid = pid.as_raw();
        metadata::write_atomic(&paths.config(), &container)?;

        match mode {
            LaunchMode::Interactive => {
                let code = process::wait(pid)?;
                container.status = Status::Stopped;
                container.pid = 0;
                let _ = fs::remove_file(paths.pid_file());
                metadata::write_atomic(&paths.config(), &container)?;
                Ok(code)
            }
            LaunchMode::Detached => Ok(0),
        }
    }

    /// `delete(name, force)`: refuses a running container unless `force`; otherwise stops
    /// the init process (SIGTERM, 10s grace, SIGKILL), tears down network then cgroups
    /// then namespace state, and removes the directory. Every sub-step is independent;
    /// failures are counted, not fatal.
    pub fn delete(&mut self, name: &str, force: bool) -> Result<usize> {
        let paths = self.paths(name);
        let container = self.load(name)?;

        if container.is_running() && !force {
            return Err(ContainerError::RunningRefusesDelete {
                name: name.to_string(),
            });
        }

        let mut failures = 0;

        if container.is_running() {
            if let Err(err) = stop_process(container.pid) {
                tracing::warn!(?err, name, "failed to stop init process");
                failures += 1;
            }
        }

        let net_driver = NetworkDriver::new();
        let network = NetworkDescriptor {
            ip: container
                .network
                .ip_address
                .parse()
                .unwrap_or(std::net::Ipv4Addr::new(10, 0, 0, 2)),
            veth_host: container.network.veth_host.clone(),
            veth_peer: container.network.veth_container.clone(),
            netns: container.namespaces.net.clone(),
        };
        failures += net_driver.teardown(&network);
        self.allocator.release(name);

        match self.cgroup_manager() {
            Ok(cgroups) => {
                if let Err(err) = cgroups.destroy(name) {
                    tracing::warn!(?err, name, "failed to tear down cgroups");
                    failures += 1;
                }
            }
            Err(err) => {
                tracing::warn!(?err, name, "could not determine cgroup manager for teardown");
                failures += 1;
            }
        }

        if let Err(source) = fs::remove_dir_all(&paths.root) {
            tracing::warn!(?source, name, "failed to remove container directory");
            failures += 1;
        }

        Ok(failures)
    }
}

/// SIGTERM the init process, wait up to [`SIGTERM_GRACE`], then SIGKILL if it's still
/// alive.
fn stop_process(pid_raw: i32) -> Result<()> {
    if pid_raw <= 0 {
        return Ok(());
    }
    let pid = Pid::from_raw(pid_raw);
    let _ = signal::kill(pid, Signal::SIGTERM);

    let deadline = Instant::now() + SIGTERM_GRACE;
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => {
                if Instant::now() >= deadline {
                    let _ = signal::kill(pid, Signal::SIGKILL);
                    let _ = waitpid(pid, None);
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            _ => return Ok(()),
        }
    }
}

fn write_cgroup_paths_conf(paths: &Paths, cgroups: &Cgroups) -> Result<()> {
    let dir = paths.cgroups_dir();
    fs::create_dir_all(&dir).map_err(|source| ContainerError::Io {
        path: dir.clone(),
        source,
    })?;
    let contents = format!(
        "memory={}\ncpu={}\n",
        cgroups.memory.display(),
        cgroups.cpu.display()
    );
    fs::write(paths.cgroups_paths_conf(), contents).map_err(|source| ContainerError::Io {
        path: paths.cgroups_paths_conf(),
        source,
    })
}

/// Polled after every setup sub-step; if SIGINT or SIGTERM arrived, unwinds immediately
/// and reports the interruption as the triggering error.
fn check_interrupt(
    stack: &mut RollbackStack,
    allocator: &mut IpAllocator,
    net_driver: &NetworkDriver,
    cgroups: Option<&CgroupManager>,
) -> Result<()> {
    if crate::rollback::interrupted() {
        stack.unwind(allocator, net_driver, cgroups);
        return Err(ContainerError::Interrupted);
    }
    if crate::rollback::term_requested() {
        stack.unwind(allocator, net_driver, cgroups);
        return Err(ContainerError::Terminated);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn test_config(base: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.base_dir = base.to_path_buf();
        config
    }

    #[test]
    #[serial]
    fn create_rejects_invalid_names_before_any_side_effect() {
        let tmp = tempfile::tempdir().unwrap();
        let mut orchestrator = Orchestrator::new(test_config(tmp.path())).unwrap();
        let err = orchestrator.create("root", 128, 50, None).unwrap_err();
        assert!(matches!(err, ContainerError::Validation(_)));
        assert!(fs::read_dir(tmp.path()).unwrap().next().is_none());
    }

    #[test]
    #[serial]
    fn create_rejects_duplicate_name() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::new(tmp.path(), "rumah-a");
        fs::create_dir_all(&paths.root).unwrap();

        let mut orchestrator = Orchestrator::new(test_config(tmp.path())).unwrap();
        let err = orchestrator.create("rumah-a", 128, 50, None).unwrap_err();
        assert!(matches!(err, ContainerError::AlreadyExists { .. }));
    }

    #[test]
    #[serial]
    fn list_containers_is_empty_for_a_fresh_base_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(test_config(tmp.path())).unwrap();
        assert!(orchestrator.list_containers().unwrap().is_empty());
    }
}
