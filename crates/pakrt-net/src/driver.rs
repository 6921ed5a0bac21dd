//! Network driver (C8): netns + veth pair + address assignment + host routing, invoked
//! through the `ip` CLI exactly as the spec's "Required external tools" contract and the
//! other_examples `netns-testbench` orchestrator do, rather than raw netlink (see
//! DESIGN.md for the tradeoff).

use std::net::Ipv4Addr;
use std::process::{Command, Output};
use std::time::Duration;

use pakrt_common::naming::{netns_name, veth_host_name, veth_peer_name};

use crate::error::{NetError, Result};

/// Everything the orchestrator needs to persist about a container's network setup.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NetworkDescriptor {
    pub ip: Ipv4Addr,
    pub veth_host: String,
    pub veth_peer: String,
    pub netns: String,
}

impl NetworkDescriptor {
    pub fn for_container(name: &str, ip: Ipv4Addr) -> Self {
        Self {
            ip,
            veth_host: veth_host_name(name),
            veth_peer: veth_peer_name(name),
            netns: netns_name(name),
        }
    }
}

pub struct NetworkDriver;

impl Default for NetworkDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkDriver {
    pub fn new() -> Self {
        NetworkDriver
    }

    /// Creates the container's netns, veth pair, moves the peer in, assigns the address,
    /// and adds the host route. Performs the steps in the order the spec prescribes so a
    /// caller can push one rollback action per successful step.
    pub fn setup(&self, desc: &NetworkDescriptor) -> Result<()> {
        self.create_netns(&desc.netns)?;
        self.set_loopback_up(&desc.netns)?;
        self.create_veth_pair(&desc.veth_host, &desc.veth_peer)?;
        self.move_into_netns(&desc.veth_peer, &desc.netns)?;
        self.set_link_up(&desc.veth_host, None)?;
        self.set_link_up(&desc.veth_peer, Some(&desc.netns))?;
        self.assign_address(&desc.veth_peer, &desc.netns, desc.ip)?;
        self.add_host_route(desc.ip, &desc.veth_host)?;
        self.add_default_route_best_effort(&desc.netns);
        Ok(())
    }

    /// Reverses `setup`. Best-effort: every step is attempted and logged even if an
    /// earlier one failed, matching the orchestrator's "best-effort total cleanup"
    /// teardown policy.
    pub fn teardown(&self, desc: &NetworkDescriptor) -> usize {
        let mut failures = 0;

        if let Err(err) = self.delete_host_route(desc.ip, &desc.veth_host) {
            tracing::warn!(?err, ip = %desc.ip, "failed to delete host route");
            failures += 1;
        }
        // the peer end is auto-removed by the kernel once the host end is deleted.
        if let Err(err) = self.delete_link(&desc.veth_host) {
            tracing::warn!(?err, veth = %desc.veth_host, "failed to delete host veth");
            failures += 1;
        }
        if let Err(err) = self.delete_netns(&desc.netns) {
            tracing::warn!(?err, netns = %desc.netns, "failed to delete netns");
            failures += 1;
        }

        failures
    }

    /// `ping -c 3 -W 2 <target>` executed inside `ns_a`, used to assert two containers
    /// are linked over the subnet.
    pub fn connectivity_test(&self, ns_a: &str, target: Ipv4Addr) -> bool {
        self.run_ignoring_status(&[
            "netns",
            "exec",
            ns_a,
            "ping",
            "-c",
            "3",
            "-W",
            "2",
            &target.to_string(),
        ])
        .map(|out| out.status.success())
        .unwrap_or(false)
    }

    fn create_netns(&self, netns: &str) -> Result<()> {
        self.run(&["netns", "add", netns])
    }

    fn delete_netns(&self, netns: &str) -> Result<()> {
        self.run(&["netns", "delete", netns])
    }

    fn set_loopback_up(&self, netns: &str) -> Result<()> {
        self.run(&["netns", "exec", netns, "ip", "link", "set", "lo", "up"])
    }

    fn create_veth_pair(&self, host: &str, peer: &str) -> Result<()> {
        self.run(&[
            "link", "add", host, "type", "veth", "peer", "name", peer,
        ])
    }

    fn move_into_netns(&self, iface: &str, netns: &str) -> Result<()> {
        self.run(&["link", "set", iface, "netns", netns])
    }

    fn set_link_up(&self, iface: &str, netns: Option<&str>) -> Result<()> {
        match netns {
            Some(ns) => self.run(&["netns", "exec", ns, "ip", "link", "set", iface, "up"]),
            None => self.run(&["link", "set", iface, "up"]),
        }
    }

    fn assign_address(&self, iface: &str, netns: &str, ip: Ipv4Addr) -> Result<()> {
        let cidr = format!("{ip}/24");
        self.run(&[
            "netns", "exec", netns, "ip", "addr", "add", &cidr, "dev", iface,
        ])
    }

    fn add_host_route(&self, ip: Ipv4Addr, host_iface: &str) -> Result<()> {
        let dst = format!("{ip}/32");
        self.run(&["route", "add", &dst, "dev", host_iface])
    }

    fn delete_host_route(&self, ip: Ipv4Addr, host_iface: &str) -> Result<()> {
        let dst = format!("{ip}/32");
        self.run(&["route", "del", &dst, "dev", host_iface])
    }

    fn delete_link(&self, iface: &str) -> Result<()> {
        self.run(&["link", "delete", iface])
    }

    /// Adding a default route inside the netns is optional per the spec; a missing
    /// gateway must not fail container setup.
    fn add_default_route_best_effort(&self, netns: &str) {
        let _ = self.run(&[
            "netns", "exec", netns, "ip", "route", "add", "default", "via", "10.0.0.1",
        ]);
    }

    fn run(&self, args: &[&str]) -> Result<()> {
        let output = self.run_ignoring_status(args)?;
        if !output.status.success() {
            return Err(NetError::CommandRejected {
                command: format!("ip {}", args.join(" ")),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn run_ignoring_status(&self, args: &[&str]) -> Result<Output> {
        tracing::debug!(?args, "ip");
        Command::new("ip")
            .args(args)
            .output()
            .map_err(|source| NetError::CommandFailed {
                command: format!("ip {}", args.join(" ")),
                source,
            })
    }
}

/// Grace period between "last attempt" polls when a teardown step depends on a process
/// exiting first (matches the cgroup driver's SIGTERM/SIGKILL grace window).
pub const TEARDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_derives_deterministic_names() {
        let a = NetworkDescriptor::for_container("rumah-a", Ipv4Addr::new(10, 0, 0, 2));
        let b = NetworkDescriptor::for_container("rumah-a", Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(a, b);
        assert_eq!(a.netns, "container-rumah-a");
        assert!(a.veth_host.len() <= 15);
        assert!(a.veth_peer.len() <= 15);
    }

    #[test]
    fn descriptor_round_trips_through_json() {
        let desc = NetworkDescriptor::for_container("rumah-b", Ipv4Addr::new(10, 0, 0, 3));
        let json = serde_json::to_string(&desc).unwrap();
        let back: NetworkDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(desc, back);
    }
}
