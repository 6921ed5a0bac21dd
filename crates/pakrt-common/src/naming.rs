//! Pure name-derivation functions shared by the network driver, the cgroup driver, and
//! the orchestrator. Every resource name a container owns — its cgroup directories, its
//! netns, its veth pair, its rootfs path — is a pure function of the container name, per
//! the data model's injectivity invariant (P5).
//!
//! Grounded on the naming helpers in the `vm0` network-pool file (`make_ns_name`,
//! `generate_veth_ip_pair`): small, separately testable pure functions kept apart from
//! the subprocess plumbing that acts on the names they produce.

/// Six hex characters derived from an FNV-1a hash of the container name, used to keep
/// veth interface names within the kernel's 15-byte `IFNAMSIZ` limit.
pub fn name_hash6(name: &str) -> String {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for byte in name.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{:06x}", hash & 0xffffff)
}

/// Host-side veth interface name: `veth-h<hash6>`, always 12 bytes.
pub fn veth_host_name(name: &str) -> String {
    format!("veth-h{}", name_hash6(name))
}

/// Container-side veth interface name: `veth-c<hash6>`, always 12 bytes.
pub fn veth_peer_name(name: &str) -> String {
    format!("veth-c{}", name_hash6(name))
}

/// Network namespace name: `container-<name>`.
pub fn netns_name(name: &str) -> String {
    format!("container-{name}")
}

/// cgroup v2 unified group name (relative to the cgroup root): `container-<name>`.
pub fn cgroup_v2_name(name: &str) -> String {
    format!("container-{name}")
}

/// cgroup v1 per-controller group name (relative to `<root>/<controller>/`):
/// `container-<name>`.
pub fn cgroup_v1_name(name: &str) -> String {
    format!("container-{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn veth_names_fit_ifnamsiz() {
        for name in ["a", "rumah-a", &"x".repeat(50)] {
            assert!(veth_host_name(name).len() <= 15);
            assert!(veth_peer_name(name).len() <= 15);
        }
    }

    #[test]
    fn host_and_peer_share_the_hash_but_differ_in_prefix() {
        let name = "rumah-a";
        let host = veth_host_name(name);
        let peer = veth_peer_name(name);
        assert_eq!(&host[6..], &peer[6..]);
        assert_ne!(host, peer);
    }

    #[test]
    fn distinct_names_usually_hash_distinctly() {
        let mut seen = HashSet::new();
        for i in 0..2000 {
            let name = format!("rumah-{i}");
            seen.insert(name_hash6(&name));
        }
        // FNV over a few thousand short strings shouldn't collide in practice; this
        // guards against an accidental constant-hash regression.
        assert!(seen.len() > 1900);
    }

    #[test]
    fn deterministic() {
        assert_eq!(name_hash6("rumah-a"), name_hash6("rumah-a"));
    }
}
