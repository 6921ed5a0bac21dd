//! IP allocator (C4): assigns unique addresses out of 10.0.0.0/24, first usable
//! `10.0.0.2`, `10.0.0.1` reserved as the optional default gateway, `10.0.0.255` as the
//! broadcast address.
//!
//! Grounded on the `vm0` network-pool's pure `generate_veth_ip_pair`-style index
//! bookkeeping: the allocator itself is plain, dependency-free arithmetic over a
//! `HashMap`, kept apart from anything that touches the kernel.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use crate::error::{NetError, Result};

pub const SUBNET_OCTETS: (u8, u8, u8) = (10, 0, 0);
pub const FIRST_USABLE: u8 = 2;
pub const LAST_USABLE: u8 = 254;
pub const GATEWAY_OCTET: u8 = 1;

/// Holds the name → IP bindings for the subnet's host octet range `[2, 254]`.
#[derive(Debug, Default)]
pub struct IpAllocator {
    held: HashMap<String, u8>,
    taken: HashSet<u8>,
    cursor: u8,
}

impl IpAllocator {
    pub fn new() -> Self {
        Self {
            held: HashMap::new(),
            taken: HashSet::new(),
            cursor: FIRST_USABLE,
        }
    }

    /// Reconstructs an allocator from a previously persisted `name -> Ipv4Addr` map (used
    /// when the orchestrator rebuilds allocator state from on-disk container metadata at
    /// process start).
    pub fn from_bindings(bindings: impl IntoIterator<Item = (String, Ipv4Addr)>) -> Self {
        let mut allocator = Self::new();
        for (name, ip) in bindings {
            if let Some(octet) = host_octet(ip) {
                allocator.held.insert(name, octet);
                allocator.taken.insert(octet);
            }
        }
        allocator
    }

    /// Returns the address already held by `name`, or allocates and returns the next free
    /// one, wrapping around the range once to reclaim holes left by `release`.
    pub fn allocate(&mut self, name: &str) -> Result<Ipv4Addr> {
        if let Some(&octet) = self.held.get(name) {
            return Ok(make_ip(octet));
        }

        let span = (LAST_USABLE - FIRST_USABLE + 1) as u16;
        for step in 0..span {
            let octet = FIRST_USABLE + (((self.cursor - FIRST_USABLE) as u16 + step) % span) as u8;
            if !self.taken.contains(&octet) {
                self.taken.insert(octet);
                self.held.insert(name.to_string(), octet);
                self.cursor = octet.checked_add(1).unwrap_or(LAST_USABLE + 1);
                if self.cursor > LAST_USABLE {
                    self.cursor = FIRST_USABLE;
                }
                return Ok(make_ip(octet));
            }
        }

        Err(NetError::SubnetExhausted {
            name: name.to_string(),
        })
    }

    /// Removes `name`'s binding, freeing its address for reuse.
    pub fn release(&mut self, name: &str) -> Option<Ipv4Addr> {
        let octet = self.held.remove(name)?;
        self.taken.remove(&octet);
        Some(make_ip(octet))
    }

    pub fn get(&self, name: &str) -> Option<Ipv4Addr> {
        self.held.get(name).copied().map(make_ip)
    }

    pub fn is_held(&self, ip: Ipv4Addr) -> bool {
        host_octet(ip).is_some_and(|o| self.taken.contains(&o))
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Every container name currently holding an address, used by the orphan sweep to
    /// find bindings whose container directory no longer exists.
    pub fn held_names(&self) -> Vec<String> {
        self.held.keys().cloned().collect()
    }
}

fn make_ip(octet: u8) -> Ipv4Addr {
    Ipv4Addr::new(SUBNET_OCTETS.0, SUBNET_OCTETS.1, SUBNET_OCTETS.2, octet)
}

fn host_octet(ip: Ipv4Addr) -> Option<u8> {
    let octets = ip.octets();
    if (octets[0], octets[1], octets[2]) == SUBNET_OCTETS
        && (FIRST_USABLE..=LAST_USABLE).contains(&octets[3])
    {
        Some(octets[3])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_allocation_is_10_0_0_2() {
        let mut allocator = IpAllocator::new();
        assert_eq!(
            allocator.allocate("rumah-a").unwrap(),
            Ipv4Addr::new(10, 0, 0, 2)
        );
    }

    #[test]
    fn second_allocation_is_10_0_0_3() {
        let mut allocator = IpAllocator::new();
        allocator.allocate("rumah-a").unwrap();
        assert_eq!(
            allocator.allocate("rumah-b").unwrap(),
            Ipv4Addr::new(10, 0, 0, 3)
        );
    }

    #[test]
    fn allocate_is_idempotent_per_name() {
        let mut allocator = IpAllocator::new();
        let first = allocator.allocate("rumah-a").unwrap();
        let second = allocator.allocate("rumah-a").unwrap();
        assert_eq!(first, second);
        assert_eq!(allocator.len(), 1);
    }

    #[test]
    fn release_then_reallocate_reuses_the_hole() {
        let mut allocator = IpAllocator::new();
        let ip = allocator.allocate("rumah-a").unwrap();
        allocator.release("rumah-a");
        assert!(allocator.get("rumah-a").is_none());

        // fill the rest of the subnet; the released hole must be handed out again once
        // the cursor wraps.
        let mut last = None;
        for i in 0..253 {
            last = Some(allocator.allocate(&format!("filler-{i}")).unwrap());
        }
        assert!(last.is_some());
        assert!(allocator.is_held(ip));
    }

    #[test]
    fn exhausts_after_253_allocations() {
        let mut allocator = IpAllocator::new();
        for i in 0..253 {
            allocator
                .allocate(&format!("c{i}"))
                .unwrap_or_else(|e| panic!("allocation {i} should succeed: {e}"));
        }
        let err = allocator.allocate("one-too-many").unwrap_err();
        assert!(matches!(err, NetError::SubnetExhausted { .. }));
    }

    #[test]
    fn delete_then_create_same_name_is_accepted() {
        let mut allocator = IpAllocator::new();
        let first = allocator.allocate("rumah-a").unwrap();
        allocator.release("rumah-a");
        let second = allocator.allocate("rumah-a").unwrap();
        assert_eq!(first, second);
    }

    quickcheck::quickcheck! {
        fn prop_no_two_names_ever_share_an_ip(names: Vec<String>) -> bool {
            let mut allocator = IpAllocator::new();
            let mut seen = HashSet::new();
            for name in names.iter().take(200) {
                if name.is_empty() {
                    continue;
                }
                if let Ok(ip) = allocator.allocate(name) {
                    if !seen.insert(ip) {
                        // duplicate only acceptable if it's a repeat allocation for the
                        // same name.
                        if allocator.get(name) != Some(ip) {
                            return false;
                        }
                    }
                }
            }
            true
        }
    }
}
