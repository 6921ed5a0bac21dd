//! Networking for pakrt containers: a private `10.0.0.0/24` subnet, one netns and veth
//! pair per container, and the `ip`-CLI driver that wires them together.

pub mod alloc;
pub mod driver;
pub mod error;

pub use alloc::IpAllocator;
pub use driver::{NetworkDescriptor, NetworkDriver};
pub use error::{NetError, Result};
