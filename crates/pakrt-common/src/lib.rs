//! Shared primitives for the pakrt container runtime: error kinds, input validation, the
//! platform probe, path containment, and the pure name-derivation functions every
//! resource path is built from.

pub mod error;
pub mod naming;
pub mod pathutil;
pub mod platform;
pub mod validate;

pub use error::{PakrtError, ValidationError};
