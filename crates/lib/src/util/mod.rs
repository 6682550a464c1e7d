//! Shared utilities.
//!
//! Payload digests and test helpers.

pub mod hash;

#[cfg(test)]
pub mod testutil;
