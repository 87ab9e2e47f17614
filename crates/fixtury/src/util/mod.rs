//! Shared utilities.
//!
//! Checksums for tracked fixture files and lock helpers.

pub mod hash;
pub(crate) mod sync;
