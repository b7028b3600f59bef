//! Output storage.
//!
//! Persists certificates and private keys in a fixed per-label directory layout.

pub mod artifact;
pub mod writer;
