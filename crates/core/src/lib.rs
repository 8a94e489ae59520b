//! `xengine-core` -- descriptor/runtime matching engine.
//!
//! Decides which runtime bundle (an archived interpreter plus package set)
//! should run an analysis job. The engine fingerprints the environment
//! declared inside the job's execution directory, including lockfiles
//! nested inside zip containers, and matches that fingerprint against a
//! catalog of descriptor files. Everything here is synchronous and free of
//! shared mutable state; the hosting process decides where it runs.

pub mod archive;
pub mod bundle;
pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod extractor;
pub mod fingerprint;
pub mod hashing;
pub mod matcher;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;
