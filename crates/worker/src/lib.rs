//! `xengine-worker` library crate.
//!
//! Hosts the matching engine: routes incoming analyses by executable type,
//! selects a runtime bundle for script analyses, and bounds how many jobs
//! resolve at once. The binary entrypoint lives in `main.rs`.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod pool;
