//! Fatal error conditions of the matching engine.
//!
//! Soft misses (unknown descriptor id, missing bundle file, no match) are
//! not errors; they fall through to the next selection rule. Every variant
//! here aborts resolution for the job that hit it.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unreadable zip container {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Error getting descriptor from file {path}: {reason}")]
    MalformedDescriptor { path: PathBuf, reason: String },

    #[error("Malformed runtime lockfile {path}: {reason}")]
    MalformedFingerprint { path: String, reason: String },

    #[error("Multiple descriptors found for requested id [{id}]: {bundles:?}")]
    DuplicateDescriptor { id: String, bundles: Vec<String> },

    #[error("Multiple environment fingerprints detected: {paths:?}")]
    AmbiguousFingerprint { paths: Vec<String> },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    /// Wrap an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
