//! Runtime fingerprint extractors.
//!
//! An extractor recognizes a lockfile format by its logical path and parses
//! the stream into a [`RuntimeFingerprint`]. Recognition is name-based and
//! never reads from the stream. Once an extractor has been handed a stream
//! it owns the outcome for that file: the stream is not offered to any
//! other extractor afterwards, even if parsing declines.
//!
//! New environment types are added by appending to [`default_extractors`].

use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;

use crate::descriptor::RuntimeFingerprint;
use crate::error::CoreError;
use crate::hashing::HashingReader;

/// Runtime type tag produced by [`RenvExtractor`].
pub const R_RUNTIME: &str = "R";

/// File name of an renv lockfile.
pub const RENV_LOCKFILE: &str = "renv.lock";

/// Upper bound on lockfile size (16 MiB).
const MAX_LOCKFILE_BYTES: u64 = 16 * 1024 * 1024;

/// Recognizes and parses one lockfile format.
pub trait FingerprintExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this extractor handles `logical_path`. Must not do I/O.
    fn recognizes(&self, logical_path: &str) -> bool;

    /// Parse a stream already accepted by [`Self::recognizes`].
    ///
    /// `Ok(None)` declines; the stream may have been consumed regardless.
    fn extract(
        &self,
        logical_path: &str,
        stream: &mut dyn Read,
    ) -> Result<Option<RuntimeFingerprint>, CoreError>;
}

/// Extractors in priority order.
pub fn default_extractors() -> Vec<Box<dyn FingerprintExtractor>> {
    vec![Box::new(RenvExtractor)]
}

/// Offer a stream to the first extractor that recognizes its path.
///
/// At most one extractor reads the stream, so at most one fingerprint is
/// produced per file.
pub fn dispatch(
    extractors: &[Box<dyn FingerprintExtractor>],
    logical_path: &str,
    stream: &mut dyn Read,
) -> Result<Option<RuntimeFingerprint>, CoreError> {
    match extractors.iter().find(|e| e.recognizes(logical_path)) {
        Some(extractor) => {
            tracing::debug!(
                path = logical_path,
                extractor = extractor.name(),
                "Parsing runtime lockfile",
            );
            extractor.extract(logical_path, stream)
        }
        None => Ok(None),
    }
}

/// Last path component of a filesystem or nested logical path.
pub fn file_name(logical_path: &str) -> &str {
    logical_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(logical_path)
}

// ---------------------------------------------------------------------------
// renv
// ---------------------------------------------------------------------------

/// Extractor for R `renv.lock` files.
pub struct RenvExtractor;

#[derive(Debug, Deserialize)]
struct RenvLock {
    #[serde(rename = "R")]
    r: Option<RenvInterpreter>,
    #[serde(rename = "Packages", default)]
    packages: BTreeMap<String, RenvPackage>,
}

#[derive(Debug, Deserialize)]
struct RenvInterpreter {
    #[serde(rename = "Version")]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenvPackage {
    #[serde(rename = "Version")]
    version: String,
}

impl FingerprintExtractor for RenvExtractor {
    fn name(&self) -> &'static str {
        "renv"
    }

    fn recognizes(&self, logical_path: &str) -> bool {
        file_name(logical_path) == RENV_LOCKFILE
    }

    fn extract(
        &self,
        logical_path: &str,
        stream: &mut dyn Read,
    ) -> Result<Option<RuntimeFingerprint>, CoreError> {
        let mut bytes = Vec::new();
        let mut reader = HashingReader::new((&mut *stream).take(MAX_LOCKFILE_BYTES + 1));
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| CoreError::io(logical_path, e))?;
        if reader.consumed() > MAX_LOCKFILE_BYTES {
            return Err(CoreError::MalformedFingerprint {
                path: logical_path.to_string(),
                reason: format!("lockfile exceeds {MAX_LOCKFILE_BYTES} bytes"),
            });
        }

        let digest = reader.finish();
        let lock: RenvLock =
            serde_json::from_slice(&bytes).map_err(|e| CoreError::MalformedFingerprint {
                path: logical_path.to_string(),
                reason: e.to_string(),
            })?;

        if lock.r.is_none() && lock.packages.is_empty() {
            tracing::debug!(path = logical_path, "Lockfile declares no runtime, skipping");
            return Ok(None);
        }

        Ok(Some(RuntimeFingerprint {
            runtime_type: R_RUNTIME.to_string(),
            version: lock.r.and_then(|r| r.version),
            dependencies: lock
                .packages
                .into_iter()
                .map(|(name, package)| (name, package.version))
                .collect(),
            source: logical_path.to_string(),
            digest,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
