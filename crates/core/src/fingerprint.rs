//! Resolves the single runtime fingerprint of a job's execution directory.

use std::path::Path;

use crate::archive;
use crate::descriptor::RuntimeFingerprint;
use crate::error::CoreError;
use crate::extractor::{self, FingerprintExtractor};

/// Drives the archive walker and the extractor set over a job directory.
pub struct FingerprintResolver {
    extractors: Vec<Box<dyn FingerprintExtractor>>,
}

impl Default for FingerprintResolver {
    fn default() -> Self {
        Self::new(extractor::default_extractors())
    }
}

impl FingerprintResolver {
    /// Create a resolver with extractors in priority order.
    pub fn new(extractors: Vec<Box<dyn FingerprintExtractor>>) -> Self {
        Self { extractors }
    }

    /// Find the runtime fingerprint declared in `root`.
    ///
    /// Returns `Ok(None)` when no file yields a fingerprint. More than one
    /// fingerprint anywhere in the tree, identical or not, is a packaging
    /// defect and fails with [`CoreError::AmbiguousFingerprint`] as soon as
    /// the second one is seen; the rest of the tree is not walked.
    pub fn resolve(&self, root: &Path) -> Result<Option<RuntimeFingerprint>, CoreError> {
        let mut found: Vec<RuntimeFingerprint> = Vec::new();

        archive::traverse(root, |logical_path, stream| {
            if let Some(fingerprint) = extractor::dispatch(&self.extractors, logical_path, stream)? {
                tracing::info!(
                    path = logical_path,
                    digest = %fingerprint.digest,
                    runtime = %fingerprint,
                    "Detected runtime fingerprint",
                );
                found.push(fingerprint);
            }
            if found.len() > 1 {
                let paths: Vec<String> = found.iter().map(|fp| fp.source.clone()).collect();
                tracing::error!(
                    root = %root.display(),
                    paths = ?paths,
                    "Multiple runtime fingerprints found, aborting",
                );
                return Err(CoreError::AmbiguousFingerprint { paths });
            }
            Ok(())
        })?;

        Ok(found.pop())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
