//! Bundle selection for a single job.
//!
//! Precedence, first usable bundle wins:
//!
//! 1. An explicitly requested descriptor id.
//! 2. Dependency matching of the job's runtime fingerprint against the
//!    catalog, when enabled.
//! 3. The default bundle.
//!
//! Soft misses (unknown id, missing bundle file, no fingerprint, no match)
//! fall through to the next rule. Fatal conditions ([`CoreError`]) are
//! propagated untouched and never replaced by the default.
//!
//! Without a descriptor directory there is nothing to choose from: every job
//! gets the default bundle and the execution directory is never walked.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bundle;
use crate::catalog::DescriptorCatalog;
use crate::config::EngineConfig;
use crate::descriptor::{Descriptor, DescriptorBundle, DescriptorMismatch, RuntimeFingerprint};
use crate::error::CoreError;
use crate::fingerprint::FingerprintResolver;

/// Descriptors partitioned by whether they accept a fingerprint.
#[derive(Debug)]
pub struct MatchOutcome<'a> {
    /// Accepting descriptors in catalog order.
    pub matched: Vec<&'a Descriptor>,
    /// Why each remaining descriptor was rejected, in catalog order.
    pub unmatched: Vec<DescriptorMismatch>,
}

/// Partition the catalog against `fingerprint`.
pub fn match_descriptors<'a>(
    catalog: &'a DescriptorCatalog,
    fingerprint: &RuntimeFingerprint,
) -> MatchOutcome<'a> {
    let mut outcome = MatchOutcome {
        matched: Vec::new(),
        unmatched: Vec::new(),
    };
    for descriptor in catalog.iter() {
        match descriptor.check(fingerprint) {
            Ok(()) => outcome.matched.push(descriptor),
            Err(mismatch) => outcome.unmatched.push(mismatch),
        }
    }
    outcome
}

/// Selects the runtime bundle for incoming jobs.
///
/// Holds only immutable configuration; the catalog is reloaded on every
/// [`Self::select_bundle`] call, so one matcher can serve concurrent jobs.
pub struct DescriptorMatcher {
    default_bundle: Arc<DescriptorBundle>,
    archive_folder: Option<PathBuf>,
    dependency_matching: bool,
    resolver: FingerprintResolver,
}

impl DescriptorMatcher {
    pub fn new(
        default_bundle: Arc<DescriptorBundle>,
        archive_folder: Option<PathBuf>,
        dependency_matching: bool,
    ) -> Self {
        Self {
            default_bundle,
            archive_folder,
            dependency_matching,
            resolver: FingerprintResolver::default(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Arc::new(DescriptorBundle::default_bundle(&config.default_archive)),
            config.archive_folder.clone(),
            config.dependency_matching,
        )
    }

    /// Replace the fingerprint resolver (custom extractor set).
    pub fn with_resolver(mut self, resolver: FingerprintResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn default_bundle(&self) -> &DescriptorBundle {
        &self.default_bundle
    }

    /// Load the configured catalog and select a bundle for one job.
    ///
    /// `analysis_id` is only used to correlate log records.
    pub fn select_bundle(
        &self,
        execution_dir: &Path,
        analysis_id: i64,
        requested_id: Option<&str>,
    ) -> Result<DescriptorBundle, CoreError> {
        let catalog = DescriptorCatalog::load(self.archive_folder.as_deref()).inspect_err(|e| {
            tracing::error!(analysis_id, error = %e, "Descriptor catalog failed to load");
        })?;
        self.select(execution_dir, analysis_id, requested_id, &catalog)
    }

    /// Select a bundle for one job against an already loaded catalog.
    pub fn select(
        &self,
        execution_dir: &Path,
        analysis_id: i64,
        requested_id: Option<&str>,
        catalog: &DescriptorCatalog,
    ) -> Result<DescriptorBundle, CoreError> {
        let requested_id = requested_id.filter(|id| !id.is_empty());

        if !catalog.is_available() {
            tracing::info!(
                analysis_id,
                requested = requested_id.unwrap_or(""),
                "No descriptor directory available, using default",
            );
            return Ok(self.fallback());
        }

        if let Some(id) = requested_id {
            if let Some(bundle) = self.find_requested(analysis_id, id, catalog)? {
                return Ok(bundle);
            }
        }

        if !self.dependency_matching {
            tracing::info!(analysis_id, "Dependency matching is disabled, using default");
            return Ok(self.fallback());
        }

        tracing::info!(
            analysis_id,
            descriptors = catalog.len(),
            "Falling back to dependency matching",
        );
        if let Some(bundle) = self.find_matching(execution_dir, analysis_id, catalog)? {
            return Ok(bundle);
        }

        tracing::info!(analysis_id, "No descriptor resolved, using default");
        Ok(self.fallback())
    }

    fn fallback(&self) -> DescriptorBundle {
        self.default_bundle.as_ref().clone()
    }

    /// Rule 1. Duplicate ids are fatal; an unknown id or missing bundle is a
    /// soft miss.
    fn find_requested(
        &self,
        analysis_id: i64,
        id: &str,
        catalog: &DescriptorCatalog,
    ) -> Result<Option<DescriptorBundle>, CoreError> {
        let found = catalog.lookup(id);
        match found.as_slice() {
            [] => {
                tracing::warn!(analysis_id, descriptor_id = id, "Requested descriptor not found");
                Ok(None)
            }
            [descriptor] => {
                let bundle = bundle::resolve(descriptor, self.archive_folder.as_deref());
                if let Some(bundle) = &bundle {
                    tracing::info!(
                        analysis_id,
                        descriptor_id = id,
                        bundle = %bundle.path.display(),
                        "Using requested descriptor",
                    );
                }
                Ok(bundle)
            }
            many => {
                let bundles: Vec<String> = many.iter().map(|d| d.bundle_name.clone()).collect();
                tracing::error!(
                    analysis_id,
                    descriptor_id = id,
                    bundles = ?bundles,
                    "Multiple descriptors found for requested id",
                );
                Err(CoreError::DuplicateDescriptor {
                    id: id.to_string(),
                    bundles,
                })
            }
        }
    }

    /// Rule 2. The first matching descriptor in catalog order wins.
    fn find_matching(
        &self,
        execution_dir: &Path,
        analysis_id: i64,
        catalog: &DescriptorCatalog,
    ) -> Result<Option<DescriptorBundle>, CoreError> {
        let fingerprint = self.resolver.resolve(execution_dir).inspect_err(|e| {
            tracing::error!(analysis_id, error = %e, "Runtime fingerprinting failed");
        })?;
        let Some(fingerprint) = fingerprint else {
            tracing::info!(
                analysis_id,
                dir = %execution_dir.display(),
                "No runtime fingerprint found in execution directory",
            );
            return Ok(None);
        };

        let outcome = match_descriptors(catalog, &fingerprint);
        let Some((chosen, discarded)) = outcome.matched.split_first() else {
            tracing::warn!(
                analysis_id,
                descriptors = catalog.len(),
                "No descriptor matched the runtime fingerprint",
            );
            for mismatch in &outcome.unmatched {
                tracing::info!(
                    analysis_id,
                    descriptor_id = %mismatch.descriptor_id,
                    label = %mismatch.label,
                    reason = %mismatch,
                    "Descriptor not matched",
                );
            }
            return Ok(None);
        };

        for extra in discarded {
            tracing::info!(
                analysis_id,
                descriptor_id = %extra.id,
                bundle = %extra.bundle_name,
                "Multiple descriptors matched, discarded extra",
            );
        }

        let bundle = bundle::resolve(chosen, self.archive_folder.as_deref());
        if let Some(bundle) = &bundle {
            tracing::info!(
                analysis_id,
                descriptor_id = %chosen.id,
                bundle = %bundle.path.display(),
                "Using matched descriptor",
            );
        }
        Ok(bundle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
