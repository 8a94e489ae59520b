//! Analysis dispatch.
//!
//! Routes an incoming analysis to the runner for its executable type. R
//! scripts go through the [`DescriptorMatcher`] first so the script runner
//! receives the runtime bundle to start in.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use xengine_core::descriptor::DescriptorBundle;
use xengine_core::matcher::DescriptorMatcher;

use crate::error::{RunnerError, WorkerError};

/// One analysis submitted for execution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub id: i64,
    pub executable_file_name: String,
    /// Descriptor explicitly requested by the submitter.
    #[serde(default)]
    pub requested_descriptor_id: Option<String>,
}

/// Executable type, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Sql,
    R,
    NotRecognized,
}

impl AnalysisKind {
    pub fn from_file_name(file_name: &str) -> Self {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("sql") => Self::Sql,
            Some("r") => Self::R,
            _ => Self::NotRecognized,
        }
    }
}

/// Result of dispatching one analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisStatus {
    pub analysis_id: i64,
    pub kind: AnalysisKind,
    /// Bundle the script was started in, for R analyses.
    pub bundle: Option<DescriptorBundle>,
}

pub trait SqlRunner: Send + Sync {
    fn run(&self, request: &AnalysisRequest, execution_dir: &Path) -> Result<(), RunnerError>;
}

pub trait ScriptRunner: Send + Sync {
    fn run(
        &self,
        request: &AnalysisRequest,
        execution_dir: &Path,
        bundle: &DescriptorBundle,
    ) -> Result<(), RunnerError>;
}

/// Collects analysis metadata before execution. Failures never block a job.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, request: &AnalysisRequest, execution_dir: &Path) -> Result<(), RunnerError>;
}

/// Entry point for analyses arriving at the worker.
pub struct AnalysisDispatcher {
    matcher: Arc<DescriptorMatcher>,
    sql: Arc<dyn SqlRunner>,
    script: Arc<dyn ScriptRunner>,
    metadata: Arc<dyn MetadataExtractor>,
}

impl AnalysisDispatcher {
    pub fn new(
        matcher: Arc<DescriptorMatcher>,
        sql: Arc<dyn SqlRunner>,
        script: Arc<dyn ScriptRunner>,
        metadata: Arc<dyn MetadataExtractor>,
    ) -> Self {
        Self {
            matcher,
            sql,
            script,
            metadata,
        }
    }

    /// Dispatch one analysis whose files are unpacked in `execution_dir`.
    ///
    /// Blocks on filesystem work; run it through a [`crate::pool::JobPool`]
    /// from async code.
    pub fn analyze(
        &self,
        request: &AnalysisRequest,
        execution_dir: &Path,
    ) -> Result<AnalysisStatus, WorkerError> {
        if let Err(e) = self.metadata.extract(request, execution_dir) {
            tracing::warn!(
                analysis_id = request.id,
                error = %e,
                "Metadata extraction failed, continuing",
            );
        }

        let kind = AnalysisKind::from_file_name(&request.executable_file_name);
        tracing::info!(
            analysis_id = request.id,
            file = %request.executable_file_name,
            kind = ?kind,
            "Dispatching analysis",
        );

        let runner_error = |source: RunnerError| WorkerError::Runner {
            analysis_id: request.id,
            source,
        };

        let bundle = match kind {
            AnalysisKind::Sql => {
                self.sql.run(request, execution_dir).map_err(runner_error)?;
                None
            }
            AnalysisKind::R => {
                let bundle = self.matcher.select_bundle(
                    execution_dir,
                    request.id,
                    request.requested_descriptor_id.as_deref(),
                )?;
                tracing::info!(
                    analysis_id = request.id,
                    descriptor_id = %bundle.descriptor.id,
                    bundle = %bundle.path.display(),
                    "Starting script in runtime bundle",
                );
                self.script
                    .run(request, execution_dir, &bundle)
                    .map_err(runner_error)?;
                Some(bundle)
            }
            AnalysisKind::NotRecognized => {
                tracing::warn!(
                    analysis_id = request.id,
                    file = %request.executable_file_name,
                    "Executable type not recognized, nothing started",
                );
                None
            }
        };

        Ok(AnalysisStatus {
            analysis_id: request.id,
            kind,
            bundle,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
