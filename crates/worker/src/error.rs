use xengine_core::error::CoreError;

/// Error reported by an external runner or metadata collaborator.
pub type RunnerError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to start a job.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Bundle selection hit a fatal engine condition.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Runner failed to start analysis {analysis_id}: {source}")]
    Runner {
        analysis_id: i64,
        #[source]
        source: RunnerError,
    },

    #[error("Job pool is closed")]
    PoolClosed,

    #[error("Job task failed: {0}")]
    JobPanicked(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
