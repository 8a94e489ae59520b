use xengine_core::config::EngineConfig;

use crate::error::WorkerError;

/// Default number of jobs allowed to resolve concurrently.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Engine settings (archive folder, default bundle, matching flag).
    pub engine: EngineConfig,
    /// Upper bound on jobs resolving at the same time.
    pub max_concurrent_jobs: usize,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default |
    /// |-----------------------|---------|
    /// | `MAX_CONCURRENT_JOBS` | `4`     |
    ///
    /// Engine variables are documented on [`EngineConfig::from_env`].
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine = EngineConfig::from_lookup(&lookup)?;

        let max_concurrent_jobs = match lookup("MAX_CONCURRENT_JOBS") {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| {
                    WorkerError::Config(format!(
                        "MAX_CONCURRENT_JOBS must be a positive integer, got '{raw}'"
                    ))
                })?,
            _ => DEFAULT_MAX_CONCURRENT_JOBS,
        };

        Ok(Self {
            engine,
            max_concurrent_jobs,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
