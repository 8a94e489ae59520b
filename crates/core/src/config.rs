use std::path::PathBuf;

use crate::error::CoreError;

/// Default bundle used when no descriptor applies and none is configured.
pub const DEFAULT_ARCHIVE: &str = "/opt/execution-engine/runtime/default.tar.gz";

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding `descriptor*` files and the bundles they name.
    /// `None` disables the catalog entirely.
    pub archive_folder: Option<PathBuf>,
    /// Bundle returned when nothing else resolves.
    pub default_archive: PathBuf,
    /// Whether to fingerprint job directories and match descriptors
    /// against the result.
    pub dependency_matching: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            archive_folder: None,
            default_archive: PathBuf::from(DEFAULT_ARCHIVE),
            dependency_matching: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `RUNTIME_ARCHIVE_FOLDER`      | unset                   |
    /// | `RUNTIME_DEFAULT_ARCHIVE`     | [`DEFAULT_ARCHIVE`]     |
    /// | `RUNTIME_DEPENDENCY_MATCHING` | `false`                 |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let archive_folder = get("RUNTIME_ARCHIVE_FOLDER").map(PathBuf::from);
        let default_archive = get("RUNTIME_DEFAULT_ARCHIVE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE));
        let dependency_matching = match get("RUNTIME_DEPENDENCY_MATCHING") {
            Some(raw) => parse_flag("RUNTIME_DEPENDENCY_MATCHING", &raw)?,
            None => false,
        };

        Ok(Self {
            archive_folder,
            default_archive,
            dependency_matching,
        })
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, CoreError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(CoreError::Config(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
