//! Descriptor catalog loaded from a flat directory of `descriptor*` files.
//!
//! The catalog is read fresh for every lookup; nothing is cached between
//! jobs. A missing or unconfigured directory is an unavailable catalog; an
//! existing directory with no descriptor files is available but empty. A
//! single unparseable descriptor file fails the whole load.

use std::fs;
use std::io;
use std::path::Path;

use crate::descriptor::Descriptor;
use crate::error::CoreError;

/// File-name prefix of descriptor records.
pub const DESCRIPTOR_PREFIX: &str = "descriptor";

/// Descriptors in load order (sorted by file name).
///
/// `Default` is the unavailable catalog: no directory configured, or the
/// configured one does not exist.
#[derive(Debug, Clone, Default)]
pub struct DescriptorCatalog {
    descriptors: Vec<Descriptor>,
    available: bool,
}

impl DescriptorCatalog {
    /// An available catalog holding `descriptors`.
    pub fn new(descriptors: Vec<Descriptor>) -> Self {
        Self {
            descriptors,
            available: true,
        }
    }

    /// Load every `descriptor*` file directly inside `dir`.
    ///
    /// `None` or a directory that does not exist yields an unavailable
    /// catalog.
    pub fn load(dir: Option<&Path>) -> Result<Self, CoreError> {
        let Some(dir) = dir else {
            return Ok(Self::default());
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(dir = %dir.display(), "Descriptor directory does not exist");
                return Ok(Self::default());
            }
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "Error traversing descriptor directory");
                return Err(CoreError::io(dir, e));
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::io(dir, e))?;
            let path = entry.path();
            let is_descriptor = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(DESCRIPTOR_PREFIX));
            if is_descriptor && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let descriptors = files
            .iter()
            .map(|path| parse_descriptor(path))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(dir = %dir.display(), count = descriptors.len(), "Loaded descriptor catalog");
        Ok(Self::new(descriptors))
    }

    /// Whether a descriptor directory was found, even if it holds nothing.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Every descriptor whose id equals `id`, in load order.
    pub fn lookup(&self, id: &str) -> Vec<&Descriptor> {
        self.descriptors.iter().filter(|d| d.id == id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Load the catalog in `dir` and return the descriptors with id `id`.
pub fn lookup(dir: Option<&Path>, id: &str) -> Result<Vec<Descriptor>, CoreError> {
    let catalog = DescriptorCatalog::load(dir)?;
    Ok(catalog.lookup(id).into_iter().cloned().collect())
}

fn parse_descriptor(path: &Path) -> Result<Descriptor, CoreError> {
    let bytes = fs::read(path).map_err(|e| CoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Malformed descriptor");
        CoreError::MalformedDescriptor {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
