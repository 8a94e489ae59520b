//! Descriptor data model and requirement evaluation.
//!
//! A [`Descriptor`] names a runnable bundle and the runtime environments it
//! can serve. A [`RuntimeFingerprint`] is what an extractor observed inside a
//! job directory. [`RuntimeRequirement::mismatches`] compares the two and
//! returns structured reasons; text is produced only through `Display`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::version::VersionReq;

/// Id of the synthetic descriptor attached to the default bundle.
pub const DEFAULT_DESCRIPTOR_ID: &str = "default";

/// Label of the synthetic descriptor attached to the default bundle.
pub const DEFAULT_DESCRIPTOR_LABEL: &str = "Default Runtime";

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Declarative runtime environment record loaded from a `descriptor*` file.
///
/// Unknown fields in the source record are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub bundle_name: String,
    #[serde(default)]
    pub execution_runtimes: Vec<RuntimeRequirement>,
}

impl Descriptor {
    /// The no-requirements descriptor attached to the default bundle.
    pub fn default_descriptor(bundle_name: impl Into<String>) -> Self {
        Self {
            id: DEFAULT_DESCRIPTOR_ID.to_string(),
            label: DEFAULT_DESCRIPTOR_LABEL.to_string(),
            bundle_name: bundle_name.into(),
            execution_runtimes: Vec::new(),
        }
    }

    /// Human-readable name for logs; falls back to the id.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }

    /// Check the fingerprint against every declared requirement.
    ///
    /// The descriptor matches when at least one requirement reports no
    /// mismatches. Otherwise the reasons of every requirement are returned.
    pub fn check(&self, fingerprint: &RuntimeFingerprint) -> Result<(), DescriptorMismatch> {
        let mut failures = Vec::with_capacity(self.execution_runtimes.len());
        for (index, requirement) in self.execution_runtimes.iter().enumerate() {
            let mismatches = requirement.mismatches(fingerprint);
            if mismatches.is_empty() {
                return Ok(());
            }
            failures.push(RequirementFailure { index, mismatches });
        }
        Err(DescriptorMismatch {
            descriptor_id: self.id.clone(),
            label: self.display_name().to_string(),
            failures,
        })
    }
}

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

/// One acceptable runtime environment of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeRequirement {
    /// Extractor family tag, e.g. `"R"`.
    #[serde(rename = "type")]
    pub runtime_type: String,
    /// Interpreter version constraint, if any.
    #[serde(default)]
    pub version: Option<VersionReq>,
    /// Package name to version constraint.
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionReq>,
}

impl RuntimeRequirement {
    /// Every reason this requirement is not satisfied by `fingerprint`.
    ///
    /// An empty result means the requirement is met. A runtime type
    /// mismatch is reported alone since nothing else is comparable.
    pub fn mismatches(&self, fingerprint: &RuntimeFingerprint) -> Vec<Mismatch> {
        if self.runtime_type != fingerprint.runtime_type {
            return vec![Mismatch::RuntimeType {
                required: self.runtime_type.clone(),
                observed: fingerprint.runtime_type.clone(),
            }];
        }

        let mut mismatches = Vec::new();

        if let Some(required) = self.version.as_ref().filter(|req| !req.is_any()) {
            match fingerprint.version.as_deref() {
                Some(observed) if required.matches(observed) => {}
                observed => mismatches.push(Mismatch::InterpreterVersion {
                    required: required.clone(),
                    observed: observed.map(str::to_string),
                }),
            }
        }

        for (name, required) in &self.dependencies {
            match fingerprint.dependencies.get(name) {
                None => mismatches.push(Mismatch::MissingDependency {
                    name: name.clone(),
                    required: required.clone(),
                }),
                Some(observed) if !required.matches(observed) => {
                    mismatches.push(Mismatch::DependencyVersion {
                        name: name.clone(),
                        required: required.clone(),
                        observed: observed.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        mismatches
    }
}

/// A single unmet condition of a [`RuntimeRequirement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    RuntimeType {
        required: String,
        observed: String,
    },
    InterpreterVersion {
        required: VersionReq,
        observed: Option<String>,
    },
    MissingDependency {
        name: String,
        required: VersionReq,
    },
    DependencyVersion {
        name: String,
        required: VersionReq,
        observed: String,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RuntimeType { required, observed } => {
                write!(f, "runtime type {required} required, {observed} found")
            }
            Self::InterpreterVersion {
                required,
                observed: Some(observed),
            } => write!(f, "interpreter {required} required, {observed} found"),
            Self::InterpreterVersion {
                required,
                observed: None,
            } => write!(f, "interpreter {required} required, version unknown"),
            Self::MissingDependency { name, required } => {
                write!(f, "{name} {required} required, not present")
            }
            Self::DependencyVersion {
                name,
                required,
                observed,
            } => write!(f, "{name} {required} required, {observed} found"),
        }
    }
}

/// Unmet conditions of one requirement, by its position in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementFailure {
    pub index: usize,
    pub mismatches: Vec<Mismatch>,
}

/// Why a descriptor did not match a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorMismatch {
    pub descriptor_id: String,
    pub label: String,
    pub failures: Vec<RequirementFailure>,
}

impl fmt::Display for DescriptorMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return f.write_str("declares no execution runtimes");
        }
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "runtime #{}: ", failure.index)?;
            for (j, mismatch) in failure.mismatches.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{mismatch}")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Runtime environment observed in a job's execution directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFingerprint {
    /// Extractor family tag, e.g. `"R"`.
    pub runtime_type: String,
    /// Interpreter version, when the source records one.
    pub version: Option<String>,
    /// Package name to observed version.
    pub dependencies: BTreeMap<String, String>,
    /// Logical path the fingerprint was read from.
    pub source: String,
    /// SHA-256 hex digest of the source bytes.
    pub digest: String,
}

impl fmt::Display for RuntimeFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} with {} dependencies",
            self.runtime_type,
            self.version.as_deref().unwrap_or("(unknown version)"),
            self.dependencies.len()
        )
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// A runnable bundle path paired with the descriptor it satisfies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorBundle {
    pub path: PathBuf,
    pub descriptor: Descriptor,
    is_default: bool,
}

impl DescriptorBundle {
    /// Bundle for a catalog descriptor.
    pub fn new(path: PathBuf, descriptor: Descriptor) -> Self {
        Self {
            path,
            descriptor,
            is_default: false,
        }
    }

    /// The fallback bundle with the synthetic no-requirements descriptor.
    pub fn default_bundle(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            descriptor: Descriptor::default_descriptor(path.to_string_lossy()),
            is_default: true,
        }
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
