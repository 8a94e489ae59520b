//! Package version parsing and constraint evaluation.
//!
//! Lockfile versions are not semver: R packages use forms such as `1.2-3`
//! or `0.4.10.9000`. Versions are therefore compared component-wise after
//! splitting on `.` and `-`, with missing trailing components read as zero.
//!
//! Constraints are a comma-separated conjunction of clauses. A clause is a
//! bare version (exact match) or one of `==`, `=`, `!=`, `>=`, `>`, `<=`,
//! `<` followed by a version. `*` or an empty string accepts anything.

use std::cmp::Ordering;
use std::fmt;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Num(u64),
    Text(String),
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Num(a), Self::Num(b)) => a.cmp(b),
            (Self::Num(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Num(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed package or interpreter version.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<Segment>,
}

impl Version {
    /// Parse a version string such as `4.2.1` or `1.2-3`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::new(input, "version is empty"));
        }
        let mut segments = Vec::new();
        for part in trimmed.split(['.', '-']) {
            if part.is_empty() {
                return Err(VersionError::new(input, "empty version component"));
            }
            let segment = if part.bytes().all(|b| b.is_ascii_digit()) {
                part.parse::<u64>()
                    .map(Segment::Num)
                    .map_err(|_| VersionError::new(input, "numeric component overflows"))?
            } else {
                Segment::Text(part.to_string())
            };
            segments.push(segment);
        }
        Ok(Self { segments })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = Segment::Num(0);
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).unwrap_or(&zero);
            let b = other.segments.get(i).unwrap_or(&zero);
            match a.cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// A version or constraint string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version '{input}': {reason}")]
pub struct VersionError {
    pub input: String,
    pub reason: &'static str,
}

impl VersionError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Comparison operator of a single constraint clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Op {
    /// Operator tokens, longest first so `>=` wins over `>`.
    const TOKENS: [(&'static str, Op); 7] = [
        (">=", Op::GreaterThanOrEqual),
        ("<=", Op::LessThanOrEqual),
        ("==", Op::Equals),
        ("!=", Op::NotEquals),
        (">", Op::GreaterThan),
        ("<", Op::LessThan),
        ("=", Op::Equals),
    ];

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Equals => ordering == Ordering::Equal,
            Self::NotEquals => ordering != Ordering::Equal,
            Self::GreaterThan => ordering == Ordering::Greater,
            Self::GreaterThanOrEqual => ordering != Ordering::Less,
            Self::LessThan => ordering == Ordering::Less,
            Self::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    op: Op,
    version: Version,
}

/// A parsed version constraint, e.g. `>=1.0, <2.0`.
///
/// Deserializes from a plain string so that invalid constraints surface as
/// descriptor parse errors when the catalog loads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct VersionReq {
    raw: String,
    clauses: Vec<Clause>,
}

impl VersionReq {
    /// Constraint that accepts every version.
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            clauses: Vec::new(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self {
                raw: trimmed.to_string(),
                clauses: Vec::new(),
            });
        }

        let mut clauses = Vec::new();
        for raw_clause in trimmed.split(',') {
            let raw_clause = raw_clause.trim();
            if raw_clause.is_empty() {
                return Err(VersionError::new(input, "empty constraint clause"));
            }
            let (op, rest) = Op::TOKENS
                .iter()
                .find_map(|(token, op)| raw_clause.strip_prefix(token).map(|rest| (*op, rest)))
                .unwrap_or((Op::Equals, raw_clause));
            let version = Version::parse(rest).map_err(|e| VersionError::new(input, e.reason))?;
            clauses.push(Clause { op, version });
        }

        Ok(Self {
            raw: trimmed.to_string(),
            clauses,
        })
    }

    /// Whether this constraint accepts every version.
    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Check an observed version string against every clause.
    ///
    /// An observed version that cannot be parsed only satisfies `*`.
    pub fn matches(&self, observed: &str) -> bool {
        if self.is_any() {
            return true;
        }
        let Ok(observed) = Version::parse(observed) else {
            return false;
        };
        self.clauses
            .iter()
            .all(|clause| clause.op.holds(observed.cmp(&clause.version)))
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&self.raw)
        }
    }
}

impl TryFrom<String> for VersionReq {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
