//! Version constraints: exact, latest-compatible, and half-open ranges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::semver::{SemanticVersion, VersionParseError};

/// A constraint a node places on a component version.
///
/// The string syntax accepted from the DSL:
///
/// - `"1.2.0"` — exactly that version.
/// - `"latest-compatible"` — the highest version within the lowest
///   registered major.
/// - `">=1.0.0 <2.0.0"` — a half-open range, inclusive lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionConstraint {
    /// Exactly the given version, even when a newer compatible one exists.
    Exact(SemanticVersion),
    /// The highest version sharing the lowest registered major.
    LatestCompatible,
    /// Any version `v` with `min <= v < max`.
    Range {
        /// Inclusive lower bound.
        min: SemanticVersion,
        /// Exclusive upper bound.
        max: SemanticVersion,
    },
}

impl Default for VersionConstraint {
    fn default() -> Self {
        Self::LatestCompatible
    }
}

impl VersionConstraint {
    /// Returns true if the given version satisfies this constraint.
    ///
    /// `LatestCompatible` is satisfied by every version; the registry scan
    /// narrows it to the actual selection rule.
    #[must_use]
    pub fn is_satisfied_by(&self, version: &SemanticVersion) -> bool {
        match self {
            Self::Exact(v) => v == version,
            Self::LatestCompatible => true,
            Self::Range { min, max } => version >= min && version < max,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::LatestCompatible => write!(f, "latest-compatible"),
            Self::Range { min, max } => write!(f, ">={min} <{max}"),
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.eq_ignore_ascii_case("latest-compatible") {
            return Ok(Self::LatestCompatible);
        }

        if trimmed.starts_with(">=") {
            let mut parts = trimmed.split_whitespace();
            let min_part = parts.next().unwrap_or_default();
            let max_part = parts.next().ok_or_else(|| VersionParseError {
                input: s.to_string(),
                detail: "range constraint needs an upper bound, e.g. '>=1.0.0 <2.0.0'"
                    .to_string(),
            })?;

            let min: SemanticVersion = min_part
                .trim_start_matches(">=")
                .parse()
                .map_err(|e: VersionParseError| VersionParseError {
                    input: s.to_string(),
                    detail: e.detail,
                })?;

            let max_raw = max_part.strip_prefix('<').ok_or_else(|| VersionParseError {
                input: s.to_string(),
                detail: "upper bound must start with '<'".to_string(),
            })?;
            let max: SemanticVersion =
                max_raw.parse().map_err(|e: VersionParseError| VersionParseError {
                    input: s.to_string(),
                    detail: e.detail,
                })?;

            if max <= min {
                return Err(VersionParseError {
                    input: s.to_string(),
                    detail: "range upper bound must be greater than lower bound".to_string(),
                });
            }

            return Ok(Self::Range { min, max });
        }

        trimmed.parse::<SemanticVersion>().map(Self::Exact)
    }
}

impl TryFrom<String> for VersionConstraint {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionConstraint> for String {
    fn from(c: VersionConstraint) -> Self {
        c.to_string()
    }
}
