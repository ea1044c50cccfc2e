//! Semantic version type with numeric ordering and major-compatibility.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A `major.minor.patch` semantic version.
///
/// Ordering is numeric per component (so `1.10.0 > 1.9.0`), never
/// lexicographic. Two versions are compatible iff they share a major.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion {
    /// Major component; a change here breaks compatibility.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

/// Error raised when a version string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid semantic version '{input}': {detail}")]
pub struct VersionParseError {
    /// The rejected input.
    pub input: String,
    /// What was wrong with it.
    pub detail: String,
}

impl SemanticVersion {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns true if `self` and `other` share a major version.
    #[must_use]
    pub const fn is_compatible_with(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |detail: &str| VersionParseError {
            input: s.to_string(),
            detail: detail.to_string(),
        };

        let mut parts = s.trim().splitn(3, '.');
        let mut component = |name: &str| -> Result<u64, VersionParseError> {
            let raw = parts
                .next()
                .ok_or_else(|| err(&format!("missing {name} component")))?;
            raw.parse::<u64>()
                .map_err(|_| err(&format!("{name} component '{raw}' is not a number")))
        };

        let major = component("major")?;
        let minor = component("minor")?;
        let patch = component("patch")?;
        Ok(Self::new(major, minor, patch))
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SemanticVersion> for String {
    fn from(v: SemanticVersion) -> Self {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let v: SemanticVersion = "1.2.3".parse().unwrap();
        assert_eq!(v, SemanticVersion::new(1, 2, 3));
        assert_eq!(v.to_string(), "1.2.3");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<SemanticVersion>().is_err());
        assert!("1.2".parse::<SemanticVersion>().is_err());
        assert!("1.2.x".parse::<SemanticVersion>().is_err());
        assert!("a.b.c".parse::<SemanticVersion>().is_err());
    }

    #[test]
    fn test_numeric_ordering() {
        let v190: SemanticVersion = "1.9.0".parse().unwrap();
        let v1100: SemanticVersion = "1.10.0".parse().unwrap();
        let v200: SemanticVersion = "2.0.0".parse().unwrap();

        assert!(v190 < v1100);
        assert!(v1100 < v200);
    }

    #[test]
    fn test_compatibility_is_same_major() {
        let a = SemanticVersion::new(1, 2, 0);
        let b = SemanticVersion::new(1, 9, 9);
        let c = SemanticVersion::new(2, 0, 0);

        assert!(a.is_compatible_with(&b));
        assert!(!a.is_compatible_with(&c));
    }

    #[test]
    fn test_serde_as_string() {
        let v = SemanticVersion::new(1, 2, 3);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#""1.2.3""#);

        let back: SemanticVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
