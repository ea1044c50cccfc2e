//! Semantic versions, constraints, the released-version registry, and the
//! deterministic resolver.

mod constraint;
mod registry;
mod resolver;
mod semver;

pub use constraint::VersionConstraint;
pub use registry::{ComponentKind, VersionCatalog, VersionRegistry};
pub use resolver::{ResolvedVersions, VersionError, VersionResolver};
pub use semver::{SemanticVersion, VersionParseError};
