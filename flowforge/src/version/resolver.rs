//! Deterministic resolution of node version constraints.
//!
//! A resolver is constructed over a single catalog snapshot and is pure:
//! the same snapshot and the same constraint always produce the same
//! resolved version. The resolved pair is recorded verbatim into the
//! execution record's version snapshot at execution start and never
//! re-resolved mid-run, even if the registry is reloaded.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::constraint::VersionConstraint;
use super::registry::{ComponentKind, VersionCatalog};
use super::semver::SemanticVersion;
use crate::dsl::model::PipelineNode;

/// Error raised when a node's version constraints cannot be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The component has no registered versions at all.
    #[error("No registered versions for {kind} '{name}'")]
    NotFound {
        /// Which component kind was looked up.
        kind: ComponentKind,
        /// The component name.
        name: String,
    },

    /// Versions exist, but none satisfies the constraint.
    #[error("No version of {kind} '{name}' satisfies '{constraint}'")]
    Incompatible {
        /// Which component kind was looked up.
        kind: ComponentKind,
        /// The component name.
        name: String,
        /// The unsatisfiable constraint.
        constraint: VersionConstraint,
    },
}

/// The concrete versions chosen for one node, frozen for the execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersions {
    /// The node's lifecycle template version.
    pub subgraph: SemanticVersion,
    /// The node's platform adapter version.
    pub executor: SemanticVersion,
}

/// Resolves version constraints against one immutable catalog snapshot.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    catalog: Arc<VersionCatalog>,
}

impl VersionResolver {
    /// Creates a resolver over the given snapshot.
    #[must_use]
    pub fn new(catalog: Arc<VersionCatalog>) -> Self {
        Self { catalog }
    }

    /// Resolves both of a node's component references.
    pub fn resolve_node(&self, node: &PipelineNode) -> Result<ResolvedVersions, VersionError> {
        let subgraph = self.resolve(
            ComponentKind::Subgraph,
            &node.subgraph.name,
            node.subgraph.version,
        )?;
        let executor = self.resolve(
            ComponentKind::Executor,
            &node.executor.name,
            node.executor.version,
        )?;
        Ok(ResolvedVersions { subgraph, executor })
    }

    /// Resolves a single constraint to a concrete registered version.
    ///
    /// The candidate list is sorted ascending, so every rule below is a
    /// deterministic scan:
    ///
    /// - `Exact` selects the version iff it is registered.
    /// - `Range` selects the highest registered version inside the range.
    /// - `LatestCompatible` selects the highest version within the lowest
    ///   registered major.
    pub fn resolve(
        &self,
        kind: ComponentKind,
        name: &str,
        constraint: VersionConstraint,
    ) -> Result<SemanticVersion, VersionError> {
        let versions = self
            .catalog
            .versions(kind, name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| VersionError::NotFound {
                kind,
                name: name.to_string(),
            })?;

        let incompatible = || VersionError::Incompatible {
            kind,
            name: name.to_string(),
            constraint,
        };

        match constraint {
            VersionConstraint::Exact(wanted) => versions
                .binary_search(&wanted)
                .map(|_| wanted)
                .map_err(|_| incompatible()),
            VersionConstraint::Range { .. } => versions
                .iter()
                .rev()
                .find(|v| constraint.is_satisfied_by(v))
                .copied()
                .ok_or_else(incompatible),
            VersionConstraint::LatestCompatible => {
                // Sorted ascending, so the first entry carries the lowest major.
                let lowest_major = versions[0].major;
                versions
                    .iter()
                    .rev()
                    .find(|v| v.major == lowest_major)
                    .copied()
                    .ok_or_else(incompatible)
            }
        }
    }
}
