//! Registry of released component versions.
//!
//! The registry is an explicitly constructed service: loaded once at process
//! start, treated as immutable for the duration of any single resolution
//! pass, and replaced wholesale through an audited [`VersionRegistry::reload`].
//! Resolution always works against an [`Arc`] snapshot, so a reload never
//! changes versions under a running resolution.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::semver::SemanticVersion;

/// The two component kinds a node references by version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// The reusable per-node lifecycle template.
    Subgraph,
    /// The platform adapter that performs the node's actual work.
    Executor,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subgraph => write!(f, "subgraph"),
            Self::Executor => write!(f, "executor"),
        }
    }
}

/// An immutable snapshot of every released version, keyed by component
/// kind and name. Versions are stored sorted ascending.
#[derive(Debug, Default, Clone)]
pub struct VersionCatalog {
    subgraphs: HashMap<String, Vec<SemanticVersion>>,
    executors: HashMap<String, Vec<SemanticVersion>>,
}

impl VersionCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a released version for a component.
    ///
    /// Duplicate registrations are ignored; the version list stays sorted.
    pub fn register(
        &mut self,
        kind: ComponentKind,
        name: impl Into<String>,
        version: SemanticVersion,
    ) {
        let versions = self.table_mut(kind).entry(name.into()).or_default();
        if let Err(pos) = versions.binary_search(&version) {
            versions.insert(pos, version);
        }
    }

    /// Registers a subgraph version (builder form).
    #[must_use]
    pub fn with_subgraph(mut self, name: impl Into<String>, version: SemanticVersion) -> Self {
        self.register(ComponentKind::Subgraph, name, version);
        self
    }

    /// Registers an executor version (builder form).
    #[must_use]
    pub fn with_executor(mut self, name: impl Into<String>, version: SemanticVersion) -> Self {
        self.register(ComponentKind::Executor, name, version);
        self
    }

    /// Returns the sorted released versions of a component, if any.
    #[must_use]
    pub fn versions(&self, kind: ComponentKind, name: &str) -> Option<&[SemanticVersion]> {
        self.table(kind).get(name).map(Vec::as_slice)
    }

    /// Returns the number of distinct components in the catalog.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.subgraphs.len() + self.executors.len()
    }

    fn table(&self, kind: ComponentKind) -> &HashMap<String, Vec<SemanticVersion>> {
        match kind {
            ComponentKind::Subgraph => &self.subgraphs,
            ComponentKind::Executor => &self.executors,
        }
    }

    fn table_mut(&mut self, kind: ComponentKind) -> &mut HashMap<String, Vec<SemanticVersion>> {
        match kind {
            ComponentKind::Subgraph => &mut self.subgraphs,
            ComponentKind::Executor => &mut self.executors,
        }
    }
}

/// The registry service owning the current catalog.
#[derive(Debug, Default)]
pub struct VersionRegistry {
    catalog: RwLock<Arc<VersionCatalog>>,
}

impl VersionRegistry {
    /// Creates a registry holding the given catalog.
    #[must_use]
    pub fn new(catalog: VersionCatalog) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Returns the current immutable catalog snapshot.
    ///
    /// Resolution passes hold this snapshot for their whole duration, so a
    /// concurrent [`reload`](Self::reload) cannot change their inputs.
    #[must_use]
    pub fn snapshot(&self) -> Arc<VersionCatalog> {
        Arc::clone(&self.catalog.read())
    }

    /// Replaces the whole catalog, leaving an audit line.
    pub fn reload(&self, catalog: VersionCatalog) {
        let components = catalog.component_count();
        *self.catalog.write() = Arc::new(catalog);
        info!(components, "Version catalog reloaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_register_keeps_versions_sorted() {
        let mut catalog = VersionCatalog::new();
        catalog.register(ComponentKind::Executor, "lambda", v("1.3.1"));
        catalog.register(ComponentKind::Executor, "lambda", v("1.2.0"));
        catalog.register(ComponentKind::Executor, "lambda", v("2.0.0"));

        let versions = catalog.versions(ComponentKind::Executor, "lambda").unwrap();
        assert_eq!(versions, &[v("1.2.0"), v("1.3.1"), v("2.0.0")]);
    }

    #[test]
    fn test_register_deduplicates() {
        let catalog = VersionCatalog::new()
            .with_subgraph("standard", v("1.0.0"))
            .with_subgraph("standard", v("1.0.0"));

        let versions = catalog.versions(ComponentKind::Subgraph, "standard").unwrap();
        assert_eq!(versions.len(), 1);
    }

    #[test]
    fn test_kinds_are_separate_namespaces() {
        let catalog = VersionCatalog::new()
            .with_subgraph("etl", v("1.0.0"))
            .with_executor("etl", v("2.0.0"));

        assert_eq!(
            catalog.versions(ComponentKind::Subgraph, "etl").unwrap(),
            &[v("1.0.0")]
        );
        assert_eq!(
            catalog.versions(ComponentKind::Executor, "etl").unwrap(),
            &[v("2.0.0")]
        );
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let registry = VersionRegistry::new(
            VersionCatalog::new().with_executor("lambda", v("1.0.0")),
        );
        let before = registry.snapshot();

        registry.reload(VersionCatalog::new());

        // The old snapshot still sees the old catalog.
        assert!(before.versions(ComponentKind::Executor, "lambda").is_some());
        assert!(registry
            .snapshot()
            .versions(ComponentKind::Executor, "lambda")
            .is_none());
    }
}
