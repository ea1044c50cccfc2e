//! Registry of executor capability implementations.
//!
//! Implementations are registered and looked up by the full key
//! `(platform, executor_type, version)` — the same triple the compiler
//! checks before an execution is allowed to start. Like the version
//! catalog, this is an explicitly constructed service: populated at process
//! start, read-only during executions, and replaced through an audited
//! reload rather than mutated ambiently.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::capability::Executor;
use crate::version::SemanticVersion;

/// The lookup key for an executor implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapabilityKey {
    /// The target platform (e.g. "aws", "local").
    pub platform: String,
    /// The executor type, the node's executor reference name.
    pub executor_type: String,
    /// The concrete resolved version.
    pub version: SemanticVersion,
}

impl CapabilityKey {
    /// Creates a key.
    #[must_use]
    pub fn new(
        platform: impl Into<String>,
        executor_type: impl Into<String>,
        version: SemanticVersion,
    ) -> Self {
        Self {
            platform: platform.into(),
            executor_type: executor_type.into(),
            version,
        }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.platform, self.executor_type, self.version)
    }
}

/// Thread-safe registry of executor implementations.
#[derive(Default)]
pub struct ExecutorRegistry {
    capabilities: DashMap<CapabilityKey, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an implementation for a capability key.
    ///
    /// A later registration for the same key replaces the earlier one.
    pub fn register(&self, key: CapabilityKey, executor: Arc<dyn Executor>) {
        self.capabilities.insert(key, executor);
    }

    /// Looks up the implementation for a key.
    #[must_use]
    pub fn lookup(&self, key: &CapabilityKey) -> Option<Arc<dyn Executor>> {
        self.capabilities.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns true if an implementation is registered for the key.
    #[must_use]
    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.capabilities.contains_key(key)
    }

    /// Returns the number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Replaces every registration, leaving an audit line.
    pub fn reload(&self, entries: Vec<(CapabilityKey, Arc<dyn Executor>)>) {
        self.capabilities.clear();
        let count = entries.len();
        for (key, executor) in entries {
            self.capabilities.insert(key, executor);
        }
        info!(capabilities = count, "Executor registry reloaded");
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}
