//! The execution record store collaborator.
//!
//! Persistence of execution history lives outside the core; the engine only
//! depends on this trait. The in-memory implementation backs tests and
//! embedded use.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use super::checkpoint::CheckpointSnapshot;
use super::record::{ExecutionErrorEntry, ExecutionMetric, ExecutionRecord, NodeExecutionRecord};

/// Error raised by a record store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store is unreachable or refused the write.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The referenced execution does not exist in the store.
    #[error("Execution not found: {0}")]
    NotFound(Uuid),

    /// A record could not be serialized for storage.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// The persistence collaborator for execution records and checkpoints.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists a freshly created execution record.
    async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Replaces the stored record (status changes, final freeze).
    async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Upserts one node's audit entry.
    async fn update_node_execution(
        &self,
        execution_id: Uuid,
        node: &NodeExecutionRecord,
    ) -> Result<(), StoreError>;

    /// Appends a metric sample.
    async fn append_metric(
        &self,
        execution_id: Uuid,
        metric: &ExecutionMetric,
    ) -> Result<(), StoreError>;

    /// Appends an error entry.
    async fn append_error(
        &self,
        execution_id: Uuid,
        error: &ExecutionErrorEntry,
    ) -> Result<(), StoreError>;

    /// Persists a checkpoint snapshot.
    async fn save_checkpoint(&self, snapshot: &CheckpointSnapshot) -> Result<(), StoreError>;

    /// Loads the most recent checkpoint for an execution.
    async fn load_latest_checkpoint(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<CheckpointSnapshot>, StoreError>;

    /// Loads an execution record.
    async fn load_execution(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<ExecutionRecord>, StoreError>;
}

#[derive(Debug, Default)]
struct InMemoryState {
    executions: HashMap<Uuid, ExecutionRecord>,
    checkpoints: HashMap<Uuid, Vec<CheckpointSnapshot>>,
}

/// An in-memory record store.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: RwLock<InMemoryState>,
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of checkpoints saved for an execution.
    #[must_use]
    pub fn checkpoint_count(&self, execution_id: Uuid) -> usize {
        self.state
            .read()
            .checkpoints
            .get(&execution_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.state
            .write()
            .executions
            .insert(record.execution_id, record.clone());
        Ok(())
    }

    async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if !state.executions.contains_key(&record.execution_id) {
            return Err(StoreError::NotFound(record.execution_id));
        }
        state.executions.insert(record.execution_id, record.clone());
        Ok(())
    }

    async fn update_node_execution(
        &self,
        execution_id: Uuid,
        node: &NodeExecutionRecord,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let record = state
            .executions
            .get_mut(&execution_id)
            .ok_or(StoreError::NotFound(execution_id))?;
        match record.nodes.iter_mut().find(|n| n.node_id == node.node_id) {
            Some(entry) => *entry = node.clone(),
            None => record.nodes.push(node.clone()),
        }
        Ok(())
    }

    async fn append_metric(
        &self,
        execution_id: Uuid,
        metric: &ExecutionMetric,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let record = state
            .executions
            .get_mut(&execution_id)
            .ok_or(StoreError::NotFound(execution_id))?;
        record.metrics.push(metric.clone());
        Ok(())
    }

    async fn append_error(
        &self,
        execution_id: Uuid,
        error: &ExecutionErrorEntry,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let record = state
            .executions
            .get_mut(&execution_id)
            .ok_or(StoreError::NotFound(execution_id))?;
        record.errors.push(error.clone());
        Ok(())
    }

    async fn save_checkpoint(&self, snapshot: &CheckpointSnapshot) -> Result<(), StoreError> {
        self.state
            .write()
            .checkpoints
            .entry(snapshot.execution_id)
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn load_latest_checkpoint(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<CheckpointSnapshot>, StoreError> {
        Ok(self
            .state
            .read()
            .checkpoints
            .get(&execution_id)
            .and_then(|snapshots| snapshots.last().cloned()))
    }

    async fn load_execution(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<ExecutionRecord>, StoreError> {
        Ok(self.state.read().executions.get(&execution_id).cloned())
    }
}
