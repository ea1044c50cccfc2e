//! The per-execution audit record.
//!
//! An [`ExecutionRecord`] is created at execution start, mutated only by the
//! engine task that owns the execution, and frozen once the execution
//! reaches a terminal status. Its resolved-version snapshot never changes
//! after creation, so a recorded run can always be reproduced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use super::checkpoint::CheckpointSnapshot;
use crate::compiler::CompiledGraph;
use crate::dsl::model::ConfigMap;
use crate::runtime::node_runner::NodeTransition;
use crate::runtime::NodeStatus;
use crate::version::{ResolvedVersions, SemanticVersion};

/// The overall state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, not yet driven.
    Pending,
    /// The engine is dispatching nodes.
    Running,
    /// Dispatch stopped; resumable from the last checkpoint.
    Paused,
    /// Every node succeeded or was skipped.
    Succeeded,
    /// At least one node failed.
    Failed,
    /// Cancelled by an operator.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns true for states an execution never leaves.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns whether the transition `self -> to` is legal.
    ///
    /// Transitions are monotonic: a terminal status never changes.
    #[must_use]
    pub fn can_transition(&self, to: Self) -> bool {
        if *self == to {
            return true;
        }
        match self {
            Self::Pending => matches!(to, Self::Running | Self::Cancelled | Self::Failed),
            Self::Running => matches!(
                to,
                Self::Paused | Self::Succeeded | Self::Failed | Self::Cancelled
            ),
            Self::Paused => matches!(to, Self::Running | Self::Cancelled | Self::Failed),
            Self::Succeeded | Self::Failed | Self::Cancelled => false,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// Error raised by illegal record mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The requested status change would leave a terminal state.
    #[error("Illegal execution status transition: {from} -> {to}")]
    IllegalTransition {
        /// The current status.
        from: ExecutionStatus,
        /// The rejected target status.
        to: ExecutionStatus,
    },

    /// A transition referenced a node the record does not know.
    #[error("Unknown node in execution record: '{id}'")]
    UnknownNode {
        /// The unknown node id.
        id: String,
    },
}

/// The exact resolved versions an execution ran with, frozen at start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    entries: BTreeMap<String, ResolvedVersions>,
}

impl VersionSnapshot {
    /// Freezes a resolution map into a snapshot.
    #[must_use]
    pub fn new(entries: BTreeMap<String, ResolvedVersions>) -> Self {
        Self { entries }
    }

    /// The resolved pair for a node.
    #[must_use]
    pub fn resolved_for(&self, node_id: &str) -> Option<&ResolvedVersions> {
        self.entries.get(node_id)
    }

    /// Iterates over (node id, resolved pair).
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolvedVersions)> {
        self.entries.iter()
    }
}

/// One node's audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionRecord {
    /// The node id.
    pub node_id: String,
    /// The node's current state.
    pub status: NodeStatus,
    /// Executor invocation attempts so far.
    pub attempts: u32,
    /// When the node first left `Pending`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the node reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Captured outputs, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<ConfigMap>,
    /// Error detail, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeExecutionRecord {
    fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Pending,
            attempts: 0,
            started_at: None,
            finished_at: None,
            outputs: None,
            error: None,
        }
    }
}

/// A metric sample attributed to an execution (and optionally a node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetric {
    /// The node that reported the sample, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// The metric name.
    pub name: String,
    /// The sampled value.
    pub value: f64,
    /// Optional unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// When the sample was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// An error recorded against an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionErrorEntry {
    /// The node the error belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// The error message.
    pub message: String,
    /// When the error was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// The full audit trail of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// The execution id.
    pub execution_id: Uuid,
    /// The pipeline that ran.
    pub pipeline_id: String,
    /// The pipeline's declared version.
    pub pipeline_version: SemanticVersion,
    /// The resolved versions used, immutable for the record's life.
    pub versions: VersionSnapshot,
    /// The overall status.
    pub status: ExecutionStatus,
    /// The variables the execution started with.
    #[serde(default, skip_serializing_if = "ConfigMap::is_empty")]
    pub variables: ConfigMap,
    /// Per-node audit entries, in the graph's topological order.
    pub nodes: Vec<NodeExecutionRecord>,
    /// Metrics reported by executors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<ExecutionMetric>,
    /// Errors recorded against the execution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ExecutionErrorEntry>,
    /// The latest checkpoint snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointSnapshot>,
    /// When the execution was created.
    pub started_at: DateTime<Utc>,
    /// When the execution reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Creates a pending record for a compiled graph.
    #[must_use]
    pub fn new(graph: &CompiledGraph, versions: VersionSnapshot, variables: ConfigMap) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pipeline_id: graph.pipeline_id().to_string(),
            pipeline_version: graph.version(),
            versions,
            status: ExecutionStatus::Pending,
            variables,
            nodes: graph
                .nodes()
                .iter()
                .map(|n| NodeExecutionRecord::new(&n.id))
                .collect(),
            metrics: Vec::new(),
            errors: Vec::new(),
            checkpoint: None,
            started_at: crate::utils::now(),
            finished_at: None,
        }
    }

    /// Looks up a node entry.
    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&NodeExecutionRecord> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// Changes the overall status, enforcing monotonicity.
    pub fn transition_status(&mut self, to: ExecutionStatus) -> Result<(), RecordError> {
        if !self.status.can_transition(to) {
            return Err(RecordError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if to.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(crate::utils::now());
        }
        Ok(())
    }

    /// Folds a node transition into the record and returns the updated
    /// entry.
    pub fn apply_transition(
        &mut self,
        transition: &NodeTransition,
    ) -> Result<&NodeExecutionRecord, RecordError> {
        let entry = self
            .nodes
            .iter_mut()
            .find(|n| n.node_id == transition.node_id)
            .ok_or_else(|| RecordError::UnknownNode {
                id: transition.node_id.clone(),
            })?;

        // A terminal node entry is frozen; late transitions (e.g. a runner
        // finishing after the engine cancelled the node) are ignored.
        if entry.status.is_terminal() {
            return Ok(entry);
        }

        entry.status = transition.status;
        entry.attempts = entry.attempts.max(transition.attempt);
        if entry.started_at.is_none() {
            entry.started_at = Some(crate::utils::now());
        }
        if transition.status.is_terminal() {
            entry.finished_at = Some(crate::utils::now());
        }
        if let Some(outputs) = &transition.outputs {
            entry.outputs = Some(outputs.clone());
        }
        if let Some(error) = &transition.error {
            if transition.status == NodeStatus::Failed {
                entry.error = Some(error.to_string());
            }
        }
        Ok(entry)
    }

    /// Records a metric sample.
    pub fn record_metric(&mut self, metric: ExecutionMetric) {
        self.metrics.push(metric);
    }

    /// Records an error entry.
    pub fn record_error(&mut self, error: ExecutionErrorEntry) {
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(node_id: &str, status: NodeStatus, attempt: u32) -> NodeTransition {
        NodeTransition {
            node_id: node_id.to_string(),
            status,
            attempt,
            outputs: None,
            metrics: Vec::new(),
            error: None,
            retry_in: None,
        }
    }

    fn record_with_node(node_id: &str) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: Uuid::new_v4(),
            pipeline_id: "p".to_string(),
            pipeline_version: "1.0.0".parse().unwrap(),
            versions: VersionSnapshot::default(),
            status: ExecutionStatus::Pending,
            variables: ConfigMap::new(),
            nodes: vec![NodeExecutionRecord::new(node_id)],
            metrics: Vec::new(),
            errors: Vec::new(),
            checkpoint: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    #[test]
    fn test_status_monotonicity() {
        assert!(ExecutionStatus::Pending.can_transition(ExecutionStatus::Running));
        assert!(ExecutionStatus::Running.can_transition(ExecutionStatus::Paused));
        assert!(ExecutionStatus::Paused.can_transition(ExecutionStatus::Running));
        assert!(ExecutionStatus::Running.can_transition(ExecutionStatus::Failed));

        for terminal in [
            ExecutionStatus::Succeeded,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
        ] {
            assert!(!terminal.can_transition(ExecutionStatus::Running));
            assert!(!terminal.can_transition(ExecutionStatus::Pending));
        }
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut record = record_with_node("a");
        record.status = ExecutionStatus::Succeeded;

        let err = record.transition_status(ExecutionStatus::Running).unwrap_err();
        assert!(matches!(err, RecordError::IllegalTransition { .. }));
        assert_eq!(record.status, ExecutionStatus::Succeeded);
    }

    #[test]
    fn test_terminal_sets_finished_at() {
        let mut record = record_with_node("a");
        record.transition_status(ExecutionStatus::Running).unwrap();
        assert!(record.finished_at.is_none());

        record.transition_status(ExecutionStatus::Failed).unwrap();
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_apply_transition_tracks_attempts() {
        let mut record = record_with_node("a");
        record
            .apply_transition(&transition("a", NodeStatus::Validating, 1))
            .unwrap();
        record
            .apply_transition(&transition("a", NodeStatus::Retrying, 2))
            .unwrap();

        let entry = record.node("a").unwrap();
        assert_eq!(entry.status, NodeStatus::Retrying);
        assert_eq!(entry.attempts, 2);
        assert!(entry.started_at.is_some());
        assert!(entry.finished_at.is_none());
    }

    #[test]
    fn test_terminal_node_entry_is_frozen() {
        let mut record = record_with_node("a");
        record
            .apply_transition(&transition("a", NodeStatus::Succeeded, 1))
            .unwrap();
        record
            .apply_transition(&transition("a", NodeStatus::Running, 2))
            .unwrap();

        let entry = record.node("a").unwrap();
        assert_eq!(entry.status, NodeStatus::Succeeded);
        assert_eq!(entry.attempts, 1);
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut record = record_with_node("a");
        let err = record
            .apply_transition(&transition("ghost", NodeStatus::Running, 1))
            .unwrap_err();
        assert!(matches!(err, RecordError::UnknownNode { .. }));
    }
}
