//! Checkpoint snapshots.
//!
//! After every node reaches a terminal state the engine persists a snapshot
//! sufficient to resume the execution without re-running completed work:
//! terminal node statuses, captured outputs, the frontier at snapshot time,
//! and the overall status. A SHA-256 fingerprint over the canonical content
//! lets the store detect torn or stale snapshots on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::record::ExecutionStatus;
use crate::dsl::model::ConfigMap;
use crate::runtime::NodeStatus;

/// A resumable snapshot of one execution's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    /// The owning execution.
    pub execution_id: Uuid,
    /// Terminal node statuses at snapshot time.
    pub statuses: BTreeMap<String, NodeStatus>,
    /// Captured outputs of succeeded nodes.
    pub outputs: BTreeMap<String, ConfigMap>,
    /// Node ids that were ready to dispatch, sorted.
    pub frontier: Vec<String>,
    /// The overall status at snapshot time.
    pub status: ExecutionStatus,
    /// Fingerprint over the canonical snapshot content.
    pub fingerprint: String,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

/// The fingerprinted subset of a snapshot; `created_at` is excluded so
/// identical content always produces an identical fingerprint.
#[derive(Serialize)]
struct FingerprintContent<'a> {
    execution_id: &'a Uuid,
    statuses: &'a BTreeMap<String, NodeStatus>,
    outputs: &'a BTreeMap<String, ConfigMap>,
    frontier: &'a [String],
    status: &'a ExecutionStatus,
}

impl CheckpointSnapshot {
    /// Builds a snapshot, computing its fingerprint.
    #[must_use]
    pub fn new(
        execution_id: Uuid,
        statuses: BTreeMap<String, NodeStatus>,
        outputs: BTreeMap<String, ConfigMap>,
        mut frontier: Vec<String>,
        status: ExecutionStatus,
    ) -> Self {
        frontier.sort();
        let fingerprint = compute_fingerprint(&FingerprintContent {
            execution_id: &execution_id,
            statuses: &statuses,
            outputs: &outputs,
            frontier: &frontier,
            status: &status,
        });
        Self {
            execution_id,
            statuses,
            outputs,
            frontier,
            status,
            fingerprint,
            created_at: Utc::now(),
        }
    }

    /// Recomputes the fingerprint and compares it to the stored one.
    #[must_use]
    pub fn verify_fingerprint(&self) -> bool {
        let expected = compute_fingerprint(&FingerprintContent {
            execution_id: &self.execution_id,
            statuses: &self.statuses,
            outputs: &self.outputs,
            frontier: &self.frontier,
            status: &self.status,
        });
        expected == self.fingerprint
    }

    /// The node ids recorded as succeeded.
    #[must_use]
    pub fn completed_nodes(&self) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, s)| s.is_success())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

fn compute_fingerprint(content: &FingerprintContent<'_>) -> String {
    // BTreeMap keys serialize in sorted order, so the JSON is canonical.
    let canonical = serde_json::to_vec(content).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    hex::encode(digest)
}
