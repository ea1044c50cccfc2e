//! The execution engine.
//!
//! One engine task owns one execution: it recomputes the frontier,
//! dispatches ready nodes (strictly one at a time in sequential mode,
//! bounded-concurrently in parallel mode), folds node transitions into the
//! record, and writes a checkpoint after every node settles. All mutable
//! per-execution state lives inside this task — node runners communicate
//! exclusively through the transition channel, so record and checkpoint
//! writes are serialized through a single writer.

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::checkpoint::CheckpointSnapshot;
use super::frontier::{compute_frontier, evaluate_gate, gather_inputs, Gate};
use super::record::{
    ExecutionErrorEntry, ExecutionMetric, ExecutionRecord, ExecutionStatus,
};
use super::store::RecordStore;
use crate::compiler::CompiledGraph;
use crate::dsl::model::{ConfigMap, ExecutionMode};
use crate::errors::{CheckpointWriteError, FlowforgeError};
use crate::events::EventSink;
use crate::executor::ExecutorRegistry;
use crate::runtime::node_runner::{NodeRunner, NodeTransition};
use crate::runtime::{CancelSignal, NodeStatus};

/// One node's progress, as reported by the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProgress {
    /// The node id.
    pub node_id: String,
    /// The node's current state.
    pub status: NodeStatus,
    /// Executor invocation attempts so far.
    pub attempts: u32,
}

/// State shared between an engine task and its control handle.
#[derive(Clone)]
pub(crate) struct SharedExecutionState {
    pub cancel: CancelSignal,
    pub pause: Arc<AtomicBool>,
    pub status: Arc<watch::Sender<ExecutionStatus>>,
    pub progress: Arc<RwLock<BTreeMap<String, NodeProgress>>>,
}

impl SharedExecutionState {
    pub(crate) fn new() -> Self {
        let (status, _) = watch::channel(ExecutionStatus::Pending);
        Self {
            cancel: CancelSignal::new(),
            pause: Arc::new(AtomicBool::new(false)),
            status: Arc::new(status),
            progress: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

/// Drives one execution of one compiled graph.
pub struct ExecutionEngine {
    graph: Arc<CompiledGraph>,
    executors: Arc<ExecutorRegistry>,
    store: Arc<dyn RecordStore>,
    events: Arc<dyn EventSink>,
    shared: SharedExecutionState,
}

impl ExecutionEngine {
    pub(crate) fn new(
        graph: Arc<CompiledGraph>,
        executors: Arc<ExecutorRegistry>,
        store: Arc<dyn RecordStore>,
        events: Arc<dyn EventSink>,
        shared: SharedExecutionState,
    ) -> Self {
        Self {
            graph,
            executors,
            store,
            events,
            shared,
        }
    }

    /// Drives the execution until it is terminal or paused.
    ///
    /// `resumed` selects the `execution.resumed` event over
    /// `execution.started`; the drive logic itself is identical — terminal
    /// node entries in the record are honored, so a succeeded node is never
    /// re-executed.
    pub(crate) async fn drive(
        &self,
        mut record: ExecutionRecord,
        resumed: bool,
    ) -> Result<ExecutionRecord, FlowforgeError> {
        let execution_id = record.execution_id;
        let settings = self.graph.settings().clone();
        let limit = match settings.mode {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel => settings.concurrency.max(1),
        };

        // Rebuild in-task state from the record. Non-terminal entries (a
        // pause can leave none, but a crash-recovered record might) restart
        // from Pending.
        let mut statuses: HashMap<String, NodeStatus> = HashMap::new();
        let mut outputs: HashMap<String, ConfigMap> = HashMap::new();
        for entry in &mut record.nodes {
            if !entry.status.is_terminal() {
                entry.status = NodeStatus::Pending;
            }
            statuses.insert(entry.node_id.clone(), entry.status);
            if let Some(captured) = &entry.outputs {
                outputs.insert(entry.node_id.clone(), captured.clone());
            }
        }

        record
            .transition_status(ExecutionStatus::Running)
            .map_err(|e| FlowforgeError::Internal(e.to_string()))?;
        self.store.update_execution(&record).await?;
        self.publish_status(ExecutionStatus::Running);
        self.sync_progress(&record);

        let event = if resumed { "execution.resumed" } else { "execution.started" };
        self.events.try_emit(
            event,
            Some(json!({
                "execution_id": execution_id,
                "pipeline": self.graph.pipeline_id(),
                "mode": settings.mode.to_string(),
            })),
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<NodeTransition>();
        let mut in_flight: FuturesUnordered<tokio::task::JoinHandle<NodeStatus>> =
            FuturesUnordered::new();

        loop {
            while let Ok(transition) = rx.try_recv() {
                self.handle_transition(&mut record, &mut statuses, &mut outputs, transition)
                    .await?;
            }

            let cancelled = self.shared.cancel.is_cancelled();
            let paused = self.shared.pause.load(Ordering::SeqCst);

            if !cancelled && !paused {
                // Apply cascading skips and dispatch up to the limit. The
                // inner loop runs until a pass makes no progress, so a
                // skip that unblocks further skips settles immediately.
                loop {
                    let mut progressed = false;
                    for node_id in compute_frontier(&self.graph, &statuses) {
                        match evaluate_gate(
                            &self.graph,
                            &statuses,
                            &outputs,
                            &node_id,
                            settings.continue_on_error,
                        ) {
                            Gate::Skip(reason) => {
                                debug!(node_id = %node_id, reason = %reason, "Skipping node");
                                let transition = synthetic_transition(
                                    &node_id,
                                    NodeStatus::Skipped,
                                );
                                self.handle_transition(
                                    &mut record,
                                    &mut statuses,
                                    &mut outputs,
                                    transition,
                                )
                                .await?;
                                progressed = true;
                            }
                            Gate::Ready if in_flight.len() < limit => {
                                let node = Arc::clone(self.graph.node(&node_id).ok_or_else(
                                    || {
                                        FlowforgeError::Internal(format!(
                                            "compiled graph lost node '{node_id}'"
                                        ))
                                    },
                                )?);
                                let key = self.graph.capability_key(&node);
                                let executor =
                                    self.executors.lookup(&key).ok_or_else(|| {
                                        FlowforgeError::Internal(format!(
                                            "capability '{key}' vanished after compilation"
                                        ))
                                    })?;
                                let inputs = gather_inputs(
                                    &self.graph,
                                    &outputs,
                                    &record.variables,
                                    &node_id,
                                );

                                // Reserve the slot so the frontier does not
                                // re-pick the node before its first
                                // transition arrives.
                                statuses.insert(node_id.clone(), NodeStatus::Validating);

                                let runner = NodeRunner::new(
                                    execution_id,
                                    node,
                                    executor,
                                    self.shared.cancel.clone(),
                                    tx.clone(),
                                );
                                in_flight.push(tokio::spawn(runner.run(inputs)));
                                progressed = true;
                            }
                            Gate::Ready => {}
                        }
                    }
                    if !progressed {
                        break;
                    }
                }
            }

            let all_terminal = statuses.values().all(NodeStatus::is_terminal);
            if all_terminal && in_flight.is_empty() {
                break;
            }

            if in_flight.is_empty() {
                if cancelled {
                    let remaining: Vec<String> = statuses
                        .iter()
                        .filter(|(_, s)| !s.is_terminal())
                        .map(|(id, _)| id.clone())
                        .collect();
                    for node_id in remaining {
                        let transition =
                            synthetic_transition(&node_id, NodeStatus::Cancelled);
                        self.handle_transition(
                            &mut record,
                            &mut statuses,
                            &mut outputs,
                            transition,
                        )
                        .await?;
                    }
                    continue;
                }

                if paused {
                    record
                        .transition_status(ExecutionStatus::Paused)
                        .map_err(|e| FlowforgeError::Internal(e.to_string()))?;
                    self.write_checkpoint(&mut record, &statuses, &outputs).await?;
                    self.store.update_execution(&record).await?;
                    self.publish_status(ExecutionStatus::Paused);
                    self.events.try_emit(
                        "execution.paused",
                        Some(json!({ "execution_id": execution_id })),
                    );
                    return Ok(record);
                }

                return Err(FlowforgeError::Internal(format!(
                    "execution {execution_id} deadlocked: no runnable nodes and none in flight"
                )));
            }

            tokio::select! {
                Some(transition) = rx.recv() => {
                    self.handle_transition(&mut record, &mut statuses, &mut outputs, transition)
                        .await?;
                }
                Some(joined) = in_flight.next() => {
                    if let Err(join_error) = joined {
                        return Err(FlowforgeError::Internal(format!(
                            "node task aborted: {join_error}"
                        )));
                    }
                }
            }
        }

        let any_failed = statuses.values().any(|s| *s == NodeStatus::Failed);
        let final_status = if self.shared.cancel.is_cancelled() {
            ExecutionStatus::Cancelled
        } else if any_failed {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Succeeded
        };

        record
            .transition_status(final_status)
            .map_err(|e| FlowforgeError::Internal(e.to_string()))?;
        self.write_checkpoint(&mut record, &statuses, &outputs).await?;
        self.store.update_execution(&record).await?;
        self.publish_status(final_status);
        self.events.try_emit(
            "execution.finished",
            Some(json!({
                "execution_id": execution_id,
                "status": final_status.to_string(),
            })),
        );

        Ok(record)
    }

    /// Folds one node transition into the record, the store, the progress
    /// board, and the event stream. The single entry point for all
    /// per-execution mutation.
    async fn handle_transition(
        &self,
        record: &mut ExecutionRecord,
        statuses: &mut HashMap<String, NodeStatus>,
        outputs: &mut HashMap<String, ConfigMap>,
        transition: NodeTransition,
    ) -> Result<(), FlowforgeError> {
        let current = statuses
            .get(&transition.node_id)
            .copied()
            .unwrap_or_default();
        if current.is_terminal() {
            // A runner that lost a cancellation race can still report; the
            // terminal state stands.
            return Ok(());
        }

        statuses.insert(transition.node_id.clone(), transition.status);
        if transition.status == NodeStatus::Succeeded {
            if let Some(captured) = &transition.outputs {
                outputs.insert(transition.node_id.clone(), captured.clone());
            }
        }

        let entry = record
            .apply_transition(&transition)
            .map_err(|e| FlowforgeError::Internal(e.to_string()))?
            .clone();
        self.store
            .update_node_execution(record.execution_id, &entry)
            .await?;

        self.shared.progress.write().insert(
            entry.node_id.clone(),
            NodeProgress {
                node_id: entry.node_id.clone(),
                status: entry.status,
                attempts: entry.attempts,
            },
        );

        if transition.status == NodeStatus::Retrying {
            self.events.try_emit(
                "node.retrying",
                Some(json!({
                    "execution_id": record.execution_id,
                    "node": transition.node_id,
                    "attempt": transition.attempt,
                    "delay_ms": transition.retry_in.map(|d| d.as_millis() as u64),
                    "error": transition.error.as_ref().map(ToString::to_string),
                })),
            );
        } else {
            self.events.try_emit(
                "node.state_changed",
                Some(json!({
                    "execution_id": record.execution_id,
                    "node": transition.node_id,
                    "status": transition.status.to_string(),
                    "attempt": transition.attempt,
                })),
            );
        }

        for sample in &transition.metrics {
            let metric = ExecutionMetric {
                node_id: Some(transition.node_id.clone()),
                name: sample.name.clone(),
                value: sample.value,
                unit: sample.unit.clone(),
                recorded_at: crate::utils::now(),
            };
            record.record_metric(metric.clone());
            self.store.append_metric(record.execution_id, &metric).await?;
        }

        if transition.status == NodeStatus::Failed {
            if let Some(error) = &transition.error {
                let entry = ExecutionErrorEntry {
                    node_id: Some(transition.node_id.clone()),
                    message: error.to_string(),
                    recorded_at: crate::utils::now(),
                };
                record.record_error(entry.clone());
                self.store.append_error(record.execution_id, &entry).await?;
            }
        }

        if transition.status.is_terminal() {
            self.write_checkpoint(record, statuses, outputs).await?;
            self.events.try_emit(
                "execution.checkpointed",
                Some(json!({
                    "execution_id": record.execution_id,
                    "fingerprint": record
                        .checkpoint
                        .as_ref()
                        .map(|c| c.fingerprint.clone()),
                })),
            );
        }

        Ok(())
    }

    /// Builds and persists a checkpoint snapshot. A failed write is fatal:
    /// silently losing checkpoint state would break resume correctness.
    async fn write_checkpoint(
        &self,
        record: &mut ExecutionRecord,
        statuses: &HashMap<String, NodeStatus>,
        outputs: &HashMap<String, ConfigMap>,
    ) -> Result<(), FlowforgeError> {
        let terminal: BTreeMap<String, NodeStatus> = statuses
            .iter()
            .filter(|(_, s)| s.is_terminal())
            .map(|(id, s)| (id.clone(), *s))
            .collect();
        let captured: BTreeMap<String, ConfigMap> = outputs
            .iter()
            .map(|(id, o)| (id.clone(), o.clone()))
            .collect();
        let frontier = compute_frontier(&self.graph, statuses);

        let snapshot = CheckpointSnapshot::new(
            record.execution_id,
            terminal,
            captured,
            frontier,
            record.status,
        );
        if let Err(store_error) = self.store.save_checkpoint(&snapshot).await {
            warn!(
                execution_id = %record.execution_id,
                error = %store_error,
                "Checkpoint write failed; aborting execution"
            );
            return Err(CheckpointWriteError::new(
                record.execution_id.to_string(),
                store_error,
            )
            .into());
        }
        record.checkpoint = Some(snapshot);
        Ok(())
    }

    fn publish_status(&self, status: ExecutionStatus) {
        // send_replace updates the value even when nobody subscribes.
        let _ = self.shared.status.send_replace(status);
    }

    fn sync_progress(&self, record: &ExecutionRecord) {
        let mut board = self.shared.progress.write();
        board.clear();
        for entry in &record.nodes {
            board.insert(
                entry.node_id.clone(),
                NodeProgress {
                    node_id: entry.node_id.clone(),
                    status: entry.status,
                    attempts: entry.attempts,
                },
            );
        }
    }
}

fn synthetic_transition(node_id: &str, status: NodeStatus) -> NodeTransition {
    NodeTransition {
        node_id: node_id.to_string(),
        status,
        attempt: 0,
        outputs: None,
        metrics: Vec::new(),
        error: None,
        retry_in: None,
    }
}

// Engine behavior is exercised end to end in `integration_tests`.
