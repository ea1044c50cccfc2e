//! The control surface the core exposes to callers.
//!
//! [`ExecutionService`] turns a declarative graph into a running execution:
//! validate, resolve versions against the registry snapshot, compile, then
//! hand the plan to an engine task. Live executions are controlled through
//! `pause` / `resume` / `cancel` and observed through `get_progress`. Each
//! execution's mutable state is owned by its engine task; the service only
//! holds the shared handles.

use dashmap::DashMap;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::engine::{ExecutionEngine, NodeProgress, SharedExecutionState};
use super::record::{ExecutionRecord, ExecutionStatus, VersionSnapshot};
use super::store::RecordStore;
use crate::compiler::{compile, CompiledGraph};
use crate::dsl::model::{ConfigMap, PipelineGraph};
use crate::dsl::validate;
use crate::errors::FlowforgeError;
use crate::events::EventSink;
use crate::executor::ExecutorRegistry;
use crate::runtime::NodeStatus;
use crate::version::{ResolvedVersions, VersionRegistry, VersionResolver};

/// A control action on a live execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Stop dispatching; in-flight nodes finish, then the execution parks.
    Pause,
    /// Reload the latest checkpoint and continue dispatching.
    Resume,
    /// Cancel the execution; non-terminal nodes become `Cancelled`.
    Cancel,
}

struct ExecutionHandle {
    graph: Arc<CompiledGraph>,
    shared: SharedExecutionState,
}

/// The entry point for starting and controlling executions.
pub struct ExecutionService {
    executors: Arc<ExecutorRegistry>,
    versions: Arc<VersionRegistry>,
    store: Arc<dyn RecordStore>,
    events: Arc<dyn EventSink>,
    executions: DashMap<Uuid, ExecutionHandle>,
}

impl ExecutionService {
    /// Creates a service over the given collaborators.
    #[must_use]
    pub fn new(
        executors: Arc<ExecutorRegistry>,
        versions: Arc<VersionRegistry>,
        store: Arc<dyn RecordStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            executors,
            versions,
            store,
            events,
            executions: DashMap::new(),
        }
    }

    /// Validates, resolves, and compiles a declarative graph into an
    /// executable plan plus the frozen version snapshot.
    ///
    /// Any failure here is synchronous and blocks execution start entirely.
    pub fn prepare(
        &self,
        graph: &PipelineGraph,
    ) -> Result<(Arc<CompiledGraph>, VersionSnapshot), FlowforgeError> {
        validate(graph)?;

        let resolver = VersionResolver::new(self.versions.snapshot());
        let mut resolutions: HashMap<String, ResolvedVersions> = HashMap::new();
        let mut snapshot: BTreeMap<String, ResolvedVersions> = BTreeMap::new();
        for node in &graph.nodes {
            let resolved = resolver.resolve_node(node)?;
            resolutions.insert(node.id.clone(), resolved);
            snapshot.insert(node.id.clone(), resolved);
        }

        let compiled = compile(graph, &resolutions, &self.executors)?;
        Ok((Arc::new(compiled), VersionSnapshot::new(snapshot)))
    }

    /// Starts an execution of a declarative graph and returns its id.
    ///
    /// The resolved versions are frozen into the record before the engine
    /// starts; a registry reload mid-run cannot change them.
    pub async fn start_execution(
        &self,
        graph: &PipelineGraph,
        variables: ConfigMap,
    ) -> Result<Uuid, FlowforgeError> {
        let (compiled, snapshot) = self.prepare(graph)?;

        let record = ExecutionRecord::new(&compiled, snapshot, variables);
        let execution_id = record.execution_id;
        self.store.create_execution(&record).await?;

        let shared = SharedExecutionState::new();
        {
            let mut board = shared.progress.write();
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

        self.executions.insert(
            execution_id,
            ExecutionHandle {
                graph: Arc::clone(&compiled),
                shared: shared.clone(),
            },
        );

        info!(
            execution_id = %execution_id,
            pipeline = %compiled.pipeline_id(),
            "Starting execution"
        );
        self.spawn_engine(compiled, shared, record, false);
        Ok(execution_id)
    }

    /// Applies a control action to a live execution.
    pub async fn control(
        &self,
        execution_id: Uuid,
        action: ControlAction,
    ) -> Result<(), FlowforgeError> {
        // Copy the handle state out so no map guard is held across awaits.
        let (graph, shared) = {
            let handle = self
                .executions
                .get(&execution_id)
                .ok_or_else(|| FlowforgeError::UnknownExecution(execution_id.to_string()))?;
            (Arc::clone(&handle.graph), handle.shared.clone())
        };
        let status = *shared.status.borrow();

        match action {
            ControlAction::Pause => {
                if status != ExecutionStatus::Running {
                    return Err(FlowforgeError::IllegalControl(format!(
                        "cannot pause an execution in status '{status}'"
                    )));
                }
                shared.pause.store(true, Ordering::SeqCst);
                Ok(())
            }
            ControlAction::Cancel => {
                if status.is_terminal() {
                    return Err(FlowforgeError::IllegalControl(format!(
                        "cannot cancel an execution in status '{status}'"
                    )));
                }
                shared.cancel.cancel("operator cancel request");
                if status == ExecutionStatus::Paused {
                    // No engine task is running; finalize here.
                    self.finalize_cancelled_paused(execution_id, &shared).await?;
                }
                Ok(())
            }
            ControlAction::Resume => {
                if status != ExecutionStatus::Paused {
                    return Err(FlowforgeError::IllegalControl(format!(
                        "cannot resume an execution in status '{status}'"
                    )));
                }

                let record = self
                    .store
                    .load_execution(execution_id)
                    .await?
                    .ok_or_else(|| {
                        FlowforgeError::UnknownExecution(execution_id.to_string())
                    })?;
                let record = apply_checkpoint(record, &self.store, execution_id).await?;

                shared.pause.store(false, Ordering::SeqCst);
                // Leave `Paused` immediately so settle-waiters do not read
                // the stale parked status while the engine task spins up.
                let _ = shared.status.send_replace(ExecutionStatus::Pending);
                self.spawn_engine(graph, shared, record, true);
                Ok(())
            }
        }
    }

    /// Returns per-node progress for an execution, ascending node id.
    pub fn get_progress(
        &self,
        execution_id: Uuid,
    ) -> Result<Vec<NodeProgress>, FlowforgeError> {
        let handle = self
            .executions
            .get(&execution_id)
            .ok_or_else(|| FlowforgeError::UnknownExecution(execution_id.to_string()))?;
        let progress = handle.shared.progress.read().values().cloned().collect();
        Ok(progress)
    }

    /// Returns the current overall status.
    pub fn status(&self, execution_id: Uuid) -> Result<ExecutionStatus, FlowforgeError> {
        let handle = self
            .executions
            .get(&execution_id)
            .ok_or_else(|| FlowforgeError::UnknownExecution(execution_id.to_string()))?;
        let status = *handle.shared.status.borrow();
        Ok(status)
    }

    /// Waits until the execution reaches a terminal status (or `Paused`,
    /// which also stops the engine task) and returns it.
    pub async fn wait_until_settled(
        &self,
        execution_id: Uuid,
    ) -> Result<ExecutionStatus, FlowforgeError> {
        let mut receiver = {
            let handle = self.executions.get(&execution_id).ok_or_else(|| {
                FlowforgeError::UnknownExecution(execution_id.to_string())
            })?;
            handle.shared.status.subscribe()
        };

        loop {
            let status = *receiver.borrow();
            if status.is_terminal() || status == ExecutionStatus::Paused {
                return Ok(status);
            }
            if receiver.changed().await.is_err() {
                return Ok(*receiver.borrow());
            }
        }
    }

    fn spawn_engine(
        &self,
        graph: Arc<CompiledGraph>,
        shared: SharedExecutionState,
        record: ExecutionRecord,
        resumed: bool,
    ) {
        let engine = ExecutionEngine::new(
            graph,
            Arc::clone(&self.executors),
            Arc::clone(&self.store),
            Arc::clone(&self.events),
            shared.clone(),
        );
        let store = Arc::clone(&self.store);
        let execution_id = record.execution_id;

        tokio::spawn(async move {
            if let Err(engine_error) = engine.drive(record, resumed).await {
                error!(
                    execution_id = %execution_id,
                    error = %engine_error,
                    "Execution failed fatally"
                );
                // Best effort: leave a diagnosable record behind.
                if let Ok(Some(mut record)) = store.load_execution(execution_id).await {
                    let _ = record.transition_status(ExecutionStatus::Failed);
                    record.record_error(super::record::ExecutionErrorEntry {
                        node_id: None,
                        message: engine_error.to_string(),
                        recorded_at: crate::utils::now(),
                    });
                    let _ = store.update_execution(&record).await;
                }
                let _ = shared.status.send_replace(ExecutionStatus::Failed);
            }
        });
    }

    /// Finalizes a paused execution after a cancel: no engine task exists,
    /// so the service marks the remaining nodes and the record directly.
    async fn finalize_cancelled_paused(
        &self,
        execution_id: Uuid,
        shared: &SharedExecutionState,
    ) -> Result<(), FlowforgeError> {
        let mut record = self
            .store
            .load_execution(execution_id)
            .await?
            .ok_or_else(|| FlowforgeError::UnknownExecution(execution_id.to_string()))?;

        for entry in &mut record.nodes {
            if !entry.status.is_terminal() {
                entry.status = NodeStatus::Cancelled;
                entry.finished_at = Some(crate::utils::now());
            }
            shared.progress.write().insert(
                entry.node_id.clone(),
                NodeProgress {
                    node_id: entry.node_id.clone(),
                    status: entry.status,
                    attempts: entry.attempts,
                },
            );
        }
        record
            .transition_status(ExecutionStatus::Cancelled)
            .map_err(|e| FlowforgeError::Internal(e.to_string()))?;
        self.store.update_execution(&record).await?;
        let _ = shared.status.send_replace(ExecutionStatus::Cancelled);
        self.events.try_emit(
            "execution.finished",
            Some(json!({
                "execution_id": execution_id,
                "status": ExecutionStatus::Cancelled.to_string(),
            })),
        );
        Ok(())
    }
}

/// Overlays the latest checkpoint onto a loaded record before resuming.
///
/// The checkpoint is authoritative for terminal statuses and captured
/// outputs; a fingerprint mismatch means the stored snapshot is torn and
/// resuming from it would be unsound.
async fn apply_checkpoint(
    mut record: ExecutionRecord,
    store: &Arc<dyn RecordStore>,
    execution_id: Uuid,
) -> Result<ExecutionRecord, FlowforgeError> {
    let Some(checkpoint) = store.load_latest_checkpoint(execution_id).await? else {
        return Ok(record);
    };

    if !checkpoint.verify_fingerprint() {
        return Err(FlowforgeError::Internal(format!(
            "checkpoint for execution {execution_id} failed fingerprint verification"
        )));
    }

    for entry in &mut record.nodes {
        if let Some(status) = checkpoint.statuses.get(&entry.node_id) {
            entry.status = *status;
        }
        if let Some(outputs) = checkpoint.outputs.get(&entry.node_id) {
            entry.outputs = Some(outputs.clone());
        }
    }
    record.checkpoint = Some(checkpoint);
    Ok(record)
}
