//! End-to-end engine tests: full executions driven through the control
//! surface against mock executors and the in-memory store.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::dsl::model::{
    ComponentRef, ConfigMap, ExecutionMode, ExecutionSettings, PipelineEdge, PipelineGraph,
    PipelineNode,
};
use crate::engine::record::ExecutionStatus;
use crate::engine::store::RecordStore;
use crate::engine::{ControlAction, ExecutionService, InMemoryRecordStore};
use crate::errors::FlowforgeError;
use crate::events::{CollectingEventSink, NoOpEventSink};
use crate::executor::{
    CapabilityKey, ExecutionError, Executor, ExecutorInvocation, ExecutorOutcome,
    ExecutorRegistry,
};
use crate::runtime::retry::{JitterStrategy, RetryPolicy};
use crate::runtime::NodeStatus;
use crate::testing::{
    harness, independent_graph, linear_graph, test_node, GatedExecutor, RecordingExecutor,
    SelectiveFailExecutor,
};
use crate::version::{ComponentKind, SemanticVersion, VersionCatalog, VersionRegistry};

fn variables(value: serde_json::Value) -> ConfigMap {
    value.as_object().cloned().unwrap_or_default()
}

fn settings(mode: ExecutionMode, concurrency: usize, continue_on_error: bool) -> ExecutionSettings {
    ExecutionSettings {
        mode,
        concurrency,
        continue_on_error,
    }
}

#[tokio::test]
async fn test_linear_success_runs_in_dependency_order() {
    let executor = Arc::new(RecordingExecutor::with_outputs(json!({ "ok": true })));
    let h = harness(Arc::clone(&executor) as Arc<dyn Executor>);
    let graph = linear_graph("chain", &["a", "b", "c"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();

    assert_eq!(status, ExecutionStatus::Succeeded);
    assert_eq!(executor.invocation_order(), vec!["a", "b", "c"]);

    let record = h.store.load_execution(id).await.unwrap().unwrap();
    for node_id in ["a", "b", "c"] {
        assert_eq!(record.node(node_id).unwrap().status, NodeStatus::Succeeded);
    }
    assert!(record.finished_at.is_some());
}

#[tokio::test]
async fn test_partial_failure_preserves_independent_results() {
    let executor = Arc::new(
        SelectiveFailExecutor::failing(&["a"]).with_outputs(json!({ "done": true })),
    );
    let h = harness(executor as Arc<dyn Executor>);
    let graph = independent_graph("islands", &["a", "b"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();

    assert_eq!(status, ExecutionStatus::Failed);
    let record = h.store.load_execution(id).await.unwrap().unwrap();
    assert_eq!(record.node("a").unwrap().status, NodeStatus::Failed);
    assert_eq!(record.node("b").unwrap().status, NodeStatus::Succeeded);
    assert!(record.node("a").unwrap().error.is_some());
    assert!(!record.errors.is_empty());
}

#[tokio::test]
async fn test_failed_node_skips_transitive_successors() {
    let executor = Arc::new(SelectiveFailExecutor::failing(&["a"]));
    let h = harness(executor as Arc<dyn Executor>);
    let graph = linear_graph("chain", &["a", "b", "c"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();

    assert_eq!(status, ExecutionStatus::Failed);
    let record = h.store.load_execution(id).await.unwrap().unwrap();
    assert_eq!(record.node("b").unwrap().status, NodeStatus::Skipped);
    assert_eq!(record.node("c").unwrap().status, NodeStatus::Skipped);
}

#[tokio::test]
async fn test_continue_on_error_runs_dependents() {
    let executor = Arc::new(SelectiveFailExecutor::failing(&["a"]));
    let h = harness(executor as Arc<dyn Executor>);
    let graph = linear_graph("chain", &["a", "b"])
        .with_settings(settings(ExecutionMode::Parallel, 4, true));

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();

    // The failed node still fails the execution; its dependent ran anyway.
    assert_eq!(status, ExecutionStatus::Failed);
    let record = h.store.load_execution(id).await.unwrap().unwrap();
    assert_eq!(record.node("b").unwrap().status, NodeStatus::Succeeded);
}

#[tokio::test]
async fn test_false_edge_condition_skips_target() {
    let executor = Arc::new(RecordingExecutor::with_outputs(json!({ "go": false })));
    let h = harness(Arc::clone(&executor) as Arc<dyn Executor>);
    let graph = PipelineGraph::new("cond")
        .with_node(test_node("a"))
        .with_node(test_node("b"))
        .with_edge(PipelineEdge::new("a", "b").with_condition("outputs.go == true"));

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();

    // A skipped branch is not a failure.
    assert_eq!(status, ExecutionStatus::Succeeded);
    let record = h.store.load_execution(id).await.unwrap().unwrap();
    assert_eq!(record.node("b").unwrap().status, NodeStatus::Skipped);
    assert_eq!(executor.calls_for("b"), 0);
}

#[tokio::test]
async fn test_true_edge_condition_runs_target() {
    let executor = Arc::new(RecordingExecutor::with_outputs(json!({ "go": true })));
    let h = harness(Arc::clone(&executor) as Arc<dyn Executor>);
    let graph = PipelineGraph::new("cond")
        .with_node(test_node("a"))
        .with_node(test_node("b"))
        .with_edge(PipelineEdge::new("a", "b").with_condition("outputs.go == true"));

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();

    assert_eq!(status, ExecutionStatus::Succeeded);
    assert_eq!(executor.calls_for("b"), 1);
}

#[tokio::test]
async fn test_parallel_dispatch_respects_concurrency_limit() {
    let executor =
        Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(20)));
    let h = harness(Arc::clone(&executor) as Arc<dyn Executor>);
    let graph = independent_graph("fan", &["a", "b", "c", "d", "e", "f"])
        .with_settings(settings(ExecutionMode::Parallel, 2, false));

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();

    assert_eq!(status, ExecutionStatus::Succeeded);
    assert!(executor.max_concurrency() <= 2);
    assert_eq!(executor.invocation_order().len(), 6);
}

#[tokio::test]
async fn test_sequential_mode_runs_one_at_a_time_ascending() {
    let executor =
        Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(5)));
    let h = harness(Arc::clone(&executor) as Arc<dyn Executor>);
    let graph = independent_graph("seq", &["c", "a", "b"])
        .with_settings(settings(ExecutionMode::Sequential, 8, false));

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();

    assert_eq!(status, ExecutionStatus::Succeeded);
    assert_eq!(executor.max_concurrency(), 1);
    // Sibling tie-break is ascending node id.
    assert_eq!(executor.invocation_order(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_retry_recovers_from_transient_failures() {
    let executor = Arc::new(crate::testing::FlakyExecutor::new(2));
    let h = harness(executor as Arc<dyn Executor>);
    let mut node = test_node("flaky");
    node.retry = RetryPolicy::default()
        .with_max_retries(3)
        .with_base_delay_ms(1)
        .with_jitter(JitterStrategy::None);
    let graph = PipelineGraph::new("retry").with_node(node);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();

    assert_eq!(status, ExecutionStatus::Succeeded);
    let record = h.store.load_execution(id).await.unwrap().unwrap();
    assert_eq!(record.node("flaky").unwrap().attempts, 3);
}

#[tokio::test]
async fn test_variables_flow_into_entry_nodes_and_downstream() {
    struct EchoExecutor;

    #[async_trait]
    impl Executor for EchoExecutor {
        async fn execute(
            &self,
            invocation: ExecutorInvocation,
        ) -> Result<ExecutorOutcome, ExecutionError> {
            Ok(ExecutorOutcome::with_outputs(invocation.inputs))
        }
    }

    let h = harness(Arc::new(EchoExecutor));
    let graph = linear_graph("echo", &["a", "b"]);

    let id = h
        .service
        .start_execution(&graph, variables(json!({ "seed": 42 })))
        .await
        .unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();

    assert_eq!(status, ExecutionStatus::Succeeded);
    let record = h.store.load_execution(id).await.unwrap().unwrap();
    let b_outputs = record.node("b").unwrap().outputs.clone().unwrap();
    assert_eq!(b_outputs.get("seed"), Some(&json!(42)));
}

#[tokio::test]
async fn test_checkpoints_written_as_nodes_settle() {
    let executor = Arc::new(RecordingExecutor::new());
    let h = harness(executor as Arc<dyn Executor>);
    let graph = linear_graph("chain", &["a", "b", "c"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    h.service.wait_until_settled(id).await.unwrap();

    // One checkpoint per terminal node, plus the final one.
    assert!(h.store.checkpoint_count(id) >= 3);
    let latest = h.store.load_latest_checkpoint(id).await.unwrap().unwrap();
    assert!(latest.verify_fingerprint());
    assert_eq!(latest.completed_nodes(), vec!["a", "b", "c"]);
    assert_eq!(latest.status, ExecutionStatus::Succeeded);
}

#[tokio::test]
async fn test_pause_parks_and_resume_finishes_without_rerunning() {
    let executor = Arc::new(GatedExecutor::gating(&["b"]));
    let h = harness(Arc::clone(&executor) as Arc<dyn Executor>);
    let graph = linear_graph("chain", &["a", "b", "c"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();

    // Wait until b is mid-execution, then pause.
    executor.wait_until_entered().await;
    h.service.control(id, ControlAction::Pause).await.unwrap();

    // The in-flight invocation finishes; c is never dispatched.
    executor.release();
    let status = h.service.wait_until_settled(id).await.unwrap();
    assert_eq!(status, ExecutionStatus::Paused);

    let record = h.store.load_execution(id).await.unwrap().unwrap();
    assert_eq!(record.node("a").unwrap().status, NodeStatus::Succeeded);
    assert_eq!(record.node("b").unwrap().status, NodeStatus::Succeeded);
    assert_eq!(record.node("c").unwrap().status, NodeStatus::Pending);
    assert_eq!(executor.calls_for("c"), 0);

    let checkpoint = h.store.load_latest_checkpoint(id).await.unwrap().unwrap();
    assert!(checkpoint.completed_nodes().contains(&"a"));
    assert!(checkpoint.completed_nodes().contains(&"b"));

    h.service.control(id, ControlAction::Resume).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();
    assert_eq!(status, ExecutionStatus::Succeeded);

    // Completed nodes were not re-executed after the resume.
    assert_eq!(executor.calls_for("a"), 1);
    assert_eq!(executor.calls_for("b"), 1);
    assert_eq!(executor.calls_for("c"), 1);
}

#[tokio::test]
async fn test_cancel_discards_in_flight_result_and_cancels_rest() {
    let executor = Arc::new(GatedExecutor::gating(&["b"]));
    let h = harness(Arc::clone(&executor) as Arc<dyn Executor>);
    let graph = linear_graph("chain", &["a", "b", "c"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    executor.wait_until_entered().await;

    h.service.control(id, ControlAction::Cancel).await.unwrap();
    executor.release();

    let status = h.service.wait_until_settled(id).await.unwrap();
    assert_eq!(status, ExecutionStatus::Cancelled);

    let record = h.store.load_execution(id).await.unwrap().unwrap();
    assert_eq!(record.node("a").unwrap().status, NodeStatus::Succeeded);
    // b's invocation completed, but its result was discarded.
    assert_eq!(record.node("b").unwrap().status, NodeStatus::Cancelled);
    assert!(record.node("b").unwrap().outputs.is_none());
    assert_eq!(record.node("c").unwrap().status, NodeStatus::Cancelled);
    assert_eq!(executor.calls_for("c"), 0);
}

#[tokio::test]
async fn test_cancel_while_paused_finalizes() {
    let executor = Arc::new(GatedExecutor::gating(&["b"]));
    let h = harness(Arc::clone(&executor) as Arc<dyn Executor>);
    let graph = linear_graph("chain", &["a", "b", "c"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    executor.wait_until_entered().await;
    h.service.control(id, ControlAction::Pause).await.unwrap();
    executor.release();
    assert_eq!(
        h.service.wait_until_settled(id).await.unwrap(),
        ExecutionStatus::Paused
    );

    h.service.control(id, ControlAction::Cancel).await.unwrap();
    assert_eq!(
        h.service.status(id).unwrap(),
        ExecutionStatus::Cancelled
    );

    let record = h.store.load_execution(id).await.unwrap().unwrap();
    assert_eq!(record.node("c").unwrap().status, NodeStatus::Cancelled);
}

#[tokio::test]
async fn test_illegal_control_actions_rejected() {
    let executor = Arc::new(RecordingExecutor::new());
    let h = harness(executor as Arc<dyn Executor>);
    let graph = linear_graph("chain", &["a"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    let status = h.service.wait_until_settled(id).await.unwrap();
    assert_eq!(status, ExecutionStatus::Succeeded);

    for action in [ControlAction::Pause, ControlAction::Resume, ControlAction::Cancel] {
        let err = h.service.control(id, action).await.unwrap_err();
        assert!(matches!(err, FlowforgeError::IllegalControl(_)));
    }

    let err = h
        .service
        .control(uuid::Uuid::new_v4(), ControlAction::Pause)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowforgeError::UnknownExecution(_)));
}

#[tokio::test]
async fn test_get_progress_reports_every_node() {
    let executor = Arc::new(RecordingExecutor::new());
    let h = harness(executor as Arc<dyn Executor>);
    let graph = linear_graph("chain", &["a", "b"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    h.service.wait_until_settled(id).await.unwrap();

    let progress = h.service.get_progress(id).unwrap();
    assert_eq!(progress.len(), 2);
    assert!(progress.iter().all(|p| p.status == NodeStatus::Succeeded));
    assert!(progress.iter().all(|p| p.attempts == 1));
}

#[tokio::test]
async fn test_events_cover_the_execution_lifecycle() {
    let executor = Arc::new(RecordingExecutor::new());
    let h = harness(executor as Arc<dyn Executor>);
    let graph = linear_graph("chain", &["a", "b"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    h.service.wait_until_settled(id).await.unwrap();

    assert_eq!(h.events.events_of_type("execution.started").len(), 1);
    assert!(!h.events.events_of_type("node.state_changed").is_empty());
    assert!(h.events.events_of_type("execution.checkpointed").len() >= 2);
    assert_eq!(h.events.events_of_type("execution.finished").len(), 1);
}

#[tokio::test]
async fn test_validation_failure_blocks_start() {
    let executor = Arc::new(RecordingExecutor::new());
    let h = harness(executor as Arc<dyn Executor>);
    let graph = PipelineGraph::new("selfie")
        .with_node(test_node("a"))
        .with_edge(PipelineEdge::new("a", "a"));

    let err = h
        .service
        .start_execution(&graph, ConfigMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowforgeError::Validation(_)));
}

#[tokio::test]
async fn test_unresolvable_version_blocks_start() {
    let executor = Arc::new(RecordingExecutor::new());
    let h = harness(executor as Arc<dyn Executor>);
    let graph = PipelineGraph::new("ghost").with_node(PipelineNode::new(
        "a",
        "work",
        ComponentRef::new("unregistered-executor"),
    ));

    let err = h
        .service
        .start_execution(&graph, ConfigMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowforgeError::Version(_)));
}

#[tokio::test]
async fn test_resolved_versions_frozen_into_record() {
    // Scenario: the registry offers 1.2.0 and 1.3.1. A latest-compatible
    // node gets 1.3.1; an exact 1.2.0 node gets 1.2.0 even though a newer
    // compatible version exists.
    let v120 = SemanticVersion::new(1, 2, 0);
    let v131 = SemanticVersion::new(1, 3, 1);

    let executors = Arc::new(ExecutorRegistry::new());
    for version in [v120, v131] {
        executors.register(
            CapabilityKey::new("local", "lambda", version),
            Arc::new(RecordingExecutor::new()) as Arc<dyn Executor>,
        );
    }

    let mut catalog = VersionCatalog::new();
    catalog.register(ComponentKind::Executor, "lambda", v120);
    catalog.register(ComponentKind::Executor, "lambda", v131);
    catalog.register(ComponentKind::Subgraph, "standard", SemanticVersion::new(1, 0, 0));
    let versions = Arc::new(VersionRegistry::new(catalog));

    let store = Arc::new(InMemoryRecordStore::new());
    let service = ExecutionService::new(
        executors,
        versions,
        Arc::clone(&store) as Arc<dyn crate::engine::RecordStore>,
        Arc::new(CollectingEventSink::new()) as Arc<dyn crate::events::EventSink>,
    );

    let graph = PipelineGraph::new("versions")
        .with_node(PipelineNode::new("latest", "work", ComponentRef::new("lambda")))
        .with_node(PipelineNode::new(
            "pinned",
            "work",
            ComponentRef::new("lambda").with_version("1.2.0".parse().unwrap()),
        ));

    let id = service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    service.wait_until_settled(id).await.unwrap();

    let record = store.load_execution(id).await.unwrap().unwrap();
    assert_eq!(record.versions.resolved_for("latest").unwrap().executor, v131);
    assert_eq!(record.versions.resolved_for("pinned").unwrap().executor, v120);
}

#[tokio::test]
async fn test_failed_execution_record_is_diagnosable() {
    let executor = Arc::new(SelectiveFailExecutor::failing(&["a"]));
    let h = harness(executor as Arc<dyn Executor>);
    let graph = linear_graph("audit", &["a", "b"]);

    let id = h.service.start_execution(&graph, ConfigMap::new()).await.unwrap();
    h.service.wait_until_settled(id).await.unwrap();

    let record = h.store.load_execution(id).await.unwrap().unwrap();
    // Enough to diagnose and re-run: resolved versions, statuses, errors.
    assert!(record.versions.resolved_for("a").is_some());
    assert!(record.node("a").unwrap().error.is_some());
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record.finished_at.is_some());
}

#[tokio::test]
async fn test_checkpoint_write_failure_fails_the_execution() {
    use crate::engine::checkpoint::CheckpointSnapshot;
    use crate::engine::record::{ExecutionErrorEntry, ExecutionMetric, NodeExecutionRecord};
    use crate::engine::store::{RecordStore, StoreError};
    use crate::engine::ExecutionRecord;
    use uuid::Uuid;

    /// Delegates everything to the in-memory store except checkpoint
    /// writes, which always fail.
    struct BrokenCheckpointStore {
        inner: InMemoryRecordStore,
    }

    #[async_trait]
    impl RecordStore for BrokenCheckpointStore {
        async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
            self.inner.create_execution(record).await
        }

        async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
            self.inner.update_execution(record).await
        }

        async fn update_node_execution(
            &self,
            execution_id: Uuid,
            node: &NodeExecutionRecord,
        ) -> Result<(), StoreError> {
            self.inner.update_node_execution(execution_id, node).await
        }

        async fn append_metric(
            &self,
            execution_id: Uuid,
            metric: &ExecutionMetric,
        ) -> Result<(), StoreError> {
            self.inner.append_metric(execution_id, metric).await
        }

        async fn append_error(
            &self,
            execution_id: Uuid,
            error: &ExecutionErrorEntry,
        ) -> Result<(), StoreError> {
            self.inner.append_error(execution_id, error).await
        }

        async fn save_checkpoint(
            &self,
            _snapshot: &CheckpointSnapshot,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("checkpoint volume offline".to_string()))
        }

        async fn load_latest_checkpoint(
            &self,
            execution_id: Uuid,
        ) -> Result<Option<CheckpointSnapshot>, StoreError> {
            self.inner.load_latest_checkpoint(execution_id).await
        }

        async fn load_execution(
            &self,
            execution_id: Uuid,
        ) -> Result<Option<ExecutionRecord>, StoreError> {
            self.inner.load_execution(execution_id).await
        }
    }

    let executors = Arc::new(ExecutorRegistry::new());
    executors.register(
        CapabilityKey::new("local", "mock", SemanticVersion::new(1, 0, 0)),
        Arc::new(RecordingExecutor::new()) as Arc<dyn Executor>,
    );
    let mut catalog = VersionCatalog::new();
    catalog.register(ComponentKind::Executor, "mock", SemanticVersion::new(1, 0, 0));
    catalog.register(ComponentKind::Subgraph, "standard", SemanticVersion::new(1, 0, 0));

    let store = Arc::new(BrokenCheckpointStore {
        inner: InMemoryRecordStore::new(),
    });
    let service = ExecutionService::new(
        executors,
        Arc::new(VersionRegistry::new(catalog)),
        Arc::clone(&store) as Arc<dyn crate::engine::RecordStore>,
        Arc::new(CollectingEventSink::new()) as Arc<dyn crate::events::EventSink>,
    );

    let id = service
        .start_execution(&linear_graph("doomed", &["a", "b"]), ConfigMap::new())
        .await
        .unwrap();
    let status = service.wait_until_settled(id).await.unwrap();

    // The lost checkpoint is fatal, never silently swallowed.
    assert_eq!(status, ExecutionStatus::Failed);
    let record = store.load_execution(id).await.unwrap().unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record
        .errors
        .iter()
        .any(|e| e.message.contains("Checkpoint write failed")));
}

#[tokio::test]
async fn test_service_with_noop_sink_still_completes() {
    let executors = Arc::new(ExecutorRegistry::new());
    executors.register(
        CapabilityKey::new("local", "mock", SemanticVersion::new(1, 0, 0)),
        Arc::new(RecordingExecutor::new()) as Arc<dyn Executor>,
    );
    let mut catalog = VersionCatalog::new();
    catalog.register(ComponentKind::Executor, "mock", SemanticVersion::new(1, 0, 0));
    catalog.register(ComponentKind::Subgraph, "standard", SemanticVersion::new(1, 0, 0));

    let store = Arc::new(InMemoryRecordStore::new());
    let service = ExecutionService::new(
        executors,
        Arc::new(VersionRegistry::new(catalog)),
        Arc::clone(&store) as Arc<dyn crate::engine::RecordStore>,
        Arc::new(NoOpEventSink) as Arc<dyn crate::events::EventSink>,
    );

    let id = service
        .start_execution(&linear_graph("quiet", &["a"]), ConfigMap::new())
        .await
        .unwrap();
    assert_eq!(
        service.wait_until_settled(id).await.unwrap(),
        ExecutionStatus::Succeeded
    );
}
