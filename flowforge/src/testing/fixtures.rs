//! Graph and service fixtures for tests.

use std::sync::Arc;

use crate::dsl::model::{ComponentRef, PipelineEdge, PipelineGraph, PipelineNode};
use crate::engine::{ExecutionService, InMemoryRecordStore};
use crate::events::CollectingEventSink;
use crate::executor::{CapabilityKey, Executor, ExecutorRegistry};
use crate::version::{ComponentKind, SemanticVersion, VersionCatalog, VersionRegistry};

/// The platform fixtures register executors under.
pub const TEST_PLATFORM: &str = "local";

/// The executor type fixtures use for every node.
pub const TEST_EXECUTOR: &str = "mock";

/// The component version fixtures register.
#[must_use]
pub fn test_version() -> SemanticVersion {
    SemanticVersion::new(1, 0, 0)
}

/// A node wired to the fixture executor.
#[must_use]
pub fn test_node(id: &str) -> PipelineNode {
    PipelineNode::new(id, "work", ComponentRef::new(TEST_EXECUTOR))
}

/// A linear chain `ids[0] -> ids[1] -> ...`.
#[must_use]
pub fn linear_graph(name: &str, ids: &[&str]) -> PipelineGraph {
    let mut graph = PipelineGraph::new(name);
    for id in ids {
        graph = graph.with_node(test_node(id));
    }
    for pair in ids.windows(2) {
        graph = graph.with_edge(PipelineEdge::new(pair[0], pair[1]));
    }
    graph
}

/// Independent nodes with no edges.
#[must_use]
pub fn independent_graph(name: &str, ids: &[&str]) -> PipelineGraph {
    let mut graph = PipelineGraph::new(name);
    for id in ids {
        graph = graph.with_node(test_node(id));
    }
    graph
}

/// Everything an engine test needs, wired together.
pub struct TestHarness {
    /// The service under test.
    pub service: ExecutionService,
    /// The backing store, for record assertions.
    pub store: Arc<InMemoryRecordStore>,
    /// The collecting sink, for event assertions.
    pub events: Arc<CollectingEventSink>,
}

/// Builds a harness with the given executor registered as the fixture
/// capability and a catalog releasing `1.0.0` for both component kinds.
#[must_use]
pub fn harness(executor: Arc<dyn Executor>) -> TestHarness {
    let executors = Arc::new(ExecutorRegistry::new());
    executors.register(
        CapabilityKey::new(TEST_PLATFORM, TEST_EXECUTOR, test_version()),
        executor,
    );

    let mut catalog = VersionCatalog::new();
    catalog.register(ComponentKind::Executor, TEST_EXECUTOR, test_version());
    catalog.register(ComponentKind::Subgraph, "standard", test_version());
    let versions = Arc::new(VersionRegistry::new(catalog));

    let store = Arc::new(InMemoryRecordStore::new());
    let events = Arc::new(CollectingEventSink::new());

    let service = ExecutionService::new(
        executors,
        versions,
        Arc::clone(&store) as Arc<dyn crate::engine::RecordStore>,
        Arc::clone(&events) as Arc<dyn crate::events::EventSink>,
    );

    TestHarness {
        service,
        store,
        events,
    }
}
