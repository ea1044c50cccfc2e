//! The immutable compiled graph.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dsl::condition::Condition;
use crate::dsl::model::{
    ConfigMap, ExecutionSettings, IoDeclaration, ResourceRequirements, SecretRef,
};
use crate::executor::CapabilityKey;
use crate::runtime::retry::RetryPolicy;
use crate::version::{ResolvedVersions, SemanticVersion};

/// One node with its resolved versions and merged effective configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledNode {
    /// The node id.
    pub id: String,
    /// The node's type tag.
    pub node_type: String,
    /// The executor type, the second component of the capability key.
    pub executor_type: String,
    /// The versions frozen for this compilation.
    pub resolved: ResolvedVersions,
    /// Pipeline defaults overlaid by node config.
    pub effective_config: ConfigMap,
    /// Declared inputs.
    pub inputs: Vec<IoDeclaration>,
    /// Declared outputs.
    pub outputs: Vec<IoDeclaration>,
    /// Retry policy.
    pub retry: RetryPolicy,
    /// Resource requirements.
    pub resources: ResourceRequirements,
    /// Secret references.
    pub secrets: Vec<SecretRef>,
}

/// An edge with its condition parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledEdge {
    /// The upstream node id.
    pub source: String,
    /// The downstream node id.
    pub target: String,
    /// The parsed condition, if the edge declared one.
    pub condition: Option<Condition>,
}

/// The executable plan: topologically ordered nodes, adjacency, entry and
/// exit sets, and per-node effective configuration.
///
/// Immutable once built; shared behind an [`Arc`] and safe for concurrent
/// readers.
#[derive(Debug)]
pub struct CompiledGraph {
    pipeline_id: String,
    version: SemanticVersion,
    platform: String,
    settings: ExecutionSettings,
    /// Nodes in deterministic topological order (ties by ascending id).
    nodes: Vec<Arc<CompiledNode>>,
    index: HashMap<String, usize>,
    successors: HashMap<String, Vec<String>>,
    predecessors: HashMap<String, Vec<String>>,
    incoming: HashMap<String, Vec<CompiledEdge>>,
    entry_nodes: Vec<String>,
    exit_nodes: Vec<String>,
}

impl CompiledGraph {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        pipeline_id: String,
        version: SemanticVersion,
        platform: String,
        settings: ExecutionSettings,
        nodes: Vec<Arc<CompiledNode>>,
        successors: HashMap<String, Vec<String>>,
        predecessors: HashMap<String, Vec<String>>,
        incoming: HashMap<String, Vec<CompiledEdge>>,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        let entry_nodes = nodes
            .iter()
            .filter(|n| predecessors.get(&n.id).map_or(true, Vec::is_empty))
            .map(|n| n.id.clone())
            .collect();
        let exit_nodes = nodes
            .iter()
            .filter(|n| successors.get(&n.id).map_or(true, Vec::is_empty))
            .map(|n| n.id.clone())
            .collect();

        Self {
            pipeline_id,
            version,
            platform,
            settings,
            nodes,
            index,
            successors,
            predecessors,
            incoming,
            entry_nodes,
            exit_nodes,
        }
    }

    /// The pipeline id.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// The declared pipeline version.
    #[must_use]
    pub const fn version(&self) -> SemanticVersion {
        self.version
    }

    /// The target platform.
    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// The execution settings.
    #[must_use]
    pub const fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Nodes in topological order.
    #[must_use]
    pub fn nodes(&self) -> &[Arc<CompiledNode>] {
        &self.nodes
    }

    /// Node ids in topological order.
    #[must_use]
    pub fn topo_order(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Arc<CompiledNode>> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// The ids of nodes with no predecessors.
    #[must_use]
    pub fn entry_nodes(&self) -> &[String] {
        &self.entry_nodes
    }

    /// The ids of nodes with no successors.
    #[must_use]
    pub fn exit_nodes(&self) -> &[String] {
        &self.exit_nodes
    }

    /// Direct successors of a node.
    #[must_use]
    pub fn successors(&self, id: &str) -> &[String] {
        self.successors.get(id).map_or(&[], Vec::as_slice)
    }

    /// Direct predecessors of a node.
    #[must_use]
    pub fn predecessors(&self, id: &str) -> &[String] {
        self.predecessors.get(id).map_or(&[], Vec::as_slice)
    }

    /// Incoming edges of a node, conditions parsed.
    #[must_use]
    pub fn incoming_edges(&self, id: &str) -> &[CompiledEdge] {
        self.incoming.get(id).map_or(&[], Vec::as_slice)
    }

    /// The capability key the engine uses to look up a node's executor.
    #[must_use]
    pub fn capability_key(&self, node: &CompiledNode) -> CapabilityKey {
        CapabilityKey::new(
            self.platform.clone(),
            node.executor_type.clone(),
            node.resolved.executor,
        )
    }

    /// The number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
