//! Compilation of a validated, version-resolved graph into an executable
//! plan.
//!
//! Compilation has no side effects and is repeatable: the same inputs
//! always produce a structurally identical [`CompiledGraph`]. The
//! topological order is deterministic, with ties broken by ascending node
//! id — the same rule the scheduler uses within a frontier.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

use super::compiled::{CompiledEdge, CompiledGraph, CompiledNode};
use super::config::merge_effective_config;
use crate::dsl::condition::Condition;
use crate::dsl::model::PipelineGraph;
use crate::executor::{CapabilityKey, ExecutorRegistry};
use crate::version::{ResolvedVersions, SemanticVersion};

/// Error raised when a validated graph cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    /// A node's resolved executor has no registered implementation.
    #[error("No capability registered for {platform}/{executor_type}@{version} (node '{node_id}')")]
    UnregisteredCapability {
        /// The node whose executor is missing.
        node_id: String,
        /// The platform component of the key.
        platform: String,
        /// The executor type component of the key.
        executor_type: String,
        /// The resolved version component of the key.
        version: SemanticVersion,
    },

    /// An edge condition expression failed to parse.
    #[error("Edge '{source_id}' -> '{target}' has an invalid condition: {detail}")]
    InvalidCondition {
        /// The edge's source id.
        source_id: String,
        /// The edge's target id.
        target: String,
        /// The parse failure.
        detail: String,
    },

    /// A node is missing from the resolved-versions map.
    #[error("No resolved versions supplied for node '{node_id}'")]
    MissingResolution {
        /// The unresolved node.
        node_id: String,
    },

    /// The graph could not be topologically ordered.
    ///
    /// Only reachable when compile is handed a graph that skipped
    /// validation.
    #[error("Graph is not acyclic; run validation first")]
    UnsortableGraph,
}

/// Compiles a validated graph and its resolved versions into an immutable
/// executable plan.
pub fn compile(
    graph: &PipelineGraph,
    resolutions: &HashMap<String, ResolvedVersions>,
    executors: &ExecutorRegistry,
) -> Result<CompiledGraph, CompilationError> {
    let mut successors: HashMap<String, Vec<String>> = HashMap::new();
    let mut predecessors: HashMap<String, Vec<String>> = HashMap::new();
    let mut incoming: HashMap<String, Vec<CompiledEdge>> = HashMap::new();

    for edge in &graph.edges {
        let condition = edge
            .condition
            .as_deref()
            .map(Condition::parse)
            .transpose()
            .map_err(|e| CompilationError::InvalidCondition {
                source_id: edge.source.clone(),
                target: edge.target.clone(),
                detail: e.detail,
            })?;

        successors
            .entry(edge.source.clone())
            .or_default()
            .push(edge.target.clone());
        predecessors
            .entry(edge.target.clone())
            .or_default()
            .push(edge.source.clone());
        incoming.entry(edge.target.clone()).or_default().push(CompiledEdge {
            source: edge.source.clone(),
            target: edge.target.clone(),
            condition,
        });
    }

    // Deterministic adjacency regardless of edge declaration order; the
    // indegree counts come from the deduplicated predecessor lists so a
    // repeated edge cannot skew them.
    for targets in successors.values_mut() {
        targets.sort();
        targets.dedup();
    }
    for sources in predecessors.values_mut() {
        sources.sort();
        sources.dedup();
    }
    let mut indegree: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .map(|n| {
            let count = predecessors.get(&n.id).map_or(0, Vec::len);
            (n.id.as_str(), count)
        })
        .collect();

    // Kahn's with a sorted ready set: ascending node id breaks ties.
    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut order: Vec<String> = Vec::with_capacity(graph.nodes.len());

    while let Some(&id) = ready.iter().next() {
        ready.remove(id);
        order.push(id.to_string());
        if let Some(targets) = successors.get(id) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        // Borrow from the original node list so the str
                        // outlives the loop.
                        if let Some(node) = graph.node(target) {
                            ready.insert(node.id.as_str());
                        }
                    }
                }
            }
        }
    }

    if order.len() != graph.nodes.len() {
        return Err(CompilationError::UnsortableGraph);
    }

    let mut nodes: Vec<Arc<CompiledNode>> = Vec::with_capacity(order.len());
    for id in &order {
        let declared = graph
            .node(id)
            .ok_or(CompilationError::UnsortableGraph)?;
        let resolved = resolutions
            .get(id)
            .copied()
            .ok_or_else(|| CompilationError::MissingResolution {
                node_id: id.clone(),
            })?;

        let key = CapabilityKey::new(
            graph.platform.clone(),
            declared.executor.name.clone(),
            resolved.executor,
        );
        if !executors.contains(&key) {
            return Err(CompilationError::UnregisteredCapability {
                node_id: id.clone(),
                platform: key.platform,
                executor_type: key.executor_type,
                version: key.version,
            });
        }

        nodes.push(Arc::new(CompiledNode {
            id: declared.id.clone(),
            node_type: declared.node_type.clone(),
            executor_type: declared.executor.name.clone(),
            resolved,
            effective_config: merge_effective_config(&graph.defaults, &declared.config),
            inputs: declared.inputs.clone(),
            outputs: declared.outputs.clone(),
            retry: declared.retry,
            resources: declared.resources,
            secrets: declared.secrets.clone(),
        }));
    }

    Ok(CompiledGraph::new(
        graph.id.clone(),
        graph.version,
        graph.platform.clone(),
        graph.settings.clone(),
        nodes,
        successors,
        predecessors,
        incoming,
    ))
}
