//! Frontier computation and node gating.
//!
//! The frontier is the set of pending nodes whose predecessors are all
//! terminal. Gating decides, for each frontier member, whether it is ready
//! to dispatch or must be skipped (failed or skipped predecessor, false
//! edge condition).

use std::collections::HashMap;

use crate::compiler::CompiledGraph;
use crate::dsl::model::ConfigMap;
use crate::runtime::NodeStatus;

/// The dispatch decision for a pending node whose predecessors are all
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// All conditions hold; the node may run.
    Ready,
    /// The node must be skipped, with the reason.
    Skip(String),
}

/// Evaluates the gate for one node. Callers guarantee every predecessor is
/// terminal.
#[must_use]
pub fn evaluate_gate(
    graph: &CompiledGraph,
    statuses: &HashMap<String, NodeStatus>,
    outputs: &HashMap<String, ConfigMap>,
    node_id: &str,
    continue_on_error: bool,
) -> Gate {
    for pred in graph.predecessors(node_id) {
        match statuses.get(pred).copied().unwrap_or_default() {
            NodeStatus::Skipped => {
                return Gate::Skip(format!("predecessor '{pred}' was skipped"));
            }
            NodeStatus::Failed | NodeStatus::Cancelled if !continue_on_error => {
                return Gate::Skip(format!("predecessor '{pred}' failed"));
            }
            _ => {}
        }
    }

    for edge in graph.incoming_edges(node_id) {
        if let Some(condition) = &edge.condition {
            let source_outputs = outputs.get(&edge.source);
            let empty = ConfigMap::new();
            let satisfied = condition.evaluate(source_outputs.unwrap_or(&empty));
            if !satisfied {
                return Gate::Skip(format!(
                    "condition on edge '{}' -> '{node_id}' evaluated false",
                    edge.source
                ));
            }
        }
    }

    Gate::Ready
}

/// Returns the pending nodes whose predecessors are all terminal, in
/// ascending node id order.
#[must_use]
pub fn compute_frontier(
    graph: &CompiledGraph,
    statuses: &HashMap<String, NodeStatus>,
) -> Vec<String> {
    let mut frontier: Vec<String> = graph
        .nodes()
        .iter()
        .filter(|node| statuses.get(&node.id).copied().unwrap_or_default() == NodeStatus::Pending)
        .filter(|node| {
            graph.predecessors(&node.id).iter().all(|pred| {
                statuses
                    .get(pred)
                    .copied()
                    .unwrap_or_default()
                    .is_terminal()
            })
        })
        .map(|node| node.id.clone())
        .collect();
    frontier.sort();
    frontier
}

/// Builds a node's resolved inputs: execution variables for entry nodes,
/// otherwise the merged outputs of its predecessors (ascending id order, so
/// later ids win on key collisions — deterministic, documented).
#[must_use]
pub fn gather_inputs(
    graph: &CompiledGraph,
    outputs: &HashMap<String, ConfigMap>,
    variables: &ConfigMap,
    node_id: &str,
) -> ConfigMap {
    let predecessors = graph.predecessors(node_id);
    if predecessors.is_empty() {
        return variables.clone();
    }

    let mut inputs = ConfigMap::new();
    for pred in predecessors {
        if let Some(pred_outputs) = outputs.get(pred) {
            for (key, value) in pred_outputs {
                inputs.insert(key.clone(), value.clone());
            }
        }
    }
    inputs
}
