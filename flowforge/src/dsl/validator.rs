//! Structural validation of pipeline graphs.
//!
//! Duplicate ids and dangling edge references are found in a single pass,
//! then Kahn's algorithm peels zero-indegree nodes; whatever survives forms
//! the reported cycle.

use std::collections::{HashMap, HashSet, VecDeque};

use super::model::PipelineGraph;
use crate::errors::{ValidationError, ValidationErrorKind};

/// Validates a graph's structural invariants.
///
/// Accepts every cycle-free, non-empty, reference-consistent graph and
/// rejects everything else. No side effects.
pub fn validate(graph: &PipelineGraph) -> Result<(), ValidationError> {
    if graph.nodes.is_empty() {
        return Err(ValidationError::new(ValidationErrorKind::EmptyGraph));
    }

    let mut ids: HashSet<&str> = HashSet::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(ValidationError::new(ValidationErrorKind::DuplicateNodeId {
                id: node.id.clone(),
            }));
        }
    }

    let mut indegree: HashMap<&str, usize> =
        graph.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();

    for edge in &graph.edges {
        for endpoint in [edge.source.as_str(), edge.target.as_str()] {
            if !ids.contains(endpoint) {
                return Err(ValidationError::new(ValidationErrorKind::DanglingEdge {
                    source_id: edge.source.clone(),
                    target: edge.target.clone(),
                    missing: endpoint.to_string(),
                }));
            }
        }
        successors
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        if let Some(count) = indegree.get_mut(edge.target.as_str()) {
            *count += 1;
        }
    }

    // Kahn's: repeatedly remove zero-indegree nodes. Anything left over
    // after no further removals are possible sits on a cycle.
    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut removed = 0usize;

    while let Some(id) = queue.pop_front() {
        removed += 1;
        if let Some(targets) = successors.get(id) {
            for &target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(target);
                    }
                }
            }
        }
    }

    if removed < graph.nodes.len() {
        let mut path: Vec<String> = indegree
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(&id, _)| id.to_string())
            .collect();
        path.sort();
        return Err(ValidationError::new(ValidationErrorKind::CycleDetected {
            path,
        }));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::model::{ComponentRef, PipelineEdge, PipelineGraph, PipelineNode};

    fn node(id: &str) -> PipelineNode {
        PipelineNode::new(id, "work", ComponentRef::new("noop"))
    }

    fn edge(source: &str, target: &str) -> PipelineEdge {
        PipelineEdge::new(source, target)
    }

    #[test]
    fn test_empty_graph_rejected() {
        let graph = PipelineGraph::new("empty");
        let err = validate(&graph).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::EmptyGraph);
    }

    #[test]
    fn test_duplicate_node_id_rejected() {
        let graph = PipelineGraph::new("dup")
            .with_node(node("a"))
            .with_node(node("a"));
        let err = validate(&graph).unwrap_err();
        assert_eq!(
            err.kind,
            ValidationErrorKind::DuplicateNodeId { id: "a".to_string() }
        );
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let graph = PipelineGraph::new("dangling")
            .with_node(node("a"))
            .with_edge(edge("a", "ghost"));
        let err = validate(&graph).unwrap_err();
        assert!(matches!(
            err.kind,
            ValidationErrorKind::DanglingEdge { ref missing, .. } if missing == "ghost"
        ));
    }

    #[test]
    fn test_linear_chain_accepted() {
        let graph = PipelineGraph::new("linear")
            .with_node(node("a"))
            .with_node(node("b"))
            .with_node(node("c"))
            .with_edge(edge("a", "b"))
            .with_edge(edge("b", "c"));
        assert!(validate(&graph).is_ok());
    }

    #[test]
    fn test_diamond_accepted() {
        let graph = PipelineGraph::new("diamond")
            .with_node(node("a"))
            .with_node(node("b"))
            .with_node(node("c"))
            .with_node(node("d"))
            .with_edge(edge("a", "b"))
            .with_edge(edge("a", "c"))
            .with_edge(edge("b", "d"))
            .with_edge(edge("c", "d"));
        assert!(validate(&graph).is_ok());
    }

    #[test]
    fn test_self_cycle_names_the_node() {
        let graph = PipelineGraph::new("selfie")
            .with_node(node("a"))
            .with_edge(edge("a", "a"));
        let err = validate(&graph).unwrap_err();
        assert_eq!(
            err.kind,
            ValidationErrorKind::CycleDetected { path: vec!["a".to_string()] }
        );
    }

    #[test]
    fn test_cycle_reports_participants_only() {
        // a feeds a b<->c cycle; d hangs off the cycle.
        let graph = PipelineGraph::new("cyclic")
            .with_node(node("a"))
            .with_node(node("b"))
            .with_node(node("c"))
            .with_node(node("d"))
            .with_edge(edge("a", "b"))
            .with_edge(edge("b", "c"))
            .with_edge(edge("c", "b"))
            .with_edge(edge("c", "d"));
        let err = validate(&graph).unwrap_err();
        match err.kind {
            ValidationErrorKind::CycleDetected { path } => {
                // d is downstream of the cycle and never becomes removable,
                // so it is reported along with the cycle members; a is not.
                assert!(path.contains(&"b".to_string()));
                assert!(path.contains(&"c".to_string()));
                assert!(!path.contains(&"a".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_disconnected_nodes_accepted() {
        let graph = PipelineGraph::new("islands")
            .with_node(node("a"))
            .with_node(node("b"));
        assert!(validate(&graph).is_ok());
    }
}
