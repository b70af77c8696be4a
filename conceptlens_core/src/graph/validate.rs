//! Validation of externally supplied graph payloads

use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{cycle, structural_errors, GraphPayload};
use crate::error::GraphStructureError;
use crate::types::{ConceptId, ValidationIssue};

/// Outcome of validating a graph payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    /// Closed cycle path when the graph is not a DAG
    pub cycle_path: Option<Vec<ConceptId>>,
}

/// Check a payload for structural problems and cycles
///
/// All structural problems are reported, not just the first. The cycle
/// search runs over the first occurrence of each node id and the edges whose
/// endpoints both exist, so a payload can be both malformed and cyclic.
pub fn validate_graph(payload: &GraphPayload) -> GraphValidation {
    let mut errors: Vec<ValidationIssue> = structural_errors(&payload.nodes, &payload.edges)
        .iter()
        .map(issue_for)
        .collect();

    let mut graph: DiGraph<&str, ()> = DiGraph::with_capacity(payload.nodes.len(), payload.edges.len());
    let mut indices = HashMap::with_capacity(payload.nodes.len());
    for node in &payload.nodes {
        indices
            .entry(node.id.as_str())
            .or_insert_with(|| graph.add_node(node.id.as_str()));
    }
    for edge in &payload.edges {
        if let (Some(&from), Some(&to)) = (
            indices.get(edge.source.as_str()),
            indices.get(edge.target.as_str()),
        ) {
            graph.update_edge(from, to, ());
        }
    }

    let cycle_path = cycle::find_cycle(&graph)
        .map(|path| path.iter().map(|&idx| graph[idx].to_string()).collect::<Vec<_>>());

    if let Some(path) = &cycle_path {
        errors.push(ValidationIssue::for_field(
            "edges",
            format!("Graph contains a cycle: {}", path.join(" -> ")),
        ));
    }

    GraphValidation {
        is_valid: errors.is_empty(),
        errors,
        cycle_path,
    }
}

fn issue_for(err: &GraphStructureError) -> ValidationIssue {
    let field = match err {
        GraphStructureError::DuplicateNode(_) => "nodes",
        _ => "edges",
    };
    ValidationIssue::for_field(field, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConceptNode, PrerequisiteEdge};

    fn nodes(ids: &[&str]) -> Vec<ConceptNode> {
        ids.iter().map(|id| ConceptNode::new(*id, *id)).collect()
    }

    #[test]
    fn test_valid_dag() {
        let payload = GraphPayload {
            nodes: nodes(&["A", "B"]),
            edges: vec![PrerequisiteEdge::new("A", "B", 0.5)],
        };
        let result = validate_graph(&payload);
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.cycle_path.is_none());
    }

    #[test]
    fn test_cycle_detection() {
        let payload = GraphPayload {
            nodes: nodes(&["A", "B", "C"]),
            edges: vec![
                PrerequisiteEdge::new("A", "B", 0.5),
                PrerequisiteEdge::new("B", "C", 0.5),
                PrerequisiteEdge::new("C", "A", 0.5),
            ],
        };
        let result = validate_graph(&payload);
        assert!(!result.is_valid);
        assert!(!result.errors.is_empty());
        let path = result.cycle_path.unwrap();
        assert_eq!(path.first(), path.last());
        for id in ["A", "B", "C"] {
            assert!(path.iter().any(|p| p == id));
        }
    }

    #[test]
    fn test_missing_edge_node() {
        let payload = GraphPayload {
            nodes: nodes(&["A"]),
            edges: vec![PrerequisiteEdge::new("A", "MISSING", 0.5)],
        };
        let result = validate_graph(&payload);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.message.contains("MISSING")));
    }

    #[test]
    fn test_collects_every_problem() {
        let payload = GraphPayload {
            nodes: nodes(&["A", "B", "A"]),
            edges: vec![
                PrerequisiteEdge::new("A", "B", 1.5),
                PrerequisiteEdge::new("B", "B", -0.1),
            ],
        };
        let result = validate_graph(&payload);
        assert!(!result.is_valid);
        // duplicate node, weight 1.5, weight -0.1, self-loop, and the self-loop cycle
        assert_eq!(result.errors.len(), 5);
        assert_eq!(result.cycle_path, Some(vec!["B".to_string(), "B".to_string()]));
    }
}
