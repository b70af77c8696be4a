//! Atomic graph patches
//!
//! A patch is validated in full before anything is applied:
//!
//! 1. Node and edge level checks (duplicate ids, unknown removals, bad
//!    weights, self-loops). Any failure returns the original graph with
//!    every error found.
//! 2. Edits are applied to a copy of the payload: edge removals, node
//!    removals (with their incident edges), node additions, then edge
//!    additions. Edge endpoints that do not exist yet are created with the
//!    id as label; adding an existing edge updates its weight.
//! 3. The candidate is searched for a cycle. If one exists the candidate is
//!    dropped and the original graph comes back with the cycle path.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{weight_in_range, ConceptGraph, ConceptNode, PrerequisiteEdge};
use crate::types::{ConceptId, ValidationIssue};

/// Identifies an edge to remove
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source: ConceptId,
    pub target: ConceptId,
}

impl EdgeKey {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Batch of structural edits applied as one transaction
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphPatch {
    pub add_nodes: Vec<ConceptNode>,
    pub remove_nodes: Vec<ConceptId>,
    pub add_edges: Vec<PrerequisiteEdge>,
    pub remove_edges: Vec<EdgeKey>,
}

impl GraphPatch {
    pub fn is_empty(&self) -> bool {
        self.add_nodes.is_empty()
            && self.remove_nodes.is_empty()
            && self.add_edges.is_empty()
            && self.remove_edges.is_empty()
    }
}

/// Result of applying a patch
#[derive(Clone, Debug)]
pub struct PatchOutcome {
    /// Patched graph on success, otherwise the unchanged original
    pub graph: ConceptGraph,
    pub is_dag: bool,
    pub cycle_path: Option<Vec<ConceptId>>,
    pub errors: Vec<ValidationIssue>,
}

impl PatchOutcome {
    pub fn is_applied(&self) -> bool {
        self.errors.is_empty()
    }

    fn rejected(original: &ConceptGraph, errors: Vec<ValidationIssue>) -> Self {
        Self {
            graph: original.clone(),
            is_dag: original.is_dag(),
            cycle_path: None,
            errors,
        }
    }
}

pub(super) fn apply(original: &ConceptGraph, patch: &GraphPatch) -> PatchOutcome {
    let errors = check(original, patch);
    if !errors.is_empty() {
        tracing::warn!("Graph patch rejected with {} error(s)", errors.len());
        return PatchOutcome::rejected(original, errors);
    }

    let candidate = stage(original, patch);

    if let Some(path) = candidate.find_cycle() {
        tracing::warn!("Graph patch rolled back, cycle {}", path.join(" -> "));
        return PatchOutcome {
            graph: original.clone(),
            is_dag: false,
            errors: vec![ValidationIssue::for_field(
                "edges",
                format!("Patch would create a cycle: {}", path.join(" -> ")),
            )],
            cycle_path: Some(path),
        };
    }

    tracing::debug!(
        "Graph patch applied: {} nodes, {} edges",
        candidate.node_count(),
        candidate.edge_count()
    );
    PatchOutcome {
        graph: candidate,
        is_dag: true,
        cycle_path: None,
        errors: Vec::new(),
    }
}

fn check(original: &ConceptGraph, patch: &GraphPatch) -> Vec<ValidationIssue> {
    let mut errors = Vec::new();

    let mut added: HashSet<&str> = HashSet::new();
    for node in &patch.add_nodes {
        if original.contains(&node.id) || !added.insert(node.id.as_str()) {
            errors.push(ValidationIssue::for_field(
                "add_nodes",
                format!("Node '{}' already exists", node.id),
            ));
        }
    }

    for id in &patch.remove_nodes {
        if !original.contains(id) {
            errors.push(ValidationIssue::for_field(
                "remove_nodes",
                format!("Node '{}' does not exist", id),
            ));
        }
    }

    for edge in &patch.add_edges {
        if edge.source == edge.target {
            errors.push(ValidationIssue::for_field(
                "add_edges",
                format!("Self-loop on '{}' is not allowed", edge.source),
            ));
        }
        if !weight_in_range(edge.weight) {
            errors.push(ValidationIssue::for_field(
                "add_edges",
                format!(
                    "Edge {} -> {} weight {} out of [0, 1] range",
                    edge.source, edge.target, edge.weight
                ),
            ));
        }
    }

    for key in &patch.remove_edges {
        if original.edge_weight(&key.source, &key.target).is_none() {
            errors.push(ValidationIssue::for_field(
                "remove_edges",
                format!("Edge {} -> {} does not exist", key.source, key.target),
            ));
        }
    }

    errors
}

fn stage(original: &ConceptGraph, patch: &GraphPatch) -> ConceptGraph {
    let mut payload = original.to_payload();

    let dropped_edges: HashSet<(&str, &str)> = patch
        .remove_edges
        .iter()
        .map(|k| (k.source.as_str(), k.target.as_str()))
        .collect();
    let dropped_nodes: HashSet<&str> = patch.remove_nodes.iter().map(String::as_str).collect();

    payload.edges.retain(|e| {
        !dropped_edges.contains(&(e.source.as_str(), e.target.as_str()))
            && !dropped_nodes.contains(e.source.as_str())
            && !dropped_nodes.contains(e.target.as_str())
    });
    payload.nodes.retain(|n| !dropped_nodes.contains(n.id.as_str()));
    payload.nodes.extend(patch.add_nodes.iter().cloned());

    let mut known: HashSet<ConceptId> = payload.nodes.iter().map(|n| n.id.clone()).collect();
    for edge in &patch.add_edges {
        for endpoint in [&edge.source, &edge.target] {
            if known.insert(endpoint.clone()) {
                payload.nodes.push(ConceptNode::new(endpoint.clone(), endpoint.clone()));
            }
        }
        match payload
            .edges
            .iter_mut()
            .find(|e| e.source == edge.source && e.target == edge.target)
        {
            Some(existing) => existing.weight = edge.weight,
            None => payload.edges.push(edge.clone()),
        }
    }

    ConceptGraph::assemble(payload.nodes, payload.edges)
}
