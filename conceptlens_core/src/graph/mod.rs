//! Concept prerequisite graph
//!
//! A directed weighted graph over concept ids. Edge `A -> B` with weight `w`
//! means "A is a prerequisite of B" with strength `w` in [0, 1].
//!
//! `ConceptGraph` is an immutable value: patches build a new candidate graph
//! and hand it back only if it is still acyclic, so a half-applied patch is
//! never observable.

mod cycle;
mod patch;
mod suggestions;
mod validate;

pub use patch::{EdgeKey, GraphPatch, PatchOutcome};
pub use suggestions::{
    validate_edge_suggestions, validate_tag_suggestions, EdgeSuggestion, RejectedSuggestion,
    SuggestionReview, TagSuggestion,
};
pub use validate::{validate_graph, GraphValidation};

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{CycleError, GraphStructureError};
use crate::readiness::QuestionConceptMap;
use crate::types::{ConceptId, QuestionId};

/// Weight given to edges whose payload omits one.
pub const DEFAULT_EDGE_WEIGHT: f64 = 0.5;

fn default_edge_weight() -> f64 {
    DEFAULT_EDGE_WEIGHT
}

/// Concept node record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub id: ConceptId,
    pub label: String,
}

impl ConceptNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Prerequisite edge record: `source` is a prerequisite of `target`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteEdge {
    pub source: ConceptId,
    pub target: ConceptId,
    #[serde(default = "default_edge_weight")]
    pub weight: f64,
}

impl PrerequisiteEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, weight: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight,
        }
    }
}

/// Wire shape of a graph: `{nodes: [{id, label}], edges: [{source, target, weight}]}`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    #[serde(default)]
    pub nodes: Vec<ConceptNode>,
    #[serde(default)]
    pub edges: Vec<PrerequisiteEdge>,
}

impl GraphPayload {
    /// Derive a graph from the question-concept mapping alone
    ///
    /// Every mapped concept becomes a node labelled with its id. Concepts are
    /// ranked by the first question (in sorted question id order) that tags
    /// them, ties by concept id; concepts sharing a question are chained in
    /// rank order with [`DEFAULT_EDGE_WEIGHT`]. Edges always point to a
    /// higher rank, so the result is acyclic.
    pub fn from_mapping(question_concept_map: &QuestionConceptMap) -> Self {
        let mut concepts: Vec<&ConceptId> = question_concept_map.keys().collect();
        concepts.sort();

        let mut question_to_concepts: BTreeMap<&QuestionId, Vec<&ConceptId>> = BTreeMap::new();
        for &concept in &concepts {
            for tagged in &question_concept_map[concept] {
                let on_question = question_to_concepts.entry(&tagged.question_id).or_default();
                if !on_question.contains(&concept) {
                    on_question.push(concept);
                }
            }
        }

        let mut first_seen: HashMap<&ConceptId, usize> = HashMap::new();
        for (idx, on_question) in question_to_concepts.values().enumerate() {
            for &concept in on_question {
                first_seen.entry(concept).or_insert(idx);
            }
        }
        let rank = |c: &&ConceptId| (first_seen.get(c).copied().unwrap_or(usize::MAX), (*c).clone());

        let mut edge_set: BTreeSet<(ConceptId, ConceptId)> = BTreeSet::new();
        for on_question in question_to_concepts.values_mut() {
            if on_question.len() < 2 {
                continue;
            }
            on_question.sort_by_key(rank);
            for pair in on_question.windows(2) {
                edge_set.insert((pair[0].clone(), pair[1].clone()));
            }
        }

        Self {
            nodes: concepts
                .into_iter()
                .map(|c| ConceptNode::new(c.clone(), c.clone()))
                .collect(),
            edges: edge_set
                .into_iter()
                .map(|(source, target)| PrerequisiteEdge::new(source, target, DEFAULT_EDGE_WEIGHT))
                .collect(),
        }
    }
}

/// Validated concept graph
///
/// Node indices follow payload order, which is what topological ordering
/// uses to break ties.
#[derive(Clone, Debug)]
pub struct ConceptGraph {
    pub(crate) graph: DiGraph<ConceptNode, f64>,
    pub(crate) node_indices: IndexMap<ConceptId, NodeIndex>,
}

impl ConceptGraph {
    /// Build a graph from node and edge records
    ///
    /// Rejects duplicate node ids, edges with unknown endpoints, self-loops,
    /// duplicate edges and weights outside [0, 1]. Cycles are not rejected
    /// here; use [`validate`](Self::validate) or
    /// [`topological_order`](Self::topological_order) to detect them.
    pub fn build(
        nodes: Vec<ConceptNode>,
        edges: Vec<PrerequisiteEdge>,
    ) -> Result<Self, GraphStructureError> {
        if let Some(err) = structural_errors(&nodes, &edges).into_iter().next() {
            return Err(err);
        }
        Ok(Self::assemble(nodes, edges))
    }

    pub fn from_payload(payload: &GraphPayload) -> Result<Self, GraphStructureError> {
        Self::build(payload.nodes.clone(), payload.edges.clone())
    }

    /// Assemble without structural checks; callers guarantee validity
    pub(crate) fn assemble(nodes: Vec<ConceptNode>, edges: Vec<PrerequisiteEdge>) -> Self {
        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut node_indices = IndexMap::with_capacity(nodes.len());

        for node in nodes {
            let id = node.id.clone();
            let idx = graph.add_node(node);
            node_indices.insert(id, idx);
        }
        for edge in edges {
            let from = node_indices[&edge.source];
            let to = node_indices[&edge.target];
            graph.add_edge(from, to, edge.weight);
        }

        Self { graph, node_indices }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_indices.contains_key(id)
    }

    /// Human-readable label for a concept
    pub fn label(&self, id: &str) -> Option<&str> {
        self.node_indices
            .get(id)
            .map(|&idx| self.graph[idx].label.as_str())
    }

    /// Concept ids in payload order
    pub fn concept_ids(&self) -> impl Iterator<Item = &ConceptId> {
        self.node_indices.keys()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ConceptNode> {
        self.node_indices.values().map(move |&idx| &self.graph[idx])
    }

    /// Edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = PrerequisiteEdge> + '_ {
        self.graph.edge_references().map(move |e| PrerequisiteEdge {
            source: self.graph[e.source()].id.clone(),
            target: self.graph[e.target()].id.clone(),
            weight: *e.weight(),
        })
    }

    pub fn edge_weight(&self, source: &str, target: &str) -> Option<f64> {
        let from = *self.node_indices.get(source)?;
        let to = *self.node_indices.get(target)?;
        self.graph
            .find_edge(from, to)
            .map(|edge| self.graph[edge])
    }

    /// Direct prerequisites of `id` with their edge weights
    pub fn parents(&self, id: &str) -> Vec<(&ConceptId, f64)> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Concepts that list `id` as a direct prerequisite
    pub fn children(&self, id: &str) -> Vec<(&ConceptId, f64)> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<(&ConceptId, f64)> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };
        let mut found: Vec<(&ConceptId, f64)> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                (&self.graph[other].id, *e.weight())
            })
            .collect();
        found.sort_by(|a, b| a.0.cmp(b.0));
        found
    }

    /// One representative cycle, closed (first id repeated last)
    pub fn find_cycle(&self) -> Option<Vec<ConceptId>> {
        cycle::find_cycle(&self.graph).map(|path| self.ids_of(&path))
    }

    pub fn is_dag(&self) -> bool {
        cycle::find_cycle(&self.graph).is_none()
    }

    /// Topological order, ties broken by payload order
    ///
    /// Kahn's algorithm over a ready set keyed by node index, so among
    /// concepts whose prerequisites are all placed the earliest-declared one
    /// goes first.
    pub fn topological_order(&self) -> Result<Vec<ConceptId>, CycleError> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.edges_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(next) = ready.pop_first() {
            let idx = NodeIndex::new(next);
            order.push(self.graph[idx].id.clone());
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let child = edge.target().index();
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.insert(child);
                }
            }
        }

        if order.len() != self.graph.node_count() {
            let path = self.find_cycle().unwrap_or_default();
            return Err(CycleError::new(path));
        }
        Ok(order)
    }

    /// Serialize back to the wire shape accepted by [`build`](Self::build)
    pub fn to_payload(&self) -> GraphPayload {
        GraphPayload {
            nodes: self.nodes().cloned().collect(),
            edges: self.edges().collect(),
        }
    }

    /// Re-check structure and acyclicity
    pub fn validate(&self) -> GraphValidation {
        validate_graph(&self.to_payload())
    }

    /// Apply a batch of structural edits atomically
    ///
    /// See [`GraphPatch`] for the validation order. The returned outcome holds
    /// either the patched graph or a clone of `self`.
    pub fn apply_patch(&self, patch: &GraphPatch) -> PatchOutcome {
        patch::apply(self, patch)
    }

    fn ids_of(&self, path: &[NodeIndex]) -> Vec<ConceptId> {
        path.iter().map(|&idx| self.graph[idx].id.clone()).collect()
    }
}

impl PartialEq for ConceptGraph {
    fn eq(&self, other: &Self) -> bool {
        self.to_payload() == other.to_payload()
    }
}

/// Build a graph from a raw payload
pub fn build_graph(payload: &GraphPayload) -> crate::error::Result<ConceptGraph> {
    Ok(ConceptGraph::from_payload(payload)?)
}

/// Apply a patch; see [`ConceptGraph::apply_patch`]
pub fn apply_graph_patch(graph: &ConceptGraph, patch: &GraphPatch) -> PatchOutcome {
    graph.apply_patch(patch)
}

/// Every structural problem in a node/edge list, in payload order
pub(crate) fn structural_errors(
    nodes: &[ConceptNode],
    edges: &[PrerequisiteEdge],
) -> Vec<GraphStructureError> {
    let mut errors = Vec::new();

    let mut ids: HashSet<&str> = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !ids.insert(node.id.as_str()) {
            errors.push(GraphStructureError::DuplicateNode(node.id.clone()));
        }
    }

    let mut seen_edges: HashSet<(&str, &str)> = HashSet::with_capacity(edges.len());
    for edge in edges {
        for endpoint in [&edge.source, &edge.target] {
            if !ids.contains(endpoint.as_str()) {
                errors.push(GraphStructureError::DanglingEdge {
                    parent: edge.source.clone(),
                    child: edge.target.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        if !weight_in_range(edge.weight) {
            errors.push(GraphStructureError::WeightOutOfRange {
                parent: edge.source.clone(),
                child: edge.target.clone(),
                weight: edge.weight,
            });
        }
        if edge.source == edge.target {
            errors.push(GraphStructureError::SelfLoop(edge.source.clone()));
        } else if !seen_edges.insert((edge.source.as_str(), edge.target.as_str())) {
            errors.push(GraphStructureError::DuplicateEdge {
                parent: edge.source.clone(),
                child: edge.target.clone(),
            });
        }
    }

    errors
}

#[inline]
pub(crate) fn weight_in_range(weight: f64) -> bool {
    (0.0..=1.0).contains(&weight)
}
