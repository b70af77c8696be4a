//! Screening of suggested prerequisite edges and concept tags
//!
//! Suggestions (from an assistant or a colleague) are checked against the
//! current graph before an instructor reviews them. Accepted edges are kept
//! in a working copy so that suggestions which only form a cycle together are
//! still caught.

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{cycle, default_edge_weight, weight_in_range, ConceptGraph, ConceptNode};
use crate::types::{ConceptId, QuestionId};

/// A proposed prerequisite edge
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeSuggestion {
    pub source: ConceptId,
    pub target: ConceptId,
    #[serde(default = "default_edge_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl EdgeSuggestion {
    pub fn new(source: impl Into<String>, target: impl Into<String>, weight: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight,
            rationale: None,
        }
    }
}

/// A proposed tag of a question with a concept
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagSuggestion {
    pub question_id: QuestionId,
    pub concept_id: ConceptId,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl TagSuggestion {
    pub fn new(question_id: impl Into<String>, concept_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            question_id: question_id.into(),
            concept_id: concept_id.into(),
            confidence,
            rationale: None,
        }
    }
}

/// A suggestion that failed screening, with the reason
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectedSuggestion<S = EdgeSuggestion> {
    pub suggestion: S,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuggestionReview<S = EdgeSuggestion> {
    pub accepted: Vec<S>,
    pub rejected: Vec<RejectedSuggestion<S>>,
}

impl<S> Default for SuggestionReview<S> {
    fn default() -> Self {
        Self {
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<S: Clone> SuggestionReview<S> {
    fn record(&mut self, suggestion: &S, verdict: Result<(), String>) {
        match verdict {
            Ok(()) => self.accepted.push(suggestion.clone()),
            Err(reason) => self.rejected.push(RejectedSuggestion {
                suggestion: suggestion.clone(),
                reason,
            }),
        }
    }
}

/// Screen suggestions in order against `graph`
pub fn validate_edge_suggestions(
    graph: &ConceptGraph,
    suggestions: &[EdgeSuggestion],
) -> SuggestionReview {
    let mut working = graph.graph.clone();
    let mut review = SuggestionReview::default();
    let mut seen: HashSet<(String, String)> = graph
        .edges()
        .map(|e| (e.source, e.target))
        .collect();

    for suggestion in suggestions {
        match screen(graph, &working, &seen, suggestion) {
            Err(reason) => review.rejected.push(RejectedSuggestion {
                suggestion: suggestion.clone(),
                reason,
            }),
            Ok((from, to)) => {
                working.add_edge(from, to, suggestion.weight);
                seen.insert((suggestion.source.clone(), suggestion.target.clone()));
                review.accepted.push(suggestion.clone());
            }
        }
    }

    tracing::debug!(
        "Edge suggestions screened: {} accepted, {} rejected",
        review.accepted.len(),
        review.rejected.len()
    );
    review
}

/// Screen concept-tag suggestions in order against the graph's concepts
///
/// Rejects an empty concept id, a concept missing from a non-empty graph, a
/// repeat of an already accepted `(question, concept)` pair, and confidence
/// outside [0, 1].
pub fn validate_tag_suggestions(
    graph: &ConceptGraph,
    suggestions: &[TagSuggestion],
) -> SuggestionReview<TagSuggestion> {
    let mut review = SuggestionReview::default();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for suggestion in suggestions {
        let verdict = screen_tag(graph, &seen, suggestion);
        if verdict.is_ok() {
            seen.insert((suggestion.question_id.as_str(), suggestion.concept_id.as_str()));
        }
        review.record(suggestion, verdict);
    }

    tracing::debug!(
        "Tag suggestions screened: {} accepted, {} rejected",
        review.accepted.len(),
        review.rejected.len()
    );
    review
}

fn screen_tag(
    graph: &ConceptGraph,
    seen: &HashSet<(&str, &str)>,
    s: &TagSuggestion,
) -> Result<(), String> {
    let concept = s.concept_id.as_str();
    if concept.is_empty() {
        return Err("Empty concept_id".to_string());
    }
    if graph.node_count() > 0 && !graph.contains(concept) {
        return Err(format!("Unknown concept_id '{}' not in catalog", concept));
    }
    if seen.contains(&(s.question_id.as_str(), concept)) {
        return Err(format!("Duplicate concept_id '{}'", concept));
    }
    if !(0.0..=1.0).contains(&s.confidence) {
        return Err(format!("Confidence {} out of [0, 1] range", s.confidence));
    }
    Ok(())
}

fn screen(
    graph: &ConceptGraph,
    working: &DiGraph<ConceptNode, f64>,
    seen: &HashSet<(String, String)>,
    s: &EdgeSuggestion,
) -> Result<(NodeIndex, NodeIndex), String> {
    if s.source == s.target {
        return Err("Self-loop: source and target are the same".to_string());
    }
    let from = *graph
        .node_indices
        .get(&s.source)
        .ok_or_else(|| format!("Source node '{}' does not exist in graph", s.source))?;
    let to = *graph
        .node_indices
        .get(&s.target)
        .ok_or_else(|| format!("Target node '{}' does not exist in graph", s.target))?;
    if seen.contains(&(s.source.clone(), s.target.clone())) {
        return Err("Duplicate: edge already exists in graph".to_string());
    }
    if !weight_in_range(s.weight) {
        return Err(format!("Edge weight {} out of [0, 1] range", s.weight));
    }

    // Adding from -> to closes a cycle iff to already reaches from
    if let Some(back) = cycle::path_between(working, to, from) {
        let mut path = vec![s.source.clone()];
        path.extend(back.iter().map(|&idx| working[idx].id.clone()));
        return Err(format!("Would create cycle: {}", path.join(" -> ")));
    }

    Ok((from, to))
}
