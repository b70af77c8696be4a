//! Shared fixtures for conceptlens-core integration tests.

#![allow(dead_code)]

use conceptlens_core::{
    ConceptNode, GraphPayload, PipelineInputs, PrerequisiteEdge, QuestionConceptMap, ScoreMatrix,
    TaggedQuestion,
};

/// Four-concept calculus graph:
/// limits -> derivatives -> {chain rule, integrals}
pub fn calculus_graph() -> GraphPayload {
    GraphPayload {
        nodes: vec![
            ConceptNode::new("C_limits", "Limits"),
            ConceptNode::new("C_derivatives", "Derivatives"),
            ConceptNode::new("C_chain_rule", "Chain Rule"),
            ConceptNode::new("C_integrals", "Integrals"),
        ],
        edges: vec![
            PrerequisiteEdge::new("C_limits", "C_derivatives", 0.7),
            PrerequisiteEdge::new("C_derivatives", "C_chain_rule", 0.8),
            PrerequisiteEdge::new("C_derivatives", "C_integrals", 0.5),
        ],
    }
}

/// Three students over three questions, all out of 10
pub fn calculus_scores() -> ScoreMatrix {
    let mut scores = ScoreMatrix::new();
    let rows = [
        ("S001", [8.0, 5.0, 9.0]),
        ("S002", [6.0, 3.0, 7.0]),
        ("S003", [10.0, 10.0, 10.0]),
    ];
    for (student, values) in rows {
        for (question, value) in ["Q1", "Q2", "Q3"].iter().zip(values) {
            scores.insert(student, *question, value);
        }
    }
    for question in ["Q1", "Q2", "Q3"] {
        scores.set_max_score(question, 10.0);
    }
    scores
}

pub fn calculus_mapping() -> QuestionConceptMap {
    mapping(&[
        ("C_derivatives", &[("Q1", 1.0), ("Q3", 0.8)]),
        ("C_limits", &[("Q1", 0.5)]),
        ("C_integrals", &[("Q2", 1.0)]),
        ("C_chain_rule", &[("Q3", 1.0)]),
    ])
}

pub fn calculus_inputs() -> PipelineInputs {
    PipelineInputs {
        scores: calculus_scores(),
        question_concept_map: calculus_mapping(),
        graph: calculus_graph(),
    }
}

pub fn mapping(entries: &[(&str, &[(&str, f64)])]) -> QuestionConceptMap {
    entries
        .iter()
        .map(|(concept, questions)| {
            (
                concept.to_string(),
                questions
                    .iter()
                    .map(|(q, w)| TaggedQuestion::new(*q, *w))
                    .collect(),
            )
        })
        .collect()
}

/// Graph with the given node ids (label = id) and weighted edges
pub fn graph(nodes: &[&str], edges: &[(&str, &str, f64)]) -> GraphPayload {
    GraphPayload {
        nodes: nodes.iter().map(|id| ConceptNode::new(*id, *id)).collect(),
        edges: edges
            .iter()
            .map(|(s, t, w)| PrerequisiteEdge::new(*s, *t, *w))
            .collect(),
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
