//! Readiness inference pipeline
//!
//! A pure four-stage numeric pipeline over fixed, lexicographically sorted
//! student and concept orderings:
//!
//! 1. direct readiness from tagged question scores
//! 2. penalty from weak prerequisites
//! 3. capped boost from strong dependents
//! 4. weighted, clamped final readiness
//!
//! Each stage fully materializes its matrix before the next one reads it.
//! Every `(student, concept)` cell carries the concept's confidence level and
//! an [`ExplanationTrace`] that rebuilds the final value from its parts.

mod confidence;
mod stages;
mod trace;

pub use confidence::{
    assess_confidence, coverage_level, question_level, variance_level, ConfidenceAssessment,
};
pub use stages::{
    combine, direct_readiness, downstream_boost, final_readiness, prerequisite_penalty, BOOST_CAP,
    DEFAULT_MAX_SCORE, VALIDATION_FACTOR,
};
pub use trace::{
    DownstreamContribution, ExplanationTrace, FormulaBreakdown, UpstreamContribution,
    WaterfallStep,
};

use indexmap::IndexMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::aggregate::{class_aggregates, ClassAggregate};
use crate::error::{InputDataError, NumericIntegrityError, Result};
use crate::graph::{ConceptGraph, GraphPayload};
use crate::types::{sanitize, ConceptId, ConfidenceLevel, QuestionId, StudentId};
use trace::{build_trace, TraceInputs};

/// Raw scores per student plus the max score of each question
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMatrix {
    #[serde(default)]
    pub scores: HashMap<StudentId, HashMap<QuestionId, f64>>,
    #[serde(default)]
    pub max_scores: HashMap<QuestionId, f64>,
}

impl ScoreMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one student's score on one question
    pub fn insert(&mut self, student: impl Into<String>, question: impl Into<String>, score: f64) {
        self.scores
            .entry(student.into())
            .or_default()
            .insert(question.into(), score);
    }

    pub fn set_max_score(&mut self, question: impl Into<String>, max: f64) {
        self.max_scores.insert(question.into(), max);
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Max score for a question, [`DEFAULT_MAX_SCORE`] when unknown
    pub fn max_score(&self, question: &str) -> f64 {
        self.max_scores
            .get(question)
            .copied()
            .unwrap_or(DEFAULT_MAX_SCORE)
    }

    /// Student ids in sorted order
    pub fn student_ids(&self) -> Vec<StudentId> {
        let mut ids: Vec<StudentId> = self.scores.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// One question tagged to a concept, with its weight
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaggedQuestion {
    pub question_id: QuestionId,
    pub weight: f64,
}

impl TaggedQuestion {
    pub fn new(question_id: impl Into<String>, weight: f64) -> Self {
        Self {
            question_id: question_id.into(),
            weight,
        }
    }
}

/// Concept id -> the questions tagged with it
pub type QuestionConceptMap = HashMap<ConceptId, Vec<TaggedQuestion>>;

/// Stage-4 weights and the weakness threshold
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadinessWeights {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub threshold: f64,
}

impl Default for ReadinessWeights {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.3,
            gamma: 0.2,
            threshold: 0.6,
        }
    }
}

/// Id -> row/column lookup shared by every stage of one run
///
/// Both orderings are sorted and deduplicated on construction.
#[derive(Clone, Debug)]
pub struct ReadinessIndex {
    concepts: Vec<ConceptId>,
    students: Vec<StudentId>,
    concept_positions: HashMap<ConceptId, usize>,
    student_positions: HashMap<StudentId, usize>,
}

impl ReadinessIndex {
    pub fn new(mut concepts: Vec<ConceptId>, mut students: Vec<StudentId>) -> Self {
        concepts.sort();
        concepts.dedup();
        students.sort();
        students.dedup();

        let concept_positions = concepts
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        let student_positions = students
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();

        Self {
            concepts,
            students,
            concept_positions,
            student_positions,
        }
    }

    pub fn concepts(&self) -> &[ConceptId] {
        &self.concepts
    }

    pub fn students(&self) -> &[StudentId] {
        &self.students
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    pub fn concept_position(&self, concept: &str) -> Option<usize> {
        self.concept_positions.get(concept).copied()
    }

    pub fn student_position(&self, student: &str) -> Option<usize> {
        self.student_positions.get(student).copied()
    }

    /// `concepts x concepts` matrix with `[[p, c]]` the weight of edge `p -> c`
    pub fn adjacency(&self, graph: &ConceptGraph) -> Array2<f64> {
        let n = self.concept_count();
        let mut adjacency = Array2::zeros((n, n));
        for edge in graph.edges() {
            if let (Some(p), Some(c)) = (
                self.concept_position(&edge.source),
                self.concept_position(&edge.target),
            ) {
                adjacency[[p, c]] = edge.weight;
            }
        }
        adjacency
    }
}

/// Everything one pipeline run reads
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineInputs {
    pub scores: ScoreMatrix,
    pub question_concept_map: QuestionConceptMap,
    pub graph: GraphPayload,
}

/// Derived readiness for one `(student, concept)` pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadinessCell {
    pub student_id: StudentId,
    pub concept_id: ConceptId,
    /// `None` when there is no evidence for this pair
    pub direct_readiness: Option<f64>,
    pub prerequisite_penalty: f64,
    pub downstream_boost: f64,
    pub final_readiness: f64,
    pub confidence: ConfidenceLevel,
    pub explanation_trace: ExplanationTrace,
}

/// Output of [`run_readiness_pipeline`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Student-major, concepts in sorted order within each student
    pub readiness_results: Vec<ReadinessCell>,
    pub class_aggregates: Vec<ClassAggregate>,
    pub concepts: Vec<ConceptId>,
    pub students: Vec<StudentId>,
    pub topological_order: Vec<ConceptId>,
    /// Concept id -> label, in sorted concept order
    pub labels: IndexMap<ConceptId, String>,
    /// Per-concept confidence breakdown, in sorted concept order
    pub confidence: IndexMap<ConceptId, ConfidenceAssessment>,
    pub direct_readiness_matrix: Array2<Option<f64>>,
    pub final_readiness_matrix: Array2<f64>,
    pub adjacency_matrix: Array2<f64>,
    pub weights: ReadinessWeights,
}

impl PipelineResult {
    pub fn concept_index(&self, concept: &str) -> Option<usize> {
        self.concepts
            .binary_search_by(|c| c.as_str().cmp(concept))
            .ok()
    }

    pub fn student_index(&self, student: &str) -> Option<usize> {
        self.students
            .binary_search_by(|s| s.as_str().cmp(student))
            .ok()
    }

    pub fn cell(&self, student: &str, concept: &str) -> Option<&ReadinessCell> {
        let s = self.student_index(student)?;
        let c = self.concept_index(concept)?;
        self.readiness_results.get(s * self.concepts.len() + c)
    }

    /// All cells for one student, in sorted concept order
    pub fn student_cells(&self, student: &str) -> Option<&[ReadinessCell]> {
        let s = self.student_index(student)?;
        let n = self.concepts.len();
        self.readiness_results.get(s * n..(s + 1) * n)
    }

    pub fn label(&self, concept: &str) -> Option<&str> {
        self.labels.get(concept).map(String::as_str)
    }

    /// Direct children of `concept` in sorted order
    pub fn children(&self, concept: &str) -> Vec<&ConceptId> {
        let Some(p) = self.concept_index(concept) else {
            return Vec::new();
        };
        self.concepts
            .iter()
            .enumerate()
            .filter(|&(c, _)| self.adjacency_matrix[[p, c]] > 0.0)
            .map(|(_, id)| id)
            .collect()
    }
}

/// Run the readiness pipeline over one snapshot of scores, mapping and graph
///
/// An empty graph is replaced by one derived from the mapping (see
/// [`GraphPayload::from_mapping`]). Fails before any computation on missing
/// scores or mapping, on a malformed graph, or on a cyclic graph. Repeated
/// calls on the same inputs produce identical results.
pub fn run_readiness_pipeline(
    inputs: &PipelineInputs,
    weights: &ReadinessWeights,
) -> Result<PipelineResult> {
    if inputs.scores.is_empty() {
        return Err(InputDataError::NoScores.into());
    }
    if inputs.question_concept_map.is_empty() {
        return Err(InputDataError::NoQuestionMapping.into());
    }

    let graph = if inputs.graph.nodes.is_empty() && inputs.graph.edges.is_empty() {
        let derived = GraphPayload::from_mapping(&inputs.question_concept_map);
        tracing::info!(
            "No concept graph supplied, derived {} nodes and {} edges from the mapping",
            derived.nodes.len(),
            derived.edges.len()
        );
        ConceptGraph::from_payload(&derived)?
    } else {
        ConceptGraph::from_payload(&inputs.graph)?
    };
    let topological_order = graph.topological_order()?;

    let index = ReadinessIndex::new(
        graph.concept_ids().cloned().collect(),
        inputs.scores.student_ids(),
    );
    let (n_students, n_concepts) = (index.student_count(), index.concept_count());
    tracing::info!(
        "Running readiness pipeline: {} students, {} concepts, {} edges",
        n_students,
        n_concepts,
        graph.edge_count()
    );

    let unmapped = inputs
        .question_concept_map
        .keys()
        .filter(|c| !graph.contains(c))
        .count();
    if unmapped > 0 {
        tracing::warn!("{} mapped concept(s) are not in the graph and were ignored", unmapped);
    }

    let adjacency = index.adjacency(&graph);
    let topo_positions: Vec<usize> = topological_order
        .iter()
        .filter_map(|c| index.concept_position(c))
        .collect();

    let direct = direct_readiness(&inputs.scores, &inputs.question_concept_map, &index);
    tracing::debug!(
        "Direct readiness: {} of {} cells defined",
        direct.iter().filter(|d| d.is_some()).count(),
        direct.len()
    );

    let penalty = prerequisite_penalty(&direct, &adjacency, &topo_positions, weights.threshold);
    tracing::debug!("Prerequisite penalty computed");

    let boost = downstream_boost(&direct, &adjacency);
    tracing::debug!("Downstream boost computed");

    let final_matrix = final_readiness(&direct, &penalty, &boost, weights);
    check_integrity(&final_matrix, &index)?;

    let confidence: IndexMap<ConceptId, ConfidenceAssessment> = index
        .concepts()
        .iter()
        .enumerate()
        .map(|(c, concept)| {
            let tagged = inputs
                .question_concept_map
                .get(concept)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let assessment = assess_confidence(c, tagged, &inputs.scores, &direct, &adjacency);
            (concept.clone(), assessment)
        })
        .collect();

    let parents_of: Vec<Vec<(usize, f64)>> = (0..n_concepts)
        .map(|c| {
            (0..n_concepts)
                .filter(|&p| adjacency[[p, c]] > 0.0)
                .map(|p| (p, adjacency[[p, c]]))
                .collect()
        })
        .collect();
    let children_of: Vec<Vec<(usize, f64)>> = (0..n_concepts)
        .map(|p| {
            (0..n_concepts)
                .filter(|&d| adjacency[[p, d]] > 0.0)
                .map(|d| (d, adjacency[[p, d]]))
                .collect()
        })
        .collect();

    let concepts = index.concepts();
    let mut readiness_results = Vec::with_capacity(n_students * n_concepts);
    for (s, student) in index.students().iter().enumerate() {
        for (c, concept) in concepts.iter().enumerate() {
            let direct_value = direct[[s, c]].map(sanitize);
            let level = confidence[c].overall;
            let neighbors = |links: &[(usize, f64)]| {
                links
                    .iter()
                    .map(|&(i, w)| (concepts[i].as_str(), direct[[s, i]], w))
                    .collect::<Vec<_>>()
            };

            let explanation_trace = build_trace(
                TraceInputs {
                    student_id: student,
                    concept_id: concept,
                    direct: direct_value,
                    penalty: penalty[[s, c]],
                    boost: boost[[s, c]],
                    final_readiness: final_matrix[[s, c]],
                    confidence: level,
                    parents: neighbors(&parents_of[c]),
                    children: neighbors(&children_of[c]),
                },
                weights,
            );

            readiness_results.push(ReadinessCell {
                student_id: student.clone(),
                concept_id: concept.clone(),
                direct_readiness: direct_value,
                prerequisite_penalty: sanitize(penalty[[s, c]]),
                downstream_boost: sanitize(boost[[s, c]]),
                final_readiness: final_matrix[[s, c]],
                confidence: level,
                explanation_trace,
            });
        }
    }

    let class_aggregates = class_aggregates(&final_matrix, concepts, weights.threshold);
    let labels = concepts
        .iter()
        .map(|c| (c.clone(), graph.label(c).unwrap_or(c.as_str()).to_string()))
        .collect();

    tracing::info!(
        "Readiness pipeline finished: {} cells",
        readiness_results.len()
    );

    Ok(PipelineResult {
        readiness_results,
        class_aggregates,
        concepts: concepts.to_vec(),
        students: index.students().to_vec(),
        topological_order,
        labels,
        confidence,
        direct_readiness_matrix: direct,
        final_readiness_matrix: final_matrix,
        adjacency_matrix: adjacency,
        weights: *weights,
    })
}

/// Every final value must be finite and inside [0, 1]
fn check_integrity(final_matrix: &Array2<f64>, index: &ReadinessIndex) -> Result<()> {
    for ((s, c), &value) in final_matrix.indexed_iter() {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            let err = NumericIntegrityError {
                student: index.students()[s].clone(),
                concept: index.concepts()[c].clone(),
                value,
            };
            tracing::error!("{}", err);
            return Err(err.into());
        }
    }
    Ok(())
}
