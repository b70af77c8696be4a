//! Per-student readiness report
//!
//! A student's own readiness per concept, the five weakest concepts, and a
//! study plan that visits every below-threshold concept prerequisites first.
//! Reports never compare a student with peers.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{InputDataError, Result};
use crate::readiness::{PipelineResult, ReadinessCell, UpstreamContribution};
use crate::types::{ConceptId, ConfidenceLevel, StudentId};

/// Weakest concepts listed in a report
pub const WEAKEST_REPORTED: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConceptReadiness {
    pub concept_id: ConceptId,
    pub label: String,
    pub direct_readiness: Option<f64>,
    pub final_readiness: f64,
    pub confidence: ConfidenceLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyReason {
    /// A later concept in the plan depends on this one
    WeakPrerequisite,
    BelowThreshold,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudyPlanItem {
    pub concept_id: ConceptId,
    pub label: String,
    pub final_readiness: f64,
    pub reason: StudyReason,
    pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudentReport {
    pub student_id: StudentId,
    pub threshold: f64,
    /// Every concept, in sorted concept order
    pub concepts: Vec<ConceptReadiness>,
    /// Lowest final readiness first, ties by concept id
    pub top_weak_concepts: Vec<ConceptReadiness>,
    /// Below-threshold concepts in topological order
    pub study_plan: Vec<StudyPlanItem>,
}

pub fn build_student_report(
    result: &PipelineResult,
    student: &str,
    threshold: f64,
) -> Result<StudentReport> {
    let cells = result
        .student_cells(student)
        .ok_or_else(|| InputDataError::UnknownStudent(student.to_string()))?;

    let label_of = |concept: &str| result.label(concept).unwrap_or(concept).to_string();

    let concepts: Vec<ConceptReadiness> = cells
        .iter()
        .map(|cell| ConceptReadiness {
            concept_id: cell.concept_id.clone(),
            label: label_of(&cell.concept_id),
            direct_readiness: cell.direct_readiness,
            final_readiness: cell.final_readiness,
            confidence: cell.confidence,
        })
        .collect();

    let mut top_weak_concepts = concepts.clone();
    top_weak_concepts.sort_by(|a, b| {
        a.final_readiness
            .total_cmp(&b.final_readiness)
            .then_with(|| a.concept_id.cmp(&b.concept_id))
    });
    top_weak_concepts.truncate(WEAKEST_REPORTED);

    let weak: HashSet<&str> = cells
        .iter()
        .filter(|c| c.final_readiness < threshold)
        .map(|c| c.concept_id.as_str())
        .collect();

    let study_plan: Vec<StudyPlanItem> = result
        .topological_order
        .iter()
        .filter(|c| weak.contains(c.as_str()))
        .filter_map(|concept| result.cell(student, concept))
        .map(|cell| {
            let feeds_plan = result
                .children(&cell.concept_id)
                .iter()
                .any(|child| weak.contains(child.as_str()));
            StudyPlanItem {
                concept_id: cell.concept_id.clone(),
                label: label_of(&cell.concept_id),
                final_readiness: cell.final_readiness,
                reason: if feeds_plan {
                    StudyReason::WeakPrerequisite
                } else {
                    StudyReason::BelowThreshold
                },
                explanation: explain(cell, threshold, &label_of),
            }
        })
        .collect();

    tracing::debug!(
        "Report for {}: {} concepts, {} in study plan",
        student,
        concepts.len(),
        study_plan.len()
    );

    Ok(StudentReport {
        student_id: student.to_string(),
        threshold,
        concepts,
        top_weak_concepts,
        study_plan,
    })
}

/// One line from the cell's trace: the largest prerequisite drag if any,
/// otherwise the direct evidence
fn explain(cell: &ReadinessCell, threshold: f64, label_of: &dyn Fn(&str) -> String) -> String {
    let trace = &cell.explanation_trace;
    // First of equal maxima wins
    let heaviest = trace
        .upstream_penalties
        .iter()
        .fold(None::<&UpstreamContribution>, |best, u| match best {
            Some(b) if b.penalty_contribution >= u.penalty_contribution => Some(b),
            _ => Some(u),
        });

    match (heaviest, cell.direct_readiness) {
        (Some(upstream), _) => format!(
            "Readiness {:.2}; held back by prerequisite {} at {:.2}",
            cell.final_readiness,
            label_of(&upstream.concept_id),
            upstream.readiness
        ),
        (None, Some(direct)) => format!(
            "Readiness {:.2}; direct evidence {:.2} against a target of {:.2}",
            cell.final_readiness, direct, threshold
        ),
        (None, None) => format!(
            "Readiness {:.2}; no questions on this concept were attempted",
            cell.final_readiness
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReadinessError;
    use crate::graph::{ConceptNode, GraphPayload, PrerequisiteEdge};
    use crate::readiness::{
        run_readiness_pipeline, PipelineInputs, ReadinessWeights, ScoreMatrix, TaggedQuestion,
    };

    /// Chain A -> B -> C; S1 is weak on A and B, strong on C
    fn result() -> PipelineResult {
        let mut scores = ScoreMatrix::new();
        for (q, v) in [("Q1", 2.0), ("Q2", 4.0), ("Q3", 9.0)] {
            scores.insert("S1", q, v);
            scores.set_max_score(q, 10.0);
        }
        let question_concept_map = [("A", "Q1"), ("B", "Q2"), ("C", "Q3")]
            .into_iter()
            .map(|(c, q)| (c.to_string(), vec![TaggedQuestion::new(q, 1.0)]))
            .collect();
        let inputs = PipelineInputs {
            scores,
            question_concept_map,
            graph: GraphPayload {
                nodes: vec![
                    ConceptNode::new("C", "Gamma"),
                    ConceptNode::new("B", "Beta"),
                    ConceptNode::new("A", "Alpha"),
                ],
                edges: vec![
                    PrerequisiteEdge::new("A", "B", 0.5),
                    PrerequisiteEdge::new("B", "C", 0.5),
                ],
            },
        };
        run_readiness_pipeline(&inputs, &ReadinessWeights::default()).unwrap()
    }

    #[test]
    fn test_study_plan_is_prerequisites_first() {
        let report = build_student_report(&result(), "S1", 0.6).unwrap();
        let plan: Vec<_> = report.study_plan.iter().map(|i| i.concept_id.as_str()).collect();
        assert_eq!(plan, vec!["A", "B"]);
        assert_eq!(report.study_plan[0].reason, StudyReason::WeakPrerequisite);
        assert_eq!(report.study_plan[1].reason, StudyReason::BelowThreshold);
        assert!(report.study_plan[1].explanation.contains("prerequisite Alpha"));
        assert!(report.study_plan[0].explanation.contains("direct evidence 0.20"));
    }

    #[test]
    fn test_weakest_first_with_labels() {
        let report = build_student_report(&result(), "S1", 0.6).unwrap();
        assert_eq!(report.concepts.len(), 3);
        assert_eq!(report.top_weak_concepts[0].concept_id, "A");
        assert_eq!(report.top_weak_concepts[0].label, "Alpha");
        assert!(report
            .top_weak_concepts
            .windows(2)
            .all(|w| w[0].final_readiness <= w[1].final_readiness));
    }

    fn two_parent_result(a: f64, b: f64, weight_b: f64) -> PipelineResult {
        let mut scores = ScoreMatrix::new();
        for (q, v) in [("Q1", a), ("Q2", b), ("Q3", 5.0)] {
            scores.insert("S1", q, v);
            scores.set_max_score(q, 10.0);
        }
        let question_concept_map = [("A", "Q1"), ("B", "Q2"), ("C", "Q3")]
            .into_iter()
            .map(|(c, q)| (c.to_string(), vec![TaggedQuestion::new(q, 1.0)]))
            .collect();
        let inputs = PipelineInputs {
            scores,
            question_concept_map,
            graph: GraphPayload {
                nodes: vec![
                    ConceptNode::new("A", "Alpha"),
                    ConceptNode::new("B", "Beta"),
                    ConceptNode::new("C", "Gamma"),
                ],
                edges: vec![
                    PrerequisiteEdge::new("A", "C", 0.5),
                    PrerequisiteEdge::new("B", "C", weight_b),
                ],
            },
        };
        run_readiness_pipeline(&inputs, &ReadinessWeights::default()).unwrap()
    }

    #[test]
    fn test_explanation_names_heaviest_prerequisite() {
        // A drags 0.5 * 0.5 = 0.25, B drags 0.9 * 0.4 = 0.36
        let result = two_parent_result(1.0, 2.0, 0.9);
        let report = build_student_report(&result, "S1", 0.6).unwrap();
        let c = report.study_plan.iter().find(|i| i.concept_id == "C").unwrap();
        assert!(c.explanation.contains("prerequisite Beta at 0.20"), "{}", c.explanation);
    }

    #[test]
    fn test_explanation_keeps_first_of_equal_prerequisites() {
        let result = two_parent_result(2.0, 2.0, 0.5);
        let report = build_student_report(&result, "S1", 0.6).unwrap();
        let c = report.study_plan.iter().find(|i| i.concept_id == "C").unwrap();
        assert!(c.explanation.contains("prerequisite Alpha"), "{}", c.explanation);
    }

    #[test]
    fn test_unknown_student() {
        let err = build_student_report(&result(), "S404", 0.6).unwrap_err();
        assert!(matches!(
            err,
            ReadinessError::InputData(InputDataError::UnknownStudent(ref s)) if s == "S404"
        ));
    }
}
