//! Intervention ranking
//!
//! Every concept whose class-mean final readiness is below the threshold
//! becomes a candidate with
//!
//! `impact = students_affected * downstream_concepts * (1 - mean_readiness)`
//!
//! where `downstream_concepts` is the number of direct children, floored at 1
//! so a weak leaf concept still ranks. Candidates are sorted by impact,
//! highest first, ties by concept id.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{sanitize, ConceptId};

/// How a recommended intervention should be delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionFormat {
    /// At least half the class is below threshold
    WholeClassReview,
    SmallGroup,
}

impl InterventionFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            InterventionFormat::WholeClassReview => "whole_class_review",
            InterventionFormat::SmallGroup => "small_group",
        }
    }
}

impl fmt::Display for InterventionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterventionCandidate {
    pub concept_id: ConceptId,
    /// Students strictly below threshold on this concept
    pub students_affected: usize,
    /// Direct children in the graph, at least 1
    pub downstream_concepts: usize,
    /// Class-mean final readiness
    pub current_readiness: f64,
    pub impact: f64,
    pub rationale: String,
    pub suggested_format: InterventionFormat,
}

/// Rank weak concepts by estimated impact of an intervention
///
/// `final_readiness` is `students x concepts`; `adjacency[[p, c]] > 0` marks
/// an edge `p -> c`. Concepts at or above `threshold` are left out entirely.
pub fn rank_interventions(
    final_readiness: &Array2<f64>,
    concepts: &[ConceptId],
    adjacency: &Array2<f64>,
    threshold: f64,
) -> Vec<InterventionCandidate> {
    let n_students = final_readiness.nrows();
    if n_students == 0 {
        return Vec::new();
    }

    let n_concepts = concepts
        .len()
        .min(final_readiness.ncols())
        .min(adjacency.nrows());

    let mut candidates: Vec<InterventionCandidate> = concepts[..n_concepts]
        .iter()
        .enumerate()
        .filter_map(|(c, concept)| {
            let column = final_readiness.column(c);
            let mean = sanitize(column.mean().unwrap_or(0.0));
            if mean >= threshold {
                return None;
            }

            let students_affected = column.iter().filter(|&&v| v < threshold).count();
            let children = adjacency.row(c).iter().filter(|&&w| w > 0.0).count();
            let downstream_concepts = children.max(1);
            let impact = sanitize(students_affected as f64 * downstream_concepts as f64 * (1.0 - mean));

            let suggested_format = if students_affected * 2 >= n_students {
                InterventionFormat::WholeClassReview
            } else {
                InterventionFormat::SmallGroup
            };
            let rationale = format!(
                "{} of {} students below {:.2} on {}; mean readiness {:.2}; unlocks {} downstream concept{}",
                students_affected,
                n_students,
                threshold,
                concept,
                mean,
                children,
                if children == 1 { "" } else { "s" }
            );

            Some(InterventionCandidate {
                concept_id: concept.clone(),
                students_affected,
                downstream_concepts,
                current_readiness: mean,
                impact,
                rationale,
                suggested_format,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.impact
            .total_cmp(&a.impact)
            .then_with(|| a.concept_id.cmp(&b.concept_id))
    });

    tracing::debug!(
        "Ranked {} intervention candidate(s) of {} concepts",
        candidates.len(),
        concepts.len()
    );
    candidates
}
