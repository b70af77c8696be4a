//! The four numeric stages
//!
//! Every stage takes fully materialized matrices from the previous stage and
//! returns a new one; nothing is updated in place across stages.
//!
//! Matrices are `students x concepts`, indexed by the sorted orderings held in
//! [`ReadinessIndex`](super::ReadinessIndex). The adjacency matrix is
//! `concepts x concepts` with `adjacency[[p, c]]` the weight of edge `p -> c`.

use ndarray::Array2;
use std::collections::HashMap;

use super::{QuestionConceptMap, ReadinessIndex, ReadinessWeights, ScoreMatrix};
use crate::types::sanitize;

/// Share of a child's edge weight that can flow back to its parent as boost.
pub const VALIDATION_FACTOR: f64 = 0.4;

/// Ceiling on the total downstream boost any concept can receive.
pub const BOOST_CAP: f64 = 0.2;

/// Max score assumed for questions missing from the max-score table.
pub const DEFAULT_MAX_SCORE: f64 = 1.0;

/// Stage 1: weighted mean of normalized scores over attempted tagged questions
///
/// `None` when the student attempted none of the concept's questions, when
/// the concept has no tagged questions, or when the scores are not finite.
pub fn direct_readiness(
    scores: &ScoreMatrix,
    question_concept_map: &QuestionConceptMap,
    index: &ReadinessIndex,
) -> Array2<Option<f64>> {
    let mut readiness = Array2::from_elem((index.student_count(), index.concept_count()), None);
    let empty = HashMap::new();

    for (c, concept) in index.concepts().iter().enumerate() {
        let Some(tagged) = question_concept_map.get(concept) else {
            continue;
        };
        if tagged.is_empty() {
            continue;
        }

        for (s, student) in index.students().iter().enumerate() {
            let student_scores = scores.scores.get(student).unwrap_or(&empty);

            let mut weighted_sum = 0.0;
            let mut weight_sum = 0.0;
            for q in tagged {
                if let Some(&score) = student_scores.get(&q.question_id) {
                    let max = scores.max_score(&q.question_id);
                    let normalized = if max > 0.0 { score / max } else { 0.0 };
                    weighted_sum += q.weight * normalized;
                    weight_sum += q.weight;
                }
            }

            if weight_sum > 0.0 {
                let value = weighted_sum / weight_sum;
                if value.is_finite() {
                    readiness[[s, c]] = Some(value);
                }
            }
        }
    }

    readiness
}

/// Stage 2: weakness inherited from direct prerequisites
///
/// `P[s, c] = Σ_p w(p, c) · max(0, threshold − D[s, p])`, missing `D` as 0.
/// Concepts are visited in topological order.
pub fn prerequisite_penalty(
    direct: &Array2<Option<f64>>,
    adjacency: &Array2<f64>,
    topo_positions: &[usize],
    threshold: f64,
) -> Array2<f64> {
    let (n_students, n_concepts) = direct.dim();
    let mut penalty = Array2::zeros((n_students, n_concepts));

    for &c in topo_positions {
        for p in 0..n_concepts {
            let weight = adjacency[[p, c]];
            if weight <= 0.0 {
                continue;
            }
            for s in 0..n_students {
                let gap = (threshold - direct[[s, p]].unwrap_or(0.0)).max(0.0);
                penalty[[s, c]] += weight * gap;
            }
        }
    }

    penalty
}

/// Stage 3: corroboration from direct dependents, capped at [`BOOST_CAP`]
///
/// `B[s, p] = min(cap, Σ_d w(p, d) · 0.4 · D[s, d])`, missing `D` as 0.
pub fn downstream_boost(direct: &Array2<Option<f64>>, adjacency: &Array2<f64>) -> Array2<f64> {
    let (n_students, n_concepts) = direct.dim();
    let mut boost = Array2::zeros((n_students, n_concepts));

    for p in 0..n_concepts {
        for d in 0..n_concepts {
            let weight = adjacency[[p, d]];
            if weight <= 0.0 {
                continue;
            }
            let validation_weight = weight * VALIDATION_FACTOR;
            for s in 0..n_students {
                boost[[s, p]] += validation_weight * direct[[s, d]].unwrap_or(0.0);
            }
        }
    }

    boost.mapv_inplace(|b: f64| b.min(BOOST_CAP));
    boost
}

/// Stage 4: `clamp(0, 1, α·D' − β·P + γ·B)` with non-finite values forced to 0
pub fn final_readiness(
    direct: &Array2<Option<f64>>,
    penalty: &Array2<f64>,
    boost: &Array2<f64>,
    weights: &ReadinessWeights,
) -> Array2<f64> {
    let mut out = Array2::zeros(direct.dim());
    ndarray::Zip::from(&mut out)
        .and(direct)
        .and(penalty)
        .and(boost)
        .for_each(|f, &d, &p, &b| {
            *f = combine(d.unwrap_or(0.0), p, b, weights);
        });
    out
}

/// Single-cell form of stage 4, shared with trace reconstruction
#[inline]
pub fn combine(direct: f64, penalty: f64, boost: f64, weights: &ReadinessWeights) -> f64 {
    let raw = weights.alpha * direct - weights.beta * penalty + weights.gamma * boost;
    sanitize(raw.clamp(0.0, 1.0))
}
