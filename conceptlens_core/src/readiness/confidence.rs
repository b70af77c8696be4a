//! Per-concept confidence estimation
//!
//! Confidence is the weakest of three independently leveled factors:
//! - tagged questions: >= 3 high, 2 medium, 0-1 low
//! - total max-score points: >= 10 high, [5, 10) medium, < 5 low
//! - variance of mean direct readiness across the concept and its direct
//!   neighbors: < 0.15 high, [0.15, 0.30] medium, > 0.30 low

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{ScoreMatrix, TaggedQuestion};
use crate::types::ConfidenceLevel;

/// Each factor's level plus the raw measurements behind it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub tagged_questions: usize,
    pub total_points: f64,
    pub neighbor_variance: f64,
    pub question_level: ConfidenceLevel,
    pub coverage_level: ConfidenceLevel,
    pub variance_level: ConfidenceLevel,
    pub overall: ConfidenceLevel,
}

/// Assess confidence for concept column `c`
pub fn assess_confidence(
    c: usize,
    tagged: &[TaggedQuestion],
    scores: &ScoreMatrix,
    direct: &Array2<Option<f64>>,
    adjacency: &Array2<f64>,
) -> ConfidenceAssessment {
    let tagged_questions = tagged.len();
    let total_points: f64 = tagged.iter().map(|q| scores.max_score(&q.question_id)).sum();
    let neighbor_variance = neighbor_variance(c, direct, adjacency);

    let question_level = question_level(tagged_questions);
    let coverage_level = coverage_level(total_points);
    let variance_level = variance_level(neighbor_variance);

    ConfidenceAssessment {
        tagged_questions,
        total_points,
        neighbor_variance,
        question_level,
        coverage_level,
        variance_level,
        overall: question_level.min(coverage_level).min(variance_level),
    }
}

pub fn question_level(count: usize) -> ConfidenceLevel {
    match count {
        0 | 1 => ConfidenceLevel::Low,
        2 => ConfidenceLevel::Medium,
        _ => ConfidenceLevel::High,
    }
}

pub fn coverage_level(points: f64) -> ConfidenceLevel {
    if points >= 10.0 {
        ConfidenceLevel::High
    } else if points >= 5.0 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

pub fn variance_level(variance: f64) -> ConfidenceLevel {
    if variance < 0.15 {
        ConfidenceLevel::High
    } else if variance <= 0.30 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

/// Population variance of per-concept mean direct readiness over `c` and its
/// parents and children
///
/// Concepts with no defined values are left out; fewer than two means, or no
/// neighbors at all, gives 0.
fn neighbor_variance(c: usize, direct: &Array2<Option<f64>>, adjacency: &Array2<f64>) -> f64 {
    let n_concepts = adjacency.nrows();
    let neighbors: Vec<usize> = (0..n_concepts)
        .filter(|&i| adjacency[[c, i]] > 0.0 || adjacency[[i, c]] > 0.0)
        .collect();
    if neighbors.is_empty() {
        return 0.0;
    }

    let means: Vec<f64> = std::iter::once(c)
        .chain(neighbors)
        .filter_map(|i| column_mean(direct, i))
        .collect();
    if means.len() < 2 {
        return 0.0;
    }

    let n = means.len() as f64;
    let mean = means.iter().sum::<f64>() / n;
    means.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n
}

fn column_mean(direct: &Array2<Option<f64>>, c: usize) -> Option<f64> {
    let (sum, count) = direct
        .index_axis(Axis(1), c)
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::DEFAULT_MAX_SCORE;
    use ndarray::array;

    fn max_scores(points: &[(&str, f64)]) -> ScoreMatrix {
        ScoreMatrix {
            scores: Default::default(),
            max_scores: points.iter().map(|(q, v)| (q.to_string(), *v)).collect(),
        }
    }

    fn tagged(ids: &[&str]) -> Vec<TaggedQuestion> {
        ids.iter().map(|q| TaggedQuestion::new(*q, 1.0)).collect()
    }

    #[test]
    fn test_high_confidence() {
        let sm = max_scores(&[("Q1", 5.0), ("Q2", 5.0), ("Q3", 5.0)]);
        let direct = array![[Some(0.7), Some(0.7)]];
        let adj = array![[0.0, 0.5], [0.0, 0.0]];
        let a = assess_confidence(0, &tagged(&["Q1", "Q2", "Q3"]), &sm, &direct, &adj);
        assert_eq!(a.overall, ConfidenceLevel::High);
        assert_eq!(a.total_points, 15.0);
        assert_eq!(a.neighbor_variance, 0.0);
    }

    #[test]
    fn test_single_question_is_low_regardless() {
        let sm = max_scores(&[("Q1", 50.0)]);
        let direct = array![[Some(0.7)]];
        let adj = array![[0.0]];
        let a = assess_confidence(0, &tagged(&["Q1"]), &sm, &direct, &adj);
        assert_eq!(a.coverage_level, ConfidenceLevel::High);
        assert_eq!(a.variance_level, ConfidenceLevel::High);
        assert_eq!(a.overall, ConfidenceLevel::Low);
    }

    #[test]
    fn test_low_points_coverage() {
        let sm = max_scores(&[("Q1", 1.0), ("Q2", 1.0), ("Q3", 1.0)]);
        let direct = array![[Some(0.7)]];
        let adj = array![[0.0]];
        let a = assess_confidence(0, &tagged(&["Q1", "Q2", "Q3"]), &sm, &direct, &adj);
        assert_eq!(a.overall, ConfidenceLevel::Low);
    }

    #[test]
    fn test_missing_max_scores_default_to_one_point() {
        let sm = max_scores(&[]);
        let direct = array![[Some(0.7)]];
        let adj = array![[0.0]];
        let a = assess_confidence(0, &tagged(&["Q1", "Q2"]), &sm, &direct, &adj);
        assert_eq!(a.total_points, 2.0 * DEFAULT_MAX_SCORE);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(question_level(0), ConfidenceLevel::Low);
        assert_eq!(question_level(2), ConfidenceLevel::Medium);
        assert_eq!(question_level(3), ConfidenceLevel::High);
        assert_eq!(coverage_level(4.99), ConfidenceLevel::Low);
        assert_eq!(coverage_level(5.0), ConfidenceLevel::Medium);
        assert_eq!(coverage_level(9.5), ConfidenceLevel::Medium);
        assert_eq!(coverage_level(10.0), ConfidenceLevel::High);
        assert_eq!(variance_level(0.149), ConfidenceLevel::High);
        assert_eq!(variance_level(0.15), ConfidenceLevel::Medium);
        assert_eq!(variance_level(0.30), ConfidenceLevel::Medium);
        assert_eq!(variance_level(0.31), ConfidenceLevel::Low);
    }

    #[test]
    fn test_variance_across_neighbors() {
        // Means 0.0 and 1.0 -> population variance 0.25
        let direct = array![[Some(0.0), Some(1.0)], [Some(0.0), Some(1.0)]];
        let adj = array![[0.0, 0.5], [0.0, 0.0]];
        assert!((neighbor_variance(0, &direct, &adj) - 0.25).abs() < 1e-12);
        assert!((neighbor_variance(1, &direct, &adj) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_variance_skips_undefined_columns() {
        let direct = array![[Some(0.2), None]];
        let adj = array![[0.0, 0.5], [0.0, 0.0]];
        assert_eq!(neighbor_variance(0, &direct, &adj), 0.0);
    }
}
