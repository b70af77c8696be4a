//! Class-wide statistics per concept

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::types::{sanitize, ConceptId};

/// Summary of one concept's final-readiness column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassAggregate {
    pub concept_id: ConceptId,
    pub mean_readiness: f64,
    pub median_readiness: f64,
    /// Population standard deviation
    pub std_readiness: f64,
    /// Students strictly below the threshold
    pub below_threshold_count: usize,
}

/// One aggregate per concept column of `final_readiness`
///
/// An empty column reports zeros.
pub fn class_aggregates(
    final_readiness: &Array2<f64>,
    concepts: &[ConceptId],
    threshold: f64,
) -> Vec<ClassAggregate> {
    concepts
        .iter()
        .enumerate()
        .map(|(c, concept)| aggregate_column(concept, final_readiness.column(c), threshold))
        .collect()
}

fn aggregate_column(concept: &str, values: ArrayView1<'_, f64>, threshold: f64) -> ClassAggregate {
    let mean = values.mean().unwrap_or(0.0);
    let std = if values.is_empty() { 0.0 } else { values.std(0.0) };

    ClassAggregate {
        concept_id: concept.to_string(),
        mean_readiness: sanitize(mean),
        median_readiness: sanitize(median(values)),
        std_readiness: sanitize(std),
        below_threshold_count: values.iter().filter(|&&v| v < threshold).count(),
    }
}

fn median(values: ArrayView1<'_, f64>) -> f64 {
    let mut sorted = values.to_vec();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
