//! Student clustering by readiness profile
//!
//! Students' final-readiness rows are grouped with seeded k-means. Labels are
//! ordinal (`"Cluster 1"`, `"Cluster 2"`, ...) in order of first appearance
//! over the student list, so identical inputs always produce identical
//! labels and membership counts.

mod kmeans;

pub use kmeans::KMeansConfig;

use indexmap::IndexMap;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::types::{sanitize, ConceptId, StudentId};

/// Concepts reported per cluster as weakest
pub const TOP_WEAK_CONCEPTS: usize = 3;

/// A group of students with a similar readiness profile
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_label: String,
    /// Mean final readiness per concept over the members
    pub centroid: IndexMap<ConceptId, f64>,
    pub student_count: usize,
    /// Up to three concepts with the lowest centroid value
    pub top_weak_concepts: Vec<ConceptId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub clusters: Vec<Cluster>,
    /// Student id -> cluster label, in student order
    pub assignments: IndexMap<StudentId, String>,
}

impl ClusteringResult {
    pub fn cluster(&self, label: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.cluster_label == label)
    }

    /// Members of a cluster in student order
    pub fn members(&self, label: &str) -> Vec<&StudentId> {
        self.assignments
            .iter()
            .filter(|(_, l)| l.as_str() == label)
            .map(|(s, _)| s)
            .collect()
    }
}

/// Cluster students into at most `k` groups with the default settings
pub fn run_clustering(
    final_readiness: &Array2<f64>,
    concepts: &[ConceptId],
    students: &[StudentId],
    k: usize,
) -> ClusteringResult {
    run_clustering_with(final_readiness, concepts, students, &KMeansConfig::with_k(k))
}

/// Cluster students with an explicit k-means configuration
///
/// `final_readiness` is `students x concepts`, rows matching `students`.
/// Never fails: `k` shrinks to the number of distinct profiles, and an
/// empty class gives an empty result.
pub fn run_clustering_with(
    final_readiness: &Array2<f64>,
    concepts: &[ConceptId],
    students: &[StudentId],
    config: &KMeansConfig,
) -> ClusteringResult {
    let n = final_readiness.nrows().min(students.len());
    if n == 0 {
        return ClusteringResult::default();
    }
    let points = final_readiness.slice(ndarray::s![..n, ..]).to_owned();

    let used_k = kmeans::effective_k(&points, config.k.max(1));
    if used_k < config.k {
        tracing::warn!(
            "Clustering {} students: k reduced from {} to {}",
            n,
            config.k,
            used_k
        );
    }

    let fit = kmeans::fit(&points, config);
    tracing::debug!(
        "k-means finished after {} iterations (converged: {}, inertia {:.4})",
        fit.iterations,
        fit.converged,
        fit.inertia
    );

    // Raw centroid index -> ordinal, by first appearance
    let mut ordinals: IndexMap<usize, usize> = IndexMap::new();
    for &raw in &fit.assignments {
        let next = ordinals.len();
        ordinals.entry(raw).or_insert(next);
    }

    let assignments: IndexMap<StudentId, String> = students[..n]
        .iter()
        .zip(&fit.assignments)
        .map(|(student, raw)| (student.clone(), label(ordinals[raw])))
        .collect();

    let clusters = ordinals
        .keys()
        .enumerate()
        .map(|(ordinal, &raw)| {
            let members: Vec<usize> = fit
                .assignments
                .iter()
                .enumerate()
                .filter(|&(_, &a)| a == raw)
                .map(|(i, _)| i)
                .collect();
            build_cluster(label(ordinal), &points, &members, concepts)
        })
        .collect();

    ClusteringResult {
        clusters,
        assignments,
    }
}

fn label(ordinal: usize) -> String {
    format!("Cluster {}", ordinal + 1)
}

fn build_cluster(
    cluster_label: String,
    points: &Array2<f64>,
    members: &[usize],
    concepts: &[ConceptId],
) -> Cluster {
    let rows = points.select(Axis(0), members);
    let means = rows
        .mean_axis(Axis(0))
        .unwrap_or_else(|| ndarray::Array1::zeros(points.ncols()));

    let centroid: IndexMap<ConceptId, f64> = concepts
        .iter()
        .zip(means.iter())
        .map(|(c, &v)| (c.clone(), sanitize(v)))
        .collect();

    let mut ranked: Vec<(&ConceptId, f64)> = centroid.iter().map(|(c, &v)| (c, v)).collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    let top_weak_concepts = ranked
        .into_iter()
        .take(TOP_WEAK_CONCEPTS)
        .map(|(c, _)| c.clone())
        .collect();

    Cluster {
        cluster_label,
        centroid,
        student_count: members.len(),
        top_weak_concepts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn test_basic_clustering() {
        let matrix = array![[0.9, 0.1], [0.8, 0.2], [0.1, 0.9], [0.2, 0.8]];
        let result = run_clustering(&matrix, &ids("C", 2), &ids("S", 4), 2);
        assert_eq!(result.clusters.len(), 2);
        assert_eq!(result.clusters.iter().map(|c| c.student_count).sum::<usize>(), 4);

        // S1 appears first, so its group is "Cluster 1"
        assert_eq!(result.assignments["S1"], "Cluster 1");
        assert_eq!(result.assignments["S2"], "Cluster 1");
        assert_eq!(result.assignments["S3"], "Cluster 2");
        assert_eq!(result.members("Cluster 2"), vec!["S3", "S4"]);

        let first = result.cluster("Cluster 1").unwrap();
        assert!((first.centroid["C1"] - 0.85).abs() < 1e-12);
        assert_eq!(first.top_weak_concepts, vec!["C2", "C1"]);
    }

    #[test]
    fn test_single_student_fallback() {
        let matrix = array![[0.5, 0.3]];
        let result = run_clustering(&matrix, &ids("C", 2), &ids("S", 1), 4);
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].student_count, 1);
        assert_eq!(result.clusters[0].top_weak_concepts, vec!["C2", "C1"]);
    }

    #[test]
    fn test_identical_profiles_collapse() {
        let matrix = array![[0.4, 0.4], [0.4, 0.4], [0.4, 0.4]];
        let result = run_clustering(&matrix, &ids("C", 2), &ids("S", 3), 3);
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].student_count, 3);
    }

    #[test]
    fn test_top_weak_concepts_capped() {
        let matrix = array![[0.9, 0.1, 0.5, 0.3], [0.8, 0.2, 0.4, 0.35]];
        let result = run_clustering(&matrix, &ids("C", 4), &ids("S", 2), 2);
        for cluster in &result.clusters {
            assert!(cluster.top_weak_concepts.len() <= TOP_WEAK_CONCEPTS);
            assert!(!cluster.top_weak_concepts.contains(&"C1".to_string()));
        }
    }

    #[test]
    fn test_deterministic() {
        let matrix = Array2::from_shape_fn((20, 5), |(i, j)| ((i * 13 + j * 7) % 17) as f64 / 16.0);
        let r1 = run_clustering(&matrix, &ids("C", 5), &ids("S", 20), 4);
        let r2 = run_clustering(&matrix, &ids("C", 5), &ids("S", 20), 4);
        assert_eq!(r1, r2);
        assert!(r1.clusters.iter().all(|c| c.student_count > 0));
    }

    #[test]
    fn test_empty_class() {
        let matrix = Array2::<f64>::zeros((0, 2));
        let result = run_clustering(&matrix, &ids("C", 2), &[], 4);
        assert!(result.clusters.is_empty());
        assert!(result.assignments.is_empty());
    }
}
