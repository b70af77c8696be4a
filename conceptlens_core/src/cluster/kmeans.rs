//! Seeded k-means with k-means++ initialisation
//!
//! 1. Pick initial centroids with k-means++ from a seeded RNG
//! 2. Assign each row to its nearest centroid (ties to the lower index)
//! 3. Recompute centroids as member means; an empty centroid stays put
//! 4. Repeat until the largest centroid move is below the threshold
//!
//! The whole procedure is restarted `n_init` times from the same RNG stream
//! and the run with the lowest inertia wins.

use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::InputDataError;

/// Configuration for k-means clustering
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Requested number of clusters; reduced when there are fewer distinct rows
    pub k: usize,
    pub max_iterations: usize,
    /// Iteration stops once no centroid moves further than this
    pub convergence_threshold: f64,
    /// Number of seeded restarts
    pub n_init: usize,
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 4,
            max_iterations: 300,
            convergence_threshold: 1e-6,
            n_init: 10,
            seed: 42,
        }
    }
}

impl KMeansConfig {
    pub fn with_k(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), InputDataError> {
        let invalid = |field: &str, reason: &str| InputDataError::InvalidParameter {
            field: field.to_string(),
            reason: reason.to_string(),
        };
        if self.k == 0 {
            return Err(invalid("k", "must be > 0"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be > 0"));
        }
        if self.n_init == 0 {
            return Err(invalid("n_init", "must be > 0"));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold <= 0.0 {
            return Err(invalid(
                "convergence_threshold",
                "must be a finite positive number",
            ));
        }
        Ok(())
    }
}

/// Best run found by [`fit`]
#[derive(Clone, Debug)]
pub(crate) struct KMeansFit {
    /// Centroid index per row
    pub assignments: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
    /// Within-cluster sum of squared distances
    pub inertia: f64,
}

/// Number of clusters actually used for `points`
pub(crate) fn effective_k(points: &Array2<f64>, k: usize) -> usize {
    k.min(distinct_rows(points))
}

pub(crate) fn fit(points: &Array2<f64>, config: &KMeansConfig) -> KMeansFit {
    let n = points.nrows();
    let k = effective_k(points, config.k.max(1));
    if n == 0 || k == 0 {
        return KMeansFit {
            assignments: Vec::new(),
            iterations: 0,
            converged: true,
            inertia: 0.0,
        };
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<KMeansFit> = None;

    for _ in 0..config.n_init.max(1) {
        let centroids = kmeans_plus_plus(points, k, &mut rng);
        let run = lloyd(points, centroids, config);
        let better = best.as_ref().map_or(true, |b| run.inertia < b.inertia);
        if better {
            best = Some(run);
        }
    }

    best.unwrap_or_else(|| lloyd(points, kmeans_plus_plus(points, k, &mut rng), config))
}

fn kmeans_plus_plus(points: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = points.nrows();
    let mut chosen = vec![rng.gen_range(0..n)];
    let mut min_distances = vec![f64::MAX; n];

    while chosen.len() < k {
        let last = points.row(chosen[chosen.len() - 1]);
        for (i, row) in points.axis_iter(Axis(0)).enumerate() {
            min_distances[i] = min_distances[i].min(squared_distance(row, last));
        }

        let total: f64 = min_distances.iter().sum();
        if total <= 0.0 {
            break;
        }

        // Sample proportionally to squared distance
        let target = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let mut next = None;
        for (i, &d) in min_distances.iter().enumerate() {
            if d <= 0.0 {
                continue;
            }
            cumulative += d;
            next = Some(i);
            if cumulative > target {
                break;
            }
        }
        match next {
            Some(i) => chosen.push(i),
            None => break,
        }
    }

    points.select(Axis(0), &chosen)
}

fn lloyd(points: &Array2<f64>, mut centroids: Array2<f64>, config: &KMeansConfig) -> KMeansFit {
    let mut assignments = vec![0usize; points.nrows()];
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        for (i, row) in points.axis_iter(Axis(0)).enumerate() {
            assignments[i] = nearest(row, &centroids);
        }

        let updated = member_means(points, &assignments, &centroids);
        let max_movement = centroids
            .axis_iter(Axis(0))
            .zip(updated.axis_iter(Axis(0)))
            .map(|(old, new)| squared_distance(old, new).sqrt())
            .fold(0.0f64, f64::max);
        centroids = updated;

        if max_movement < config.convergence_threshold {
            converged = true;
            break;
        }
    }

    // Final assignment against the settled centroids
    for (i, row) in points.axis_iter(Axis(0)).enumerate() {
        assignments[i] = nearest(row, &centroids);
    }
    let inertia = points
        .axis_iter(Axis(0))
        .zip(&assignments)
        .map(|(row, &c)| squared_distance(row, centroids.row(c)))
        .sum();

    KMeansFit {
        assignments,
        iterations,
        converged,
        inertia,
    }
}

fn nearest(row: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> usize {
    let mut best = 0;
    let mut best_distance = f64::MAX;
    for (j, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
        let distance = squared_distance(row, centroid);
        if distance < best_distance {
            best_distance = distance;
            best = j;
        }
    }
    best
}

fn member_means(points: &Array2<f64>, assignments: &[usize], previous: &Array2<f64>) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(previous.dim());
    let mut counts = vec![0usize; previous.nrows()];
    for (row, &c) in points.axis_iter(Axis(0)).zip(assignments) {
        counts[c] += 1;
        let mut target = sums.row_mut(c);
        target += &row;
    }

    for (c, mut sum) in sums.axis_iter_mut(Axis(0)).enumerate() {
        if counts[c] > 0 {
            sum /= counts[c] as f64;
        } else {
            sum.assign(&previous.row(c));
        }
    }
    sums
}

#[inline]
fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn distinct_rows(points: &Array2<f64>) -> usize {
    points
        .axis_iter(Axis(0))
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_config_validation() {
        assert!(KMeansConfig::default().validate().is_ok());
        assert!(KMeansConfig::with_k(0).validate().is_err());
        let config = KMeansConfig {
            convergence_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_separates_two_groups() {
        let points = array![[0.9, 0.1], [0.8, 0.2], [0.1, 0.9], [0.2, 0.8]];
        let fit = fit(&points, &KMeansConfig::with_k(2));
        assert_eq!(fit.assignments[0], fit.assignments[1]);
        assert_eq!(fit.assignments[2], fit.assignments[3]);
        assert_ne!(fit.assignments[0], fit.assignments[2]);
        assert!(fit.converged);
        // Every point is 0.05 off its centroid on both axes
        assert!((fit.inertia - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_k_reduced_to_distinct_rows() {
        let points = array![[0.5, 0.5], [0.5, 0.5], [0.1, 0.2]];
        assert_eq!(effective_k(&points, 4), 2);
        let fit = fit(&points, &KMeansConfig::with_k(4));
        let used: HashSet<usize> = fit.assignments.iter().copied().collect();
        assert_eq!(used.len(), 2);
        assert_eq!(fit.assignments[0], fit.assignments[1]);
    }

    #[test]
    fn test_same_seed_same_fit() {
        let points = Array2::from_shape_fn((20, 3), |(i, j)| ((i * 7 + j * 3) % 11) as f64 / 10.0);
        let config = KMeansConfig::with_k(3);
        let a = fit(&points, &config);
        let b = fit(&points, &config);
        assert_eq!(a.assignments, b.assignments);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn test_empty_input() {
        let points = Array2::<f64>::zeros((0, 3));
        let fit = fit(&points, &KMeansConfig::default());
        assert!(fit.assignments.is_empty());
        assert_eq!(fit.inertia, 0.0);
    }
}
