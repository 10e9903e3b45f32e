//! Seeded spherical K-means.
//!
//! Points and centroids live on the unit sphere, so "distance" is
//! `1 - cos`. Centroids are seeded with K-means++ and refined with Lloyd
//! iterations until no assignment changes. Every random draw comes from a
//! `StdRng` seeded by the caller: the same input and seed always give the
//! same labels.

use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Upper bound on Lloyd iterations per run.
const MAX_ITERATIONS: usize = 100;

const EPSILON: f32 = 1e-10;

/// Labels and centroids from one K-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Unit-length centroids, indexed by cluster id.
    pub centroids: Vec<Vec<f32>>,

    /// Cluster id in `[0, k)` for each input row.
    pub assignments: Vec<usize>,

    pub iterations: usize,

    /// Sum over rows of `1 - cos(row, centroid)`.
    pub inertia: f32,
}

impl KMeansResult {
    /// How many cluster ids actually label at least one row.
    pub fn distinct_labels(&self) -> usize {
        let mut used = vec![false; self.centroids.len()];
        for &label in &self.assignments {
            used[label] = true;
        }
        used.iter().filter(|u| **u).count()
    }
}

#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error("No vectors to cluster\nSuggestion: Add documents before running the analysis")]
    EmptyVectorSet,

    #[error("Invalid cluster count: {0}\nSuggestion: Use k between 1 and the number of vectors")]
    InvalidClusterCount(usize),

    #[error(
        "Vectors have different lengths\nSuggestion: Re-embed the corpus with a single embedding model"
    )]
    DimensionMismatch,
}

/// Best of `restarts` runs by inertia, seeded `seed, seed + 1, ...`.
/// The earliest run wins a tie.
pub fn kmeans_with_restarts(
    vectors: &[Vec<f32>],
    k: usize,
    seed: u64,
    restarts: usize,
) -> Result<KMeansResult, ClusteringError> {
    let mut best = kmeans_clustering(vectors, k, seed)?;
    for run in 1..restarts {
        let candidate = kmeans_clustering(vectors, k, seed.wrapping_add(run as u64))?;
        if candidate.inertia < best.inertia {
            best = candidate;
        }
    }
    Ok(best)
}

/// One seeded spherical K-means run.
///
/// Rows need not be normalized; they are projected onto the unit sphere
/// first. Fails on an empty input, `k` outside `1..=N`, or ragged rows.
#[must_use = "clustering results should be used or the computation is wasted"]
pub fn kmeans_clustering(
    vectors: &[Vec<f32>],
    k: usize,
    seed: u64,
) -> Result<KMeansResult, ClusteringError> {
    let Some(first) = vectors.first() else {
        return Err(ClusteringError::EmptyVectorSet);
    };
    if k == 0 || k > vectors.len() {
        return Err(ClusteringError::InvalidClusterCount(k));
    }
    if vectors.iter().any(|v| v.len() != first.len()) {
        return Err(ClusteringError::DimensionMismatch);
    }

    let points: Vec<Vec<f32>> = vectors.iter().map(|v| normalize_vector_copy(v)).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = seed_centroids(&points, k, &mut rng);
    let mut assignments = assign_all(&points, &centroids);
    let mut iterations = 1;

    while iterations < MAX_ITERATIONS {
        centroids = mean_directions(&points, &assignments, &centroids);
        let next = assign_all(&points, &centroids);
        iterations += 1;
        if next == assignments {
            break;
        }
        assignments = next;
    }

    if iterations == MAX_ITERATIONS {
        tracing::debug!("k-means (k={k}) hit {MAX_ITERATIONS} iterations");
    }

    let inertia = points
        .iter()
        .zip(&assignments)
        .map(|(p, &c)| 1.0 - dot(p, &centroids[c]))
        .sum();

    Ok(KMeansResult {
        centroids,
        assignments,
        iterations,
        inertia,
    })
}

/// Index of the centroid with the highest cosine to `vector`; ties go to the
/// lowest index.
pub fn assign_to_nearest_centroid(vector: &[f32], centroids: &[Vec<f32>]) -> usize {
    centroids
        .iter()
        .map(|c| cosine_similarity(vector, c))
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, sim)| {
            if sim > best.1 { (i, sim) } else { best }
        })
        .0
}

fn assign_all(points: &[Vec<f32>], centroids: &[Vec<f32>]) -> Vec<usize> {
    points
        .iter()
        .map(|p| assign_to_nearest_centroid(p, centroids))
        .collect()
}

/// K-means++ seeding with `(1 - cos)^2` weights.
///
/// When every point already sits on a chosen centroid the weights vanish
/// and a uniformly drawn point is duplicated, so exactly `k` centroids
/// come back.
fn seed_centroids(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centroids = vec![points[rng.random_range(0..points.len())].clone()];
    let mut nearest: Vec<f32> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let pick = match WeightedIndex::new(&nearest) {
            Ok(weights) => weights.sample(rng),
            Err(_) => rng.random_range(0..points.len()),
        };
        let chosen = points[pick].clone();
        for (d, p) in nearest.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &chosen));
        }
        centroids.push(chosen);
    }

    centroids
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    let d = (1.0 - dot(a, b)).max(0.0);
    d * d
}

/// Normalized member sums. A cluster that lost all members takes over the
/// point lying farthest from its own centroid.
fn mean_directions(
    points: &[Vec<f32>],
    assignments: &[usize],
    previous: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    let dimension = points[0].len();
    let mut sums = vec![vec![0.0f32; dimension]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (p, &c) in points.iter().zip(assignments) {
        for (s, x) in sums[c].iter_mut().zip(p) {
            *s += x;
        }
        counts[c] += 1;
    }

    for (cluster, sum) in sums.iter_mut().enumerate() {
        if counts[cluster] == 0 {
            let farthest = points
                .iter()
                .zip(assignments)
                .map(|(p, &c)| 1.0 - dot(p, &previous[c]))
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(0, |(i, _)| i);
            sum.clone_from(&points[farthest]);
        } else {
            normalize_vector(sum);
        }
    }

    sums
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity in `[-1, 1]`. Zero when either vector is all zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot(a, b) / (norm_a * norm_b)
    }
}

/// Scale to unit length in place. Near-zero vectors are left unchanged.
pub fn normalize_vector(vector: &mut [f32]) {
    let norm = dot(vector, vector).sqrt();
    if norm > EPSILON {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

pub fn normalize_vector_copy(vector: &[f32]) -> Vec<f32> {
    let mut normalized = vector.to_vec();
    normalize_vector(&mut normalized);
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_axis_groups() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.1, 0.0],
            vec![0.9, 0.2, 0.1],
            vec![1.1, 0.0, 0.2],
            vec![0.1, 1.0, 0.0],
            vec![0.2, 0.9, 0.1],
            vec![0.0, 1.1, 0.2],
            vec![0.0, 0.1, 1.0],
            vec![0.1, 0.2, 0.9],
            vec![0.2, 0.0, 1.1],
        ]
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_nearest_centroid_prefers_lowest_index_on_tie() {
        let centroids = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]];
        assert_eq!(assign_to_nearest_centroid(&[0.9, 0.1], &centroids), 0);
        assert_eq!(assign_to_nearest_centroid(&[0.1, 0.9], &centroids), 1);
    }

    #[test]
    fn test_separated_groups_are_recovered() {
        let result = kmeans_with_restarts(&three_axis_groups(), 3, 42, 4).unwrap();

        assert_eq!(result.centroids.len(), 3);
        assert_eq!(result.distinct_labels(), 3);
        assert!(result.iterations <= MAX_ITERATIONS);
        for group in 0..3 {
            let first = result.assignments[group * 3];
            assert_eq!(result.assignments[group * 3 + 1], first);
            assert_eq!(result.assignments[group * 3 + 2], first);
        }
        for centroid in &result.centroids {
            assert!((dot(centroid, centroid).sqrt() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let vectors = three_axis_groups();
        assert_eq!(
            kmeans_clustering(&vectors, 3, 7).unwrap(),
            kmeans_clustering(&vectors, 3, 7).unwrap()
        );
    }

    #[test]
    fn test_restarts_never_worse_than_first_run() {
        let vectors = three_axis_groups();
        let single = kmeans_clustering(&vectors, 2, 11).unwrap();
        let best = kmeans_with_restarts(&vectors, 2, 11, 5).unwrap();
        assert!(best.inertia <= single.inertia);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            kmeans_clustering(&[], 1, 0),
            Err(ClusteringError::EmptyVectorSet)
        ));
        assert!(matches!(
            kmeans_clustering(&[vec![1.0, 2.0]], 0, 0),
            Err(ClusteringError::InvalidClusterCount(0))
        ));
        assert!(matches!(
            kmeans_clustering(&[vec![1.0, 2.0], vec![3.0, 4.0]], 3, 0),
            Err(ClusteringError::InvalidClusterCount(3))
        ));
        assert!(matches!(
            kmeans_clustering(&[vec![1.0, 2.0], vec![3.0, 4.0, 5.0]], 1, 0),
            Err(ClusteringError::DimensionMismatch)
        ));
    }

    #[test]
    fn test_identical_vectors_still_yield_k_centroids() {
        let result = kmeans_clustering(&vec![vec![1.0, 0.0]; 4], 3, 42).unwrap();
        assert_eq!(result.centroids.len(), 3);
        assert_eq!(result.distinct_labels(), 1);
    }

    #[test]
    fn test_single_cluster() {
        let vectors = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]];
        let result = kmeans_clustering(&vectors, 1, 42).unwrap();
        assert!(result.assignments.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_normalize_vector() {
        let mut vector = vec![3.0, 4.0];
        normalize_vector(&mut vector);
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize_vector(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
