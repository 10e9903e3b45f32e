//! Automatic cluster-count selection.
//!
//! Every candidate `k` in `[2, min(max_clusters, N)]` is clustered with the
//! configured [`ClusterAlgorithm`] and scored by the mean cosine silhouette.
//! Candidates whose labelling collapses (fewer than two distinct labels, or
//! one label per point) are skipped. When nothing survives, a size-based
//! fallback `k` is used without scoring.

use crate::config::AnalysisConfig;
use crate::vector::{ClusteringError, KMeansResult, cosine_similarity, kmeans_with_restarts};
use rayon::prelude::*;

/// Partitioning algorithm run for a fixed `k`.
pub trait ClusterAlgorithm: Send + Sync {
    fn cluster(&self, vectors: &[Vec<f32>], k: usize) -> Result<KMeansResult, ClusteringError>;
}

/// Seeded spherical K-means keeping the best of several restarts.
#[derive(Debug, Clone)]
pub struct SphericalKMeans {
    pub seed: u64,
    pub restarts: usize,
}

impl ClusterAlgorithm for SphericalKMeans {
    fn cluster(&self, vectors: &[Vec<f32>], k: usize) -> Result<KMeansResult, ClusteringError> {
        kmeans_with_restarts(vectors, k, self.seed, self.restarts)
    }
}

/// How the final cluster count was reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionOutcome {
    /// One document, one cluster.
    Single,
    /// Best silhouette among the candidates.
    Scored { k: usize, silhouette: f32 },
    /// No candidate survived; size-based `k` accepted as is.
    Fallback { k: usize },
}

/// Cluster assignment for every row of the corpus matrix.
#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
    pub outcome: SelectionOutcome,
}

impl ClusterAssignment {
    /// Number of clusters, including any left empty by the algorithm.
    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }
}

pub struct ClusterSelector {
    algorithm: Box<dyn ClusterAlgorithm>,
    max_clusters: usize,
}

impl std::fmt::Debug for ClusterSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSelector")
            .field("max_clusters", &self.max_clusters)
            .finish_non_exhaustive()
    }
}

impl ClusterSelector {
    pub fn new(algorithm: Box<dyn ClusterAlgorithm>, max_clusters: usize) -> Self {
        Self {
            algorithm,
            max_clusters: max_clusters.max(2),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            Box::new(SphericalKMeans {
                seed: config.seed,
                restarts: config.kmeans_restarts,
            }),
            config.max_clusters,
        )
    }

    /// Choose a cluster count and assign every vector.
    pub fn select(&self, vectors: &[Vec<f32>]) -> Result<ClusterAssignment, ClusteringError> {
        let n = vectors.len();
        match n {
            0 => return Err(ClusteringError::EmptyVectorSet),
            1 => {
                return Ok(ClusterAssignment {
                    assignments: vec![0],
                    centroids: vec![vectors[0].clone()],
                    outcome: SelectionOutcome::Single,
                });
            }
            _ => {}
        }

        let distances = cosine_distance_matrix(vectors);
        let mut best: Option<(f32, usize, KMeansResult)> = None;

        for k in 2..=self.max_clusters.min(n) {
            let result = match self.algorithm.cluster(vectors, k) {
                Ok(result) => result,
                Err(e) => {
                    tracing::debug!("k={k} clustering failed: {e}");
                    continue;
                }
            };

            let distinct = result.distinct_labels();
            if distinct < 2 || distinct >= n {
                tracing::debug!("k={k} rejected: {distinct} distinct labels for {n} points");
                continue;
            }

            let score = silhouette_score(&result.assignments, &distances);
            tracing::debug!("k={k} silhouette={score:.4}");
            if best.as_ref().is_none_or(|(best_score, _, _)| score > *best_score) {
                best = Some((score, k, result));
            }
        }

        if let Some((silhouette, k, result)) = best {
            return Ok(ClusterAssignment {
                assignments: result.assignments,
                centroids: result.centroids,
                outcome: SelectionOutcome::Scored { k, silhouette },
            });
        }

        let k = fallback_cluster_count(n);
        tracing::warn!("No usable cluster count among candidates; falling back to k={k}");
        let result = self.algorithm.cluster(vectors, k)?;
        Ok(ClusterAssignment {
            assignments: result.assignments,
            centroids: result.centroids,
            outcome: SelectionOutcome::Fallback { k },
        })
    }
}

/// `min(5, max(2, round(sqrt(n))), n)`.
pub fn fallback_cluster_count(n: usize) -> usize {
    let root = (n as f64).sqrt().round() as usize;
    root.max(2).min(5).min(n)
}

/// Pairwise `1 - cos` distances, zero on the diagonal.
pub fn cosine_distance_matrix(vectors: &[Vec<f32>]) -> Vec<Vec<f32>> {
    vectors
        .par_iter()
        .enumerate()
        .map(|(i, a)| {
            vectors
                .iter()
                .enumerate()
                .map(|(j, b)| {
                    if i == j {
                        0.0
                    } else {
                        (1.0 - cosine_similarity(a, b)).max(0.0)
                    }
                })
                .collect()
        })
        .collect()
}

/// Mean silhouette coefficient over all points.
///
/// Points alone in their cluster score 0.
pub fn silhouette_score(labels: &[usize], distances: &[Vec<f32>]) -> f32 {
    let n = labels.len();
    if n == 0 {
        return 0.0;
    }
    let cluster_count = labels.iter().copied().max().map_or(0, |m| m + 1);

    let total: f32 = (0..n)
        .map(|i| {
            let mut sums = vec![0.0f32; cluster_count];
            let mut counts = vec![0usize; cluster_count];
            for j in 0..n {
                if i != j {
                    sums[labels[j]] += distances[i][j];
                    counts[labels[j]] += 1;
                }
            }

            let own = labels[i];
            if counts[own] == 0 {
                return 0.0;
            }
            let a = sums[own] / counts[own] as f32;
            let b = (0..cluster_count)
                .filter(|&c| c != own && counts[c] > 0)
                .map(|c| sums[c] / counts[c] as f32)
                .fold(f32::INFINITY, f32::min);
            if !b.is_finite() {
                return 0.0;
            }

            let denom = a.max(b);
            if denom <= f32::EPSILON {
                0.0
            } else {
                (b - a) / denom
            }
        })
        .sum();

    total / n as f32
}
