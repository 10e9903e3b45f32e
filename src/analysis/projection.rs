//! Dimensionality reduction of the corpus matrix to 3-D coordinates.
//!
//! Corpora with at least `manifold_min_points` documents go through a
//! [`ManifoldProjector`] (by default [`NeighborEmbedding`], a seeded
//! UMAP-style neighbor embedding). Smaller corpora, and any manifold
//! failure, use a seeded PCA. Either way the result is centered and scaled so
//! the largest absolute coordinate equals the configured radius.

use crate::analysis::selector::cosine_distance_matrix;
use crate::config::AnalysisConfig;
use crate::types::Position;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Target spread of the embedded points.
const SPREAD: f32 = 1.0;

/// Minimum distance between embedded points.
const MIN_DIST: f32 = 0.12;

/// Optimization epochs for the neighbor embedding.
const EPOCHS: usize = 200;

/// Negative samples drawn per positive edge update.
const NEGATIVE_SAMPLES: usize = 5;

/// Gradient clip for a single coordinate update.
const GRADIENT_CLIP: f32 = 4.0;

/// Power iterations per principal component.
const POWER_ITERATIONS: usize = 200;

/// Below this eigenvalue a component carries no variance.
const RANK_EPSILON: f64 = 1e-9;

/// Below this the coordinate scale is treated as 1.0.
const SCALE_EPSILON: f32 = 1e-6;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("Manifold projection needs at least {required} points, got {actual}")]
    TooFewPoints { required: usize, actual: usize },

    #[error("Manifold projection produced non-finite coordinates")]
    NonFinite,

    #[error("Dimension mismatch in vectors")]
    DimensionMismatch,
}

/// Non-linear, neighborhood-preserving reduction to three dimensions.
pub trait ManifoldProjector: Send + Sync {
    fn project(&self, vectors: &[Vec<f32>], seed: u64) -> Result<Vec<[f32; 3]>, ProjectionError>;
}

/// Which reduction produced the coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// Zero or one document; nothing to reduce.
    Origin,
    Manifold,
    /// PCA; `reason` is set when the manifold projector was tried and failed.
    Linear { reason: Option<String> },
}

#[derive(Debug, Clone)]
pub struct Projection {
    pub positions: Vec<Position>,
    pub outcome: ProjectionOutcome,
}

pub struct Projector {
    manifold: Box<dyn ManifoldProjector>,
    seed: u64,
    manifold_min_points: usize,
    radius: f32,
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("seed", &self.seed)
            .field("manifold_min_points", &self.manifold_min_points)
            .field("radius", &self.radius)
            .finish_non_exhaustive()
    }
}

impl Projector {
    pub fn new(manifold: Box<dyn ManifoldProjector>, config: &AnalysisConfig) -> Self {
        Self {
            manifold,
            seed: config.seed,
            manifold_min_points: config.manifold_min_points,
            radius: config.projection_radius,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            Box::new(NeighborEmbedding::new(config.max_neighbors)),
            config,
        )
    }

    /// Reduce every row to a 3-D position.
    pub fn project(&self, vectors: &[Vec<f32>]) -> Projection {
        if vectors.len() <= 1 {
            return Projection {
                positions: vec![Position::ORIGIN; vectors.len()],
                outcome: ProjectionOutcome::Origin,
            };
        }

        let (mut coords, outcome) = if vectors.len() >= self.manifold_min_points {
            match self.manifold.project(vectors, self.seed) {
                Ok(coords) if coords.len() == vectors.len() => {
                    (coords, ProjectionOutcome::Manifold)
                }
                Ok(coords) => {
                    let reason = format!(
                        "manifold projector returned {} rows for {} vectors",
                        coords.len(),
                        vectors.len()
                    );
                    tracing::warn!("{reason}; using PCA");
                    (
                        pca_project(vectors, self.seed),
                        ProjectionOutcome::Linear {
                            reason: Some(reason),
                        },
                    )
                }
                Err(e) => {
                    tracing::warn!("Manifold projection failed ({e}); using PCA");
                    (
                        pca_project(vectors, self.seed),
                        ProjectionOutcome::Linear {
                            reason: Some(e.to_string()),
                        },
                    )
                }
            }
        } else {
            (
                pca_project(vectors, self.seed),
                ProjectionOutcome::Linear { reason: None },
            )
        };

        center_and_rescale(&mut coords, self.radius);
        Projection {
            positions: coords.into_iter().map(Position::from).collect(),
            outcome,
        }
    }
}

/// Center coordinates on the origin and scale the largest |coord| to `radius`.
pub fn center_and_rescale(coords: &mut [[f32; 3]], radius: f32) {
    if coords.is_empty() {
        return;
    }

    let n = coords.len() as f32;
    let mut mean = [0.0f32; 3];
    for point in coords.iter() {
        for c in 0..3 {
            mean[c] += point[c] / n;
        }
    }

    let mut max_abs = 0.0f32;
    for point in coords.iter_mut() {
        for c in 0..3 {
            point[c] -= mean[c];
            max_abs = max_abs.max(point[c].abs());
        }
    }

    let scale = if max_abs < SCALE_EPSILON { 1.0 } else { max_abs };
    for point in coords.iter_mut() {
        for value in point.iter_mut() {
            *value = *value / scale * radius;
        }
    }
}

/// Seeded PCA to three components by power iteration with deflation.
///
/// Components beyond the rank of the centered data are zero.
pub fn pca_project(vectors: &[Vec<f32>], seed: u64) -> Vec<[f32; 3]> {
    let n = vectors.len();
    if n == 0 {
        return Vec::new();
    }
    let dimension = vectors[0].len();

    let mut mean = vec![0.0f64; dimension];
    for vector in vectors {
        for (m, &x) in mean.iter_mut().zip(vector) {
            *m += f64::from(x) / n as f64;
        }
    }
    let centered: Vec<Vec<f64>> = vectors
        .iter()
        .map(|v| v.iter().zip(&mean).map(|(&x, m)| f64::from(x) - m).collect())
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut components: Vec<Vec<f64>> = Vec::with_capacity(3);
    let mut coords = vec![[0.0f32; 3]; n];

    for axis in 0..3.min(dimension) {
        let Some(component) = principal_component(&centered, &components, &mut rng) else {
            break;
        };
        for (row, coord) in centered.iter().zip(coords.iter_mut()) {
            coord[axis] = dot(row, &component) as f32;
        }
        components.push(component);
    }

    coords
}

fn principal_component(
    data: &[Vec<f64>],
    previous: &[Vec<f64>],
    rng: &mut StdRng,
) -> Option<Vec<f64>> {
    let dimension = data[0].len();
    let mut v: Vec<f64> = (0..dimension).map(|_| rng.random::<f64>() - 0.5).collect();
    orthogonalize(&mut v, previous);
    if !normalize(&mut v) {
        return None;
    }

    for _ in 0..POWER_ITERATIONS {
        let mut w = vec![0.0f64; dimension];
        for row in data {
            let score = dot(row, &v);
            for (wi, xi) in w.iter_mut().zip(row) {
                *wi += score * xi;
            }
        }
        orthogonalize(&mut w, previous);

        let eigenvalue = dot(&w, &w).sqrt();
        if eigenvalue < RANK_EPSILON {
            return None;
        }
        for x in w.iter_mut() {
            *x /= eigenvalue;
        }

        let delta = 1.0 - dot(&w, &v).abs();
        v = w;
        if delta < 1e-12 {
            break;
        }
    }

    // Largest loading positive, so the axis direction is stable
    let pivot = v
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if pivot < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }

    Some(v)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let projection = dot(v, b);
        for (x, y) in v.iter_mut().zip(b) {
            *x -= projection * y;
        }
    }
}

fn normalize(v: &mut [f64]) -> bool {
    let norm = dot(v, v).sqrt();
    if norm < RANK_EPSILON {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// UMAP-style neighbor embedding.
///
/// Builds a fuzzy k-nearest-neighbor graph over cosine distances (per-point
/// bandwidth, symmetrized by fuzzy union) and lays it out in 3-D with seeded
/// stochastic gradient descent: attraction along graph edges, repulsion
/// against negative samples.
#[derive(Debug, Clone)]
pub struct NeighborEmbedding {
    pub max_neighbors: usize,
    pub min_dist: f32,
    pub spread: f32,
    pub epochs: usize,
    pub negative_samples: usize,
}

impl NeighborEmbedding {
    pub fn new(max_neighbors: usize) -> Self {
        Self {
            max_neighbors: max_neighbors.max(1),
            min_dist: MIN_DIST,
            spread: SPREAD,
            epochs: EPOCHS,
            negative_samples: NEGATIVE_SAMPLES,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GraphEdge {
    head: usize,
    tail: usize,
    weight: f32,
}

impl ManifoldProjector for NeighborEmbedding {
    fn project(&self, vectors: &[Vec<f32>], seed: u64) -> Result<Vec<[f32; 3]>, ProjectionError> {
        let n = vectors.len();
        if n < 3 {
            return Err(ProjectionError::TooFewPoints {
                required: 3,
                actual: n,
            });
        }
        let dimension = vectors[0].len();
        if vectors.iter().any(|v| v.len() != dimension) {
            return Err(ProjectionError::DimensionMismatch);
        }

        let k = self.max_neighbors.min(n - 1);
        let distances = cosine_distance_matrix(vectors);
        let edges = fuzzy_neighbor_graph(&distances, k);
        let (a, b) = fit_curve(self.spread, self.min_dist);
        tracing::debug!(
            "neighbor embedding: n={n} k={k} edges={} a={a:.3} b={b:.3}",
            edges.len()
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let mut embedding = initial_layout(vectors, seed, &mut rng);
        self.optimize(&mut embedding, &edges, a, b, &mut rng);

        if embedding.iter().flatten().any(|x| !x.is_finite()) {
            return Err(ProjectionError::NonFinite);
        }
        Ok(embedding)
    }
}

impl NeighborEmbedding {
    fn optimize(
        &self,
        embedding: &mut [[f32; 3]],
        edges: &[GraphEdge],
        a: f32,
        b: f32,
        rng: &mut StdRng,
    ) {
        let n = embedding.len();
        let max_weight = edges.iter().map(|e| e.weight).fold(0.0f32, f32::max);
        if max_weight <= 0.0 {
            return;
        }

        for epoch in 0..self.epochs {
            let alpha = 1.0 - epoch as f32 / self.epochs as f32;

            for edge in edges {
                if rng.random::<f32>() > edge.weight / max_weight {
                    continue;
                }

                let (i, j) = (edge.head, edge.tail);
                let (yi, yj) = (embedding[i], embedding[j]);
                let d2 = squared_distance(&yi, &yj);
                if d2 > 0.0 {
                    let coef = -2.0 * a * b * d2.powf(b - 1.0) / (a * d2.powf(b) + 1.0);
                    for c in 0..3 {
                        let grad = clip(coef * (yi[c] - yj[c])) * alpha;
                        embedding[i][c] += grad;
                        embedding[j][c] -= grad;
                    }
                }

                for _ in 0..self.negative_samples {
                    let other = rng.random_range(0..n);
                    if other == i {
                        continue;
                    }
                    let (yi, yo) = (embedding[i], embedding[other]);
                    let d2 = squared_distance(&yi, &yo);
                    let coef = if d2 > 0.0 {
                        2.0 * b / ((0.001 + d2) * (a * d2.powf(b) + 1.0))
                    } else {
                        0.0
                    };
                    for c in 0..3 {
                        let grad = if coef > 0.0 {
                            clip(coef * (yi[c] - yo[c]))
                        } else {
                            GRADIENT_CLIP
                        };
                        embedding[i][c] += grad * alpha;
                    }
                }
            }
        }
    }
}

/// Random start for small corpora, scaled PCA for larger ones.
fn initial_layout(vectors: &[Vec<f32>], seed: u64, rng: &mut StdRng) -> Vec<[f32; 3]> {
    if vectors.len() < 10 {
        return (0..vectors.len())
            .map(|_| {
                [
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-10.0..10.0),
                ]
            })
            .collect();
    }

    let mut coords = pca_project(vectors, seed);
    center_and_rescale(&mut coords, 10.0);
    for point in coords.iter_mut() {
        for value in point.iter_mut() {
            *value += rng.random_range(-1e-4..1e-4);
        }
    }
    coords
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (0..3).map(|c| (a[c] - b[c]) * (a[c] - b[c])).sum()
}

fn clip(value: f32) -> f32 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

/// Directed edges of the symmetrized fuzzy kNN graph.
fn fuzzy_neighbor_graph(distances: &[Vec<f32>], k: usize) -> Vec<GraphEdge> {
    let n = distances.len();
    let target = (k as f32).log2();
    let mut membership = vec![vec![0.0f32; n]; n];

    for i in 0..n {
        let mut neighbors: Vec<(usize, f32)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (j, distances[i][j]))
            .collect();
        neighbors.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
        neighbors.truncate(k);

        let rho = neighbors.first().map_or(0.0, |(_, d)| *d);
        let sigma = smooth_bandwidth(&neighbors, rho, target);
        for (j, d) in neighbors {
            membership[i][j] = (-(d - rho).max(0.0) / sigma).exp();
        }
    }

    let mut edges = Vec::new();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let (p, q) = (membership[i][j], membership[j][i]);
            let weight = p + q - p * q;
            if weight > 0.0 {
                edges.push(GraphEdge {
                    head: i,
                    tail: j,
                    weight,
                });
            }
        }
    }
    edges
}

/// Binary search for the bandwidth whose membership sum equals `target`.
fn smooth_bandwidth(neighbors: &[(usize, f32)], rho: f32, target: f32) -> f32 {
    let mut lo = 0.0f32;
    let mut hi = f32::INFINITY;
    let mut mid = 1.0f32;

    for _ in 0..64 {
        let sum: f32 = neighbors
            .iter()
            .map(|(_, d)| (-(d - rho).max(0.0) / mid).exp())
            .sum();
        if (sum - target).abs() < 1e-5 {
            break;
        }
        if sum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_finite() { (lo + hi) / 2.0 } else { mid * 2.0 };
        }
    }

    let mean_distance = if neighbors.is_empty() {
        0.0
    } else {
        neighbors.iter().map(|(_, d)| d).sum::<f32>() / neighbors.len() as f32
    };
    mid.max(1e-3 * mean_distance).max(1e-6)
}

/// Fit `1 / (1 + a x^(2b))` to the offset-exponential membership curve.
fn fit_curve(spread: f32, min_dist: f32) -> (f32, f32) {
    let xs: Vec<f32> = (1..=300).map(|i| i as f32 * 3.0 * spread / 300.0).collect();
    let ys: Vec<f32> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();
    let error = |a: f32, b: f32| -> f32 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let r = 1.0 / (1.0 + a * x.powf(2.0 * b)) - y;
                r * r
            })
            .sum()
    };

    let search = |a_range: (f32, f32), b_range: (f32, f32), steps: usize| {
        let mut best = (a_range.0, b_range.0, f32::INFINITY);
        for ia in 0..=steps {
            let a = a_range.0 + (a_range.1 - a_range.0) * ia as f32 / steps as f32;
            for ib in 0..=steps {
                let b = b_range.0 + (b_range.1 - b_range.0) * ib as f32 / steps as f32;
                let e = error(a, b);
                if e < best.2 {
                    best = (a, b, e);
                }
            }
        }
        best
    };

    let (a, b, _) = search((0.2, 4.0), (0.3, 2.0), 50);
    let (a_step, b_step) = (3.8 / 50.0, 1.7 / 50.0);
    let (a, b, _) = search(
        ((a - a_step).max(0.01), a + a_step),
        ((b - b_step).max(0.01), b + b_step),
        20,
    );
    (a, b)
}
