//! Cluster membership strength and display size.

use crate::types::BASE_SIZE;
use crate::vector::{Score, cosine_similarity};

/// Display size gained per unit of confidence.
pub const SIZE_PER_CONFIDENCE: f32 = 5.0;

/// Confidence and display size of one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Membership {
    pub confidence: Score,
    pub size: f32,
}

/// Cosine of a vector to its centroid, clamped to `[0, 1]`.
pub fn confidence(vector: &[f32], centroid: &[f32]) -> Score {
    Score::clamped(cosine_similarity(vector, centroid))
}

/// `BASE_SIZE + SIZE_PER_CONFIDENCE * confidence`.
pub fn display_size(confidence: Score) -> f32 {
    BASE_SIZE + SIZE_PER_CONFIDENCE * confidence.get()
}

/// Score every row against the centroid of its assigned cluster.
///
/// A row whose cluster id has no centroid is scored against itself.
pub fn score_memberships(
    vectors: &[Vec<f32>],
    assignments: &[usize],
    centroids: &[Vec<f32>],
) -> Vec<Membership> {
    vectors
        .iter()
        .zip(assignments)
        .map(|(vector, &cluster)| {
            let centroid = centroids.get(cluster).map_or(vector.as_slice(), Vec::as_slice);
            let confidence = confidence(vector, centroid);
            Membership {
                confidence,
                size: display_size(confidence),
            }
        })
        .collect()
}
