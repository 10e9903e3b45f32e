//! Embedding vectors and the math that runs over them.
//!
//! This module owns everything that touches raw `f32` vectors: generating
//! embeddings from document text, seeded spherical K-means, and the cosine
//! and normalization helpers the analysis stages share.
//!
//! # Architecture
//! Embeddings are produced behind the [`Embedder`] trait so the corpus store
//! never depends on a particular model. All vectors leaving an embedder are
//! unit length, which lets cosine similarity reduce to a dot product.

mod clustering;
mod embedding;
mod types;

// Re-export core types for public API
pub use clustering::{
    ClusteringError, KMeansResult, assign_to_nearest_centroid, cosine_similarity,
    kmeans_clustering, kmeans_with_restarts, normalize_vector, normalize_vector_copy,
};
pub use embedding::{Embedder, FastEmbedder, HashEmbedder, create_embedder, parse_embedding_model};
pub use types::{Score, VECTOR_DIMENSION_384, VectorDimension, VectorError};
