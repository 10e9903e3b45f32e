//! Sparse similarity graph computed at read time.
//!
//! Each document keeps its `top_k` most similar neighbors whose cosine
//! similarity exceeds the threshold. Pairs are deduplicated on the sorted id
//! pair, so every undirected edge appears once.

use crate::config::GraphConfig;
use crate::types::{Document, EdgeKind, SimilarityEdge};
use crate::vector::cosine_similarity;
use rayon::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct SimilarityGraphBuilder {
    pub top_k: usize,
    pub threshold: f32,
}

impl SimilarityGraphBuilder {
    pub fn new(top_k: usize, threshold: f32) -> Self {
        Self { top_k, threshold }
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        Self::new(config.top_k, config.threshold)
    }

    /// Build edges for documents whose vectors sit at the same row index.
    ///
    /// Returns no edges for fewer than two documents or mismatched inputs.
    pub fn build(&self, documents: &[Document], vectors: &[Vec<f32>]) -> Vec<SimilarityEdge> {
        let n = documents.len();
        if n < 2 || vectors.len() != n {
            return Vec::new();
        }
        let k = self.top_k.min(n - 1);

        let neighbor_lists: Vec<Vec<(usize, f32)>> = vectors
            .par_iter()
            .enumerate()
            .map(|(i, a)| {
                let mut row: Vec<(usize, f32)> = vectors
                    .iter()
                    .enumerate()
                    .map(|(j, b)| (j, if i == j { 0.0 } else { cosine_similarity(a, b) }))
                    .collect();
                row.sort_by(|x, y| y.1.total_cmp(&x.1).then(x.0.cmp(&y.0)));
                row.truncate(k);
                row
            })
            .collect();

        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let mut edges = Vec::new();

        for (i, neighbors) in neighbor_lists.iter().enumerate() {
            for &(j, weight) in neighbors {
                if i == j || weight.is_nan() || weight <= self.threshold {
                    continue;
                }

                let (a, b) = (&documents[i], &documents[j]);
                let (source, target) = if a.id <= b.id { (a, b) } else { (b, a) };
                if !seen.insert((source.id.as_str(), target.id.as_str())) {
                    continue;
                }

                edges.push(SimilarityEdge {
                    source: source.id.clone(),
                    target: target.id.clone(),
                    weight: weight.min(1.0),
                    kind: if a.cluster == b.cluster {
                        EdgeKind::Intra
                    } else {
                        EdgeKind::Bridge
                    },
                });
            }
        }

        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentId;

    fn documents(ids: &[&str]) -> Vec<Document> {
        ids.iter()
            .map(|id| Document::new(DocumentId::new(*id), format!("{id}.txt")))
            .collect()
    }

    #[test]
    fn test_all_similar_triangle_has_three_edges() {
        let docs = documents(&["c", "a", "b"]);
        let vectors = vec![vec![1.0, 0.1], vec![1.0, 0.2], vec![1.0, 0.0]];
        let edges = SimilarityGraphBuilder::new(4, 0.28).build(&docs, &vectors);

        assert_eq!(edges.len(), 3);
        for edge in &edges {
            assert!(edge.source < edge.target);
            assert!(edge.weight > 0.28 && edge.weight <= 1.0);
            assert_eq!(edge.kind, EdgeKind::Intra);
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let docs = documents(&["a", "b"]);
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        // cos = 1.0 exactly
        assert!(SimilarityGraphBuilder::new(4, 1.0).build(&docs, &vectors).is_empty());
        assert_eq!(SimilarityGraphBuilder::new(4, 0.99).build(&docs, &vectors).len(), 1);
    }

    #[test]
    fn test_bridge_edges_cross_clusters() {
        let mut docs = documents(&["a", "b"]);
        docs[1].assign_cluster(1);
        let edges = SimilarityGraphBuilder::new(4, 0.28)
            .build(&docs, &[vec![1.0, 0.0], vec![0.9, 0.1]]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::Bridge);
    }

    #[test]
    fn test_top_k_limits_neighbors() {
        let ids: Vec<String> = (0..6).map(|i| format!("d{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let docs = documents(&id_refs);
        let vectors = vec![vec![1.0, 0.0]; 6];

        let edges = SimilarityGraphBuilder::new(1, 0.28).build(&docs, &vectors);
        // Each document contributes at most one edge
        assert!(edges.len() <= 6);
        let edges_all = SimilarityGraphBuilder::new(5, 0.28).build(&docs, &vectors);
        assert_eq!(edges_all.len(), 15);
    }

    #[test]
    fn test_degenerate_inputs() {
        let builder = SimilarityGraphBuilder::new(4, 0.28);
        assert!(builder.build(&documents(&["a"]), &[vec![1.0]]).is_empty());
        assert!(builder.build(&documents(&["a", "b"]), &[vec![1.0]]).is_empty());
    }
}
