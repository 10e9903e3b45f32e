//! The recompute pipeline over the corpus matrix.
//!
//! Stages run in a fixed order on an N×D matrix of unit vectors:
//!
//! 1. [`ClusterSelector`] picks `k` and assigns every row.
//! 2. [`Projector`] reduces the matrix to 3-D.
//! 3. [`LayoutArranger`] pulls clusters apart.
//! 4. [`score_memberships`] rates each row against its centroid.
//!
//! The [`SimilarityGraphBuilder`] is separate: it runs at read time and its
//! output is never stored.

pub mod confidence;
pub mod graph;
pub mod layout;
pub mod projection;
pub mod selector;

pub use confidence::{Membership, display_size, score_memberships};
pub use graph::SimilarityGraphBuilder;
pub use layout::LayoutArranger;
pub use projection::{
    ManifoldProjector, NeighborEmbedding, Projection, ProjectionError, ProjectionOutcome, Projector,
};
pub use selector::{
    ClusterAlgorithm, ClusterAssignment, ClusterSelector, SelectionOutcome, SphericalKMeans,
};

use crate::config::AnalysisConfig;
use crate::types::Position;
use crate::vector::ClusteringError;

/// Phases of a corpus recompute, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeStage {
    Idle,
    Embedding,
    Clustering,
    Projecting,
    Arranging,
    Scoring,
    Persisting,
}

impl std::fmt::Display for RecomputeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Embedding => "embedding",
            Self::Clustering => "clustering",
            Self::Projecting => "projecting",
            Self::Arranging => "arranging",
            Self::Scoring => "scoring",
            Self::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// Everything a recompute writes back onto the documents, row-aligned.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub assignments: Vec<usize>,
    pub memberships: Vec<Membership>,
    pub positions: Vec<Position>,
    pub cluster_count: usize,
    pub selection: SelectionOutcome,
    pub projection: ProjectionOutcome,
}

/// The clustering, projection, layout and scoring stages wired together.
#[derive(Debug)]
pub struct AnalysisPipeline {
    selector: ClusterSelector,
    projector: Projector,
    arranger: LayoutArranger,
}

impl AnalysisPipeline {
    pub fn new(selector: ClusterSelector, projector: Projector, arranger: LayoutArranger) -> Self {
        Self {
            selector,
            projector,
            arranger,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            ClusterSelector::from_config(config),
            Projector::from_config(config),
            LayoutArranger::new(config.layout_radius, config.contraction),
        )
    }

    /// Run every stage over a non-empty matrix.
    pub fn run(&self, vectors: &[Vec<f32>]) -> Result<AnalysisResult, ClusteringError> {
        self.run_observed(vectors, |_| {})
    }

    /// Like [`run`](Self::run), reporting each stage as it starts.
    pub fn run_observed(
        &self,
        vectors: &[Vec<f32>],
        mut on_stage: impl FnMut(RecomputeStage),
    ) -> Result<AnalysisResult, ClusteringError> {
        on_stage(RecomputeStage::Clustering);
        let clusters = self.selector.select(vectors)?;
        tracing::debug!("clustering: {:?}", clusters.outcome);

        on_stage(RecomputeStage::Projecting);
        let Projection {
            mut positions,
            outcome,
        } = self.projector.project(vectors);
        tracing::debug!("projection: {outcome:?}");

        on_stage(RecomputeStage::Arranging);
        let cluster_count = clusters.cluster_count();
        self.arranger
            .arrange(&mut positions, &clusters.assignments, cluster_count);

        on_stage(RecomputeStage::Scoring);
        let memberships = score_memberships(vectors, &clusters.assignments, &clusters.centroids);

        Ok(AnalysisResult {
            assignments: clusters.assignments,
            memberships,
            positions,
            cluster_count,
            selection: clusters.outcome,
            projection: outcome,
        })
    }
}
