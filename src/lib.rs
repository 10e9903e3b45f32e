/// The main library module for scholarmap
pub mod analysis;
pub mod config;
pub mod corpus;
pub mod display;
pub mod error;
pub mod io;
pub mod storage;
pub mod text;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use corpus::{AnalyzeOutcome, CorpusStore, RecomputeReport, RecomputeStage};
pub use error::{CorpusError, CorpusResult};
pub use types::{
    Document, DocumentId, DocumentMetadata, EdgeKind, Position, SimilarityEdge, Visualization,
};
pub use vector::{Embedder, HashEmbedder};
