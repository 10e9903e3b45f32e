//! The stateful corpus service.

mod store;

pub use crate::analysis::RecomputeStage;
pub use store::{AnalyzeOutcome, CorpusStore, RecomputeReport};
