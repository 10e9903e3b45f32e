//! Persistence for the corpus.

pub mod snapshot;

pub use snapshot::{CorpusSnapshot, SNAPSHOT_VERSION, SnapshotStore};
