//! JSON snapshot of the corpus: document records plus the embedding matrix.
//!
//! The file is rewritten whole after every recompute. Writes go to a temp
//! file in the same directory and are renamed into place, so a crash never
//! leaves a half-written snapshot behind.

use crate::error::{CorpusError, CorpusResult};
use crate::types::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// On-disk form of the corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub papers: Vec<Document>,

    /// Embedding rows aligned with `papers`; empty when no matrix exists.
    #[serde(default)]
    pub vectors: Vec<Vec<f32>>,
}

impl CorpusSnapshot {
    pub fn new(papers: Vec<Document>, vectors: Option<Vec<Vec<f32>>>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            updated_at: Some(Utc::now()),
            papers,
            vectors: vectors.unwrap_or_default(),
        }
    }

    /// Split into documents and matrix.
    ///
    /// The matrix is absent when it is empty, when its row count differs from
    /// the document count, or when its rows disagree in length.
    pub fn into_parts(self) -> (Vec<Document>, Option<Vec<Vec<f32>>>) {
        let Self {
            papers, vectors, ..
        } = self;

        if vectors.is_empty() || vectors.len() != papers.len() {
            if !vectors.is_empty() {
                tracing::warn!(
                    "Snapshot has {} vectors for {} documents; matrix discarded",
                    vectors.len(),
                    papers.len()
                );
            }
            return (papers, None);
        }

        let dimension = vectors[0].len();
        if dimension == 0 || vectors.iter().any(|v| v.len() != dimension) {
            tracing::warn!("Snapshot vectors have inconsistent dimensions; matrix discarded");
            return (papers, None);
        }

        (papers, Some(vectors))
    }
}

/// Reads and writes the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the snapshot; `Ok(None)` when no file exists yet.
    pub fn load(&self) -> CorpusResult<Option<CorpusSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path).map_err(|e| CorpusError::LoadError {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let snapshot: CorpusSnapshot =
            serde_json::from_str(&json).map_err(|e| CorpusError::LoadError {
                path: self.path.clone(),
                reason: format!("Failed to parse snapshot: {e}"),
            })?;

        if snapshot.version > SNAPSHOT_VERSION {
            tracing::warn!(
                "Snapshot version {} is newer than supported version {SNAPSHOT_VERSION}",
                snapshot.version
            );
        }

        Ok(Some(snapshot))
    }

    /// Atomically replace the snapshot file.
    #[must_use = "Save errors should be handled to ensure data is persisted"]
    pub fn save(&self, snapshot: &CorpusSnapshot) -> CorpusResult<()> {
        let failure = |reason: String| CorpusError::PersistenceFailure {
            path: self.path.clone(),
            reason,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| failure(e.to_string()))?;

        let temp = NamedTempFile::new_in(&parent).map_err(|e| failure(e.to_string()))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, snapshot)
                .map_err(|e| failure(format!("Failed to serialize snapshot: {e}")))?;
            writer.flush().map_err(|e| failure(e.to_string()))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| failure(e.to_string()))?;
        temp.persist(&self.path)
            .map_err(|e| failure(e.error.to_string()))?;

        Ok(())
    }

    /// Copy an unreadable snapshot aside so the next save cannot clobber it.
    pub fn back_up(&self) -> CorpusResult<PathBuf> {
        let backup = self.path.with_extension("json.bak");
        std::fs::copy(&self.path, &backup).map_err(|e| CorpusError::PersistenceFailure {
            path: backup.clone(),
            reason: e.to_string(),
        })?;
        Ok(backup)
    }
}
