//! Error types for the corpus analysis system
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages. Only failures that callers
//! can act on are surfaced here; degraded-but-valid pipeline stages are
//! reported through outcome enums in [`crate::analysis`].

use crate::vector::ClusteringError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for corpus operations
#[derive(Error, Debug)]
pub enum CorpusError {
    /// The embedding backend could not be loaded or used.
    ///
    /// Fatal to the recompute in progress; previously computed document
    /// fields are left untouched.
    #[error("Embedding model '{model}' is unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    /// Text could not be pulled out of a source file
    #[error("Failed to extract text from '{path}': {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("Unsupported file type '{extension}' for file '{path}'. Supported types: .txt, .md")]
    UnsupportedFileType { path: PathBuf, extension: String },

    /// The document was rejected before entering the corpus
    #[error("Invalid document '{name}': {reason}")]
    InvalidDocument { name: String, reason: String },

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Snapshot write failure. Logged by the store, never fatal to a recompute.
    #[error("Failed to persist corpus snapshot to '{path}': {reason}")]
    PersistenceFailure { path: PathBuf, reason: String },

    #[error("Failed to load corpus snapshot from '{path}': {reason}")]
    LoadError { path: PathBuf, reason: String },

    #[error("Document '{id}' not found in corpus")]
    DocumentNotFound { id: String },

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    /// Background task failed to complete
    #[error("Background recompute did not complete: {0}")]
    TaskJoin(String),

    /// Clustering rejected the embedding matrix. Not expected for a matrix
    /// the store has validated.
    #[error("Analysis failed: {0}")]
    Analysis(#[from] ClusteringError),
}

impl CorpusError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            Self::Extraction { .. } => "EXTRACTION_ERROR",
            Self::UnsupportedFileType { .. } => "UNSUPPORTED_FILE_TYPE",
            Self::InvalidDocument { .. } => "INVALID_DOCUMENT",
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::PersistenceFailure { .. } => "PERSISTENCE_ERROR",
            Self::LoadError { .. } => "LOAD_ERROR",
            Self::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::TaskJoin(_) => "TASK_JOIN_ERROR",
            Self::Analysis(_) => "ANALYSIS_ERROR",
        }
        .to_string()
    }

    /// Whether retrying the same request can succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. } | Self::TaskJoin(_))
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::ModelUnavailable { .. } => vec![
                "Check network access for the first model download",
                "Offline mode reuses a model already in embedding.cache_dir",
                "Set embedding.local_model_dir to a directory holding model.onnx and tokenizer files",
                "Existing topic assignments were kept; retry once the model is reachable",
            ],
            Self::PersistenceFailure { .. } => vec![
                "In-memory results are still valid and will be saved on the next recompute",
                "Check disk space and permissions in the data directory",
            ],
            Self::LoadError { .. } => vec![
                "Move the broken snapshot aside and re-ingest the inbox",
                "Run 'scholarmap ingest' to rebuild the corpus",
            ],
            Self::InvalidDocument { .. } | Self::Extraction { .. } => vec![
                "The file may be empty, image-only or encrypted",
                "Provide at least a paragraph of plain text",
            ],
            Self::UnsupportedFileType { .. } => {
                vec!["Convert the document to plain text (.txt or .md) first"]
            }
            Self::ConfigError { .. } => {
                vec!["Run 'scholarmap init --force' to regenerate settings"]
            }
            _ => vec![],
        }
    }
}

/// Result type alias for corpus operations
pub type CorpusResult<T> = Result<T, CorpusError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Attach the file path the failing operation was reading.
    fn with_path(self, path: &std::path::Path) -> Result<T, CorpusError>;
}

impl<T> ErrorContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: &std::path::Path) -> Result<T, CorpusError> {
        self.map_err(|source| CorpusError::FileRead {
            path: path.to_path_buf(),
            source,
        })
    }
}
