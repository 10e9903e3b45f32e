//! Exit codes for CLI operations following Unix conventions.
//!
//! - `0`: success
//! - `1`: unspecified failure
//! - `2`: blocking failure that should halt automation
//! - `3-125`: specific recoverable failures

use crate::error::CorpusError;

/// Process exit codes for `scholarmap` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,

    GeneralError = 1,

    /// The corpus snapshot cannot be trusted (code 2)
    BlockingError = 2,

    /// Document id not present in the corpus (code 3)
    NotFound = 3,

    /// Source file was rejected or had no usable text (code 4)
    InvalidInput = 4,

    IoError = 5,

    ConfigError = 6,

    /// Embedding model could not be loaded (code 7)
    ModelUnavailable = 7,

    UnsupportedOperation = 8,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// Map a corpus error to the exit code scripts should see.
    pub fn from_error(error: &CorpusError) -> Self {
        match error {
            CorpusError::DocumentNotFound { .. } => ExitCode::NotFound,
            CorpusError::InvalidDocument { .. } | CorpusError::Extraction { .. } => {
                ExitCode::InvalidInput
            }
            CorpusError::UnsupportedFileType { .. } => ExitCode::UnsupportedOperation,
            CorpusError::FileRead { .. } | CorpusError::PersistenceFailure { .. } => {
                ExitCode::IoError
            }
            CorpusError::LoadError { .. } => ExitCode::BlockingError,
            CorpusError::ConfigError { .. } => ExitCode::ConfigError,
            CorpusError::ModelUnavailable { .. } => ExitCode::ModelUnavailable,
            CorpusError::TaskJoin(_) | CorpusError::Analysis(_) => ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - automation should halt",
            ExitCode::NotFound => "Not found",
            ExitCode::InvalidInput => "Invalid input document",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::ModelUnavailable => "Embedding model unavailable",
            ExitCode::UnsupportedOperation => "Unsupported operation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as u8, 0);
        assert_eq!(ExitCode::GeneralError as u8, 1);
        assert_eq!(ExitCode::NotFound as u8, 3);
        assert_eq!(i32::from(ExitCode::ModelUnavailable), 7);
    }

    #[test]
    fn test_from_error() {
        let not_found = CorpusError::DocumentNotFound {
            id: "abc".to_string(),
        };
        assert_eq!(ExitCode::from_error(&not_found), ExitCode::NotFound);

        let model = CorpusError::ModelUnavailable {
            model: "AllMiniLML6V2".to_string(),
            reason: "offline".to_string(),
        };
        assert_eq!(ExitCode::from_error(&model), ExitCode::ModelUnavailable);

        let unsupported = CorpusError::UnsupportedFileType {
            path: PathBuf::from("scan.tiff"),
            extension: "tiff".to_string(),
        };
        assert_eq!(
            ExitCode::from_error(&unsupported),
            ExitCode::UnsupportedOperation
        );
        assert!(!ExitCode::from_error(&unsupported).is_success());

        let analysis = CorpusError::from(crate::vector::ClusteringError::DimensionMismatch);
        assert_eq!(ExitCode::from_error(&analysis), ExitCode::GeneralError);
    }
}
