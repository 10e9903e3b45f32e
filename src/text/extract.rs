//! Pulling raw text out of source files.

use crate::error::{CorpusError, CorpusResult, ErrorContext};
use crate::text::clean_text;
use std::path::Path;

/// Extensions the bundled extractor reads.
const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// Source-file to text conversion.
pub trait TextExtractor: Send + Sync {
    /// Cleaned text of the file at `path`.
    fn extract(&self, path: &Path) -> CorpusResult<String>;

    /// Whether this extractor handles the file at `path`.
    fn supports(&self, path: &Path) -> bool;
}

/// Whether the file has an extension the plain-text extractor reads.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
}

/// UTF-8 `.txt` and `.md` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> CorpusResult<String> {
        if !self.supports(path) {
            return Err(CorpusError::UnsupportedFileType {
                path: path.to_path_buf(),
                extension: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_string(),
            });
        }

        let bytes = std::fs::read(path).with_path(path)?;
        let text = String::from_utf8(bytes).map_err(|e| CorpusError::Extraction {
            path: path.to_path_buf(),
            reason: format!("not valid UTF-8: {e}"),
        })?;
        Ok(clean_text(&text))
    }

    fn supports(&self, path: &Path) -> bool {
        is_supported(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extracts_and_cleans_text() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.MD");
        std::fs::write(&path, "Title\t\there\n\n\n\nbody").unwrap();

        let text = PlainTextExtractor.extract(&path).unwrap();
        assert_eq!(text, "Title here\n\nbody");
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let result = PlainTextExtractor.extract(Path::new("paper.docx"));
        assert!(matches!(
            result,
            Err(CorpusError::UnsupportedFileType { extension, .. }) if extension == "docx"
        ));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("binary.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        assert!(matches!(
            PlainTextExtractor.extract(&path),
            Err(CorpusError::Extraction { .. })
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let result = PlainTextExtractor.extract(Path::new("/nonexistent/file.txt"));
        assert!(matches!(result, Err(CorpusError::FileRead { .. })));
    }
}
