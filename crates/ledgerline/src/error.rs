//! Error types for the reconstruction pipeline.
//!
//! Uses [`thiserror`] for error derivation. [`ParseError`] distinguishes
//! user-facing intake/stage failures from internal ones; only the
//! user-facing kinds map to their own UI strings, everything else collapses
//! to the unknown-error message.

use thiserror::Error;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Fatal pipeline error.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input document could not be read at all.
    #[error("unable to read the PDF")]
    PdfUnreadable,

    /// The input document is structurally corrupted.
    #[error("the PDF is corrupted")]
    PdfCorrupted,

    /// The input document is password-protected.
    #[error("the PDF is locked")]
    PdfLocked,

    /// The document has no extractable text on any page.
    #[error("the PDF is image-based, no extractable text found")]
    PdfImageBased,

    /// No table header row could be detected.
    #[error("unable to find table headers")]
    HeadersNotFound,

    /// A stage failed for an internal reason.
    #[error("stage {stage} failed: {message}")]
    Stage {
        /// Name of the failing stage.
        stage: &'static str,
        /// Human-readable cause.
        message: String,
    },

    /// The object store rejected or lost an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// Local I/O failure (spill files, outputs).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stream record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParseError {
    /// Short machine-readable tag for job failure records.
    pub fn error_type(&self) -> &'static str {
        match self {
            ParseError::PdfUnreadable => "PdfUnreadable",
            ParseError::PdfCorrupted => "PdfCorrupted",
            ParseError::PdfLocked => "PdfLocked",
            ParseError::PdfImageBased => "PdfImageBased",
            ParseError::HeadersNotFound => "HeadersNotFound",
            ParseError::Stage { .. } => "StageInternal",
            ParseError::Storage(_) => "StorageUnavailable",
            ParseError::Io(_) => "Io",
            ParseError::Json(_) => "Json",
        }
    }

    /// The message shown to end users.
    ///
    /// Internal kinds are deliberately not surfaced.
    pub fn user_message(&self) -> &'static str {
        match self {
            ParseError::PdfUnreadable => "Not able to read the pdf",
            ParseError::PdfLocked => "Pdf is locked, upload unlocked pdf",
            ParseError::PdfCorrupted => "Pdf unreadable",
            ParseError::PdfImageBased => "Pdf is image based, we don't support image based pdfs",
            ParseError::HeadersNotFound => "Unable to find headers",
            _ => "Unknown error occurred while processing your document",
        }
    }

    /// Wrap an internal cause as a stage failure.
    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        ParseError::Stage {
            stage,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_messages() {
        assert_eq!(
            ParseError::PdfImageBased.user_message(),
            "Pdf is image based, we don't support image based pdfs"
        );
        assert_eq!(
            ParseError::HeadersNotFound.user_message(),
            "Unable to find headers"
        );
    }

    #[test]
    fn internal_errors_collapse_to_unknown() {
        let err = ParseError::stage("build_rows", "boom");
        assert_eq!(
            err.user_message(),
            "Unknown error occurred while processing your document"
        );
        let err = ParseError::Storage("bucket gone".into());
        assert_eq!(
            err.user_message(),
            "Unknown error occurred while processing your document"
        );
    }

    #[test]
    fn stage_error_display() {
        let err = ParseError::stage("column_range", "no pages");
        assert_eq!(err.to_string(), "stage column_range failed: no pages");
        assert_eq!(err.error_type(), "StageInternal");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ParseError = io.into();
        assert!(matches!(err, ParseError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }
}
