//! Error types for the bulk loader.

use thiserror::Error;

/// Errors raised while writing documents to a sink.
///
/// Only [`LoaderError::Configuration`] and [`LoaderError::Io`] escape the
/// loader; write failures are classified per batch and surface as counts in
/// [`crate::LoadReport`].
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Transient failure (network, timeout, 429, 5xx). Retried with backoff.
    #[error("Transient write failure: {0}")]
    Write(String),

    /// The store rejected a document (mapping/validation). Never retried.
    #[error("Document {document_id} permanently rejected: {reason}")]
    PermanentWrite { document_id: String, reason: String },

    #[error("Invalid loader configuration: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LoaderError {
    /// Whether the failed operation may succeed if attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, LoaderError::Write(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_write_errors_are_transient() {
        assert!(LoaderError::Write("timeout".into()).is_transient());
        assert!(!LoaderError::PermanentWrite {
            document_id: "media-1".into(),
            reason: "strict_dynamic_mapping_exception".into(),
        }
        .is_transient());
        assert!(!LoaderError::Configuration("bad".into()).is_transient());
    }

    #[test]
    fn test_permanent_error_names_document() {
        let err = LoaderError::PermanentWrite {
            document_id: "media-0000042-a1b2c3".into(),
            reason: "mapper_parsing_exception".into(),
        };
        assert!(err.to_string().contains("media-0000042-a1b2c3"));
    }
}
