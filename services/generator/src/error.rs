//! Error types for record generation.

use thiserror::Error;

/// Errors raised by the generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Invalid topology or settings. Raised before any record is generated.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A generated record broke one of its own consistency rules. Always a
    /// generator bug.
    #[error("Generation invariant violated: {0}")]
    GenerationInvariant(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// The downstream batch channel closed before generation finished.
    #[error("Record sink closed")]
    SinkClosed,
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

impl GeneratorError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        GeneratorError::Configuration(message.into())
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        GeneratorError::GenerationInvariant(message.into())
    }
}
