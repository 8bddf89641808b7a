//! Embedding error types.
//!
//! Only [`EmbeddingError::Load`] is fatal to a generation run. Inference
//! failures are isolated per example, and [`EmbeddingError::Format`] is the
//! corruption signal surfaced by the AOT decoder.

use thiserror::Error;

/// Errors from embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Vocabulary or model could not be loaded.
    #[error("Load failed: {0}")]
    Load(String),

    /// Inference failed for a single input.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Binary container is malformed or cannot be produced.
    #[error("Format error: {0}")]
    Format(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Filesystem error (preserves source chain).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

/// Result alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;
