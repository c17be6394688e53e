//! Vector index error types.

use rag_types::{EmbeddingModelId, RagError};
use thiserror::Error;

/// Errors that can occur during vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// usearch index error
    #[error("Index error: {0}")]
    Index(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Chunk id already present in the theme's index
    #[error("Duplicate chunk id: {0}")]
    DuplicateChunk(String),

    /// Index on disk was built by a different model than requested
    #[error("Index for theme {theme} was built with {found}, not {expected}")]
    ModelMismatch {
        theme: String,
        expected: EmbeddingModelId,
        found: EmbeddingModelId,
    },

    /// Theme id cannot be used as a directory name
    #[error("Invalid theme id for index path: {0:?}")]
    InvalidThemeId(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// RocksDB error
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),
}

impl From<VectorError> for RagError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::InvalidThemeId(id) => {
                RagError::InvalidInput(format!("invalid theme id {id:?}"))
            }
            other => RagError::Index(other.to_string()),
        }
    }
}
