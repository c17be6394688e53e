//! Vector index trait and types.
//!
//! Defines the interface for vector similarity search.

use rag_embeddings::Embedding;

use crate::error::VectorError;

/// Result of a vector search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Internal vector ID
    pub vector_id: u64,
    /// Cosine distance (0 = same direction, similarity = 1 - distance)
    pub distance: f32,
}

impl SearchResult {
    pub fn new(vector_id: u64, distance: f32) -> Self {
        Self {
            vector_id,
            distance,
        }
    }

    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Index statistics
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Number of vectors in the index
    pub vector_count: usize,
    /// Embedding dimension
    pub dimension: usize,
    /// Index file size in bytes
    pub size_bytes: u64,
}

/// Trait for vector indexes.
///
/// Implementations must be thread-safe for concurrent read access.
pub trait VectorIndex: Send + Sync {
    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the number of vectors in the index
    fn len(&self) -> usize;

    /// Check if the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a vector with the given ID.
    /// Returns error if ID already exists.
    fn add(&mut self, id: u64, embedding: &Embedding) -> Result<(), VectorError>;

    /// Search for the `k` nearest neighbors.
    ///
    /// `k` is clamped to `1..=len()`; an empty index yields no results.
    /// Results are ordered by ascending distance.
    fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>, VectorError>;

    /// Remove a vector by ID.
    fn remove(&mut self, id: u64) -> Result<bool, VectorError>;

    /// Check if a vector ID exists
    fn contains(&self, id: u64) -> bool;

    /// Get index statistics
    fn stats(&self) -> IndexStats;

    /// Save index to disk
    fn save(&self) -> Result<(), VectorError>;
}
