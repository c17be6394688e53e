//! # rag-vector
//!
//! Per-theme vector index for theme-rag.
//!
//! Each theme owns one on-disk index: an HNSW graph (usearch, cosine metric)
//! for the vectors, a RocksDB store for chunk text and metadata, and a small
//! header recording which embedding model produced the vectors.
//!
//! ## Features
//! - usearch-powered HNSW index with atomic file persistence
//! - Cosine distance ranking, `k` clamped to the stored count
//! - All-or-nothing inserts per call, rejecting colliding chunk ids
//! - [`IndexRegistry`]: one handle per theme, constructed once

pub mod error;
pub mod hnsw;
pub mod index;
pub mod metadata;
pub mod registry;
pub mod store;

pub use error::VectorError;
pub use hnsw::{HnswConfig, HnswIndex};
pub use index::{IndexStats, SearchResult, VectorIndex};
pub use metadata::{ChunkRecord, ChunkStore, CF_CHUNKS, CF_CHUNK_IDS};
pub use registry::IndexRegistry;
pub use store::{ChunkInput, ChunkMetadata, IndexHeader, QueryHit, ThemeIndex, ThemeIndexStats};
