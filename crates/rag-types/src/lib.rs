//! # rag-types
//!
//! Shared domain types for the theme RAG retrieval core.
//!
//! This crate defines the data structures every other crate agrees on:
//! - Embedding model identifiers: the closed set of supported models
//! - Themes: named document collections bound to one embedding model
//! - Settings: layered configuration
//! - RagError: the closed error taxonomy surfaced to callers

pub mod config;
pub mod error;
pub mod model;
pub mod theme;

pub use config::{
    ChunkingSettings, DevicePreference, EmbeddingBackend, IndexSettings, ModelSettings,
    RetrievalSettings, Settings,
};
pub use error::RagError;
pub use model::{EmbeddingModelId, Pooling};
pub use theme::{normalize_theme_id, DocumentEntry, Theme, ThemeSummary};
