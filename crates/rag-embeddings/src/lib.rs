//! # rag-embeddings
//!
//! Embedding generation for the theme RAG core.
//!
//! Every theme is bound to one [`EmbeddingModelId`]; this crate turns that id
//! into a loaded model and keeps one instance per id for the life of the
//! process.
//!
//! ## Features
//! - Local inference via Candle (BERT family: MiniLM and BGE)
//! - Automatic model file caching from the HuggingFace Hub
//! - Asymmetric query embedding for models that expect an instruction prefix
//! - [`EmbedderRegistry`]: at most one construction per model id, even under
//!   concurrent first access
//! - A deterministic stub backend for offline runs and tests

pub mod cache;
pub mod candle;
pub mod error;
pub mod model;
pub mod registry;
pub mod stub;

pub use crate::candle::CandleEmbedder;
pub use cache::{get_or_download_model, ModelCache, ModelPaths, MODEL_FILES};
pub use error::EmbeddingError;
pub use model::{Embedding, EmbeddingModel, ModelInfo};
pub use rag_types::EmbeddingModelId;
pub use registry::{
    CandleLoader, EmbedderRegistry, ModelLoader, SharedModel, StubLoader, WarmUpReport,
};
pub use stub::StubEmbedder;
