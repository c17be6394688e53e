//! # rag-retrieval
//!
//! Retrieval core for theme-rag.
//!
//! [`RagService`] ties the theme registry, embedder registry and per-theme
//! vector indexes together:
//! - theme creation bound to a validated embedding model
//! - batch uploads, one independent and atomic insert per file
//! - context assembly: embed the question, rank chunks, format the result
//!
//! All operations are synchronous; async callers should run them on a
//! blocking thread.

pub mod chunker;
pub mod context;
pub mod ingest;
pub mod service;

pub use chunker::Chunker;
pub use context::{format_context, format_hit, NO_CONTEXT_SENTINEL};
pub use ingest::{DocumentIngestor, UploadFailure, UploadReport, UploadedFile};
pub use service::RagService;
