//! # rag-themes
//!
//! Durable registry of themes for theme-rag.
//!
//! Themes live in a single `themes.json` file keyed by normalized theme id.
//! Reads are served from an in-memory snapshot; every write produces a new
//! file through write-temp, fsync, rename and only then replaces the
//! snapshot.

pub mod atomic;
pub mod error;
pub mod registry;

pub use atomic::write_atomic;
pub use error::RegistryError;
pub use registry::ThemeRegistry;
