//! Theme records and their document manifest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::EmbeddingModelId;

/// Normalize a user-supplied theme name into its identifier.
///
/// Trims, lowercases and replaces spaces with underscores, so
/// `"My Topic"` and `"my_topic"` map to the same id.
pub fn normalize_theme_id(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// One uploaded document in a theme's manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// Original filename
    pub name: String,
    /// Where the raw bytes are stored
    pub storage_path: String,
    /// Size of the raw upload in bytes
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Document id in the theme's vector index
    pub index_id: String,
    /// Number of chunks the document was split into
    #[serde(default = "default_chunk_count")]
    pub chunk_count: usize,
}

fn default_chunk_count() -> usize {
    1
}

/// A named document collection bound to one embedding model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    /// Normalized identifier (see [`normalize_theme_id`])
    pub id: String,
    /// Name as the user typed it
    pub display_name: String,
    /// Model that produced every vector in this theme's index.
    /// Fixed at creation.
    pub embedding_model: EmbeddingModelId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
}

impl Theme {
    /// Create a theme record from a display name.
    pub fn new(display_name: impl Into<String>, embedding_model: EmbeddingModelId) -> Self {
        let display_name = display_name.into();
        Self {
            id: normalize_theme_id(&display_name),
            display_name,
            embedding_model,
            created_at: Utc::now(),
            documents: Vec::new(),
        }
    }

    /// Listing view of this theme.
    pub fn summary(&self) -> ThemeSummary {
        ThemeSummary {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            embedding_model: self.embedding_model,
            documents_count: self.documents.len(),
            created_at: self.created_at,
        }
    }
}

/// Theme overview without the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeSummary {
    pub id: String,
    pub display_name: String,
    pub embedding_model: EmbeddingModelId,
    pub documents_count: usize,
    pub created_at: DateTime<Utc>,
}
