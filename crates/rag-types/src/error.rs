//! Error types for the theme RAG core.

use thiserror::Error;

/// Closed error taxonomy for retrieval core operations.
///
/// Component crates keep their own error enums; everything crossing the
/// service boundary is converted into one of these kinds.
#[derive(Debug, Error)]
pub enum RagError {
    /// Requested embedding model is not in the supported set
    #[error("Unsupported embedding model: {0}")]
    UnsupportedModel(String),

    /// Embedding model failed to initialize
    #[error("Failed to load embedding model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    /// Operation referenced an unknown theme
    #[error("Theme not found: {theme} (available: {})", available.join(", "))]
    ThemeNotFound {
        theme: String,
        available: Vec<String>,
    },

    /// Theme id already taken
    #[error("Theme already exists: {0}")]
    DuplicateTheme(String),

    /// Vector index construction, insert or query failure
    #[error("Index error: {0}")]
    Index(String),

    /// Durable theme registry read/write failure
    #[error("Registry I/O error: {0}")]
    RegistryIo(String),

    /// Embedding inference failed on a loaded model
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Caller supplied input the core refuses
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything not covered above
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RagError {
    /// Whether this error is a not-found condition for the caller.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RagError::ThemeNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_not_found_lists_available() {
        let err = RagError::ThemeNotFound {
            theme: "missing".to_string(),
            available: vec!["physics".to_string(), "poetry".to_string()],
        };
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Theme not found: missing (available: physics, poetry)"
        );
    }

    #[test]
    fn test_model_load_message() {
        let err = RagError::ModelLoad {
            model: "BAAI/bge-base-en-v1.5".to_string(),
            reason: "weights missing".to_string(),
        };
        assert!(err.to_string().contains("BAAI/bge-base-en-v1.5"));
        assert!(err.to_string().contains("weights missing"));
        assert!(!err.is_not_found());
    }
}
