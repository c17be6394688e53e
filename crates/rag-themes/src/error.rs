//! Theme registry error types.

use rag_types::RagError;
use thiserror::Error;

/// Errors from theme registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Normalized theme id already registered
    #[error("Theme already exists: {0}")]
    Duplicate(String),

    /// No theme with this id
    #[error("Theme not found: {theme}")]
    NotFound {
        theme: String,
        available: Vec<String>,
    },

    /// Name normalizes to something unusable as an id
    #[error("Invalid theme name: {0}")]
    InvalidName(String),

    /// Registry file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry file is not valid JSON for the expected layout
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RegistryError> for RagError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Duplicate(id) => RagError::DuplicateTheme(id),
            RegistryError::NotFound { theme, available } => {
                RagError::ThemeNotFound { theme, available }
            }
            RegistryError::InvalidName(msg) => RagError::InvalidInput(msg),
            other => RagError::RegistryIo(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_keeps_available_ids() {
        let err: RagError = RegistryError::NotFound {
            theme: "chem".to_string(),
            available: vec!["physics".to_string()],
        }
        .into();
        match err {
            RagError::ThemeNotFound { theme, available } => {
                assert_eq!(theme, "chem");
                assert_eq!(available, vec!["physics"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_io_maps_to_registry_io() {
        let err: RagError = RegistryError::Io(std::io::Error::other("disk full")).into();
        assert!(matches!(err, RagError::RegistryIo(_)));
    }
}
