//! Index handle registry.
//!
//! Opening an index takes the RocksDB lock for its directory, so each theme
//! must be opened once per process. Handles are cached per theme id behind a
//! [`OnceCell`]; concurrent first callers converge on one handle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use rag_types::{EmbeddingModelId, IndexSettings};
use tracing::debug;

use crate::error::VectorError;
use crate::store::ThemeIndex;

type Slot = Arc<OnceCell<Arc<ThemeIndex>>>;

/// Owns every open [`ThemeIndex`] under one root directory.
pub struct IndexRegistry {
    root: PathBuf,
    settings: IndexSettings,
    slots: Mutex<HashMap<String, Slot>>,
}

/// Theme ids become directory names; reject anything that could escape the root.
fn validate_theme_id(theme_id: &str) -> Result<(), VectorError> {
    if theme_id.is_empty()
        || theme_id.starts_with('.')
        || theme_id.contains(['/', '\\'])
        || theme_id.contains('\0')
    {
        return Err(VectorError::InvalidThemeId(theme_id.to_string()));
    }
    Ok(())
}

impl IndexRegistry {
    pub fn new(root: impl Into<PathBuf>, settings: IndexSettings) -> Self {
        Self {
            root: root.into(),
            settings,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a theme's index.
    pub fn index_dir(&self, theme_id: &str) -> Result<PathBuf, VectorError> {
        validate_theme_id(theme_id)?;
        Ok(self.root.join(theme_id))
    }

    /// Return the theme's handle, opening or creating its index on first use.
    ///
    /// A cached handle built for a different model is a
    /// [`VectorError::ModelMismatch`], as is an on-disk index recorded with
    /// another model.
    pub fn get_or_create(
        &self,
        theme_id: &str,
        model: EmbeddingModelId,
    ) -> Result<Arc<ThemeIndex>, VectorError> {
        let dir = self.index_dir(theme_id)?;
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(theme_id.to_string()).or_default().clone()
        };

        let handle = slot
            .get_or_try_init(|| {
                debug!(theme = theme_id, model = %model, "Opening theme index");
                ThemeIndex::open(dir, theme_id, model, &self.settings).map(Arc::new)
            })?
            .clone();

        if handle.model() != model {
            return Err(VectorError::ModelMismatch {
                theme: theme_id.to_string(),
                expected: model,
                found: handle.model(),
            });
        }
        Ok(handle)
    }

    /// Cached handle, if the theme's index has been opened.
    pub fn get(&self, theme_id: &str) -> Option<Arc<ThemeIndex>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(theme_id).and_then(|slot| slot.get().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use tempfile::TempDir;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let registry = IndexRegistry::new(temp.path(), IndexSettings::default());

        let a = registry.get_or_create("physics", EmbeddingModelId::MiniLmL6V2).unwrap();
        let b = registry.get_or_create("physics", EmbeddingModelId::MiniLmL6V2).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(temp.path().join("physics").join("index.json").exists());
        assert!(registry.get("physics").is_some());
        assert!(registry.get("history").is_none());
    }

    #[test]
    fn test_concurrent_first_access_converges() {
        let temp = TempDir::new().unwrap();
        let registry = Arc::new(IndexRegistry::new(temp.path(), IndexSettings::default()));
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry
                        .get_or_create("biology", EmbeddingModelId::BgeSmallEnV15)
                        .unwrap()
                })
            })
            .collect();

        let indexes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for index in &indexes[1..] {
            assert!(Arc::ptr_eq(&indexes[0], index));
        }
    }

    #[test]
    fn test_model_mismatch_on_cached_handle() {
        let temp = TempDir::new().unwrap();
        let registry = IndexRegistry::new(temp.path(), IndexSettings::default());
        registry.get_or_create("physics", EmbeddingModelId::MiniLmL6V2).unwrap();

        let err = registry
            .get_or_create("physics", EmbeddingModelId::BgeBaseEnV15)
            .unwrap_err();
        assert!(matches!(err, VectorError::ModelMismatch { .. }));
    }

    #[test]
    fn test_rejects_unsafe_theme_ids() {
        let temp = TempDir::new().unwrap();
        let registry = IndexRegistry::new(temp.path(), IndexSettings::default());
        for bad in ["", "..", "../escape", "a/b", ".hidden"] {
            let err = registry.get_or_create(bad, EmbeddingModelId::MiniLmL6V2).unwrap_err();
            assert!(matches!(err, VectorError::InvalidThemeId(_)), "{bad:?}");
        }
    }
}
