//! Theme registry backed by a JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rag_types::{normalize_theme_id, DocumentEntry, EmbeddingModelId, Theme, ThemeSummary};
use tracing::{debug, info};

use crate::atomic::write_atomic;
use crate::error::RegistryError;

type Snapshot = Arc<BTreeMap<String, Theme>>;

/// Durable store of theme records.
///
/// Writers are serialized by one mutex. Each write clones the current
/// snapshot, applies the change, persists it and swaps it in; a failed
/// write leaves both the file and the snapshot untouched.
pub struct ThemeRegistry {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for ThemeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeRegistry")
            .field("path", &self.path)
            .field("themes", &self.snapshot().len())
            .finish()
    }
}

/// Check that a normalized id is usable as a directory name.
fn validate_id(id: &str, name: &str) -> Result<(), RegistryError> {
    if id.is_empty() {
        return Err(RegistryError::InvalidName(format!(
            "theme name {name:?} is empty after normalization"
        )));
    }
    if id.starts_with('.') || id.contains(['/', '\\', '\0']) {
        return Err(RegistryError::InvalidName(format!(
            "theme name {name:?} cannot be used as an identifier"
        )));
    }
    Ok(())
}

impl ThemeRegistry {
    /// Load the registry at `path`. A missing file is an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let themes: BTreeMap<String, Theme> = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = ?path, themes = themes.len(), "Loaded theme registry");
        Ok(Self {
            path,
            snapshot: RwLock::new(Arc::new(themes)),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Persist `next` and make it the visible snapshot.
    fn commit(&self, next: BTreeMap<String, Theme>) -> Result<(), RegistryError> {
        let bytes = serde_json::to_vec_pretty(&next)?;
        write_atomic(&self.path, &bytes)?;
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(())
    }

    fn not_found(&self, theme: &str, snapshot: &Snapshot) -> RegistryError {
        RegistryError::NotFound {
            theme: theme.to_string(),
            available: snapshot.keys().cloned().collect(),
        }
    }

    /// Register a new theme bound to `model`.
    pub fn create(&self, name: &str, model: EmbeddingModelId) -> Result<Theme, RegistryError> {
        let theme = Theme::new(name.trim(), model);
        validate_id(&theme.id, name)?;

        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        if current.contains_key(&theme.id) {
            return Err(RegistryError::Duplicate(theme.id));
        }

        let mut next = (*current).clone();
        next.insert(theme.id.clone(), theme.clone());
        self.commit(next)?;

        info!(theme = %theme.id, model = %model, "Created theme");
        Ok(theme)
    }

    /// Theme record by id.
    pub fn get(&self, theme_id: &str) -> Result<Theme, RegistryError> {
        let snapshot = self.snapshot();
        snapshot
            .get(theme_id)
            .cloned()
            .ok_or_else(|| self.not_found(theme_id, &snapshot))
    }

    pub fn contains(&self, theme_id: &str) -> bool {
        self.snapshot().contains_key(theme_id)
    }

    /// All theme ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    /// All theme records, sorted by id.
    pub fn list(&self) -> Vec<Theme> {
        self.snapshot().values().cloned().collect()
    }

    pub fn summaries(&self) -> Vec<ThemeSummary> {
        self.snapshot().values().map(Theme::summary).collect()
    }

    /// Manifest of a theme's documents in upload order.
    pub fn documents(&self, theme_id: &str) -> Result<Vec<DocumentEntry>, RegistryError> {
        Ok(self.get(theme_id)?.documents)
    }

    /// Append manifest entries, returning the theme's new document count.
    pub fn add_documents(
        &self,
        theme_id: &str,
        entries: Vec<DocumentEntry>,
    ) -> Result<usize, RegistryError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let mut next = (*current).clone();
        let total = match next.get_mut(theme_id) {
            Some(theme) => {
                theme.documents.extend(entries);
                theme.documents.len()
            }
            None => return Err(self.not_found(theme_id, &current)),
        };
        self.commit(next)?;

        debug!(theme = theme_id, total, "Updated document manifest");
        Ok(total)
    }

    pub fn add_document(&self, theme_id: &str, entry: DocumentEntry) -> Result<usize, RegistryError> {
        self.add_documents(theme_id, vec![entry])
    }

    /// Look up by user-facing name or id.
    pub fn resolve(&self, name: &str) -> Result<Theme, RegistryError> {
        self.get(&normalize_theme_id(name))
    }
}
