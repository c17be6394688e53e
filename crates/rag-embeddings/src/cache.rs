//! Model file caching.
//!
//! Downloads and caches model files from HuggingFace Hub, one directory per
//! supported model.

use std::path::{Path, PathBuf};

use rag_types::EmbeddingModelId;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Required model files
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Model cache configuration
#[derive(Debug, Clone)]
pub struct ModelCache {
    /// Cache directory path
    pub cache_dir: PathBuf,
    /// HuggingFace Hub token, passed explicitly to the download client
    pub token: Option<SecretString>,
}

impl Default for ModelCache {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("theme-rag")
            .join("models");

        Self {
            cache_dir,
            token: None,
        }
    }
}

impl ModelCache {
    /// Create a new model cache rooted at `cache_dir`
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            token: None,
        }
    }

    /// Attach a HuggingFace Hub token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty()).map(SecretString::from);
        self
    }

    /// Get the directory holding one model's files
    pub fn model_dir(&self, model: EmbeddingModelId) -> PathBuf {
        self.cache_dir.join(model.repo_id().replace('/', "_"))
    }

    /// Check if all files of a model are cached
    pub fn is_cached(&self, model: EmbeddingModelId) -> bool {
        let model_dir = self.model_dir(model);
        MODEL_FILES.iter().all(|f| model_dir.join(f).exists())
    }

    /// Get path to a specific model file
    pub fn file_path(&self, model: EmbeddingModelId, filename: &str) -> PathBuf {
        self.model_dir(model).join(filename)
    }
}

/// Paths to model files
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelPaths {
    fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        }
    }
}

/// Get or download model files.
///
/// Returns paths to config.json, tokenizer.json, and model.safetensors.
pub fn get_or_download_model(
    cache: &ModelCache,
    model: EmbeddingModelId,
) -> Result<ModelPaths, EmbeddingError> {
    let model_dir = cache.model_dir(model);

    if cache.is_cached(model) {
        debug!(path = ?model_dir, model = %model, "Using cached model");
    } else {
        info!(repo = model.repo_id(), "Downloading model files...");
        download_model_files(cache, model)?;
    }

    Ok(ModelPaths::in_dir(&model_dir))
}

/// Download model files from HuggingFace Hub
fn download_model_files(cache: &ModelCache, model: EmbeddingModelId) -> Result<(), EmbeddingError> {
    use hf_hub::api::sync::ApiBuilder;

    let token = cache
        .token
        .as_ref()
        .map(|t| t.expose_secret().to_string());
    let api = ApiBuilder::new()
        .with_progress(false)
        .with_token(token)
        .build()
        .map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(model.repo_id().to_string());

    let model_dir = cache.model_dir(model);
    std::fs::create_dir_all(&model_dir)?;

    for filename in MODEL_FILES {
        info!(file = filename, model = %model, "Downloading...");
        let source_path = repo
            .get(filename)
            .map_err(|e| EmbeddingError::Download(format!("{}: {}", filename, e)))?;

        // Copy under a temporary name so a crash never leaves a truncated
        // file that is_cached() would accept.
        let dest_path = cache.file_path(model, filename);
        let tmp_path = model_dir.join(format!(".{}.partial", filename));
        std::fs::copy(&source_path, &tmp_path)?;
        std::fs::rename(&tmp_path, &dest_path)?;
        debug!(file = filename, "Downloaded to {:?}", dest_path);
    }

    Ok(())
}
