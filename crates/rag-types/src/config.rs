//! Configuration loading for theme-rag.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/theme-rag/config.toml.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Which embedding implementation backs the model ids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Real transformer inference via Candle
    #[default]
    Candle,
    /// Deterministic feature-hashing vectors, no downloads
    Stub,
}

/// Compute device preference for model inference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Use CUDA when available, otherwise CPU
    #[default]
    Auto,
    Cpu,
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Where downloaded model files are kept
    #[serde(default = "default_model_cache_dir")]
    pub cache_dir: String,

    /// HuggingFace Hub token (usually set through RAG_MODELS__HF_TOKEN)
    #[serde(default, skip_serializing)]
    pub hf_token: Option<String>,

    #[serde(default)]
    pub device: DevicePreference,

    /// Load every supported model at startup
    #[serde(default)]
    pub warm_up: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            cache_dir: default_model_cache_dir(),
            hf_token: None,
            device: DevicePreference::default(),
            warm_up: false,
        }
    }
}

/// Context retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Number of passages placed in the context when the caller gives none
    #[serde(default = "default_k")]
    pub default_k: usize,
}

fn default_k() -> usize {
    3
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_k: default_k(),
        }
    }
}

/// Windowed chunking of uploaded documents.
///
/// Disabled by default: each uploaded file becomes a single chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Target window length in characters
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,

    /// Characters shared between consecutive windows
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

fn default_window_chars() -> usize {
    1200
}

fn default_overlap_chars() -> usize {
    200
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            window_chars: default_window_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

/// HNSW parameters applied to newly created theme indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default = "default_connectivity")]
    pub connectivity: usize,
    #[serde(default = "default_expansion_add")]
    pub expansion_add: usize,
    #[serde(default = "default_expansion_search")]
    pub expansion_search: usize,
    /// Initial capacity reserved per theme index
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_connectivity() -> usize {
    16
}

fn default_expansion_add() -> usize {
    200
}

fn default_expansion_search() -> usize {
    100
}

fn default_capacity() -> usize {
    1024
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            connectivity: default_connectivity(),
            expansion_add: default_expansion_add(),
            expansion_search: default_expansion_search(),
            capacity: default_capacity(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root of all persisted state (registry, indexes, uploaded files)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub models: ModelSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub chunking: ChunkingSettings,

    #[serde(default)]
    pub index: IndexSettings,
}

fn default_data_dir() -> String {
    ProjectDirs::from("", "", "theme-rag")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./storage"))
        .to_string_lossy()
        .to_string()
}

fn default_model_cache_dir() -> String {
    ProjectDirs::from("", "", "theme-rag")
        .map(|p| p.cache_dir().join("models"))
        .unwrap_or_else(|| PathBuf::from("./.cache/models"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            models: ModelSettings::default(),
            retrieval: RetrievalSettings::default(),
            chunking: ChunkingSettings::default(),
            index: IndexSettings::default(),
        }
    }
}

fn config_err(e: config::ConfigError) -> RagError {
    RagError::Config(e.to_string())
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/theme-rag/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (RAG_*, nested keys joined by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, RagError> {
        let config_dir = ProjectDirs::from("", "", "theme-rag")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("data_dir", default_data_dir())
            .map_err(config_err)?
            .set_default("log_level", default_log_level())
            .map_err(config_err)?
            .set_default("models.backend", "candle")
            .map_err(config_err)?
            .set_default("models.cache_dir", default_model_cache_dir())
            .map_err(config_err)?
            .set_default("models.device", "auto")
            .map_err(config_err)?
            .set_default("models.warm_up", false)
            .map_err(config_err)?
            .set_default("retrieval.default_k", default_k() as i64)
            .map_err(config_err)?
            .set_default("chunking.enabled", false)
            .map_err(config_err)?
            .set_default("chunking.window_chars", default_window_chars() as i64)
            .map_err(config_err)?
            .set_default("chunking.overlap_chars", default_overlap_chars() as i64)
            .map_err(config_err)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // RAG_DATA_DIR, RAG_MODELS__BACKEND, RAG_CHUNKING__ENABLED, ...
        builder = builder.add_source(
            Environment::with_prefix("RAG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .map_err(config_err)?
            .try_deserialize()
            .map_err(config_err)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.retrieval.default_k == 0 {
            return Err(RagError::Config("retrieval.default_k must be > 0".to_string()));
        }
        if self.chunking.window_chars == 0 {
            return Err(RagError::Config(
                "chunking.window_chars must be > 0".to_string(),
            ));
        }
        if self.chunking.overlap_chars >= self.chunking.window_chars {
            return Err(RagError::Config(format!(
                "chunking.overlap_chars ({}) must be smaller than chunking.window_chars ({})",
                self.chunking.overlap_chars, self.chunking.window_chars
            )));
        }
        if self.index.connectivity == 0 {
            return Err(RagError::Config("index.connectivity must be > 0".to_string()));
        }
        Ok(())
    }

    /// Data root with a leading `~/` expanded.
    pub fn expanded_data_dir(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }

    /// Model cache directory with a leading `~/` expanded.
    pub fn expanded_model_cache_dir(&self) -> PathBuf {
        expand_home(&self.models.cache_dir)
    }

    /// Path of the theme registry file.
    pub fn themes_file(&self) -> PathBuf {
        self.expanded_data_dir().join("themes.json")
    }

    /// Root under which each theme's vector index lives.
    pub fn index_root(&self) -> PathBuf {
        self.expanded_data_dir().join("indexes")
    }

    /// Root under which raw uploads are stored, one directory per theme.
    pub fn files_root(&self) -> PathBuf {
        self.expanded_data_dir().join("files")
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(base) = directories::BaseDirs::new() {
            return base.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
