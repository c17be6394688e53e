//! Per-process embedder registry.
//!
//! Loading a model is expensive (weights, tokenizer, device setup), so each
//! [`EmbeddingModelId`] is constructed at most once and shared afterwards.
//! Every id owns a [`OnceCell`] slot: concurrent first callers block on the
//! same initialization, and a failed load leaves the slot empty so a later
//! call can retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use rag_types::{DevicePreference, EmbeddingBackend, EmbeddingModelId, ModelSettings};
use tracing::{error, info};

use crate::cache::ModelCache;
use crate::candle::CandleEmbedder;
use crate::error::EmbeddingError;
use crate::model::EmbeddingModel;
use crate::stub::StubEmbedder;

/// Shared handle to a loaded model.
pub type SharedModel = Arc<dyn EmbeddingModel>;

/// Constructs model instances for the registry.
pub trait ModelLoader: Send + Sync {
    fn load(&self, model: EmbeddingModelId) -> Result<SharedModel, EmbeddingError>;
}

/// Loads Candle models from the HuggingFace cache.
pub struct CandleLoader {
    cache: ModelCache,
    device: DevicePreference,
}

impl CandleLoader {
    pub fn new(cache: ModelCache, device: DevicePreference) -> Self {
        Self { cache, device }
    }
}

impl ModelLoader for CandleLoader {
    fn load(&self, model: EmbeddingModelId) -> Result<SharedModel, EmbeddingError> {
        let embedder = CandleEmbedder::load(model, &self.cache, self.device)?;
        Ok(Arc::new(embedder))
    }
}

/// Builds [`StubEmbedder`]s.
#[derive(Debug, Default)]
pub struct StubLoader;

impl ModelLoader for StubLoader {
    fn load(&self, model: EmbeddingModelId) -> Result<SharedModel, EmbeddingError> {
        Ok(Arc::new(StubEmbedder::new(model)))
    }
}

type Slot = Arc<OnceCell<SharedModel>>;

/// Outcome of loading every supported model up front.
#[derive(Debug, Default)]
pub struct WarmUpReport {
    pub loaded: Vec<EmbeddingModelId>,
    pub failed: Vec<(EmbeddingModelId, String)>,
}

/// Process-wide cache of loaded embedding models.
pub struct EmbedderRegistry {
    loader: Arc<dyn ModelLoader>,
    slots: Mutex<HashMap<EmbeddingModelId, Slot>>,
}

impl EmbedderRegistry {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Build a registry from model settings.
    ///
    /// The HuggingFace token is handed to the loader here; nothing is written
    /// to the process environment.
    pub fn from_settings(settings: &ModelSettings, cache_dir: impl Into<std::path::PathBuf>) -> Self {
        let loader: Arc<dyn ModelLoader> = match settings.backend {
            EmbeddingBackend::Candle => {
                let cache = ModelCache::new(cache_dir).with_token(settings.hf_token.clone());
                Arc::new(CandleLoader::new(cache, settings.device))
            }
            EmbeddingBackend::Stub => Arc::new(StubLoader),
        };
        Self::new(loader)
    }

    fn slot(&self, model: EmbeddingModelId) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(model).or_default().clone()
    }

    /// Get the shared instance for `model`, loading it on first use.
    ///
    /// Load failures surface as [`EmbeddingError::ModelLoad`] and are not
    /// cached.
    pub fn get(&self, model: EmbeddingModelId) -> Result<SharedModel, EmbeddingError> {
        // The map lock is released before loading so other models stay
        // reachable while this one initializes.
        let slot = self.slot(model);
        slot.get_or_try_init(|| {
            info!(model = %model, "Constructing embedding model");
            self.loader.load(model).map_err(|e| match e {
                EmbeddingError::ModelLoad { .. } => e,
                other => EmbeddingError::ModelLoad {
                    model: model.as_str().to_string(),
                    reason: other.to_string(),
                },
            })
        })
        .cloned()
        .inspect_err(|e| error!(model = %model, error = %e, "Embedding model failed to load"))
    }

    /// Whether `model` has a constructed instance.
    pub fn is_loaded(&self, model: EmbeddingModelId) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(&model).is_some_and(|slot| slot.get().is_some())
    }

    /// Load every supported model, tolerating individual failures.
    pub fn warm_up(&self) -> WarmUpReport {
        let mut report = WarmUpReport::default();
        for model in EmbeddingModelId::ALL {
            match self.get(model) {
                Ok(_) => {
                    info!(model = %model, "Model warmed up");
                    report.loaded.push(model);
                }
                Err(e) => report.failed.push((model, e.to_string())),
            }
        }
        report
    }
}
