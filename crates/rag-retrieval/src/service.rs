//! Retrieval service facade.

use std::str::FromStr;
use std::sync::Arc;

use rag_embeddings::{EmbedderRegistry, EmbeddingModel, ModelInfo, WarmUpReport};
use rag_themes::ThemeRegistry;
use rag_types::{
    normalize_theme_id, DocumentEntry, EmbeddingModelId, RagError, Settings, Theme, ThemeSummary,
};
use rag_vector::{IndexRegistry, QueryHit, ThemeIndex, ThemeIndexStats};
use tracing::{debug, error, info, warn};

use crate::chunker::Chunker;
use crate::context::format_context;
use crate::ingest::{DocumentIngestor, UploadFailure, UploadReport, UploadedFile};

/// Owns the registries for one data root and exposes the core operations.
pub struct RagService {
    settings: Settings,
    themes: Arc<ThemeRegistry>,
    embedders: Arc<EmbedderRegistry>,
    indexes: Arc<IndexRegistry>,
    ingestor: DocumentIngestor,
}

impl RagService {
    /// Open the data root described by `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self, RagError> {
        let embedders = EmbedderRegistry::from_settings(
            &settings.models,
            settings.expanded_model_cache_dir(),
        );
        Self::with_embedders(settings, Arc::new(embedders))
    }

    /// Open the data root with a caller-supplied embedder registry.
    pub fn with_embedders(
        settings: Settings,
        embedders: Arc<EmbedderRegistry>,
    ) -> Result<Self, RagError> {
        settings.validate()?;
        let data_dir = settings.expanded_data_dir();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            RagError::RegistryIo(format!("cannot create {}: {}", data_dir.display(), e))
        })?;

        let themes = Arc::new(ThemeRegistry::open(settings.themes_file())?);
        let indexes = Arc::new(IndexRegistry::new(settings.index_root(), settings.index.clone()));
        let ingestor =
            DocumentIngestor::new(settings.files_root(), Chunker::new(settings.chunking.clone()));

        info!(data_dir = ?data_dir, themes = themes.ids().len(), "Retrieval service ready");
        Ok(Self {
            settings,
            themes,
            embedders,
            indexes,
            ingestor,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Every model a theme can be created with.
    pub fn supported_models() -> Vec<ModelInfo> {
        EmbeddingModelId::ALL
            .into_iter()
            .map(ModelInfo::for_model)
            .collect()
    }

    /// Create a theme bound to `model`.
    ///
    /// The model string is validated before anything is written.
    pub fn create_theme(&self, name: &str, model: &str) -> Result<Theme, RagError> {
        let model = EmbeddingModelId::from_str(model)?;
        let theme = self.themes.create(name, model)?;

        // The theme is committed at this point. Both directories are created
        // again on first upload, so a failure here only delays it.
        if let Err(e) = std::fs::create_dir_all(self.ingestor.theme_dir(&theme.id)) {
            warn!(theme = %theme.id, error = %e, "Could not create files dir for new theme");
        }
        if let Err(e) = self.indexes.get_or_create(&theme.id, model) {
            warn!(theme = %theme.id, error = %e, "Could not open index for new theme");
        }
        Ok(theme)
    }

    /// Theme record by id or display name.
    pub fn theme(&self, theme: &str) -> Result<Theme, RagError> {
        Ok(self.themes.resolve(theme)?)
    }

    pub fn list_themes(&self) -> Vec<ThemeSummary> {
        self.themes.summaries()
    }

    pub fn theme_documents(&self, theme: &str) -> Result<Vec<DocumentEntry>, RagError> {
        Ok(self.themes.documents(&normalize_theme_id(theme))?)
    }

    fn open_index(&self, theme: &Theme) -> Result<Arc<ThemeIndex>, RagError> {
        Ok(self.indexes.get_or_create(&theme.id, theme.embedding_model)?)
    }

    /// Ingest a batch of files into a theme.
    ///
    /// Files are processed independently. A file that fails is reported in
    /// [`UploadReport::failed`] and leaves no manifest entry; the rest carry
    /// on. Only failures that affect the whole batch (unknown theme, model
    /// or index unavailable) are returned as errors.
    pub fn upload(&self, theme: &str, files: Vec<UploadedFile>) -> Result<UploadReport, RagError> {
        let theme = self.theme(theme)?;
        let embedder = self.embedders.get(theme.embedding_model)?;
        let index = self.open_index(&theme)?;

        let mut report = UploadReport {
            theme_id: theme.id.clone(),
            ..Default::default()
        };

        for file in &files {
            let outcome = self
                .ingestor
                .ingest_file(&theme.id, file, embedder.as_ref(), &index)
                .and_then(|entry| {
                    self.themes.add_document(&theme.id, entry.clone())?;
                    Ok(entry)
                });

            match outcome {
                Ok(entry) => report.saved.push(entry),
                Err(e) => {
                    error!(theme = %theme.id, file = %file.filename, error = %e, "Failed to ingest file");
                    report.failed.push(UploadFailure {
                        filename: file.filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.total_documents = self.themes.documents(&theme.id)?.len();
        info!(
            theme = %theme.id,
            saved = report.saved.len(),
            failed = report.failed.len(),
            "Upload complete"
        );
        Ok(report)
    }

    /// Rank a theme's chunks against `query`.
    pub fn retrieve(&self, theme: &str, query: &str, k: usize) -> Result<Vec<QueryHit>, RagError> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query is empty".to_string()));
        }
        let theme = self.theme(theme)?;
        let index = self.open_index(&theme)?;
        let embedder = self.embedders.get(theme.embedding_model)?;

        let vector = embedder.embed_query(query)?;
        let hits = index.query(&vector, k)?;
        debug!(theme = %theme.id, k, hits = hits.len(), "Retrieved chunks");
        Ok(hits)
    }

    /// Build the context string for a question against a theme.
    ///
    /// Returns the no-context sentinel when the theme has no chunks.
    pub fn build_context(&self, theme: &str, query: &str, k: usize) -> Result<String, RagError> {
        let hits = self.retrieve(theme, query, k)?;
        Ok(format_context(&hits))
    }

    /// Same as [`build_context`](Self::build_context) with the configured `k`.
    pub fn build_context_default(&self, theme: &str, query: &str) -> Result<String, RagError> {
        self.build_context(theme, query, self.settings.retrieval.default_k)
    }

    /// Construct every supported model, tolerating failures.
    pub fn warm_up(&self) -> WarmUpReport {
        self.embedders.warm_up()
    }

    pub fn index_stats(&self, theme: &str) -> Result<ThemeIndexStats, RagError> {
        let theme = self.theme(theme)?;
        Ok(self.open_index(&theme)?.stats())
    }

    /// Model instance used for a theme.
    pub fn embedder_for(&self, theme: &str) -> Result<Arc<dyn EmbeddingModel>, RagError> {
        let theme = self.theme(theme)?;
        Ok(self.embedders.get(theme.embedding_model)?)
    }
}
