//! End-to-end test infrastructure for theme-rag.
//!
//! Provides a shared TestHarness and helpers for E2E tests covering theme
//! creation, upload and context assembly against a real data root.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rag_embeddings::{EmbedderRegistry, EmbeddingError, ModelLoader, SharedModel, StubLoader};
use rag_retrieval::{RagService, UploadedFile};
use rag_types::{EmbeddingBackend, EmbeddingModelId, Settings};

/// Shared test harness for E2E tests.
///
/// Owns a temporary data root. Services are opened explicitly so tests can
/// drop one and reopen the same root to simulate a restart.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Data root handed to every service
    pub data_dir: PathBuf,
}

impl TestHarness {
    /// Create a new harness with an empty data root.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let data_dir = temp_dir.path().join("data");
        Self {
            _temp_dir: temp_dir,
            data_dir,
        }
    }

    /// Settings using the stub embedding backend under this harness's root.
    pub fn settings(&self) -> Settings {
        stub_settings(&self.data_dir)
    }

    /// Open a service on the data root with stub embeddings.
    pub fn open_service(&self) -> RagService {
        self.open_service_with(self.settings())
    }

    /// Open a service with customized settings.
    pub fn open_service_with(&self, settings: Settings) -> RagService {
        RagService::from_settings(settings).expect("Failed to open service")
    }

    /// Open a service whose models come from `loader`.
    pub fn open_service_with_loader(&self, loader: Arc<dyn ModelLoader>) -> RagService {
        RagService::with_embedders(self.settings(), Arc::new(EmbedderRegistry::new(loader)))
            .expect("Failed to open service")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Default settings pointed at `data_dir` with the stub backend.
pub fn stub_settings(data_dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.data_dir = data_dir.to_string_lossy().into_owned();
    settings.models.backend = EmbeddingBackend::Stub;
    settings
}

/// Build upload files from `(filename, text)` pairs.
pub fn text_files(files: &[(&str, &str)]) -> Vec<UploadedFile> {
    files
        .iter()
        .map(|(name, text)| UploadedFile::new(*name, *text))
        .collect()
}

/// Topically distinct documents for ranking tests.
pub fn sample_documents() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "ownership.txt",
            "Rust ownership and the borrow checker ensure memory safety without garbage collection",
        ),
        (
            "django.txt",
            "Python web frameworks like Django and Flask provide rapid development for web apps",
        ),
        (
            "indexes.txt",
            "Database query optimization relies on SQL indexing and careful execution plans",
        ),
    ]
}

/// Stub loader that counts how many models it constructs.
#[derive(Default)]
pub struct CountingLoader {
    loads: AtomicUsize,
}

impl CountingLoader {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self, model: EmbeddingModelId) -> Result<SharedModel, EmbeddingError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        // Widen the window for concurrent first callers.
        std::thread::sleep(std::time::Duration::from_millis(20));
        StubLoader.load(model)
    }
}
