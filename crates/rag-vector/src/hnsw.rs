//! HNSW index implementation using usearch.
//!
//! Default parameters favour quality over speed:
//! - M = 16 (connections per layer)
//! - ef_construction = 200 (build-time quality)
//! - ef_search = 100 (search-time quality)

use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rag_embeddings::Embedding;
use rag_types::IndexSettings;
use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::VectorError;
use crate::index::{IndexStats, SearchResult, VectorIndex};

const INDEX_FILE: &str = "hnsw.usearch";

/// HNSW index configuration
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Embedding dimension (must match model)
    pub dimension: usize,
    /// Number of connections per layer (M parameter)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Index directory
    pub index_path: PathBuf,
    /// Initial capacity; grows on demand
    pub capacity: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
            index_path: PathBuf::from("./vector-index"),
            capacity: 1024,
        }
    }
}

impl HnswConfig {
    pub fn new(dimension: usize, index_path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            index_path: index_path.into(),
            ..Default::default()
        }
    }

    /// Apply configured HNSW parameters.
    pub fn with_settings(mut self, settings: &IndexSettings) -> Self {
        self.connectivity = settings.connectivity;
        self.expansion_add = settings.expansion_add;
        self.expansion_search = settings.expansion_search;
        self.capacity = settings.capacity.max(1);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false, // Single vector per key
        }
    }
}

/// HNSW index wrapper around usearch.
pub struct HnswIndex {
    index: RwLock<Index>,
    config: HnswConfig,
}

fn index_err(e: impl std::fmt::Display) -> VectorError {
    VectorError::Index(e.to_string())
}

impl HnswIndex {
    /// Create a new HNSW index or open existing one.
    pub fn open_or_create(config: HnswConfig) -> Result<Self, VectorError> {
        let index_file = config.index_path.join(INDEX_FILE);
        let options = config.options();

        let index = if index_file.exists() {
            info!(path = ?index_file, "Opening existing vector index");
            let idx = Index::new(&options).map_err(index_err)?;
            idx.load(path_str(&index_file)?)
                .map_err(|e| VectorError::Index(format!("Failed to load: {}", e)))?;
            let wanted = idx.size().max(config.capacity);
            idx.reserve(wanted).map_err(index_err)?;
            idx
        } else {
            info!(path = ?index_file, dim = config.dimension, "Creating new vector index");
            std::fs::create_dir_all(&config.index_path)?;
            let idx = Index::new(&options).map_err(index_err)?;
            idx.reserve(config.capacity).map_err(index_err)?;
            idx
        };

        Ok(Self {
            index: RwLock::new(index),
            config,
        })
    }

    /// Get the index file path
    pub fn index_file(&self) -> PathBuf {
        self.config.index_path.join(INDEX_FILE)
    }

    fn read(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Index> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn path_str(path: &std::path::Path) -> Result<&str, VectorError> {
    path.to_str()
        .ok_or_else(|| VectorError::Index("Invalid path encoding".to_string()))
}

impl VectorIndex for HnswIndex {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn len(&self) -> usize {
        self.read().size()
    }

    fn add(&mut self, id: u64, embedding: &Embedding) -> Result<(), VectorError> {
        if embedding.dimension() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.dimension(),
            });
        }

        let index = self.write();
        if index.contains(id) {
            return Err(VectorError::Index(format!("vector key {id} already present")));
        }
        if index.size() >= index.capacity() {
            let grown = (index.capacity() * 2).max(self.config.capacity);
            index.reserve(grown).map_err(index_err)?;
            debug!(capacity = grown, "Grew vector index capacity");
        }
        index.add(id, &embedding.values).map_err(index_err)?;

        debug!(id = id, "Added vector");
        Ok(())
    }

    fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>, VectorError> {
        if query.dimension() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.dimension(),
            });
        }

        let index = self.read();
        let size = index.size();
        if size == 0 {
            return Ok(vec![]);
        }
        let k = k.clamp(1, size);

        let matches = index.search(&query.values, k).map_err(index_err)?;

        let mut results: Vec<SearchResult> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&id, &dist)| SearchResult::new(id, dist))
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        debug!(k = k, found = results.len(), "Search complete");
        Ok(results)
    }

    fn remove(&mut self, id: u64) -> Result<bool, VectorError> {
        let index = self.write();
        let removed = index.remove(id).map_err(index_err)?;

        if removed > 0 {
            debug!(id = id, "Removed vector");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn contains(&self, id: u64) -> bool {
        self.read().contains(id)
    }

    fn stats(&self) -> IndexStats {
        let size_bytes = std::fs::metadata(self.index_file())
            .map(|m| m.len())
            .unwrap_or(0);

        IndexStats {
            vector_count: self.read().size(),
            dimension: self.config.dimension,
            size_bytes,
        }
    }

    /// Save to a temporary file, then rename over the live one, so a crash
    /// leaves either the old or the new index on disk.
    fn save(&self) -> Result<(), VectorError> {
        let index = self.read();
        let path = self.index_file();
        let tmp = self.config.index_path.join(format!("{INDEX_FILE}.tmp"));

        index
            .save(path_str(&tmp)?)
            .map_err(|e| VectorError::Index(format!("Failed to save: {}", e)))?;
        std::fs::rename(&tmp, &path)?;

        info!(path = ?path, vectors = index.size(), "Saved vector index");
        Ok(())
    }
}
