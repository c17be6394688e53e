//! Per-theme index handle.
//!
//! A [`ThemeIndex`] bundles the HNSW graph, the chunk store and the header
//! that pins the theme's embedding model. Queries share a read lock on the
//! graph; inserts are serialized and either land completely or not at all.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rag_embeddings::Embedding;
use rag_types::{EmbeddingModelId, IndexSettings};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::VectorError;
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::index::VectorIndex;
use crate::metadata::{ChunkRecord, ChunkStore};

const HEADER_FILE: &str = "index.json";
const VECTORS_DIR: &str = "vectors";
const CHUNKS_DIR: &str = "chunks";

/// On-disk record of what built an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHeader {
    pub theme_id: String,
    pub model: EmbeddingModelId,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
}

/// A chunk to insert, already embedded with the theme's document path.
#[derive(Debug, Clone)]
pub struct ChunkInput {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub source_filename: String,
    pub chunk_index: u32,
    pub embedding: Embedding,
}

/// Provenance returned with each query hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    pub source_filename: String,
    pub document_id: String,
    pub chunk_index: u32,
}

/// One ranked query result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance
    pub distance: f32,
}

impl QueryHit {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Index status for one theme.
#[derive(Debug, Clone, Serialize)]
pub struct ThemeIndexStats {
    pub theme_id: String,
    pub model: EmbeddingModelId,
    pub vector_count: usize,
    pub dimension: usize,
    pub size_bytes: u64,
}

/// Open vector index for a single theme.
pub struct ThemeIndex {
    header: IndexHeader,
    dir: PathBuf,
    vectors: RwLock<HnswIndex>,
    chunks: ChunkStore,
    /// Serializes inserts; holds the next free vector id.
    next_id: Mutex<u64>,
}

impl std::fmt::Debug for ThemeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeIndex")
            .field("header", &self.header)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

fn write_header(path: &Path, header: &IndexHeader) -> Result<(), VectorError> {
    let bytes = serde_json::to_vec_pretty(header)
        .map_err(|e| VectorError::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_header(path: &Path) -> Result<IndexHeader, VectorError> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| VectorError::Serialization(e.to_string()))
}

impl ThemeIndex {
    /// Open the index in `dir`, creating it for `model` if absent.
    ///
    /// Fails with [`VectorError::ModelMismatch`] when the directory holds an
    /// index built by another model.
    pub fn open(
        dir: impl Into<PathBuf>,
        theme_id: &str,
        model: EmbeddingModelId,
        settings: &IndexSettings,
    ) -> Result<Self, VectorError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let header_path = dir.join(HEADER_FILE);
        let header = if header_path.exists() {
            let header = read_header(&header_path)?;
            if header.model != model {
                return Err(VectorError::ModelMismatch {
                    theme: theme_id.to_string(),
                    expected: model,
                    found: header.model,
                });
            }
            header
        } else {
            let header = IndexHeader {
                theme_id: theme_id.to_string(),
                model,
                dimension: model.dimension(),
                created_at: Utc::now(),
            };
            write_header(&header_path, &header)?;
            info!(theme = theme_id, model = %model, "Created theme index");
            header
        };

        let config = HnswConfig::new(header.dimension, dir.join(VECTORS_DIR)).with_settings(settings);
        let vectors = HnswIndex::open_or_create(config)?;
        let chunks = ChunkStore::open(dir.join(CHUNKS_DIR))?;

        let index = Self {
            next_id: Mutex::new(0),
            header,
            dir,
            vectors: RwLock::new(vectors),
            chunks,
        };
        index.reconcile()?;
        Ok(index)
    }

    /// Drop metadata whose vector never reached the saved graph and seed the
    /// id counter past every key in use.
    fn reconcile(&self) -> Result<(), VectorError> {
        let vectors = self.vectors.read().unwrap_or_else(PoisonError::into_inner);
        let orphans: Vec<ChunkRecord> = self
            .chunks
            .all()?
            .into_iter()
            .filter(|record| !vectors.contains(record.vector_id))
            .collect();
        if !orphans.is_empty() {
            warn!(
                theme = %self.header.theme_id,
                count = orphans.len(),
                "Dropping chunk metadata with no saved vector"
            );
            self.chunks.delete_batch(&orphans)?;
        }

        let mut next = self.chunks.next_vector_id()?;
        while vectors.contains(next) {
            next += 1;
        }
        *self.next_id.lock().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    pub fn theme_id(&self) -> &str {
        &self.header.theme_id
    }

    pub fn model(&self) -> EmbeddingModelId {
        self.header.model
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of stored chunks
    pub fn len(&self) -> usize {
        self.vectors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert chunks, returning their ids in input order.
    ///
    /// Rejects the whole call if any chunk id collides with a stored chunk or
    /// with another chunk in the same call. On any failure nothing from the
    /// call remains in the index.
    pub fn insert(&self, inputs: Vec<ChunkInput>) -> Result<Vec<String>, VectorError> {
        if inputs.is_empty() {
            return Ok(vec![]);
        }

        let mut next_id = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);

        let mut seen = HashSet::new();
        for input in &inputs {
            if input.embedding.dimension() != self.header.dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: self.header.dimension,
                    actual: input.embedding.dimension(),
                });
            }
            if !seen.insert(input.chunk_id.as_str())
                || self.chunks.find_vector_id(&input.chunk_id)?.is_some()
            {
                return Err(VectorError::DuplicateChunk(input.chunk_id.clone()));
            }
        }

        let now = Utc::now();
        let records: Vec<ChunkRecord> = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| ChunkRecord {
                vector_id: *next_id + i as u64,
                chunk_id: input.chunk_id.clone(),
                document_id: input.document_id.clone(),
                text: input.text.clone(),
                source_filename: input.source_filename.clone(),
                chunk_index: input.chunk_index,
                created_at: now,
            })
            .collect();

        let mut vectors = self.vectors.write().unwrap_or_else(PoisonError::into_inner);

        let mut added = Vec::with_capacity(records.len());
        for (record, input) in records.iter().zip(&inputs) {
            if let Err(e) = vectors.add(record.vector_id, &input.embedding) {
                rollback_vectors(&mut vectors, &added);
                return Err(e);
            }
            added.push(record.vector_id);
        }

        if let Err(e) = self.chunks.put_batch(&records) {
            rollback_vectors(&mut vectors, &added);
            return Err(e);
        }

        if let Err(e) = vectors.save() {
            if let Err(cleanup) = self.chunks.delete_batch(&records) {
                warn!(error = %cleanup, "Failed to remove metadata after index save failure");
            }
            rollback_vectors(&mut vectors, &added);
            return Err(e);
        }

        *next_id += records.len() as u64;
        debug!(theme = %self.header.theme_id, count = records.len(), "Inserted chunks");
        Ok(records.into_iter().map(|r| r.chunk_id).collect())
    }

    /// Rank stored chunks by cosine distance to `query`.
    ///
    /// `k` is clamped to `1..=len()`; an empty index yields no hits.
    pub fn query(&self, query: &Embedding, k: usize) -> Result<Vec<QueryHit>, VectorError> {
        let results = {
            let vectors = self.vectors.read().unwrap_or_else(PoisonError::into_inner);
            vectors.search(query, k)?
        };

        let mut hits = Vec::with_capacity(results.len());
        for result in results {
            match self.chunks.get(result.vector_id)? {
                Some(record) => hits.push(QueryHit {
                    chunk_id: record.chunk_id,
                    text: record.text,
                    metadata: ChunkMetadata {
                        source_filename: record.source_filename,
                        document_id: record.document_id,
                        chunk_index: record.chunk_index,
                    },
                    distance: result.distance,
                }),
                None => warn!(
                    theme = %self.header.theme_id,
                    vector_id = result.vector_id,
                    "Vector has no chunk metadata, skipping"
                ),
            }
        }
        Ok(hits)
    }

    /// Whether a chunk id is stored.
    pub fn contains_chunk(&self, chunk_id: &str) -> Result<bool, VectorError> {
        Ok(self.chunks.find_vector_id(chunk_id)?.is_some())
    }

    pub fn stats(&self) -> ThemeIndexStats {
        let stats = self.vectors.read().unwrap_or_else(PoisonError::into_inner).stats();
        ThemeIndexStats {
            theme_id: self.header.theme_id.clone(),
            model: self.header.model,
            vector_count: stats.vector_count,
            dimension: stats.dimension,
            size_bytes: stats.size_bytes,
        }
    }
}

fn rollback_vectors(vectors: &mut HnswIndex, ids: &[u64]) {
    for &id in ids {
        if let Err(e) = vectors.remove(id) {
            warn!(vector_id = id, error = %e, "Failed to roll back vector");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_embeddings::{EmbeddingModel, StubEmbedder};
    use tempfile::TempDir;

    fn chunk(embedder: &StubEmbedder, id: &str, text: &str) -> ChunkInput {
        ChunkInput {
            chunk_id: id.to_string(),
            document_id: id.to_string(),
            text: text.to_string(),
            source_filename: format!("{id}.txt"),
            chunk_index: 0,
            embedding: embedder.embed_documents(&[text]).unwrap().remove(0),
        }
    }

    fn open(dir: &Path, model: EmbeddingModelId) -> ThemeIndex {
        ThemeIndex::open(dir, "physics", model, &IndexSettings::default()).unwrap()
    }

    #[test]
    fn test_insert_and_query_self_first() {
        let temp = TempDir::new().unwrap();
        let model = EmbeddingModelId::MiniLmL6V2;
        let embedder = StubEmbedder::new(model);
        let index = open(temp.path(), model);

        let ids = index
            .insert(vec![
                chunk(&embedder, "a", "Newton's laws describe motion and force"),
                chunk(&embedder, "b", "Photosynthesis converts light into sugar"),
                chunk(&embedder, "c", "The French revolution began in 1789"),
            ])
            .unwrap();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let query = embedder
            .embed_documents(&["Photosynthesis converts light into sugar"])
            .unwrap()
            .remove(0);
        let hits = index.query(&query, 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk_id, "b");
        assert_eq!(hits[0].metadata.source_filename, "b.txt");
        assert!(hits[0].distance.abs() < 1e-3);
        assert!((hits[0].similarity() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_index_query() {
        let temp = TempDir::new().unwrap();
        let model = EmbeddingModelId::BgeSmallEnV15;
        let index = open(temp.path(), model);
        let query = StubEmbedder::new(model).embed_query("anything").unwrap();
        assert!(index.query(&query, 3).unwrap().is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_k_larger_than_count() {
        let temp = TempDir::new().unwrap();
        let model = EmbeddingModelId::MiniLmL6V2;
        let embedder = StubEmbedder::new(model);
        let index = open(temp.path(), model);
        index
            .insert(vec![chunk(&embedder, "a", "alpha"), chunk(&embedder, "b", "beta")])
            .unwrap();

        let query = embedder.embed_query("alpha").unwrap();
        let hits = index.query(&query, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_duplicate_chunk_rejects_whole_call() {
        let temp = TempDir::new().unwrap();
        let model = EmbeddingModelId::MiniLmL6V2;
        let embedder = StubEmbedder::new(model);
        let index = open(temp.path(), model);
        index.insert(vec![chunk(&embedder, "a", "alpha")]).unwrap();

        let err = index
            .insert(vec![chunk(&embedder, "b", "beta"), chunk(&embedder, "a", "again")])
            .unwrap_err();
        assert!(matches!(err, VectorError::DuplicateChunk(ref id) if id == "a"));
        assert_eq!(index.len(), 1);
        assert!(!index.contains_chunk("b").unwrap());

        let err = index
            .insert(vec![chunk(&embedder, "c", "one"), chunk(&embedder, "c", "two")])
            .unwrap_err();
        assert!(matches!(err, VectorError::DuplicateChunk(_)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let temp = TempDir::new().unwrap();
        let index = open(temp.path(), EmbeddingModelId::BgeBaseEnV15);
        let wrong = StubEmbedder::new(EmbeddingModelId::MiniLmL6V2);
        let err = index.insert(vec![chunk(&wrong, "a", "alpha")]).unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { expected: 768, actual: 384 }));
    }

    #[test]
    fn test_reopen_keeps_chunks_and_model() {
        let temp = TempDir::new().unwrap();
        let model = EmbeddingModelId::BgeSmallEnV15;
        let embedder = StubEmbedder::new(model);
        {
            let index = open(temp.path(), model);
            index.insert(vec![chunk(&embedder, "a", "alpha")]).unwrap();
        }

        let index = open(temp.path(), model);
        assert_eq!(index.len(), 1);
        assert_eq!(index.model(), model);
        index.insert(vec![chunk(&embedder, "b", "beta")]).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.stats().vector_count, 2);
    }

    #[test]
    fn test_model_mismatch_on_reopen() {
        let temp = TempDir::new().unwrap();
        drop(open(temp.path(), EmbeddingModelId::MiniLmL6V2));

        let err = ThemeIndex::open(
            temp.path(),
            "physics",
            EmbeddingModelId::BgeBaseEnV15,
            &IndexSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, VectorError::ModelMismatch { .. }));
    }
}
