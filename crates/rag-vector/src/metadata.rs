//! Chunk metadata storage.
//!
//! Maps internal vector IDs (u64) to the chunk text and its source, plus a
//! reverse map from caller-supplied chunk IDs to vector IDs.
//! Stored in RocksDB for persistence and atomic batch updates.

use std::path::Path;

use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::VectorError;

/// Column family: vector_id (big-endian) -> ChunkRecord JSON
pub const CF_CHUNKS: &str = "chunks";
/// Column family: chunk_id -> vector_id (big-endian)
pub const CF_CHUNK_IDS: &str = "chunk_ids";

/// Stored chunk text and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Internal vector ID (key in HNSW index)
    pub vector_id: u64,
    /// Caller-supplied chunk id, unique within the theme
    pub chunk_id: String,
    /// Document this chunk was cut from
    pub document_id: String,
    /// Full chunk text
    pub text: String,
    /// Original upload filename
    pub source_filename: String,
    /// Position of the chunk within its document
    #[serde(default)]
    pub chunk_index: u32,
    pub created_at: DateTime<Utc>,
}

/// Chunk metadata storage using RocksDB.
pub struct ChunkStore {
    db: DB,
}

fn ser_err(e: serde_json::Error) -> VectorError {
    VectorError::Serialization(e.to_string())
}

fn decode_vector_id(bytes: &[u8]) -> Result<u64, VectorError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| VectorError::Serialization(format!("bad vector key length {}", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

impl ChunkStore {
    /// Open or create metadata storage.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = path.as_ref();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_CHUNKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_CHUNK_IDS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        info!(path = ?path, "Opened chunk metadata storage");
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, VectorError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| VectorError::Index(format!("column family {name} missing")))
    }

    /// Store records and their chunk id mappings in one atomic write.
    pub fn put_batch(&self, records: &[ChunkRecord]) -> Result<(), VectorError> {
        let chunks = self.cf(CF_CHUNKS)?;
        let ids = self.cf(CF_CHUNK_IDS)?;

        let mut batch = WriteBatch::default();
        for record in records {
            let key = record.vector_id.to_be_bytes();
            let value = serde_json::to_vec(record).map_err(ser_err)?;
            batch.put_cf(chunks, key, value);
            batch.put_cf(ids, record.chunk_id.as_bytes(), key);
        }
        self.db.write(batch)?;

        debug!(count = records.len(), "Stored chunk metadata");
        Ok(())
    }

    /// Remove records and their chunk id mappings in one atomic write.
    pub fn delete_batch(&self, records: &[ChunkRecord]) -> Result<(), VectorError> {
        let chunks = self.cf(CF_CHUNKS)?;
        let ids = self.cf(CF_CHUNK_IDS)?;

        let mut batch = WriteBatch::default();
        for record in records {
            batch.delete_cf(chunks, record.vector_id.to_be_bytes());
            batch.delete_cf(ids, record.chunk_id.as_bytes());
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// Get chunk record by vector ID.
    pub fn get(&self, vector_id: u64) -> Result<Option<ChunkRecord>, VectorError> {
        match self.db.get_cf(self.cf(CF_CHUNKS)?, vector_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    /// Find the vector ID assigned to a chunk id.
    pub fn find_vector_id(&self, chunk_id: &str) -> Result<Option<u64>, VectorError> {
        match self.db.get_cf(self.cf(CF_CHUNK_IDS)?, chunk_id.as_bytes())? {
            Some(bytes) => Ok(Some(decode_vector_id(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Count total records
    pub fn count(&self) -> Result<usize, VectorError> {
        let iter = self.db.iterator_cf(self.cf(CF_CHUNKS)?, IteratorMode::Start);
        Ok(iter.count())
    }

    /// Next unused vector ID (one past the highest stored key).
    pub fn next_vector_id(&self) -> Result<u64, VectorError> {
        let mut iter = self.db.iterator_cf(self.cf(CF_CHUNKS)?, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                Ok(decode_vector_id(&key)? + 1)
            }
            None => Ok(0),
        }
    }

    /// Get all records in vector ID order.
    ///
    /// Use with caution on large indexes.
    pub fn all(&self) -> Result<Vec<ChunkRecord>, VectorError> {
        let mut records = Vec::new();
        let iter = self.db.iterator_cf(self.cf(CF_CHUNKS)?, IteratorMode::Start);

        for item in iter {
            let (_, value) = item?;
            records.push(serde_json::from_slice(&value).map_err(ser_err)?);
        }

        Ok(records)
    }
}
