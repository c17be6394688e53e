//! Document ingestion.
//!
//! Each uploaded file is handled on its own: decode, store the raw bytes,
//! chunk, embed with the theme's document path and insert into the theme's
//! index. A failure affects only that file.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rag_embeddings::EmbeddingModel;
use rag_themes::write_atomic;
use rag_types::{DocumentEntry, RagError};
use rag_vector::{ChunkInput, ThemeIndex};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunker::Chunker;

/// One file in an upload batch.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            filename,
            bytes: std::fs::read(path)?,
        })
    }
}

/// A file that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub filename: String,
    pub reason: String,
}

/// Outcome of a batch upload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    pub theme_id: String,
    /// Manifest entries written for this batch, in input order
    pub saved: Vec<DocumentEntry>,
    pub failed: Vec<UploadFailure>,
    /// Documents in the theme after this batch
    pub total_documents: usize,
}

/// Reject names that could escape the theme's file directory.
fn validate_filename(name: &str) -> Result<(), RagError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(RagError::InvalidInput(format!(
            "unsafe filename {name:?}"
        )));
    }
    Ok(())
}

/// Decode upload bytes as UTF-8 text.
fn extract_text(file: &UploadedFile) -> Result<String, RagError> {
    let text = std::str::from_utf8(&file.bytes).map_err(|e| {
        RagError::InvalidInput(format!("{} is not valid UTF-8: {}", file.filename, e))
    })?;
    if text.trim().is_empty() {
        return Err(RagError::InvalidInput(format!(
            "{} contains no text",
            file.filename
        )));
    }
    Ok(text.to_string())
}

/// Turns uploaded files into indexed chunks for one data root.
#[derive(Debug, Clone)]
pub struct DocumentIngestor {
    files_root: PathBuf,
    chunker: Chunker,
}

impl DocumentIngestor {
    pub fn new(files_root: impl Into<PathBuf>, chunker: Chunker) -> Self {
        Self {
            files_root: files_root.into(),
            chunker,
        }
    }

    /// Directory holding a theme's raw uploads.
    pub fn theme_dir(&self, theme_id: &str) -> PathBuf {
        self.files_root.join(theme_id)
    }

    /// Ingest one file and return the manifest entry to record for it.
    ///
    /// The raw bytes are written only after every chunk is in the index, so
    /// a failed re-upload keeps the earlier file under the same name.
    pub fn ingest_file(
        &self,
        theme_id: &str,
        file: &UploadedFile,
        embedder: &dyn EmbeddingModel,
        index: &ThemeIndex,
    ) -> Result<DocumentEntry, RagError> {
        validate_filename(&file.filename)?;
        let text = extract_text(file)?;

        let uploaded_at = Utc::now();
        let document_id = format!(
            "{}_{}_{}",
            theme_id,
            file.filename,
            uploaded_at.timestamp_micros()
        );

        let pieces = self.chunker.chunk(&text);
        let embeddings = embedder.embed_texts(&pieces)?;
        let single = pieces.len() == 1;

        let inputs: Vec<ChunkInput> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| ChunkInput {
                chunk_id: if single {
                    document_id.clone()
                } else {
                    format!("{document_id}#{i}")
                },
                document_id: document_id.clone(),
                text,
                source_filename: file.filename.clone(),
                chunk_index: i as u32,
                embedding,
            })
            .collect();
        let chunk_count = inputs.len();

        index.insert(inputs)?;
        debug!(theme = theme_id, document = %document_id, chunks = chunk_count, "Indexed document");

        // Bytes land last so a failed embed or insert leaves a previous upload intact.
        let storage_path = self.theme_dir(theme_id).join(&file.filename);
        if let Err(e) = write_atomic(&storage_path, &file.bytes) {
            warn!(theme = theme_id, document = %document_id, error = %e, "Indexed chunks have no stored file");
            return Err(RagError::Internal(format!(
                "failed to store {}: {}",
                file.filename, e
            )));
        }

        info!(theme = theme_id, file = %file.filename, size = file.bytes.len(), "Ingested file");
        Ok(DocumentEntry {
            name: file.filename.clone(),
            storage_path: storage_path.to_string_lossy().into_owned(),
            size: file.bytes.len() as u64,
            uploaded_at,
            index_id: document_id,
            chunk_count,
        })
    }
}
