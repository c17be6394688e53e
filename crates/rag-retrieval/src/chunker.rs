//! Text chunking for ingestion.
//!
//! Disabled by default: a document is stored as one chunk. When enabled,
//! text is cut into character windows that overlap by a fixed amount,
//! ending at whitespace when one is near the window edge.

use rag_types::ChunkingSettings;

/// Splits document text into chunks for embedding.
#[derive(Debug, Clone)]
pub struct Chunker {
    settings: ChunkingSettings,
}

impl Chunker {
    pub fn new(settings: ChunkingSettings) -> Self {
        Self { settings }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Split `text` into chunks. Never returns an empty list for non-blank text.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if !self.settings.enabled {
            return vec![text.to_string()];
        }

        let window = self.settings.window_chars.max(1);
        let overlap = self.settings.overlap_chars.min(window - 1);

        // Byte offset of every char, plus the end of the string.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;
        if total <= window {
            return vec![text.to_string()];
        }

        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let mut end = (start + window).min(total);
            if end < total {
                // Back off to whitespace in the second half of the window.
                let floor = start + window / 2;
                if let Some(ws) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                    end = ws + 1;
                }
            }

            let piece = text[bounds[start]..bounds[end]].trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }
            if end >= total {
                break;
            }
            let mut next = end.saturating_sub(overlap).max(start + 1);
            // Start the overlap on a word boundary when there is one.
            if let Some(ws) = (next..end).find(|&i| chars[i].is_whitespace()) {
                next = ws + 1;
            }
            start = next;
        }

        if chunks.is_empty() {
            chunks.push(text.to_string());
        }
        chunks
    }
}
