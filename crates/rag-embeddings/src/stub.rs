//! Deterministic stub embedder.
//!
//! Feature-hashes lowercase word tokens and character trigrams into a vector
//! of the model's dimension. Needs no weights, so the full ingest/query path
//! runs offline. Texts sharing words land close together; identical texts
//! produce identical vectors.

use rag_types::EmbeddingModelId;

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stub embedder producing hashed bag-of-features vectors.
pub struct StubEmbedder {
    info: ModelInfo,
    seed: u64,
}

impl StubEmbedder {
    pub fn new(model: EmbeddingModelId) -> Self {
        Self {
            info: ModelInfo::for_model(model),
            seed: fnv1a(FNV_OFFSET, model.as_str().as_bytes()),
        }
    }

    fn embed_one(&self, text: &str) -> Embedding {
        let dim = self.info.dimension;
        let mut values = vec![0.0f32; dim];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.accumulate(&mut values, word.as_bytes(), 1.0);

            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut values, trigram.as_bytes(), 0.5);
            }
        }

        Embedding::new(values)
    }

    fn accumulate(&self, values: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(self.seed, feature);
        let slot = (hash % values.len() as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        values[slot] += sign * weight;
    }
}

fn fnv1a(seed: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(seed, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

impl EmbeddingModel for StubEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_matches_model() {
        for model in EmbeddingModelId::ALL {
            let embedder = StubEmbedder::new(model);
            let emb = embedder.embed_documents(&["hello world"]).unwrap();
            assert_eq!(emb[0].dimension(), model.dimension());
        }
    }

    #[test]
    fn test_deterministic() {
        let embedder = StubEmbedder::new(EmbeddingModelId::MiniLmL6V2);
        let a = embedder.embed_documents(&["Rust ownership rules"]).unwrap();
        let b = embedder.embed_documents(&["Rust ownership rules"]).unwrap();
        assert_eq!(a, b);

        let other = StubEmbedder::new(EmbeddingModelId::MiniLmL6V2);
        assert_eq!(other.embed_documents(&["Rust ownership rules"]).unwrap(), a);
    }

    #[test]
    fn test_overlap_ranks_higher() {
        let embedder = StubEmbedder::new(EmbeddingModelId::BgeBaseEnV15);
        let docs = embedder
            .embed_documents(&[
                "fresh pasta dough needs flour and eggs",
                "the borrow checker enforces ownership",
            ])
            .unwrap();
        let query = embedder.embed_query("how to make pasta dough").unwrap();
        assert!(query.cosine_similarity(&docs[0]) > query.cosine_similarity(&docs[1]));
    }

    #[test]
    fn test_identical_text_similarity_is_one() {
        let embedder = StubEmbedder::new(EmbeddingModelId::BgeSmallEnV15);
        let doc = embedder.embed_documents(&["quantum entanglement"]).unwrap();
        let query = embedder.embed_query("quantum entanglement").unwrap();
        assert!((doc[0].cosine_similarity(&query) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_models_produce_different_vectors() {
        let a = StubEmbedder::new(EmbeddingModelId::MiniLmL6V2)
            .embed_documents(&["same text"])
            .unwrap();
        let b = StubEmbedder::new(EmbeddingModelId::BgeSmallEnV15)
            .embed_documents(&["same text"])
            .unwrap();
        assert_ne!(a, b);
    }
}
