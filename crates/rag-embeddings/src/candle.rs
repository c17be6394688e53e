//! Candle-based embedding implementation.
//!
//! Runs the BERT-family models in [`EmbeddingModelId`]: all-MiniLM-L6-v2
//! with mean pooling, BGE small/base with CLS pooling and a query
//! instruction prefix.

use std::path::Path;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use rag_types::{DevicePreference, EmbeddingModelId, Pooling};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::cache::{get_or_download_model, ModelCache};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Default batch size for embedding
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Candle-based BERT embedder.
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    info: ModelInfo,
}

/// Pick the inference device.
///
/// Without the CUDA backend compiled into candle this always yields the CPU.
pub fn select_device(preference: DevicePreference) -> Result<Device, EmbeddingError> {
    match preference {
        DevicePreference::Cpu => Ok(Device::Cpu),
        DevicePreference::Auto => Ok(Device::cuda_if_available(0)?),
    }
}

impl CandleEmbedder {
    /// Load a model from cache (downloading if needed).
    pub fn load(
        model: EmbeddingModelId,
        cache: &ModelCache,
        device: DevicePreference,
    ) -> Result<Self, EmbeddingError> {
        let paths = get_or_download_model(cache, model)?;
        let device = select_device(device)?;
        Self::load_from_paths(model, &paths.config, &paths.tokenizer, &paths.weights, device)
    }

    /// Load from explicit file paths
    pub fn load_from_paths(
        model: EmbeddingModelId,
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
        device: Device,
    ) -> Result<Self, EmbeddingError> {
        info!(model = %model, device = ?device, "Loading embedding model...");

        let config_str = std::fs::read_to_string(config_path)?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e)))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };

        let bert = BertModel::load(vb, &config)?;
        let info = ModelInfo::for_model(model);

        info!(
            model = %model,
            dim = info.dimension,
            max_seq = info.max_sequence_length,
            "Model loaded successfully"
        );

        Ok(Self {
            model: bert,
            tokenizer,
            device,
            info,
        })
    }

    /// Mean pooling over token embeddings (excluding padding)
    fn mean_pooling(
        &self,
        embeddings: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor, EmbeddingError> {
        let mask = attention_mask
            .unsqueeze(2)?
            .broadcast_as(embeddings.shape())?;
        let mask_f32 = mask.to_dtype(DType::F32)?;

        let masked = embeddings.broadcast_mul(&mask_f32)?;
        let sum = masked.sum(1)?;

        let mask_sum = mask_f32.sum(1)?;
        let mask_sum = mask_sum.clamp(1e-9, f64::MAX)?; // Avoid division by zero

        let mean = sum.broadcast_div(&mask_sum)?;
        Ok(mean)
    }

    fn pool(&self, output: &Tensor, attention_mask: &Tensor) -> Result<Tensor, EmbeddingError> {
        match self.info.model.pooling() {
            Pooling::Mean => self.mean_pooling(output, attention_mask),
            Pooling::Cls => Ok(output.i((.., 0))?),
        }
    }

    fn forward_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.info.max_sequence_length);

        let mut input_ids: Vec<Vec<u32>> = Vec::with_capacity(encodings.len());
        let mut attention_masks: Vec<Vec<u32>> = Vec::with_capacity(encodings.len());

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();

            let truncated_len = ids.len().min(max_len);
            let mut padded_ids = ids[..truncated_len].to_vec();
            let mut padded_mask = mask[..truncated_len].to_vec();

            padded_ids.resize(max_len, 0);
            padded_mask.resize(max_len, 0);

            input_ids.push(padded_ids);
            attention_masks.push(padded_mask);
        }

        let batch_size = texts.len();
        let input_ids_flat: Vec<u32> = input_ids.into_iter().flatten().collect();
        let mask_flat: Vec<u32> = attention_masks.into_iter().flatten().collect();

        let input_ids = Tensor::from_vec(input_ids_flat, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(mask_flat, (batch_size, max_len), &self.device)?;
        let token_type_ids = Tensor::zeros_like(&input_ids)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let pooled = self.pool(&output, &attention_mask)?;
        let pooled_vec: Vec<Vec<f32>> = pooled.to_vec2()?;

        Ok(pooled_vec.into_iter().map(Embedding::new).collect())
    }
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = texts.len(), model = %self.info.model, "Embedding batch");

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(DEFAULT_BATCH_SIZE) {
            embeddings.extend(self.forward_batch(batch)?);
        }

        debug!(
            count = embeddings.len(),
            dim = self.info.dimension,
            "Batch complete"
        );

        Ok(embeddings)
    }

    fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let prefixed;
        let input = match self.info.model.query_instruction() {
            Some(instruction) => {
                prefixed = format!("{instruction}{text}");
                prefixed.as_str()
            }
            None => text,
        };

        self.forward_batch(&[input])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidInput("model returned no embedding".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests download model weights on first run:
    // cargo test -p rag-embeddings -- --ignored

    fn load(model: EmbeddingModelId) -> CandleEmbedder {
        CandleEmbedder::load(model, &ModelCache::default(), DevicePreference::Cpu).unwrap()
    }

    #[test]
    fn test_select_cpu_device() {
        assert!(matches!(
            select_device(DevicePreference::Cpu).unwrap(),
            Device::Cpu
        ));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_dimension_per_model() {
        for model in EmbeddingModelId::ALL {
            let embedder = load(model);
            let emb = embedder.embed_documents(&["Hello, world!"]).unwrap();
            assert_eq!(emb[0].dimension(), model.dimension());
        }
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_document_embedding_is_deterministic() {
        let embedder = load(EmbeddingModelId::MiniLmL6V2);
        let first = embedder.embed_documents(&["The cat sat on the mat"]).unwrap();
        let second = embedder.embed_documents(&["The cat sat on the mat"]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_similar_texts_high_similarity() {
        let embedder = load(EmbeddingModelId::BgeSmallEnV15);
        let docs = embedder
            .embed_documents(&[
                "A cat is sitting on a mat",
                "Python is a programming language",
            ])
            .unwrap();
        let query = embedder.embed_query("Where is the cat?").unwrap();

        assert!(query.cosine_similarity(&docs[0]) > query.cosine_similarity(&docs[1]));
    }
}
