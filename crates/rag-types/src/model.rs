//! Supported embedding models.
//!
//! The set is closed: adding a model means adding a variant and letting the
//! compiler point at every match that needs a new arm.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Instruction BGE models expect in front of retrieval queries.
pub const BGE_QUERY_INSTRUCTION: &str =
    "Represent this sentence for searching relevant passages: ";

/// How token embeddings are reduced to one sentence vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// Average over non-padding tokens
    Mean,
    /// Hidden state of the leading [CLS] token
    Cls,
}

/// Identifier of a supported embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EmbeddingModelId {
    /// sentence-transformers all-MiniLM-L6-v2 (384 dimensions)
    #[serde(rename = "all-MiniLM-L6-v2")]
    MiniLmL6V2,
    /// BAAI bge-small-en-v1.5 (384 dimensions)
    #[serde(rename = "BAAI/bge-small-en-v1.5")]
    BgeSmallEnV15,
    /// BAAI bge-base-en-v1.5 (768 dimensions)
    #[serde(rename = "BAAI/bge-base-en-v1.5")]
    BgeBaseEnV15,
}

impl EmbeddingModelId {
    /// Every supported model, in presentation order.
    pub const ALL: [EmbeddingModelId; 3] = [
        EmbeddingModelId::MiniLmL6V2,
        EmbeddingModelId::BgeSmallEnV15,
        EmbeddingModelId::BgeBaseEnV15,
    ];

    /// Public identifier, as accepted from callers and stored on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingModelId::MiniLmL6V2 => "all-MiniLM-L6-v2",
            EmbeddingModelId::BgeSmallEnV15 => "BAAI/bge-small-en-v1.5",
            EmbeddingModelId::BgeBaseEnV15 => "BAAI/bge-base-en-v1.5",
        }
    }

    /// HuggingFace Hub repository holding the weights.
    pub fn repo_id(&self) -> &'static str {
        match self {
            EmbeddingModelId::MiniLmL6V2 => "sentence-transformers/all-MiniLM-L6-v2",
            EmbeddingModelId::BgeSmallEnV15 => "BAAI/bge-small-en-v1.5",
            EmbeddingModelId::BgeBaseEnV15 => "BAAI/bge-base-en-v1.5",
        }
    }

    /// Output dimension.
    pub fn dimension(&self) -> usize {
        match self {
            EmbeddingModelId::MiniLmL6V2 | EmbeddingModelId::BgeSmallEnV15 => 384,
            EmbeddingModelId::BgeBaseEnV15 => 768,
        }
    }

    /// Maximum sequence length in tokens.
    pub fn max_sequence_length(&self) -> usize {
        match self {
            EmbeddingModelId::MiniLmL6V2 => 256,
            EmbeddingModelId::BgeSmallEnV15 | EmbeddingModelId::BgeBaseEnV15 => 512,
        }
    }

    pub fn pooling(&self) -> Pooling {
        match self {
            EmbeddingModelId::MiniLmL6V2 => Pooling::Mean,
            EmbeddingModelId::BgeSmallEnV15 | EmbeddingModelId::BgeBaseEnV15 => Pooling::Cls,
        }
    }

    /// Prefix applied to queries (not documents) for asymmetric models.
    pub fn query_instruction(&self) -> Option<&'static str> {
        match self {
            EmbeddingModelId::MiniLmL6V2 => None,
            EmbeddingModelId::BgeSmallEnV15 | EmbeddingModelId::BgeBaseEnV15 => {
                Some(BGE_QUERY_INSTRUCTION)
            }
        }
    }
}

impl fmt::Display for EmbeddingModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingModelId {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        EmbeddingModelId::ALL
            .into_iter()
            .find(|m| m.as_str() == trimmed)
            .ok_or_else(|| RagError::UnsupportedModel(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_models() {
        for model in EmbeddingModelId::ALL {
            assert_eq!(model.as_str().parse::<EmbeddingModelId>().unwrap(), model);
        }
    }

    #[test]
    fn test_parse_unknown_model() {
        let err = "text-embedding-3-small".parse::<EmbeddingModelId>().unwrap_err();
        assert!(matches!(err, RagError::UnsupportedModel(ref m) if m == "text-embedding-3-small"));
    }

    #[test]
    fn test_serde_uses_public_ids() {
        let json = serde_json::to_string(&EmbeddingModelId::BgeSmallEnV15).unwrap();
        assert_eq!(json, "\"BAAI/bge-small-en-v1.5\"");
        let decoded: EmbeddingModelId = serde_json::from_str("\"all-MiniLM-L6-v2\"").unwrap();
        assert_eq!(decoded, EmbeddingModelId::MiniLmL6V2);
    }

    #[test]
    fn test_dimensions() {
        assert_eq!(EmbeddingModelId::MiniLmL6V2.dimension(), 384);
        assert_eq!(EmbeddingModelId::BgeSmallEnV15.dimension(), 384);
        assert_eq!(EmbeddingModelId::BgeBaseEnV15.dimension(), 768);
    }

    #[test]
    fn test_only_bge_has_query_instruction() {
        assert!(EmbeddingModelId::MiniLmL6V2.query_instruction().is_none());
        assert_eq!(
            EmbeddingModelId::BgeBaseEnV15.query_instruction(),
            Some(BGE_QUERY_INSTRUCTION)
        );
    }
}
