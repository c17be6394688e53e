//! Context string assembly.

use rag_vector::QueryHit;

/// Returned when a theme has nothing to offer for a question.
pub const NO_CONTEXT_SENTINEL: &str = "No context found for this question.";

/// Render one hit with its similarity annotation.
pub fn format_hit(hit: &QueryHit) -> String {
    format!("[Similarity: {:.2}]\n{}", hit.similarity(), hit.text)
}

/// Join ranked hits into the context handed to a language model.
pub fn format_context(hits: &[QueryHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT_SENTINEL.to_string();
    }
    hits.iter().map(format_hit).collect::<Vec<_>>().join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_vector::ChunkMetadata;

    fn hit(text: &str, distance: f32) -> QueryHit {
        QueryHit {
            chunk_id: format!("id-{text}"),
            text: text.to_string(),
            metadata: ChunkMetadata {
                source_filename: "notes.txt".to_string(),
                document_id: "doc".to_string(),
                chunk_index: 0,
            },
            distance,
        }
    }

    #[test]
    fn test_empty_hits_give_sentinel() {
        assert_eq!(format_context(&[]), NO_CONTEXT_SENTINEL);
    }

    #[test]
    fn test_format_ranked_hits() {
        let context = format_context(&[hit("first", 0.1), hit("second", 0.456)]);
        assert_eq!(
            context,
            "[Similarity: 0.90]\nfirst\n\n[Similarity: 0.54]\nsecond"
        );
    }

    #[test]
    fn test_exact_match_similarity() {
        assert_eq!(format_hit(&hit("same", 0.0)), "[Similarity: 1.00]\nsame");
    }
}
