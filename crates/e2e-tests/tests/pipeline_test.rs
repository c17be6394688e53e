//! Upload-to-context pipeline E2E tests for theme-rag.
//!
//! Verifies batch ingestion, ranking and context formatting against a real
//! data root using the stub embedding backend.

use pretty_assertions::assert_eq;

use e2e_tests::{sample_documents, text_files, TestHarness};
use rag_embeddings::EmbeddingModelId;
use rag_retrieval::{UploadedFile, NO_CONTEXT_SENTINEL};
use rag_vector::ThemeIndexStats;

/// A batch of five files where one is not UTF-8: four land, one is reported.
#[test]
fn test_batch_with_undecodable_file() {
    let harness = TestHarness::new();
    let service = harness.open_service();
    service.create_theme("Physics", "all-MiniLM-L6-v2").unwrap();

    let mut files = text_files(&[
        ("gravity.txt", "Gravity is the curvature of spacetime caused by mass."),
        ("light.txt", "Light travels at roughly 300000 kilometres per second."),
        ("atoms.txt", "Atoms consist of a nucleus surrounded by electrons."),
        ("heat.txt", "Heat flows from hotter bodies to colder ones."),
    ]);
    files.insert(2, UploadedFile::new("scan.pdf", vec![0x25, 0x50, 0xff, 0xfe, 0xc3, 0x28]));

    let report = service.upload("physics", files).unwrap();

    let saved: Vec<_> = report.saved.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(saved, vec!["gravity.txt", "light.txt", "atoms.txt", "heat.txt"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].filename, "scan.pdf");
    assert!(report.failed[0].reason.contains("UTF-8"));
    assert_eq!(report.total_documents, 4);

    let manifest: Vec<_> = service
        .theme_documents("physics")
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(manifest, vec!["gravity.txt", "light.txt", "atoms.txt", "heat.txt"]);
    let stats: ThemeIndexStats = service.index_stats("physics").unwrap();
    assert_eq!(stats.vector_count, 4);
    assert_eq!(stats.model, EmbeddingModelId::MiniLmL6V2);
    assert_eq!(stats.dimension, 384);

    let files_dir = harness.data_dir.join("files").join("physics");
    assert!(files_dir.join("gravity.txt").exists());
    assert!(!files_dir.join("scan.pdf").exists());
}

/// Querying with a document's own text returns that document first, for
/// every supported model.
#[test]
fn test_self_query_ranks_first_for_every_model() {
    let harness = TestHarness::new();
    let service = harness.open_service();
    let docs = sample_documents();

    for model in EmbeddingModelId::ALL {
        let theme = service
            .create_theme(&model.as_str().replace('/', "-"), model.as_str())
            .unwrap();
        service.upload(&theme.id, text_files(&docs)).unwrap();

        for (filename, text) in &docs {
            let hits = service.retrieve(&theme.id, text, 3).unwrap();
            assert_eq!(hits.len(), 3);
            assert_eq!(&hits[0].metadata.source_filename, filename, "model {model}");
            assert!(hits[0].distance.abs() < 1e-3, "model {model}");
            assert!((hits[0].similarity() - 1.0).abs() < 1e-3, "model {model}");
            for pair in hits.windows(2) {
                assert!(pair[0].distance <= pair[1].distance);
            }
        }
    }
}

/// `k` larger than the stored count returns every chunk, ranked.
#[test]
fn test_k_larger_than_stored_count() {
    let harness = TestHarness::new();
    let service = harness.open_service();
    service.create_theme("code", "BAAI/bge-small-en-v1.5").unwrap();
    service.upload("code", text_files(&sample_documents())).unwrap();

    let hits = service.retrieve("code", "borrow checker memory safety", 50).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].metadata.source_filename, "ownership.txt");

    let context = service.build_context("code", "borrow checker memory safety", 50).unwrap();
    assert_eq!(context.matches("[Similarity: ").count(), 3);
    assert_eq!(context.split("\n\n").count(), 3);
}

/// A theme with no documents yields the sentinel rather than an error.
#[test]
fn test_empty_theme_returns_sentinel() {
    let harness = TestHarness::new();
    let service = harness.open_service();
    service.create_theme("Empty Shelf", "BAAI/bge-base-en-v1.5").unwrap();

    let context = service.build_context("empty_shelf", "anything at all?", 3).unwrap();
    assert_eq!(context, NO_CONTEXT_SENTINEL);
}

/// Context string layout: annotated, ranked, blank-line separated.
#[test]
fn test_context_format() {
    let harness = TestHarness::new();
    let service = harness.open_service();
    service.create_theme("code", "all-MiniLM-L6-v2").unwrap();
    service.upload("code", text_files(&sample_documents())).unwrap();

    let question = "Python web frameworks like Django and Flask provide rapid development for web apps";
    let context = service.build_context("code", question, 2).unwrap();

    let blocks: Vec<_> = context.split("\n\n").collect();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0], format!("[Similarity: 1.00]\n{question}"));
    assert!(blocks[1].starts_with("[Similarity: "));
}

/// Windowed chunking splits long documents and records the chunk count.
#[test]
fn test_chunked_upload() {
    let harness = TestHarness::new();
    let mut settings = harness.settings();
    settings.chunking.enabled = true;
    settings.chunking.window_chars = 120;
    settings.chunking.overlap_chars = 20;
    let service = harness.open_service_with(settings);
    service.create_theme("history", "all-MiniLM-L6-v2").unwrap();

    let long: String = (0..30)
        .map(|i| format!("Sentence number {i} about the industrial revolution. "))
        .collect();
    let report = service
        .upload("history", text_files(&[("long.txt", long.as_str()), ("short.txt", "Steam engines.")]))
        .unwrap();

    let long_entry = &report.saved[0];
    assert!(long_entry.chunk_count > 1);
    assert_eq!(report.saved[1].chunk_count, 1);

    let stats = service.index_stats("history").unwrap();
    assert_eq!(stats.vector_count, long_entry.chunk_count + 1);
}
