//! Concurrency E2E tests for theme-rag.
//!
//! Verifies one model construction under concurrent first access and that
//! parallel uploads to one theme lose no manifest entries.

use std::sync::{Arc, Barrier};

use pretty_assertions::assert_eq;

use e2e_tests::{text_files, CountingLoader, TestHarness};
use rag_embeddings::ModelLoader;

/// N concurrent first queries construct the theme's model exactly once.
#[test]
fn test_concurrent_first_access_loads_model_once() {
    let harness = TestHarness::new();
    let loader = Arc::new(CountingLoader::default());
    let service = Arc::new(harness.open_service_with_loader(loader.clone() as Arc<dyn ModelLoader>));
    service.create_theme("physics", "BAAI/bge-base-en-v1.5").unwrap();

    let n = 8;
    let barrier = Arc::new(Barrier::new(n));
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                let embedder = service.embedder_for("physics").unwrap();
                let context = service.build_context("physics", "gravity?", 3).unwrap();
                (embedder, context)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(loader.loads(), 1);
    for (embedder, _) in &results[1..] {
        assert!(Arc::ptr_eq(&results[0].0, embedder));
    }
}

/// Parallel uploads of distinct files into one theme all reach the manifest.
#[test]
fn test_parallel_uploads_keep_every_entry() {
    let harness = TestHarness::new();
    let service = Arc::new(harness.open_service());
    service.create_theme("notes", "all-MiniLM-L6-v2").unwrap();

    let n = 6;
    let barrier = Arc::new(Barrier::new(n));
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                let name = format!("note-{i}.txt");
                let text = format!("Note {i} talks about topic number {i}");
                service
                    .upload("notes", text_files(&[(name.as_str(), text.as_str())]))
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        let report = handle.join().unwrap();
        assert_eq!(report.saved.len(), 1);
    }

    assert_eq!(service.theme_documents("notes").unwrap().len(), n);
    assert_eq!(service.index_stats("notes").unwrap().vector_count, n);
}

/// Async callers drive the core through blocking tasks.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_queries_from_blocking_tasks() {
    let harness = TestHarness::new();
    let service = Arc::new(harness.open_service());
    service.create_theme("cooking", "BAAI/bge-small-en-v1.5").unwrap();
    service
        .upload(
            "cooking",
            text_files(&[
                ("pasta.txt", "Fresh pasta dough needs flour and eggs"),
                ("bread.txt", "Sourdough bread rises with a wild yeast starter"),
            ]),
        )
        .unwrap();

    let mut tasks = Vec::new();
    for question in ["pasta dough", "sourdough starter", "flour and eggs", "wild yeast"] {
        let service = Arc::clone(&service);
        tasks.push(tokio::task::spawn_blocking(move || {
            service.retrieve("cooking", question, 1).unwrap()
        }));
    }

    let mut firsts = Vec::new();
    for task in tasks {
        let hits = task.await.unwrap();
        firsts.push(hits[0].metadata.source_filename.clone());
    }
    assert_eq!(firsts, vec!["pasta.txt", "bread.txt", "pasta.txt", "bread.txt"]);
}
