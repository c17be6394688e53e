//! Command implementations.
//!
//! Core operations are synchronous and may load models or touch disk, so
//! every call into [`RagService`] runs on a blocking thread.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rag_embeddings::ModelInfo;
use rag_retrieval::{RagService, UploadFailure, UploadReport, UploadedFile};
use rag_types::{DocumentEntry, Settings, ThemeSummary};
use rag_vector::ThemeIndexStats;
use tracing::{info, warn};

use crate::cli::ThemeCommands;

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    log_level: Option<&str>,
    data_dir: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    if let Some(dir) = data_dir {
        settings.data_dir = dir.to_string();
    }
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the config.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Open the service for the configured data root.
pub async fn open_service(settings: Settings) -> Result<Arc<RagService>> {
    let warm_up = settings.models.warm_up;
    let service = blocking(move || Ok(RagService::from_settings(settings)?)).await?;
    let service = Arc::new(service);

    if warm_up {
        let svc = Arc::clone(&service);
        let report = blocking(move || Ok(svc.warm_up())).await?;
        for (model, reason) in &report.failed {
            warn!(model = %model, reason = %reason, "Model warm-up failed");
        }
    }
    Ok(service)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Blocking task panicked")?
}

pub fn show_models() {
    print!("{}", render_models(&RagService::supported_models()));
}

pub async fn handle_themes(service: Arc<RagService>, command: ThemeCommands) -> Result<()> {
    match command {
        ThemeCommands::Create { name, model } => {
            let theme = blocking(move || {
                service
                    .create_theme(&name, &model)
                    .with_context(|| format!("Failed to create theme {name:?}"))
            })
            .await?;
            info!(theme = %theme.id, "Theme created");
            println!(
                "Created theme {} ({}) with model {}",
                theme.id, theme.display_name, theme.embedding_model
            );
        }
        ThemeCommands::List => {
            let themes = blocking(move || Ok(service.list_themes())).await?;
            print!("{}", render_themes(&themes));
        }
        ThemeCommands::Documents { theme } => {
            let docs = blocking(move || Ok(service.theme_documents(&theme)?)).await?;
            print!("{}", render_documents(&docs));
        }
    }
    Ok(())
}

/// Read upload paths, collecting unreadable ones as failures instead of
/// aborting the batch.
pub fn read_upload_files(paths: &[PathBuf]) -> (Vec<UploadedFile>, Vec<UploadFailure>) {
    let mut files = Vec::with_capacity(paths.len());
    let mut failed = Vec::new();
    for path in paths {
        match UploadedFile::from_path(path) {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read upload");
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                failed.push(UploadFailure {
                    filename,
                    reason: e.to_string(),
                });
            }
        }
    }
    (files, failed)
}

pub async fn handle_upload(
    service: Arc<RagService>,
    theme: String,
    paths: Vec<PathBuf>,
) -> Result<()> {
    let (files, unreadable) = read_upload_files(&paths);

    let mut report = blocking(move || Ok(service.upload(&theme, files)?)).await?;
    let ingest_failures = std::mem::take(&mut report.failed);
    report.failed = unreadable.into_iter().chain(ingest_failures).collect();
    print!("{}", render_upload(&report));
    if !report.failed.is_empty() && report.saved.is_empty() {
        anyhow::bail!("No files were ingested");
    }
    Ok(())
}

pub async fn handle_context(
    service: Arc<RagService>,
    theme: String,
    question: String,
    k: Option<usize>,
) -> Result<()> {
    let context = blocking(move || {
        let k = k.unwrap_or(service.settings().retrieval.default_k);
        Ok(service.build_context(&theme, &question, k)?)
    })
    .await?;
    println!("{context}");
    Ok(())
}

pub async fn handle_warmup(service: Arc<RagService>) -> Result<()> {
    let report = blocking(move || Ok(service.warm_up())).await?;
    for model in &report.loaded {
        println!("loaded  {model}");
    }
    for (model, reason) in &report.failed {
        println!("failed  {model}: {reason}");
    }
    if report.loaded.is_empty() {
        anyhow::bail!("No embedding model could be loaded");
    }
    Ok(())
}

pub async fn show_status(service: Arc<RagService>, theme: String) -> Result<()> {
    let stats = blocking(move || Ok(service.index_stats(&theme)?)).await?;
    print!("{}", render_status(&stats));
    Ok(())
}

pub fn render_models(models: &[ModelInfo]) -> String {
    let mut out = String::new();
    for m in models {
        out.push_str(&format!(
            "{:<24} dim={:<4} max_tokens={}\n",
            m.name(),
            m.dimension,
            m.max_sequence_length
        ));
    }
    out
}

pub fn render_themes(themes: &[ThemeSummary]) -> String {
    if themes.is_empty() {
        return "No themes\n".to_string();
    }
    let mut out = String::new();
    for t in themes {
        out.push_str(&format!(
            "{:<24} {:<24} docs={:<4} created={}\n",
            t.id,
            t.embedding_model.as_str(),
            t.documents_count,
            t.created_at.to_rfc3339()
        ));
    }
    out
}

pub fn render_documents(docs: &[DocumentEntry]) -> String {
    if docs.is_empty() {
        return "No documents\n".to_string();
    }
    let mut out = String::new();
    for d in docs {
        out.push_str(&format!(
            "{:<32} {:>10} bytes  chunks={:<3} {}\n",
            d.name,
            d.size,
            d.chunk_count,
            d.uploaded_at.to_rfc3339()
        ));
    }
    out
}

pub fn render_upload(report: &UploadReport) -> String {
    let mut out = String::new();
    for entry in &report.saved {
        out.push_str(&format!("saved   {} ({} chunks)\n", entry.name, entry.chunk_count));
    }
    for failure in &report.failed {
        out.push_str(&format!("failed  {}: {}\n", failure.filename, failure.reason));
    }
    out.push_str(&format!(
        "{}: {} saved, {} failed, {} documents total\n",
        report.theme_id,
        report.saved.len(),
        report.failed.len(),
        report.total_documents
    ));
    out
}

pub fn render_status(stats: &ThemeIndexStats) -> String {
    format!(
        "theme:     {}\nmodel:     {}\nvectors:   {}\ndimension: {}\nsize:      {} bytes\n",
        stats.theme_id, stats.model, stats.vector_count, stats.dimension, stats.size_bytes
    )
}
