//! theme-rag
//!
//! Per-theme document retrieval: create themes bound to an embedding model,
//! upload text files, and print the context assembled for a question.
//!
//! # Usage
//!
//! ```bash
//! theme-rag themes create "Quantum Physics" --model BAAI/bge-small-en-v1.5
//! theme-rag upload quantum_physics notes/*.txt
//! theme-rag context quantum_physics "What is entanglement?" -k 3
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/theme-rag/config.toml)
//! 3. `--config` file
//! 4. Environment variables (RAG_*, `__` for nested keys)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use rag_cli::{
    handle_context, handle_themes, handle_upload, handle_warmup, init_logging, load_settings,
    open_service, show_models, show_status, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Models = cli.command {
        show_models();
        return Ok(());
    }

    let settings = load_settings(
        cli.config.as_deref(),
        cli.log_level.as_deref(),
        cli.data_dir.as_deref(),
    )?;
    init_logging(&settings)?;
    let service = open_service(settings).await?;

    match cli.command {
        Commands::Models => show_models(),
        Commands::Themes(cmd) => handle_themes(service, cmd).await?,
        Commands::Upload { theme, files } => handle_upload(service, theme, files).await?,
        Commands::Context { theme, question, k } => {
            handle_context(service, theme, question, k).await?
        }
        Commands::Warmup => handle_warmup(service).await?,
        Commands::Status { theme } => show_status(service, theme).await?,
    }

    Ok(())
}
