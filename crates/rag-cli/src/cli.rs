//! CLI argument parsing for theme-rag.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Theme RAG
///
/// Build per-theme document indexes and assemble retrieval context.
#[derive(Parser, Debug)]
#[command(name = "theme-rag")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/theme-rag/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the data directory
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List supported embedding models
    Models,

    /// Manage themes
    #[command(subcommand)]
    Themes(ThemeCommands),

    /// Upload text files into a theme
    Upload {
        /// Theme id or name
        theme: String,

        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the retrieval context for a question
    Context {
        /// Theme id or name
        theme: String,

        /// Question to retrieve context for
        question: String,

        /// Number of chunks (default from config)
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Load every supported embedding model
    Warmup,

    /// Show index status for a theme
    Status {
        /// Theme id or name
        theme: String,
    },
}

/// Theme subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ThemeCommands {
    /// Create a theme bound to an embedding model
    Create {
        /// Theme name
        name: String,

        /// Embedding model id
        #[arg(short, long, default_value = "all-MiniLM-L6-v2")]
        model: String,
    },

    /// List themes
    List,

    /// List a theme's documents
    Documents {
        /// Theme id or name
        theme: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_models() {
        let cli = Cli::parse_from(["theme-rag", "models"]);
        assert!(matches!(cli.command, Commands::Models));
    }

    #[test]
    fn test_cli_themes_create_default_model() {
        let cli = Cli::parse_from(["theme-rag", "themes", "create", "Quantum Physics"]);
        match cli.command {
            Commands::Themes(ThemeCommands::Create { name, model }) => {
                assert_eq!(name, "Quantum Physics");
                assert_eq!(model, "all-MiniLM-L6-v2");
            }
            _ => panic!("Expected themes create"),
        }
    }

    #[test]
    fn test_cli_themes_create_with_model() {
        let cli = Cli::parse_from([
            "theme-rag",
            "themes",
            "create",
            "physics",
            "--model",
            "BAAI/bge-base-en-v1.5",
        ]);
        match cli.command {
            Commands::Themes(ThemeCommands::Create { model, .. }) => {
                assert_eq!(model, "BAAI/bge-base-en-v1.5")
            }
            _ => panic!("Expected themes create"),
        }
    }

    #[test]
    fn test_cli_upload_requires_files() {
        assert!(Cli::try_parse_from(["theme-rag", "upload", "physics"]).is_err());

        let cli = Cli::parse_from(["theme-rag", "upload", "physics", "a.txt", "b.txt"]);
        match cli.command {
            Commands::Upload { theme, files } => {
                assert_eq!(theme, "physics");
                assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
            }
            _ => panic!("Expected upload"),
        }
    }

    #[test]
    fn test_cli_context_with_k() {
        let cli = Cli::parse_from(["theme-rag", "context", "physics", "what is gravity?", "-k", "5"]);
        match cli.command {
            Commands::Context { theme, question, k } => {
                assert_eq!(theme, "physics");
                assert_eq!(question, "what is gravity?");
                assert_eq!(k, Some(5));
            }
            _ => panic!("Expected context"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "theme-rag",
            "--config",
            "/path/to/config.toml",
            "--data-dir",
            "/tmp/rag",
            "--log-level",
            "debug",
            "themes",
            "list",
        ]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
        assert_eq!(cli.data_dir, Some("/tmp/rag".to_string()));
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::Themes(ThemeCommands::List)));
    }
}
