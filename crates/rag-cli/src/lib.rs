//! theme-rag command-line library.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, ThemeCommands};
pub use commands::{
    handle_context, handle_themes, handle_upload, handle_warmup, init_logging, load_settings,
    open_service, show_models, show_status,
};
