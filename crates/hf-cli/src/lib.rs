//! Hotfix operator front end
//!
//! The `hf` binary embeds the hotfix engine in a small demo service and exposes it to an
//! operator: a line-oriented shell served over TCP, plus one-shot `apply`, `check` and
//! `symbols` commands.

pub mod commands;
pub mod config;
pub mod demo;
pub mod diagnostics;
pub mod server;
pub mod shell;

// CLI-specific error handling
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum CliError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error(transparent)]
        Hotfix(#[from] hf_core::Error),

        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error("Server error: {0}")]
        Server(String),
    }

    pub type Result<T> = std::result::Result<T, CliError>;
}

pub use error::{CliError, Result};
