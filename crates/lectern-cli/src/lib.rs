//! # lectern-cli
//!
//! Command-line interface for the Lectern offline progress queue.
//!
//! ## Commands
//!
//! - `lectern record` - Record a lesson completion (buffered if over quota)
//! - `lectern pending` - List buffered progress events
//! - `lectern sync` - Drain buffered events into the remote store
//! - `lectern progress` - Show a user's course progress
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `LECTERN_DATA_DIR` - Directory holding the local slot and the remote
//!   emulator snapshot (default: `.lectern`)
//! - `LECTERN_RETRY_MAX_RETRIES`, `LECTERN_RETRY_INITIAL_DELAY_MS`,
//!   `LECTERN_PENDING_KEY`, `LECTERN_PROGRESS_COLLECTION`,
//!   `LECTERN_RETAIN_UNHANDLED`, `LECTERN_LOG_FORMAT` - see
//!   [`lectern_progress::SyncConfig::from_env`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;
pub mod stores;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lectern_progress::SyncConfig;

/// Lectern CLI - offline lesson-progress queue.
#[derive(Debug, Parser)]
#[command(name = "lectern")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the local slot and the remote snapshot.
    #[arg(long, env = "LECTERN_DATA_DIR", default_value = ".lectern")]
    pub data_dir: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a `LECTERN_*` environment variable is malformed.
    pub fn config(&self) -> anyhow::Result<Config> {
        Ok(Config {
            data_dir: self.data_dir.clone(),
            format: self.format,
            sync: SyncConfig::from_env()?,
        })
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record a lesson completion.
    Record(commands::record::RecordArgs),
    /// List buffered progress events.
    Pending(commands::pending::PendingArgs),
    /// Drain buffered events into the remote store.
    Sync(commands::sync::SyncArgs),
    /// Show course progress.
    Progress(commands::progress::ProgressArgs),
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

/// CLI configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Data directory.
    pub data_dir: PathBuf,
    /// Output format.
    pub format: OutputFormat,
    /// Queue, retry and logging settings.
    pub sync: SyncConfig,
}
