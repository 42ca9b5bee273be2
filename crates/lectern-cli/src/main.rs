//! Lectern CLI - Command-line interface for the offline progress queue.
//!
//! The main entry point for the `lectern` CLI binary.

use anyhow::Result;
use clap::Parser;

use lectern_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let config = cli.config()?;

    lectern_core::init_logging_with_default(config.sync.log_format, "warn");

    // Create runtime and execute
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Record(args) => lectern_cli::commands::record::execute(args, &config).await,
            Commands::Pending(args) => lectern_cli::commands::pending::execute(&args, &config),
            Commands::Sync(args) => lectern_cli::commands::sync::execute(args, &config).await,
            Commands::Progress(args) => {
                lectern_cli::commands::progress::execute(args, &config).await
            }
        }
    })
}
