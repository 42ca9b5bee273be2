//! Sync command - drain buffered events into the remote store.

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;

use crate::stores::Stores;
use crate::{Config, OutputFormat};

/// Arguments for the sync command.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Keep events of unhandled types instead of discarding them.
    #[arg(long)]
    pub retain_unhandled: bool,
}

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if the stores cannot be opened or the batch commit fails;
/// in that case the buffered events are kept for the next run.
pub async fn execute(args: SyncArgs, config: &Config) -> Result<()> {
    let mut config = config.clone();
    config.sync.retain_unhandled |= args.retain_unhandled;

    let stores = Stores::open(&config)?;
    let report = stores
        .reconciler()
        .reconcile()
        .await
        .context("Sync failed; pending updates were kept")?;

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if report.pending == 0 {
                println!("Nothing to sync");
                return Ok(());
            }
            if report.committed {
                println!(
                    "{} {} lesson update(s)",
                    "Synced".green(),
                    report.staged
                );
            } else {
                println!("{}", "No applicable updates; pending list kept".yellow());
            }
            if report.superseded > 0 {
                println!("  Superseded: {}", report.superseded);
            }
            if report.unhandled > 0 {
                let verb = if !report.committed || config.sync.retain_unhandled {
                    "kept"
                } else {
                    "discarded"
                };
                println!("  Unhandled:  {} ({verb})", report.unhandled);
            }
        }
    }

    Ok(())
}
