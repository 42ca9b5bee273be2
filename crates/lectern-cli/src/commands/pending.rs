//! Pending command - list buffered progress events.

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;

use crate::stores::Stores;
use crate::{Config, OutputFormat};

/// Arguments for the pending command.
#[derive(Debug, Args)]
pub struct PendingArgs {
    /// Only show events for this learner.
    #[arg(long)]
    pub user: Option<String>,
}

/// Execute the pending command.
///
/// # Errors
///
/// Returns an error if the stores cannot be opened.
pub fn execute(args: &PendingArgs, config: &Config) -> Result<()> {
    let stores = Stores::open(config)?;
    let events: Vec<_> = stores
        .pending()
        .pending_updates()
        .into_iter()
        .filter(|e| args.user.as_ref().is_none_or(|u| *u == e.update.user_id))
        .collect();

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        OutputFormat::Text => {
            if events.is_empty() {
                println!("No pending progress updates");
                return Ok(());
            }

            println!("Pending progress updates:");
            println!();
            for event in &events {
                let update = &event.update;
                let kind = if event.is_lesson_completion() {
                    update.event_type.to_string()
                } else {
                    update.event_type.to_string().dimmed().to_string()
                };
                let state = if update.completed {
                    "completed".green().to_string()
                } else {
                    "incomplete".yellow().to_string()
                };
                println!(
                    "  #{:<4} {}/{} {} {kind} {state} at {}",
                    event.sequence,
                    update.user_id,
                    update.course_id,
                    update.lesson_key,
                    event.timestamp.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }

    Ok(())
}
