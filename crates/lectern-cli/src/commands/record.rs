//! Record command - record a lesson completion.

use anyhow::{Context, Result};
use clap::Args;
use lectern_progress::{ProgressUpdate, RecordOutcome};
use owo_colors::OwoColorize;
use serde_json::json;

use crate::stores::Stores;
use crate::{Config, OutputFormat};

/// Arguments for the record command.
#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Learner ID.
    #[arg(long)]
    pub user: String,

    /// Course ID.
    #[arg(long)]
    pub course: String,

    /// Module ID.
    #[arg(long)]
    pub module: String,

    /// Lesson ID within the module.
    #[arg(long)]
    pub lesson: String,

    /// Mark a buffered event as not completed. A direct write still adds the
    /// lesson to the completed set.
    #[arg(long)]
    pub incomplete: bool,
}

/// Execute the record command.
///
/// # Errors
///
/// Returns an error if the stores cannot be opened or the remote rejects the
/// write for a reason other than quota.
pub async fn execute(args: RecordArgs, config: &Config) -> Result<()> {
    let stores = Stores::open(config)?;
    let update = ProgressUpdate::lesson_completion(args.user, args.course, args.module, args.lesson)
        .with_completed(!args.incomplete);
    let lesson_key = update.lesson_key.clone();

    let outcome = stores
        .recorder()
        .record_lesson_completion(update)
        .await
        .with_context(|| format!("Failed to record lesson {lesson_key}"))?;

    match config.format {
        OutputFormat::Json => {
            let body = match &outcome {
                RecordOutcome::Committed => json!({ "outcome": "committed", "lessonKey": lesson_key }),
                RecordOutcome::Buffered(event) => {
                    json!({ "outcome": "buffered", "lessonKey": lesson_key, "event": event })
                }
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => match &outcome {
            RecordOutcome::Committed => {
                println!("{} {lesson_key}", "Recorded".green());
            }
            RecordOutcome::Buffered(event) => {
                println!(
                    "{} {lesson_key} (high traffic, queued as #{}; run `lectern sync` later)",
                    "Buffered".yellow(),
                    event.sequence
                );
            }
        },
    }

    Ok(())
}
