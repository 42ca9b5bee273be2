//! Progress command - show a user's course progress.

use anyhow::{Context, Result};
use clap::Args;
use lectern_progress::{CourseProgress, ProgressSource, progress_percentage};
use owo_colors::OwoColorize;
use serde_json::json;

use crate::stores::Stores;
use crate::{Config, OutputFormat};

/// Arguments for the progress command.
#[derive(Debug, Args)]
pub struct ProgressArgs {
    /// Learner ID.
    #[arg(long)]
    pub user: String,

    /// Course ID. Lists every course when omitted.
    #[arg(long)]
    pub course: Option<String>,

    /// Lessons in the course, for a completion percentage.
    #[arg(long)]
    pub total_lessons: Option<usize>,
}

/// Execute the progress command.
///
/// # Errors
///
/// Returns an error if the stores cannot be opened or the remote read fails.
pub async fn execute(args: ProgressArgs, config: &Config) -> Result<()> {
    let stores = Stores::open(config)?;
    let recorder = stores.recorder();

    let Some(course) = &args.course else {
        let all = recorder
            .list_user_progress(&args.user)
            .await
            .with_context(|| format!("Failed to list progress for {}", args.user))?;
        return print_list(&args, &all, config);
    };

    let fetched = recorder
        .fetch_course_progress(&args.user, course)
        .await
        .with_context(|| format!("Failed to read progress for {}/{course}", args.user))?;

    let Some(fetched) = fetched else {
        match config.format {
            OutputFormat::Json => println!("null"),
            OutputFormat::Text => println!("No progress for {} in {course}", args.user),
        }
        return Ok(());
    };

    match config.format {
        OutputFormat::Json => {
            let body = json!({
                "source": fetched.source.as_str(),
                "progress": fetched.progress,
                "percentage": args.total_lessons.map(|t| fetched.progress.percentage(t)),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            if fetched.source == ProgressSource::Cache {
                println!("{}", "High traffic, using cached data".yellow());
            }
            print_course(&fetched.progress, args.total_lessons);
        }
    }

    Ok(())
}

fn print_list(args: &ProgressArgs, all: &[CourseProgress], config: &Config) -> Result<()> {
    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(all)?);
        }
        OutputFormat::Text => {
            if all.is_empty() {
                println!("No progress for {}", args.user);
                return Ok(());
            }
            for progress in all {
                print_course(progress, args.total_lessons);
                println!();
            }
        }
    }
    Ok(())
}

fn print_course(progress: &CourseProgress, total_lessons: Option<usize>) {
    println!("Course: {}", progress.course_id.bold());
    let completed = progress.completed_lessons.len();
    match total_lessons {
        Some(total) => println!(
            "  Completed: {completed}/{total} ({}%)",
            progress_percentage(completed, total)
        ),
        None => println!("  Completed: {completed}"),
    }
    if let Some(updated) = &progress.last_updated {
        println!("  Updated:   {updated}");
    }
    for lesson in &progress.completed_lessons {
        println!("    {} {lesson}", "✓".green());
    }
}
