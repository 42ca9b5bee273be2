//! Workspace automation tasks.
//!
//! Run with: `cargo xtask <command>`

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask", about = "Lectern workspace automation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks locally
    Ci,
    /// Validate workspace conventions
    Lint,
    /// Generate coverage report
    Coverage,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci => run_ci(),
        Commands::Lint => run_lint(),
        Commands::Coverage => run_coverage(),
    }
}

fn run_ci() -> Result<()> {
    println!("Running CI checks...\n");

    run_lint()?;
    run_cmd("cargo", &["fmt", "--check"])?;
    run_cmd("cargo", &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    run_cmd("cargo", &["test", "--workspace"])?;
    run_cmd("cargo", &["doc", "--workspace", "--no-deps"])?;

    println!("\nAll CI checks passed!");
    Ok(())
}

/// Every crate under `crates/` is named `lectern-*`, opts into the
/// workspace lints, and forbids unsafe code at its crate root.
fn run_lint() -> Result<()> {
    println!("Validating workspace conventions...\n");

    let mut violations = Vec::new();
    for entry in fs::read_dir("crates").context("Failed to read crates/")? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let dir = entry.path();

        if !name.starts_with("lectern-") {
            violations.push(format!("crate '{name}' does not follow lectern-* naming"));
        }

        let manifest = read(&dir.join("Cargo.toml"))?;
        if !manifest.contains("[lints]\nworkspace = true") {
            violations.push(format!("crate '{name}' does not inherit workspace lints"));
        }

        let root = ["src/lib.rs", "src/main.rs"]
            .iter()
            .map(|file| dir.join(file))
            .find(|path| path.exists())
            .with_context(|| format!("crate '{name}' has no lib.rs or main.rs"))?;
        if !read(&root)?.contains("#![forbid(unsafe_code)]") {
            violations.push(format!("{} does not forbid unsafe code", root.display()));
        }
    }

    if !violations.is_empty() {
        for violation in &violations {
            println!("  {violation}");
        }
        anyhow::bail!("{} convention violation(s)", violations.len());
    }

    println!("All conventions validated!");
    Ok(())
}

fn run_coverage() -> Result<()> {
    run_cmd("cargo", &["llvm-cov", "--workspace", "--html"])?;
    println!("\nCoverage report: target/llvm-cov/html/index.html");
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn run_cmd(cmd: &str, args: &[&str]) -> Result<()> {
    println!("$ {} {}", cmd, args.join(" "));
    let status = Command::new(cmd)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run: {} {}", cmd, args.join(" ")))?;

    if !status.success() {
        anyhow::bail!("Command failed: {} {}", cmd, args.join(" "));
    }
    Ok(())
}
