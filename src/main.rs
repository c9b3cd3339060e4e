//! mathscore - Main Entry Point
//!
//! Trains the candidate roster on the student performance data and serves
//! single-student predictions from the persisted artifact.

use clap::Parser;
use colored::*;
use mathscore::cli::{render_error, run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mathscore=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "Command failed");
            eprintln!("  {} {}", "error:".red().bold(), render_error(&err));
            ExitCode::FAILURE
        }
    }
}
