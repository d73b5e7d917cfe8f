// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Latency report CLI entry point.

use clap::Parser;
use interlat_report::{render_table, summarize, ReportError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Summarize display latency from an interlat JSONL capture
#[derive(Parser, Debug)]
#[command(name = "interlat-report")]
#[command(version, about = "Summarize interaction latency from a capture")]
struct Cli {
    /// Capture written by `UpdateLog::with_file`
    capture: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Include cancel causes and trigger latency
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("interlat-report: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ReportError> {
    let content = tokio::fs::read_to_string(&cli.capture)
        .await
        .map_err(|source| ReportError::Read {
            path: cli.capture.display().to_string(),
            source,
        })?;
    let updates = interlat_capture::parse_jsonl(&content)?;
    tracing::info!(path = %cli.capture.display(), updates = updates.len(), "capture loaded");

    let report = summarize(&updates);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_table(&report, cli.verbose));
    }
    Ok(())
}
