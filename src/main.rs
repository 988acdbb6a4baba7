//! CLI entry point for paperfetch.

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use paperfetch_core::config::load_config;
use paperfetch_core::parser::parse_records_file;
use paperfetch_core::report::Report;
use paperfetch_core::{Pipeline, SourceRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod cli;

use cli::{Args, resolve_settings};

/// Some records failed.
const EXIT_PARTIAL: u8 = 2;

/// The run was interrupted.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{err:#}"), "run aborted");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = loaded.path.as_ref().filter(|_| loaded.loaded_from_file()) {
        info!(path = %path.display(), "using config file");
    }
    let settings = resolve_settings(&args, loaded.config.as_ref());

    let registry = SourceRegistry::with_builtin_sources().context("Failed to initialize sources")?;
    let pipeline = Pipeline::new(registry)
        .with_search_settings(settings.search)
        .with_fallback(settings.fallback_enabled);

    if args.check_sources {
        for (name, available) in pipeline.check_sources().await {
            let status = if available { "available" } else { "unavailable" };
            println!("{name}: {status}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let Some(input) = args.input.as_deref() else {
        bail!("--input is required");
    };
    let records = parse_records_file(input)
        .await
        .with_context(|| format!("Failed to read records from '{}'", input.display()))?;
    if records.is_empty() {
        bail!("No records found in '{}'", input.display());
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling outstanding work");
            interrupt.cancel();
        }
    });

    let report = pipeline
        .process_records(records, &settings.priority, &settings.download, &cancel)
        .await?;
    print_summary(&report);

    if report.summary.cancelled {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else if report.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL))
    }
}

fn print_summary(report: &Report) {
    let summary = &report.summary;
    println!(
        "Downloaded {}/{} records ({} skipped as existing, {} via fallback, {})",
        summary.successful_downloads,
        summary.total_records,
        summary.skipped_existing,
        summary.fallback_successes,
        summary.total_size
    );
    if summary.failed_searches > 0 {
        println!("No source found: {}", summary.failed_searches);
    }
    if summary.failed_downloads > 0 {
        println!("Download failed: {}", summary.failed_downloads);
    }
    for failure in &report.failures {
        let source = failure.source.as_deref().unwrap_or("-");
        println!("  [{:?}] {} ({source}): {}", failure.stage, failure.title, failure.reason);
    }
}
