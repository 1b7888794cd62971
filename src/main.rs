//! portal-reconcile - Concurrent Payment Portal Reconciliation
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use portal_reconcile::config::{CliArgs, ReconcileConfig};
use portal_reconcile::error_log::{has_entries, ErrorLog};
use portal_reconcile::fetch::HttpPortal;
use portal_reconcile::progress::print_summary;
use portal_reconcile::reconcile::BatchOrchestrator;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_fatal(&e);
            ExitCode::FAILURE
        }
    }
}

/// Report a fatal error exactly once
///
/// Once logging is up the console layer prints it and the error log keeps a
/// copy; before that it goes straight to stderr.
fn report_fatal(e: &anyhow::Error) {
    if tracing::dispatcher::has_been_set() {
        error!("{:#}", e);
    } else {
        eprintln!("Error: {:#}", e);
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging before validation so config errors reach the error log
    let error_log = ErrorLog::new(&args.log_file);
    setup_logging(args.verbose, &error_log)?;

    // Validate and create config
    let config = ReconcileConfig::from_args(args)
        .context("Invalid configuration")?;

    // Create tokio runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(run_async(config))
}

async fn run_async(config: ReconcileConfig) -> Result<()> {
    let show_progress = config.show_progress;
    let log_path = config.log_path.clone();
    let input = config.input_path.clone();

    let portal = HttpPortal::new(config.portal.clone());
    let orchestrator = BatchOrchestrator::new(config, portal);

    let summary = orchestrator
        .run()
        .await
        .with_context(|| format!("Reconciliation of {} failed", input.display()))?;

    if show_progress {
        let artifacts: Vec<&Path> = summary.artifacts.iter().map(|p| p.as_path()).collect();
        print_summary(
            summary.total_rows,
            &summary.tally,
            summary.duration,
            &artifacts,
            &log_path,
        );
    }

    if has_entries(&log_path) {
        info!(log = %log_path.display(), "Some accounts failed, see the error log");
    }

    Ok(())
}

fn setup_logging(verbose: bool, error_log: &ErrorLog) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("portal_reconcile=debug,warn")
    } else {
        EnvFilter::new("portal_reconcile=info,warn")
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(console)
        .with(error_log.layer())
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
