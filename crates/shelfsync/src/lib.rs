//! `shelfsync`
//!
//! Command-line wiring around `shelfsync_core`: environment, logging and the exit status
use anyhow::{Context as _, Error, bail};
use shelfsync_core::config::SyncConfig;
use shelfsync_core::feed::client::GoodreadsFeedClient;
use shelfsync_core::notion::client::NotionClient;
use shelfsync_core::{SyncReport, run_sync};
use std::process::ExitCode;
use tracing::Instrument as _;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is not set
const DEFAULT_LOG_FILTER: &str = "info";

#[allow(
    clippy::missing_inline_in_public_items,
    reason = "Executed once per run, never across crate boundaries"
)]
#[allow(
    clippy::print_stderr,
    reason = "Tracing might not be available here if run_safe() failed before its initialization"
)]
pub async fn run() -> ExitCode {
    match run_safe().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Sync failed! Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

/// Encapsulated run function that allows returning errors instead of panicking, so `run()` can
/// turn any of them into a failing exit status.
async fn run_safe() -> Result<(), Error> {
    // A missing .env file is fine, the variables may come from the environment itself
    let env_file = dotenvy::dotenv().ok();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("Unable to set global tracing subscriber: {err}"))?;
    if let Some(path) = env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let config = SyncConfig::from_env().context("Invalid configuration")?;
    tracing::debug!("Using {config:?}");

    let feed = GoodreadsFeedClient::from_config(&config)?;
    let notion = NotionClient::from_config(&config)?;

    let span = tracing::info_span!("sync", goodreads_id = %config.goodreads_id);
    let report = run_sync(&feed, &notion, config.batch_size)
        .instrument(span)
        .await?;

    summarize(&report);
    if !report.is_clean() {
        bail!("{} writes to Notion failed", report.failures.len());
    }
    Ok(())
}

/// Logs the outcome of a run, one line per failed write.
fn summarize(report: &SyncReport) {
    log::info!(
        "Sync finished: {} created, {} updated, {} unchanged, {} duplicates, {} without book ID",
        report.created,
        report.updated,
        report.unchanged,
        report.duplicates,
        report.unkeyed
    );
    for failure in &report.failures {
        match &failure.record_id {
            Some(record_id) => log::error!(
                "Could not update {:?} (book {}, page {record_id}): {}",
                failure.title,
                failure.external_id,
                failure.error
            ),
            None => log::error!(
                "Could not create {:?} (book {}): {}",
                failure.title,
                failure.external_id,
                failure.error
            ),
        }
    }
}
