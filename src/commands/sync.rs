//! Sync command - download TPH data and replace the local cache

use crate::config::Config;
use crate::error::{Error, Result};
use crate::geofence::Geofence;
use crate::progress::SyncSpinner;
use crate::session::{Session, SessionEvent};
use crate::store::LocationStore;
use crate::sync::{RecordSource, SyncClient, SyncReport};
use std::sync::Arc;
use tracing::{info, warn};

/// Sync options
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Use this URL instead of the configured endpoint
    pub url: Option<String>,
    /// Suppress the spinner (JSON output, scripts)
    pub quiet: bool,
}

/// Build the configured record source
pub fn endpoint_source(config: &Config, url: Option<String>) -> Result<Arc<dyn RecordSource>> {
    let url = url.unwrap_or_else(|| config.endpoint_url.clone());
    url::Url::parse(&url)?;
    let client = SyncClient::new(&config.sync)?;
    Ok(Arc::new(client.endpoint(url)))
}

/// Execute sync: run one background sync through a session and wait for it.
///
/// Ctrl-C tears the session down, which aborts the sync before it commits.
pub async fn cmd_sync(
    config: &Config,
    store: &LocationStore,
    options: SyncOptions,
) -> Result<SyncReport> {
    let source = endpoint_source(config, options.url)?;
    let geofence = Geofence::from_config(&config.geofence)?;
    run_sync(store, source, geofence, options.quiet).await
}

async fn run_sync(
    store: &LocationStore,
    source: Arc<dyn RecordSource>,
    geofence: Geofence,
    quiet: bool,
) -> Result<SyncReport> {
    info!("Syncing from {}", source.describe());

    let (mut session, mut events) = Session::new(store.clone(), source, geofence);
    session.trigger_sync()?;

    let spinner = (!quiet).then(SyncSpinner::start);

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Progress(stage)) => {
                    if let Some(spinner) = &spinner {
                        spinner.stage(stage);
                    }
                }
                Some(SessionEvent::Synced(report)) => break Ok(report),
                Some(SessionEvent::SyncFailed(e)) => break Err(e),
                None => break Err(Error::Cancelled),
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling sync");
                session.shutdown();
                break Err(Error::Cancelled);
            }
        }
    };

    if let Some(spinner) = spinner {
        match &outcome {
            Ok(report) => spinner.finish(format!("✓ Synced {} records", report.records_stored)),
            Err(e) => spinner.finish(format!("✗ Sync failed: {}", e)),
        }
    }

    outcome
}

/// Print sync summary to console
pub fn print_sync_report(report: &SyncReport) {
    println!("\n✅ Sync complete\n");
    println!("Source: {}", report.source);
    println!("Total records: {}", report.records_stored);
    if report.duplicates_replaced > 0 {
        println!(
            "Duplicate keys replaced: {} (last record kept)",
            report.duplicates_replaced
        );
    }
    println!("Elapsed: {} ms", report.elapsed_ms);
    println!("\nData saved to the local cache. Pick a block with 'tph blocks'.");
}

/// Print a sync failure with a retry hint
pub fn print_sync_failure(error: &Error) {
    eprintln!("\n❌ Sync failed: {}", error);
    eprintln!("The local cache was left unchanged.");
    if error.is_retryable() {
        eprintln!("Check the network connection and run 'tph sync' again.");
    }
}
