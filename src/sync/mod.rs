//! Fetching TPH records from the remote endpoint
//!
//! This module provides:
//! - An HTTP client with explicit connect and read timeouts
//! - All-or-nothing decoding of the JSON payload
//! - A `RecordSource` trait so callers can swap the endpoint for a fake
//! - `sync_into`, which only touches the store after a successful fetch

mod payload;

pub use crate::stage::{NoProgress, SyncObserver, SyncStage};
pub use payload::*;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::LocationRecord;
use crate::store::LocationStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Anything that can produce a full set of TPH records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch the complete record set. Fails as a unit.
    async fn fetch_records(&self, observer: &dyn SyncObserver) -> Result<Vec<LocationRecord>>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}

/// HTTP client for the TPH endpoint
#[derive(Clone)]
pub struct SyncClient {
    client: Client,
}

impl SyncClient {
    /// Build a client from sync settings
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5));

        if let Some(total) = config.total_timeout_secs {
            builder = builder.timeout(Duration::from_secs(total));
        }

        let client = builder
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// GET `url` and decode the record array
    pub async fn fetch(&self, url: &str) -> Result<Vec<LocationRecord>> {
        self.fetch_observed(url, &NoProgress).await
    }

    /// `fetch` with stage reporting
    pub async fn fetch_observed(
        &self,
        url: &str,
        observer: &dyn SyncObserver,
    ) -> Result<Vec<LocationRecord>> {
        observer.on_stage(SyncStage::Connecting);
        debug!("Fetching: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("HTTP {}: {}", status, url)));
        }

        observer.on_stage(SyncStage::Downloading);
        // Anything failing mid-body is a transport failure; the payload
        // itself is judged by `parse_records`
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("failed reading response from {}: {}", url, e)))?;
        debug!("Downloaded {} bytes from {}", body.len(), url);

        let records = parse_records(&body)?;
        observer.on_stage(SyncStage::Processing {
            records: records.len(),
        });
        Ok(records)
    }

    /// Bind this client to an endpoint
    pub fn endpoint(self, url: impl Into<String>) -> Endpoint {
        Endpoint {
            client: self,
            url: url.into(),
        }
    }
}

/// A `SyncClient` bound to one URL
#[derive(Clone)]
pub struct Endpoint {
    client: SyncClient,
    url: String,
}

impl Endpoint {
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RecordSource for Endpoint {
    async fn fetch_records(&self, observer: &dyn SyncObserver) -> Result<Vec<LocationRecord>> {
        self.client.fetch_observed(&self.url, observer).await
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Result of a successful sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub source: String,
    pub records_fetched: usize,
    pub records_stored: usize,
    pub duplicates_replaced: usize,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Utc>,
}

/// Fetch from `source` and replace the cache.
///
/// The store is only touched once the fetch has fully succeeded, and the
/// replacement itself is one transaction.
pub async fn sync_into(
    source: &dyn RecordSource,
    store: &LocationStore,
    observer: &dyn SyncObserver,
) -> Result<SyncReport> {
    let started = Instant::now();
    let origin = source.describe();
    info!("Starting sync from {}", origin);

    let records = match source.fetch_records(observer).await {
        Ok(records) => records,
        Err(e) => {
            warn!("Sync from {} failed, cache left unchanged: {}", origin, e);
            return Err(e);
        }
    };

    let stats = store.replace_all_observed(&records, observer).await?;
    observer.on_stage(SyncStage::Done {
        records: stats.inserted,
    });

    let report = SyncReport {
        source: origin,
        records_fetched: records.len(),
        records_stored: stats.inserted,
        duplicates_replaced: stats.duplicates_replaced,
        elapsed_ms: started.elapsed().as_millis() as u64,
        finished_at: Utc::now(),
    };
    info!(
        "Sync complete: {} records in {}ms",
        report.records_stored, report.elapsed_ms
    );
    Ok(report)
}
