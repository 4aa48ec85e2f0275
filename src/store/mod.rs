//! Local TPH cache backed by SQLite
//!
//! A single `data_tph` table keyed by (kodeBlok, noTPH). The whole table is
//! swapped in one transaction on every sync, so readers see either the
//! previous snapshot or the new one.

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::LocationRecord;
use crate::stage::{NoProgress, SyncObserver, SyncStage};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Report progress every this many saved rows
const SAVE_PROGRESS_EVERY: usize = 100;

/// Outcome of a `replace_all`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceStats {
    /// Rows in the table after commit
    pub inserted: usize,
    /// Records that overwrote an earlier record with the same key
    pub duplicates_replaced: usize,
}

/// TPH cache handle
#[derive(Clone)]
pub struct LocationStore {
    pool: SqlitePool,
}

impl LocationStore {
    /// Open the store configured for this installation
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file).await
    }

    /// Open (creating if needed) the database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// A private in-memory store. Limited to one connection, since every
    /// SQLite memory connection is its own database.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the table, or drop and recreate it when the stored schema
    /// version differs
    pub async fn ensure_schema(&self) -> Result<()> {
        let version: i32 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;

        if version == SCHEMA_VERSION {
            return Ok(());
        }

        if version != 0 {
            warn!(
                "Schema version {} differs from {}; dropping cached data",
                version, SCHEMA_VERSION
            );
        }

        info!("Initializing database schema");
        let mut tx = self.pool.begin().await?;
        sqlx::query(DROP_SQL).execute(&mut *tx).await?;
        sqlx::query(SCHEMA_SQL).execute(&mut *tx).await?;
        sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Replace the whole cache with `records`
    pub async fn replace_all(&self, records: &[LocationRecord]) -> Result<ReplaceStats> {
        self.replace_all_observed(records, &NoProgress).await
    }

    /// Replace the whole cache, reporting `Saving` progress to `observer`.
    ///
    /// Later records win over earlier ones with the same (block, point) key.
    /// Nothing is visible to other connections until the commit; any error
    /// (or dropping the future) rolls the transaction back.
    pub async fn replace_all_observed(
        &self,
        records: &[LocationRecord],
        observer: &dyn SyncObserver,
    ) -> Result<ReplaceStats> {
        let total = records.len();
        let unique: HashSet<(&str, &str)> = records.iter().map(|r| r.key()).collect();
        let duplicates_replaced = total - unique.len();

        let mut tx = self.pool.begin().await?;

        let cleared = sqlx::query("DELETE FROM data_tph")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        debug!("Cleared {} cached records", cleared);

        for (i, record) in records.iter().enumerate() {
            if i % SAVE_PROGRESS_EVERY == 0 {
                observer.on_stage(SyncStage::Saving { saved: i, total });
            }

            sqlx::query(
                r#"
                INSERT INTO data_tph (company, location, kodeBlok, noTPH, coordinate)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(kodeBlok, noTPH) DO UPDATE SET
                    company = excluded.company,
                    location = excluded.location,
                    coordinate = excluded.coordinate
                "#,
            )
            .bind(&record.company)
            .bind(&record.location_code)
            .bind(&record.block_code)
            .bind(&record.point_id)
            .bind(&record.coordinate)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        if duplicates_replaced > 0 {
            warn!(
                "{} records shared a (block, point) key with an earlier record; kept the last",
                duplicates_replaced
            );
        }

        let stats = ReplaceStats {
            inserted: unique.len(),
            duplicates_replaced,
        };
        info!("Cache replaced: {} records", stats.inserted);
        Ok(stats)
    }

    /// Lazily stream distinct, non-empty block codes in ascending order.
    ///
    /// Every call runs a fresh query, so the sequence can be restarted.
    pub fn distinct_block_codes(&self) -> BoxStream<'_, Result<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT kodeBlok FROM data_tph WHERE kodeBlok <> '' ORDER BY kodeBlok",
        )
        .fetch(&self.pool)
        .map_err(Error::from)
        .boxed()
    }

    /// Collect `distinct_block_codes`
    pub async fn block_codes(&self) -> Result<Vec<String>> {
        self.distinct_block_codes().try_collect().await
    }

    /// Point ids belonging to a block, ascending. Unknown block gives an
    /// empty list.
    pub async fn points_for_block(&self, block_code: &str) -> Result<Vec<String>> {
        let points = sqlx::query_scalar::<_, String>(
            "SELECT noTPH FROM data_tph WHERE kodeBlok = ? AND noTPH <> '' ORDER BY noTPH",
        )
        .bind(block_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(points)
    }

    /// Find the record for a (block, point) key
    pub async fn lookup(&self, block_code: &str, point_id: &str) -> Result<Option<LocationRecord>> {
        let record = sqlx::query_as::<_, LocationRecord>(
            r#"
            SELECT company, location, kodeBlok, noTPH, coordinate
            FROM data_tph
            WHERE kodeBlok = ? AND noTPH = ?
            "#,
        )
        .bind(block_code)
        .bind(point_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Like `lookup` but a miss is an `Error::NotFound`
    pub async fn get(&self, block_code: &str, point_id: &str) -> Result<LocationRecord> {
        self.lookup(block_code, point_id)
            .await?
            .ok_or_else(|| Error::not_found(block_code, point_id))
    }

    /// Whether the cache holds no records
    pub async fn is_empty(&self) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM data_tph)")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists == 0)
    }

    /// Number of cached records
    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM data_tph")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// First `limit` records ordered by block then point
    pub async fn list(&self, limit: usize) -> Result<Vec<LocationRecord>> {
        // SQLite reads a negative LIMIT as unbounded
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let records = sqlx::query_as::<_, LocationRecord>(
            r#"
            SELECT company, location, kodeBlok, noTPH, coordinate
            FROM data_tph
            ORDER BY kodeBlok, noTPH
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Mutex};
    use tempfile::TempDir;

    async fn setup_test_store() -> (LocationStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = LocationStore::open(&tmp.path().join("test.db"))
            .await
            .unwrap();
        (store, tmp)
    }

    fn sample_records() -> Vec<LocationRecord> {
        vec![
            LocationRecord::new("A06", "L1", "B2", "T2", "-6.21,106.81"),
            LocationRecord::new("A06", "L1", "B1", "T3", "-6.20,106.80"),
            LocationRecord::new("A06", "L1", "B1", "T1", "-6.2,106.8"),
            LocationRecord::new("A07", "L2", "B2", "T1", "-6.22,106.82"),
        ]
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let (store, _tmp) = setup_test_store().await;
        assert!(store.is_empty().await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.block_codes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = LocationStore::open_in_memory().await.unwrap();
        assert!(store.is_empty().await.unwrap());

        store.replace_all(&sample_records()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 4);
        assert!(store.lookup("B2", "T1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_replace_all_empty_yields_no_blocks() {
        let (store, _tmp) = setup_test_store().await;
        store.replace_all(&sample_records()).await.unwrap();
        store.replace_all(&[]).await.unwrap();

        assert!(store.is_empty().await.unwrap());
        assert!(store.block_codes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blocks_and_points_are_sorted() {
        let (store, _tmp) = setup_test_store().await;
        store.replace_all(&sample_records()).await.unwrap();

        assert_eq!(store.block_codes().await.unwrap(), vec!["B1", "B2"]);
        assert_eq!(store.points_for_block("B1").await.unwrap(), vec!["T1", "T3"]);
        assert_eq!(store.points_for_block("B2").await.unwrap(), vec!["T1", "T2"]);
        assert!(store.points_for_block("B9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_block_stream_is_restartable() {
        let (store, _tmp) = setup_test_store().await;
        store.replace_all(&sample_records()).await.unwrap();

        let mut stream = store.distinct_block_codes();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "B1");
        drop(stream);

        let again: Vec<String> = store.distinct_block_codes().try_collect().await.unwrap();
        assert_eq!(again, vec!["B1", "B2"]);
    }

    #[tokio::test]
    async fn test_lookup_present_and_absent() {
        let (store, _tmp) = setup_test_store().await;
        let records = sample_records();
        store.replace_all(&records).await.unwrap();

        for record in &records {
            let found = store
                .lookup(&record.block_code, &record.point_id)
                .await
                .unwrap();
            assert_eq!(found.as_ref(), Some(record));
        }

        assert!(store.lookup("B1", "T9").await.unwrap().is_none());
        let err = store.get("B1", "T9").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_replace_all_is_idempotent() {
        let (store, _tmp) = setup_test_store().await;
        let records = sample_records();

        store.replace_all(&records).await.unwrap();
        let once = store.list(100).await.unwrap();

        store.replace_all(&records).await.unwrap();
        let twice = store.list(100).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.count().await.unwrap(), records.len());
    }

    #[tokio::test]
    async fn test_replace_all_discards_previous_snapshot() {
        let (store, _tmp) = setup_test_store().await;
        store.replace_all(&sample_records()).await.unwrap();

        let fresh = vec![LocationRecord::new("B01", "L9", "C1", "T1", "1.0,101.0")];
        store.replace_all(&fresh).await.unwrap();

        assert_eq!(store.block_codes().await.unwrap(), vec!["C1"]);
        assert!(store.lookup("B1", "T1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_keys_last_wins() {
        let (store, _tmp) = setup_test_store().await;
        let records = vec![
            LocationRecord::new("A06", "L1", "B1", "T1", "-6.2,106.8"),
            LocationRecord::new("A06", "L1", "B1", "T2", "-6.3,106.9"),
            LocationRecord::new("A99", "L7", "B1", "T1", "-6.4,107.0"),
        ];

        let stats = store.replace_all(&records).await.unwrap();
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.duplicates_replaced, 1);

        let found = store.get("B1", "T1").await.unwrap();
        assert_eq!(found.company, "A99");
        assert_eq!(found.coordinate, "-6.4,107.0");
    }

    #[tokio::test]
    async fn test_empty_codes_hidden_from_selection() {
        let (store, _tmp) = setup_test_store().await;
        let records = vec![
            LocationRecord::new("A06", "", "", "T1", "-6.2,106.8"),
            LocationRecord::new("A06", "", "B1", "", "-6.2,106.8"),
            LocationRecord::new("A06", "", "B1", "T1", "-6.2,106.8"),
        ];
        store.replace_all(&records).await.unwrap();

        assert_eq!(store.block_codes().await.unwrap(), vec!["B1"]);
        assert_eq!(store.points_for_block("B1").await.unwrap(), vec!["T1"]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let (store, _tmp) = setup_test_store().await;
        store.replace_all(&sample_records()).await.unwrap();

        let listed = store.list(2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].key(), ("B1", "T1"));
        assert_eq!(listed[1].key(), ("B1", "T3"));
    }

    #[tokio::test]
    async fn test_saving_progress_reported() {
        let (store, _tmp) = setup_test_store().await;
        let records: Vec<LocationRecord> = (0..250)
            .map(|i| LocationRecord::new("A06", "L1", "B1", format!("T{:03}", i), "0,0"))
            .collect();

        let seen = Mutex::new(Vec::new());
        let observer = |stage: SyncStage| {
            if let SyncStage::Saving { saved, .. } = stage {
                seen.lock().unwrap().push(saved);
            }
        };
        store
            .replace_all_observed(&records, &observer)
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 100, 200]);
    }

    #[tokio::test]
    async fn test_list_with_huge_limit_returns_everything() {
        let (store, _tmp) = setup_test_store().await;
        store.replace_all(&sample_records()).await.unwrap();

        assert_eq!(store.list(usize::MAX).await.unwrap().len(), 4);
        assert!(store.list(0).await.unwrap().is_empty());
    }

    fn bulk_records(n: usize) -> Vec<LocationRecord> {
        (0..n)
            .map(|i| {
                LocationRecord::new(
                    "A06",
                    "L1",
                    format!("B{}", i / 50 + 1),
                    format!("T{:05}", i),
                    "-6.2,106.8",
                )
            })
            .collect()
    }

    /// Observer that parks the writer at `Saving { saved: at, .. }` until
    /// released, after telling the test it got there
    fn parking_observer(
        at: usize,
    ) -> (
        impl SyncObserver + 'static,
        mpsc::Receiver<()>,
        mpsc::Sender<()>,
    ) {
        let (parked_tx, parked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let parked_tx = Mutex::new(parked_tx);
        let release_rx = Mutex::new(release_rx);

        let observer = move |stage: SyncStage| {
            if let SyncStage::Saving { saved, .. } = stage {
                if saved == at {
                    let _ = parked_tx.lock().unwrap().send(());
                    let _ = release_rx.lock().unwrap().recv();
                }
            }
        };
        (observer, parked_rx, release_tx)
    }

    async fn wait_parked(parked: mpsc::Receiver<()>) {
        tokio::task::spawn_blocking(move || parked.recv())
            .await
            .unwrap()
            .unwrap();
    }

    fn keys(records: &[LocationRecord]) -> Vec<(String, String)> {
        records
            .iter()
            .map(|r| (r.block_code.clone(), r.point_id.clone()))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readers_see_old_snapshot_during_replace() {
        let (store, _tmp) = setup_test_store().await;
        let previous = vec![LocationRecord::new("OLD", "L0", "B0", "T0", "1.0,101.0")];
        store.replace_all(&previous).await.unwrap();

        let (observer, parked, release) = parking_observer(1_000);
        let writer = store.clone();
        let handle = tokio::spawn(async move {
            writer
                .replace_all_observed(&bulk_records(5_000), &observer)
                .await
        });

        // The writer has deleted the old rows and inserted 1,000 new ones,
        // all uncommitted
        wait_parked(parked).await;
        assert_eq!(keys(&store.list(10).await.unwrap()), keys(&previous));
        assert_eq!(store.block_codes().await.unwrap(), vec!["B0"]);
        assert!(!store.is_empty().await.unwrap());

        release.send(()).unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.inserted, 5_000);
        assert_eq!(store.count().await.unwrap(), 5_000);
        assert!(store.lookup("B0", "T0").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_aborted_replace_keeps_old_snapshot() {
        let (store, _tmp) = setup_test_store().await;
        let previous = vec![LocationRecord::new("OLD", "L0", "B0", "T0", "1.0,101.0")];
        store.replace_all(&previous).await.unwrap();

        let (observer, parked, release) = parking_observer(1_000);
        let writer = store.clone();
        let handle = tokio::spawn(async move {
            writer
                .replace_all_observed(&bulk_records(5_000), &observer)
                .await
        });

        wait_parked(parked).await;
        // Cancellation lands at the writer's next await, mid-transaction
        handle.abort();
        release.send(()).unwrap();
        assert!(handle.await.unwrap_err().is_cancelled());

        assert_eq!(store.list(10).await.unwrap(), previous);
        assert_eq!(store.count().await.unwrap(), 1);

        // The store is still writable afterwards
        let stats = store.replace_all(&sample_records()).await.unwrap();
        assert_eq!(stats.inserted, 4);
        assert!(store.lookup("B0", "T0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schema_version_mismatch_recreates_table() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.db");

        let store = LocationStore::open(&path).await.unwrap();
        store.replace_all(&sample_records()).await.unwrap();
        sqlx::query("PRAGMA user_version = 1")
            .execute(&store.pool)
            .await
            .unwrap();
        store.close().await;

        let reopened = LocationStore::open(&path).await.unwrap();
        assert!(reopened.is_empty().await.unwrap());

        let version: i32 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&reopened.pool)
            .await
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
