//! Read-only views over the cache: blocks, points, single records, listing

use crate::error::Result;
use crate::models::{GeoPoint, LocationRecord};
use crate::store::LocationStore;
use serde::Serialize;
use tracing::info;

/// Distinct non-empty block codes, sorted
pub async fn cmd_blocks(store: &LocationStore) -> Result<Vec<String>> {
    info!("Listing block codes");
    store.block_codes().await
}

/// Point ids for one block, sorted
pub async fn cmd_points(store: &LocationStore, block_code: &str) -> Result<Vec<String>> {
    info!(block = %block_code, "Listing points");
    store.points_for_block(block_code).await
}

/// One record plus its parsed coordinate
#[derive(Debug, Clone, Serialize)]
pub struct RecordDetail {
    #[serde(flatten)]
    pub record: LocationRecord,
    pub point: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate_error: Option<String>,
}

/// Look up one record; a missing key is `NotFound`
pub async fn cmd_show(store: &LocationStore, block_code: &str, point_id: &str) -> Result<RecordDetail> {
    let record = store.get(block_code, point_id).await?;
    let (point, coordinate_error) = match record.geo_point() {
        Ok(p) => (Some(p), None),
        Err(e) => (None, Some(e.to_string())),
    };

    Ok(RecordDetail {
        record,
        point,
        coordinate_error,
    })
}

/// First rows of the cache plus the overall total
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub records: Vec<LocationRecord>,
    pub total: usize,
    pub remaining: usize,
}

pub async fn cmd_list(store: &LocationStore, limit: usize) -> Result<Listing> {
    let records = store.list(limit).await?;
    let total = store.count().await?;

    Ok(Listing {
        remaining: total.saturating_sub(records.len()),
        records,
        total,
    })
}

fn print_empty_hint() {
    println!("No TPH data cached. Run 'tph sync' first.");
}

pub fn print_blocks(blocks: &[String]) {
    if blocks.is_empty() {
        print_empty_hint();
        return;
    }
    for block in blocks {
        println!("{}", block);
    }
}

pub fn print_points(block_code: &str, points: &[String]) {
    if points.is_empty() {
        println!("No TPH points in block '{}'.", block_code);
        return;
    }
    for point in points {
        println!("{}", point);
    }
}

pub fn print_record_detail(detail: &RecordDetail) {
    let r = &detail.record;
    println!("\n📍 TPH {} / {}\n", r.block_code, r.point_id);
    println!("Company: {}", r.company);
    println!("Location: {}", r.location_code);
    println!("Block: {}", r.block_code);
    println!("TPH: {}", r.point_id);
    println!("Coordinate: {}", r.coordinate);
    match (&detail.point, &detail.coordinate_error) {
        (Some(p), _) => println!("  lat {:.6}, lng {:.6}", p.latitude, p.longitude),
        (None, Some(e)) => println!("  ⚠ {}", e),
        (None, None) => {}
    }
}

pub fn print_listing(listing: &Listing) {
    if listing.total == 0 {
        print_empty_hint();
        return;
    }

    println!("\n📋 TPH data ({} records)\n", listing.total);
    for r in &listing.records {
        println!(
            "{} | {} | {} | {} | {}",
            r.company, r.location_code, r.block_code, r.point_id, r.coordinate
        );
    }
    if listing.remaining > 0 {
        println!("\n... and {} more", listing.remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    async fn seeded_store() -> (LocationStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = LocationStore::open(&tmp.path().join("test.db"))
            .await
            .unwrap();
        store
            .replace_all(&[
                LocationRecord::new("A06", "L1", "B2", "T1", "-6.3,106.9"),
                LocationRecord::new("A06", "L1", "B1", "T2", "n/a"),
                LocationRecord::new("A06", "L1", "B1", "T1", "-6.2,106.8"),
            ])
            .await
            .unwrap();
        (store, tmp)
    }

    #[tokio::test]
    async fn test_blocks_and_points_sorted() {
        let (store, _tmp) = seeded_store().await;
        assert_eq!(cmd_blocks(&store).await.unwrap(), vec!["B1", "B2"]);
        assert_eq!(cmd_points(&store, "B1").await.unwrap(), vec!["T1", "T2"]);
        assert!(cmd_points(&store, "B9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_show_parses_coordinate() {
        let (store, _tmp) = seeded_store().await;

        let detail = cmd_show(&store, "B1", "T1").await.unwrap();
        let point = detail.point.unwrap();
        assert_eq!(point.latitude, -6.2);
        assert_eq!(point.longitude, 106.8);
        assert!(detail.coordinate_error.is_none());

        let detail = cmd_show(&store, "B1", "T2").await.unwrap();
        assert!(detail.point.is_none());
        assert!(detail.coordinate_error.is_some());

        let err = cmd_show(&store, "B1", "T9").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_reports_remaining() {
        let (store, _tmp) = seeded_store().await;

        let listing = cmd_list(&store, 2).await.unwrap();
        assert_eq!(listing.records.len(), 2);
        assert_eq!(listing.total, 3);
        assert_eq!(listing.remaining, 1);
        assert_eq!(listing.records[0].key(), ("B1", "T1"));
    }
}
