//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::geomath::DistanceMethod;
use crate::store::LocationStore;
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub endpoint_url: String,
    pub radius_m: f64,
    pub distance_method: DistanceMethod,
    pub has_data: bool,
    pub record_count: usize,
    pub block_count: usize,
}

/// Get system status
pub async fn cmd_status(config: &Config, store: &LocationStore) -> Result<StatusInfo> {
    info!("Getting status");

    let has_data = !store.is_empty().await?;
    let (record_count, block_count) = if has_data {
        (store.count().await?, store.block_codes().await?.len())
    } else {
        (0, 0)
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        endpoint_url: config.endpoint_url.clone(),
        radius_m: config.geofence.radius_m,
        distance_method: config.geofence.distance_method,
        has_data,
        record_count,
        block_count,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 tph Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Endpoint: {}", status.endpoint_url);
    println!("\nGeofence:");
    println!("  Radius: {} m", status.radius_m);
    println!("  Distance: {}", status.distance_method);
    println!("\nCache:");
    if status.has_data {
        println!("  Records: {}", status.record_count);
        println!("  Blocks: {}", status.block_count);
    } else {
        println!("  ⚠ Empty (run 'tph sync' to download TPH data)");
    }
}

/// Print block codes for shell completions
pub fn print_block_completions(blocks: &[String], shell: Shell) {
    for block in blocks {
        match shell {
            Shell::Zsh => println!("{}", block.replace(':', "\\:")),
            _ => println!("{}", block),
        }
    }
}
