//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::LocationStore;
use std::path::Path;
use tracing::info;

/// Write a default config at `config_path` and create the cache database
/// next to it
pub async fn cmd_init(config_path: &Path, force: bool) -> Result<Config> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let config = Config::at(config_path);
    config.validate()?;
    config.save()?;
    info!("Created config at {:?}", config.paths.config_file);

    let store = LocationStore::connect(&config).await?;
    store.close().await;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(config)
}

/// Print next steps after init
pub fn print_init(config: &Config) {
    println!("✓ Initialized tph at {:?}", config.paths.base_dir);
    println!("\nConfiguration: {:?}", config.paths.config_file);
    println!("Database: {:?}", config.paths.db_file);
    println!("\nNext steps:");
    println!("  1. Edit the config file to set endpoint_url and geofence.radius_m");
    println!("  2. tph sync                          # Download TPH data");
    println!("  3. tph blocks                        # Pick a block code");
    println!("  4. tph check B1 T1 --lat .. --lng .. # Validate a position");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_db() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let config = cmd_init(&path, false).await.unwrap();
        assert!(path.exists());
        assert!(config.paths.db_file.exists());

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.geofence.radius_m, config.geofence.radius_m);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        cmd_init(&path, false).await.unwrap();
        let err = cmd_init(&path, false).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(cmd_init(&path, true).await.is_ok());
    }
}
