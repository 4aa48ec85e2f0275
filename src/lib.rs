//! tph-sync: offline TPH (harvest collection point) lookup and geofencing
//!
//! Downloads the TPH list from an HTTP endpoint into a local SQLite cache,
//! then answers block/point lookups and checks whether a device position is
//! within a radius of the selected point.

pub mod commands;
pub mod config;
pub mod error;
pub mod geofence;
pub mod geomath;
pub mod models;
pub mod progress;
pub mod session;
pub mod stage;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
