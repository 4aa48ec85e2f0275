//! Great-circle distance between two positions.
//!
//! `haversine_distance` is the reference implementation. `library_distance`
//! delegates to the `geo` crate and is kept as an alternative that must agree
//! with it to within rounding.

use crate::models::GeoPoint;
use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Earth radius used by the hand-rolled formula, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points
    let h = h.clamp(0.0, 1.0);

    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Distance in meters computed by the `geo` crate (mean radius 6,371,008.8 m)
pub fn library_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let pa = Point::new(a.longitude, a.latitude);
    let pb = Point::new(b.longitude, b.latitude);
    pa.haversine_distance(&pb)
}

/// Which distance implementation the geofence uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMethod {
    #[default]
    Haversine,
    Library,
}

impl DistanceMethod {
    pub fn distance(self, a: GeoPoint, b: GeoPoint) -> f64 {
        match self {
            DistanceMethod::Haversine => haversine_distance(a, b),
            DistanceMethod::Library => library_distance(a, b),
        }
    }
}

impl fmt::Display for DistanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMethod::Haversine => write!(f, "haversine"),
            DistanceMethod::Library => write!(f, "library"),
        }
    }
}

impl FromStr for DistanceMethod {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "haversine" => Ok(DistanceMethod::Haversine),
            "library" | "geo" => Ok(DistanceMethod::Library),
            _ => Err(crate::error::Error::Config(format!(
                "Unknown distance method: {}",
                s
            ))),
        }
    }
}
