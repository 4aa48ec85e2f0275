//! Core data types: cached TPH records and geographic points.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A TPH collection point as cached in the local store.
///
/// The identity key is `(block_code, point_id)`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LocationRecord {
    pub company: String,
    /// Location (estate/division) code
    #[sqlx(rename = "location")]
    pub location_code: String,
    #[sqlx(rename = "kodeBlok")]
    pub block_code: String,
    #[sqlx(rename = "noTPH")]
    pub point_id: String,
    /// Raw `"lat,lng"` string as delivered by the endpoint
    pub coordinate: String,
}

impl LocationRecord {
    pub fn new(
        company: impl Into<String>,
        location_code: impl Into<String>,
        block_code: impl Into<String>,
        point_id: impl Into<String>,
        coordinate: impl Into<String>,
    ) -> Self {
        Self {
            company: company.into(),
            location_code: location_code.into(),
            block_code: block_code.into(),
            point_id: point_id.into(),
            coordinate: coordinate.into(),
        }
    }

    /// Identity key of the record
    pub fn key(&self) -> (&str, &str) {
        (&self.block_code, &self.point_id)
    }

    /// Parse the coordinate column
    pub fn geo_point(&self) -> Result<GeoPoint> {
        self.coordinate.parse()
    }

    /// Parsed coordinate, or `None` when the column is empty or invalid.
    ///
    /// An unparseable coordinate means "no target location set".
    pub fn target(&self) -> Option<GeoPoint> {
        match self.geo_point() {
            Ok(point) => Some(point),
            Err(e) => {
                debug!(
                    block = %self.block_code,
                    point = %self.point_id,
                    "No usable coordinate: {}",
                    e
                );
                None
            }
        }
    }
}

/// A WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Unchecked wire form; deserializing goes through `GeoPoint::new`
#[derive(Deserialize)]
struct RawGeoPoint {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = Error;

    fn try_from(raw: RawGeoPoint) -> Result<Self> {
        GeoPoint::new(raw.latitude, raw.longitude)
    }
}

impl GeoPoint {
    /// Create a point, validating ranges
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidCoordinate(format!(
                "latitude {} out of range",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidCoordinate(format!(
                "longitude {} out of range",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

impl FromStr for GeoPoint {
    type Err = Error;

    /// Parse `"lat,lng"`. Tokens after the second are ignored, which covers
    /// the trailing comma some records carry.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(',').map(str::trim);

        let lat = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::InvalidCoordinate(format!("missing latitude in '{}'", s)))?;
        let lng = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::InvalidCoordinate(format!("missing longitude in '{}'", s)))?;

        let latitude: f64 = lat
            .parse()
            .map_err(|_| Error::InvalidCoordinate(format!("bad latitude '{}'", lat)))?;
        let longitude: f64 = lng
            .parse()
            .map_err(|_| Error::InvalidCoordinate(format!("bad longitude '{}'", lng)))?;

        GeoPoint::new(latitude, longitude)
    }
}
