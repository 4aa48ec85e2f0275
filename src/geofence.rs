//! Inside/outside checks of a live position against a selected TPH.

use crate::config::GeofenceConfig;
use crate::error::{Error, Result};
use crate::geomath::{haversine_distance, DistanceMethod};
use crate::models::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a geofence check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Verdict {
    /// No position yet, or no target selected
    Unknown,
    Inside { distance_m: f64 },
    Outside { distance_m: f64 },
}

impl Verdict {
    pub fn distance_m(&self) -> Option<f64> {
        match self {
            Verdict::Unknown => None,
            Verdict::Inside { distance_m } | Verdict::Outside { distance_m } => Some(*distance_m),
        }
    }

    pub fn is_inside(&self) -> bool {
        matches!(self, Verdict::Inside { .. })
    }

    /// Same state, ignoring the distance
    pub fn same_state(&self, other: &Verdict) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Unknown => write!(f, "unknown"),
            Verdict::Inside { distance_m } => write!(f, "inside ({:.1} m)", distance_m),
            Verdict::Outside { distance_m } => write!(f, "outside ({:.1} m)", distance_m),
        }
    }
}

fn classify(distance_m: f64, radius_m: f64) -> Verdict {
    if distance_m <= radius_m {
        Verdict::Inside { distance_m }
    } else {
        Verdict::Outside { distance_m }
    }
}

/// Pure geofence check using the haversine distance. The radius boundary is
/// inclusive.
pub fn evaluate(current: Option<GeoPoint>, target: Option<GeoPoint>, radius_m: f64) -> Verdict {
    match (current, target) {
        (Some(current), Some(target)) => classify(haversine_distance(current, target), radius_m),
        _ => Verdict::Unknown,
    }
}

/// A configured geofence: radius plus distance implementation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
    radius_m: f64,
    method: DistanceMethod,
}

impl Geofence {
    pub fn new(radius_m: f64, method: DistanceMethod) -> Result<Self> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(Error::Config(format!(
                "geofence radius must be a positive number of meters, got {}",
                radius_m
            )));
        }
        Ok(Self { radius_m, method })
    }

    pub fn from_config(config: &GeofenceConfig) -> Result<Self> {
        Self::new(config.radius_m, config.distance_method)
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn method(&self) -> DistanceMethod {
        self.method
    }

    pub fn evaluate(&self, current: Option<GeoPoint>, target: Option<GeoPoint>) -> Verdict {
        match (current, target) {
            (Some(current), Some(target)) => {
                classify(self.method.distance(current, target), self.radius_m)
            }
            _ => Verdict::Unknown,
        }
    }
}

/// A verdict change produced by a new position or target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub previous: Verdict,
    pub current: Verdict,
}

impl Transition {
    /// Whether the inside/outside/unknown state changed
    pub fn changed(&self) -> bool {
        !self.previous.same_state(&self.current)
    }
}

/// Tracks the latest position and selected target, re-evaluating on every
/// change of either
#[derive(Debug, Clone)]
pub struct GeofenceTracker {
    geofence: Geofence,
    position: Option<GeoPoint>,
    target: Option<GeoPoint>,
    verdict: Verdict,
}

impl GeofenceTracker {
    pub fn new(geofence: Geofence) -> Self {
        Self {
            geofence,
            position: None,
            target: None,
            verdict: Verdict::Unknown,
        }
    }

    pub fn geofence(&self) -> &Geofence {
        &self.geofence
    }

    pub fn position(&self) -> Option<GeoPoint> {
        self.position
    }

    pub fn target(&self) -> Option<GeoPoint> {
        self.target
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn update_position(&mut self, position: GeoPoint) -> Transition {
        self.position = Some(position);
        self.reevaluate()
    }

    pub fn set_target(&mut self, target: Option<GeoPoint>) -> Transition {
        self.target = target;
        self.reevaluate()
    }

    fn reevaluate(&mut self) -> Transition {
        let previous = self.verdict;
        self.verdict = self.geofence.evaluate(self.position, self.target);
        Transition {
            previous,
            current: self.verdict,
        }
    }
}
