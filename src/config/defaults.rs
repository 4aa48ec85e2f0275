//! Default values for configuration

use crate::geomath::DistanceMethod;

/// Default TPH endpoint
pub fn default_endpoint_url() -> String {
    std::env::var("TPH_ENDPOINT_URL")
        .unwrap_or_else(|_| "https://my-proxy-api-six.vercel.app/api/data".to_string())
}

/// Default connect timeout in seconds
pub fn default_connect_timeout() -> u64 {
    15
}

/// Default read timeout in seconds
pub fn default_read_timeout() -> u64 {
    30
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("tph-sync/{}", env!("CARGO_PKG_VERSION"))
}

/// Default geofence radius in meters
pub fn default_radius_m() -> f64 {
    30.0
}

/// Default distance implementation
pub fn default_distance_method() -> DistanceMethod {
    DistanceMethod::Haversine
}

/// Default number of rows shown by `list`
pub fn default_list_limit() -> usize {
    50
}
