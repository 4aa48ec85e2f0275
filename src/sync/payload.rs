//! Decoding of the endpoint's JSON payload

use crate::error::{Error, Result};
use crate::models::LocationRecord;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One element of the endpoint's JSON array. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct RemoteRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    company: String,
    #[serde(default, deserialize_with = "lenient_string")]
    location: String,
    #[serde(default, rename = "kodeBlok", deserialize_with = "lenient_string")]
    kode_blok: String,
    #[serde(default, rename = "noTPH", deserialize_with = "lenient_string")]
    no_tph: String,
    #[serde(default, deserialize_with = "lenient_string")]
    coordinate: String,
}

impl From<RemoteRecord> for LocationRecord {
    fn from(r: RemoteRecord) -> Self {
        LocationRecord {
            company: r.company,
            location_code: r.location,
            block_code: r.kode_blok,
            point_id: r.no_tph,
            coordinate: r.coordinate,
        }
    }
}

/// Strings pass through, numbers and booleans become their text, null
/// becomes empty. Arrays and objects are rejected.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {}",
            other
        ))),
    }
}

/// Decode a response body into records. All-or-nothing: any malformed
/// element fails the whole payload.
pub fn parse_records(body: &str) -> Result<Vec<LocationRecord>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("response is not valid JSON: {}", e)))?;

    let Value::Array(items) = value else {
        return Err(Error::Parse("expected a JSON array of objects".to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(Error::Parse(format!("element {} is not an object", i)));
            }
            serde_json::from_value::<RemoteRecord>(item)
                .map(LocationRecord::from)
                .map_err(|e| Error::Parse(format!("element {}: {}", i, e)))
        })
        .collect()
}
