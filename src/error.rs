//! Custom error types for tph-sync

use thiserror::Error;

/// Main error type for tph-sync operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Timeout, DNS failure, refused connection or a non-success status
    #[error("Network error: {0}")]
    Network(String),

    /// Response body is not a JSON array of objects
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("TPH not found: block '{block_code}', point '{point_id}'")]
    NotFound {
        block_code: String,
        point_id: String,
    },

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("A sync is already running")]
    SyncInProgress,

    #[error("Sync cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a not-found error for a (block, point) key
    pub fn not_found(block_code: &str, point_id: &str) -> Self {
        Error::NotFound {
            block_code: block_code.to_string(),
            point_id: point_id.to_string(),
        }
    }

    /// Whether retrying the sync could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Parse(_) | Error::SyncInProgress | Error::Cancelled
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // A stalled body is flagged as both timeout and decode
        if err.is_timeout() {
            Error::Network(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Error::Parse(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

/// Result type alias for tph-sync
pub type Result<T> = std::result::Result<T, Error>;
