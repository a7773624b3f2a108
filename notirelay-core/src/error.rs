//! Error types for notirelay-core

use thiserror::Error;

/// Main error type for the notirelay-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Wire timestamp that is not in the accepted ISO-8601 shape
    #[error("malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// Record cannot be represented on the wire
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Record violates a construction invariant
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Delivery client setup error
    #[error("delivery error: {0}")]
    Delivery(String),
}

/// Result type alias for notirelay-core
pub type Result<T> = std::result::Result<T, Error>;
