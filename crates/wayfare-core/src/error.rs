//! Error types for wayfare-core

use thiserror::Error;

/// Result type alias using wayfare-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in wayfare-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The backend refused a value because it exceeds its quota
    #[error("Storage quota exceeded for '{key}': {size} bytes (limit {limit})")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
