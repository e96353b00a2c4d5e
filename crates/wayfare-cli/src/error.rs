use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] wayfare_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Nothing to save: give a city or a --title")]
    EmptyRecord,
    #[error("Search origin cannot be empty")]
    EmptySearchOrigin,
    #[error("No record '{id}' in {collection}")]
    RecordNotFound { collection: String, id: String },
    #[error("'{0}' is not an email address")]
    InvalidEmail(String),
    #[error("Invalid --detail '{0}': expected KEY=VALUE")]
    InvalidDetail(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "No backend configured. Run `wayfare config init --api-base-url <URL>` or set WAYFARE_API_BASE."
    )]
    RemoteNotConfigured,
    #[error("Remote API error: {0}")]
    Api(#[from] wayfare_core::api::ApiError),
    #[error("Mirror error: {0}")]
    Mirror(#[from] wayfare_core::mirror::MirrorError),
}
