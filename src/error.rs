//! Error types for popgate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PopgateError>;

#[derive(Debug, Error)]
pub enum PopgateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("state store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl PopgateError {
    /// True for failures of the reader state store, which callers surface as
    /// a temporary outage rather than a bad request.
    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::StoreUnavailable(_) | Self::Sqlite(_)
        )
    }
}
