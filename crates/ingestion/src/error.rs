//! Ingestion error types

use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Base URL is not usable
    #[error("invalid base url '{url}': {message}")]
    InvalidBaseUrl {
        /// Offending URL
        url: String,
        /// Error message
        message: String,
    },

    /// Feed request could not be constructed
    #[error("failed to prepare feed request: {message}")]
    Request {
        /// Error message
        message: String,
    },
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
