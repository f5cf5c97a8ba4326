//! Layered error definitions
//!
//! Categorized by source: config / feed / payload / handler

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Feed Errors =====
    /// Feed connection error
    #[error("feed connection error: {message}")]
    FeedConnection { message: String },

    // ===== Payload Errors =====
    /// Build announcement parse error
    #[error("announcement parse error: {message}")]
    AnnouncementParse { message: String },

    /// Build event parse error
    #[error("event parse error for build '{build_id}': {message}")]
    EventParse { build_id: String, message: String },

    // ===== Handler Errors =====
    /// Handler-level fault, isolated from the dispatch loop
    #[error("handler '{handler}' failed: {message}")]
    Handler { handler: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create feed connection error
    pub fn feed_connection(message: impl Into<String>) -> Self {
        Self::FeedConnection {
            message: message.into(),
        }
    }

    /// Create event parse error
    pub fn event_parse(build_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EventParse {
            build_id: build_id.into(),
            message: message.into(),
        }
    }

    /// Create handler fault error
    pub fn handler(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            handler: handler.into(),
            message: message.into(),
        }
    }
}
