//! Handler Factory error types

use contracts::ContractError;
use thiserror::Error;

/// Handler Factory specific error
#[derive(Debug, Error)]
pub enum HandlerFactoryError {
    /// Invalid handler parameter
    #[error("invalid parameter '{param}' for handler '{handler}': {message}")]
    InvalidParam {
        handler: String,
        param: String,
        message: String,
    },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl HandlerFactoryError {
    /// Create invalid parameter error
    pub fn invalid_param(
        handler: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            handler: handler.into(),
            param: param.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, HandlerFactoryError>;
