//! Grid-specific error types

use thiserror::Error;

/// Errors that can occur in grid trading operations
#[derive(Error, Debug, Clone)]
pub enum GridError {
    #[error("Invalid grid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing exchange credentials: {0}")]
    MissingCredentials(String),

    #[error("Exchange error: {0}")]
    Exchange(String),

    #[error("Exchange API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Sell order at listing position {index} has no grid level ({levels} levels)")]
    SellIndexOutOfRange { index: usize, levels: usize },

    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl From<reqwest::Error> for GridError {
    fn from(err: reqwest::Error) -> Self {
        GridError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::JsonParse(err.to_string())
    }
}

impl From<config::ConfigError> for GridError {
    fn from(err: config::ConfigError) -> Self {
        GridError::Settings(err.to_string())
    }
}

/// Result type for grid operations
pub type GridResult<T> = std::result::Result<T, GridError>;
