//! Error types for the gateway crate

use thiserror::Error;
use tranche_ports::ExchangeError;

/// Configuration errors, raised once at process start
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API credentials not found: set BINANCE_API_KEY and BINANCE_API_SECRET")]
    MissingCredentials,

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

pub type GatewayResult<T> = std::result::Result<T, ConfigError>;

/// Classify a reqwest failure. Anything below the HTTP status line is a
/// transport problem and may be retried.
pub(crate) fn from_http(err: reqwest::Error) -> ExchangeError {
    if err.is_decode() {
        ExchangeError::Decode(err.to_string())
    } else {
        ExchangeError::Transport(err.to_string())
    }
}
