//! Gateway configuration
//!
//! Built once at process start and never mutated afterwards. Clients hold
//! it behind an `Arc`.

use std::fmt;
use std::time::Duration;

use crate::error::{ConfigError, GatewayResult};

pub const TESTNET_BASE_URL: &str = "https://testnet.binancefuture.com";
pub const MAINNET_BASE_URL: &str = "https://fapi.binance.com";

const ENV_API_KEY: &str = "BINANCE_API_KEY";
const ENV_API_SECRET: &str = "BINANCE_API_SECRET";
const ENV_USE_TESTNET: &str = "USE_TESTNET";
const ENV_TESTNET_URL: &str = "TESTNET_BASE_URL";
const ENV_MAINNET_URL: &str = "BINANCE_BASE_URL";
const ENV_RECV_WINDOW: &str = "BINANCE_RECV_WINDOW_MS";

/// Connection settings for the futures REST API
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub testnet: bool,
    /// Validity window for signed requests
    pub recv_window_ms: u64,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Testnet configuration with default settings
    pub fn testnet(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: TESTNET_BASE_URL.to_string(),
            testnet: true,
            recv_window_ms: 5_000,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from process environment variables
    pub fn from_env() -> GatewayResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment, map in tests)
    pub fn from_lookup<F>(lookup: F) -> GatewayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty(ENV_API_KEY).ok_or(ConfigError::MissingCredentials)?;
        let api_secret = non_empty(ENV_API_SECRET).ok_or(ConfigError::MissingCredentials)?;

        let testnet = match non_empty(ENV_USE_TESTNET) {
            None => true,
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_USE_TESTNET.to_string(),
                        value: v,
                    });
                }
            },
        };

        let base_url = if testnet {
            non_empty(ENV_TESTNET_URL).unwrap_or_else(|| TESTNET_BASE_URL.to_string())
        } else {
            non_empty(ENV_MAINNET_URL).unwrap_or_else(|| MAINNET_BASE_URL.to_string())
        };

        let recv_window_ms = match non_empty(ENV_RECV_WINDOW) {
            None => 5_000,
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_RECV_WINDOW.to_string(),
                value: v.clone(),
            })?,
        };

        Ok(Self {
            testnet,
            recv_window_ms,
            ..Self::testnet(api_key, api_secret)
        }
        .with_base_url(base_url))
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &"***")
            .field("base_url", &self.base_url)
            .field("testnet", &self.testnet)
            .field("recv_window_ms", &self.recv_window_ms)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn mask(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{visible}***")
}
