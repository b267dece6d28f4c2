//! Tranche Gateway
//!
//! Infrastructure behind the ports of `tranche-ports`:
//! - Exchange adapters: signed Binance USDT-M futures REST, and an in-process mock
//! - Retry decorator with a bounded, explicit backoff policy
//! - Audit sinks (log-backed JSON lines, in-memory for tests)
//! - Immutable gateway configuration loaded once from the environment
//!
//! ## Architecture
//!
//! ```text
//!   Strategies (TWAP, Grid, direct orders)
//!         │ ExchangeClient
//!    ┌────▼─────────┐
//!    │RetryingClient│  transport errors: bounded retry
//!    └────┬─────────┘  rejections: returned immediately
//!         │
//!    ┌────▼───────────────┐      ┌──────────────┐
//!    │BinanceFuturesClient│  or  │ MockExchange │
//!    └────────────────────┘      └──────────────┘
//! ```

pub mod adapters;
pub mod audit;
pub mod config;
pub mod error;
pub mod retry;

// Re-export commonly used types
pub use adapters::{BinanceFuturesClient, MockExchange, MockOp, MockOrder};
pub use audit::{LogAuditSink, MemoryAuditSink};
pub use config::GatewayConfig;
pub use error::{ConfigError, GatewayResult};
pub use retry::{Backoff, RetryPolicy, RetryingClient};
