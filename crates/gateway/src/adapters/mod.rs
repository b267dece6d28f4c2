//! Exchange adapters
//!
//! Implementations of the [`ExchangeClient`](tranche_ports::ExchangeClient)
//! port: the signed Binance futures REST client used in production and an
//! in-process mock used by tests and paper runs.

pub mod binance;
pub mod mock;

pub use binance::BinanceFuturesClient;
pub use mock::{MockExchange, MockOp, MockOrder};
