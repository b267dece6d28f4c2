//! Binance USDT-M futures adapter

mod client;
mod signer;
mod types;

pub use client::BinanceFuturesClient;
pub use signer::Signer;
