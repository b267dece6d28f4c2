//! Session bootstrap
//!
//! Wires the exchange client, audit sink and clock once at start-up. A live
//! session reads its credentials from the environment; a paper session runs
//! against an in-process [`MockExchange`]. Either way the client is wrapped
//! in a [`RetryingClient`].

use log::info;
use std::sync::Arc;
use tranche_clock::SystemClock;
use tranche_core::Price;
use tranche_gateway::{
    BinanceFuturesClient, GatewayConfig, GatewayResult, LogAuditSink, MockExchange, RetryPolicy,
    RetryingClient,
};
use tranche_ports::{AuditSink, Clock, ExchangeClient};

/// Collaborators shared by every command
pub struct Session {
    pub client: Arc<dyn ExchangeClient>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
    /// The paper exchange, when not trading live
    pub paper: Option<Arc<MockExchange>>,
}

impl Session {
    /// Live session against Binance, configured from the environment
    pub fn live() -> GatewayResult<Self> {
        let config = GatewayConfig::from_env()?;
        info!(
            "Connecting to {} ({})",
            config.base_url,
            if config.testnet { "testnet" } else { "MAINNET" }
        );
        let client = BinanceFuturesClient::new(Arc::new(config))?;
        Ok(Self::with_client(Arc::new(client), None))
    }

    /// Paper session with a fixed market price
    pub fn paper(price: Price) -> Self {
        info!("Paper trading at {}", price);
        let mock = Arc::new(MockExchange::new(price));
        Self::with_client(mock.clone(), Some(mock))
    }

    fn with_client<C>(client: Arc<C>, paper: Option<Arc<MockExchange>>) -> Self
    where
        C: ExchangeClient + 'static,
    {
        Self {
            client: Arc::new(RetryingClient::new(client, RetryPolicy::default())),
            audit: Arc::new(LogAuditSink::new()),
            clock: Arc::new(SystemClock::new()),
            paper,
        }
    }
}
