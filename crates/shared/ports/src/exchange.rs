use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tranche_core::{OrderId, OrderSpec, OrderStatus, OrderType, Price, Quantity, Side, SymbolFilters};

use crate::error::ExchangeResult;

/// Exchange acknowledgement of a submitted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: OrderId,
    pub client_order_id: Option<String>,
    pub status: OrderStatus,
    /// Cumulative filled quantity at acknowledgement time
    pub executed_qty: Quantity,
    /// Average fill price, if anything filled
    pub avg_price: Option<Price>,
}

impl OrderAck {
    /// Acknowledgement for an order resting on the book
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            order_id,
            client_order_id: None,
            status,
            executed_qty: Decimal::ZERO,
            avg_price: None,
        }
    }

    pub fn with_fill(mut self, executed_qty: Quantity, avg_price: Price) -> Self {
        self.executed_qty = executed_qty;
        self.avg_price = Some(avg_price);
        self
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }
}

/// An order still working on the book, as listed by the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    pub order_id: OrderId,
    pub client_order_id: Option<String>,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub price: Option<Price>,
    pub stop_price: Option<Price>,
    pub executed_qty: Quantity,
    pub status: OrderStatus,
}

/// Port for the trading venue
///
/// Implementations perform one request per call and do not retry; retry is
/// layered on top by a decorator so the policy stays explicit and testable.
/// Every method may fail with a transport error or an exchange rejection,
/// distinguished by [`ExchangeError::is_retryable`](crate::ExchangeError::is_retryable).
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Submit an order
    async fn place_order(&self, spec: &OrderSpec) -> ExchangeResult<OrderAck>;

    /// Cancel an order. Returns false if the exchange no longer had it open.
    async fn cancel_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<bool>;

    /// Current state of an order, including what has filled so far
    async fn query_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<OrderAck>;

    /// Look an order up by the client order id it was submitted with.
    /// Unknown ids are a rejection (`-2013`).
    async fn query_order_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> ExchangeResult<OrderAck>;

    /// Current status of an order
    async fn order_status(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<OrderStatus> {
        Ok(self.query_order(symbol, order_id).await?.status)
    }

    /// Orders still working on the book for a symbol
    async fn list_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<OpenOrder>>;

    /// Cancel every working order on a symbol
    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<()>;

    /// Latest traded price for a symbol
    async fn current_price(&self, symbol: &str) -> ExchangeResult<Price>;

    /// Precision and minimums the exchange enforces for a symbol
    async fn symbol_filters(&self, symbol: &str) -> ExchangeResult<SymbolFilters>;

    /// Identifier for logging
    fn name(&self) -> &str {
        "exchange"
    }
}

#[async_trait]
impl<T: ExchangeClient + ?Sized> ExchangeClient for Arc<T> {
    async fn place_order(&self, spec: &OrderSpec) -> ExchangeResult<OrderAck> {
        (**self).place_order(spec).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<bool> {
        (**self).cancel_order(symbol, order_id).await
    }

    async fn query_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<OrderAck> {
        (**self).query_order(symbol, order_id).await
    }

    async fn query_order_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> ExchangeResult<OrderAck> {
        (**self).query_order_by_client_id(symbol, client_order_id).await
    }

    async fn order_status(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<OrderStatus> {
        (**self).order_status(symbol, order_id).await
    }

    async fn list_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<OpenOrder>> {
        (**self).list_open_orders(symbol).await
    }

    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<()> {
        (**self).cancel_all_orders(symbol).await
    }

    async fn current_price(&self, symbol: &str) -> ExchangeResult<Price> {
        (**self).current_price(symbol).await
    }

    async fn symbol_filters(&self, symbol: &str) -> ExchangeResult<SymbolFilters> {
        (**self).symbol_filters(symbol).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
