//! Wire types for the USDT-M futures REST API
//!
//! Decimal fields arrive as JSON strings; `rust_decimal`'s serde support
//! parses them without going through floats.

use rust_decimal::Decimal;
use serde::Deserialize;
use tranche_core::{OrderId, OrderStatus, OrderType, Side, SymbolFilters};
use tranche_ports::{ExchangeError, ExchangeResult, OpenOrder, OrderAck};

/// `{code, msg}` body of every non-2xx response, also returned by the bulk
/// cancel endpoint on success
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub executed_qty: Decimal,
    #[serde(default)]
    pub avg_price: Decimal,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default, rename = "type")]
    pub order_type: Option<String>,
    #[serde(default)]
    pub orig_qty: Decimal,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub stop_price: Decimal,
}

impl OrderResponse {
    pub fn status(&self) -> ExchangeResult<OrderStatus> {
        parse_status(&self.status)
    }

    pub fn into_ack(self) -> ExchangeResult<OrderAck> {
        let status = self.status()?;
        let mut ack = OrderAck::new(OrderId::from(self.order_id), status);
        if self.executed_qty > Decimal::ZERO && self.avg_price > Decimal::ZERO {
            ack = ack.with_fill(self.executed_qty, self.avg_price);
        }
        if let Some(id) = self.client_order_id {
            ack = ack.with_client_order_id(id);
        }
        Ok(ack)
    }

    /// Entry of the open orders listing. `None` for order types this crate
    /// does not model.
    pub fn into_open_order(self) -> ExchangeResult<Option<OpenOrder>> {
        let Some(order_type) = self.order_type.as_deref().and_then(OrderType::from_wire) else {
            return Ok(None);
        };
        let side = self
            .side
            .as_deref()
            .unwrap_or_default()
            .parse::<Side>()
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        let positive = |d: Decimal| (d > Decimal::ZERO).then_some(d);
        Ok(Some(OpenOrder {
            order_id: OrderId::from(self.order_id),
            status: self.status()?,
            client_order_id: self.client_order_id,
            side,
            order_type,
            quantity: self.orig_qty,
            price: positive(self.price),
            stop_price: positive(self.stop_price),
            executed_qty: self.executed_qty,
        }))
    }
}

pub fn parse_status(status: &str) -> ExchangeResult<OrderStatus> {
    OrderStatus::from_wire(status)
        .ok_or_else(|| ExchangeError::Decode(format!("unknown order status '{status}'")))
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub filters: Vec<Filter>,
}

/// Only the filters that constrain order prices and quantities are modelled
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum Filter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    Price {
        min_price: Decimal,
        max_price: Decimal,
        tick_size: Decimal,
    },
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        min_qty: Decimal,
        max_qty: Decimal,
        step_size: Decimal,
    },
    #[serde(other)]
    Other,
}

impl SymbolInfo {
    /// Collapse PRICE_FILTER and LOT_SIZE into [`SymbolFilters`]. Missing
    /// filters fall back to the defaults.
    pub fn to_filters(&self) -> SymbolFilters {
        let mut filters = SymbolFilters::default();
        for filter in &self.filters {
            match filter {
                Filter::Price {
                    min_price,
                    tick_size,
                    ..
                } => {
                    filters.min_price = *min_price;
                    filters.tick_size = *tick_size;
                }
                Filter::LotSize {
                    min_qty, step_size, ..
                } => {
                    filters.min_qty = *min_qty;
                    filters.step_size = *step_size;
                }
                Filter::Other => {}
            }
        }
        filters
    }
}
