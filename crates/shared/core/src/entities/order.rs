use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{OrderType, PositionSide, Side, TimeInForce};
use crate::instruments::SymbolFilters;
use crate::validation::{self, ValidationLimits, ValidationResult};
use crate::values::{Price, Quantity, Symbol};

/// Exchange-assigned order identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Specification of a single order to be sent to the exchange.
///
/// Immutable once constructed: the `with_*` builders consume and return a new
/// value, and there are no setters. Construct with [`OrderSpec::market`],
/// [`OrderSpec::limit`], [`OrderSpec::stop_limit`] or [`OrderSpec::stop_market`],
/// then check it with [`OrderSpec::validate`] before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    symbol: Symbol,
    side: Side,
    order_type: OrderType,
    quantity: Quantity,
    /// Required for Limit and StopLimit orders
    price: Option<Price>,
    /// Required for StopLimit and StopMarket orders
    stop_price: Option<Price>,
    time_in_force: Option<TimeInForce>,
    position_side: PositionSide,
    reduce_only: bool,
    /// Sent as `newClientOrderId` so a retried submission is deduplicated
    client_order_id: Option<String>,
}

impl OrderSpec {
    fn base(symbol: impl Into<Symbol>, side: Side, order_type: OrderType, quantity: Quantity) -> Self {
        Self {
            symbol: symbol.into().trim().to_ascii_uppercase(),
            side,
            order_type,
            quantity,
            price: None,
            stop_price: None,
            time_in_force: None,
            position_side: PositionSide::Both,
            reduce_only: false,
            client_order_id: None,
        }
    }

    /// Market order
    pub fn market(symbol: impl Into<Symbol>, side: Side, quantity: Quantity) -> Self {
        Self::base(symbol, side, OrderType::Market, quantity)
    }

    /// Good-till-cancel limit order
    pub fn limit(symbol: impl Into<Symbol>, side: Side, quantity: Quantity, price: Price) -> Self {
        Self {
            price: Some(price),
            time_in_force: Some(TimeInForce::GTC),
            ..Self::base(symbol, side, OrderType::Limit, quantity)
        }
    }

    /// Limit order that is only placed once `stop_price` trades
    pub fn stop_limit(
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        stop_price: Price,
        price: Price,
    ) -> Self {
        Self {
            price: Some(price),
            stop_price: Some(stop_price),
            time_in_force: Some(TimeInForce::GTC),
            ..Self::base(symbol, side, OrderType::StopLimit, quantity)
        }
    }

    /// Market order triggered at `stop_price`
    pub fn stop_market(
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        stop_price: Price,
    ) -> Self {
        Self {
            stop_price: Some(stop_price),
            ..Self::base(symbol, side, OrderType::StopMarket, quantity)
        }
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        if self.order_type.uses_time_in_force() {
            self.time_in_force = Some(tif);
        }
        self
    }

    pub fn with_position_side(mut self, position_side: PositionSide) -> Self {
        self.position_side = position_side;
        self
    }

    pub fn with_reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = reduce_only;
        self
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    /// Same order with a different quantity (used when slicing a parent order)
    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn price(&self) -> Option<Price> {
        self.price
    }

    pub fn stop_price(&self) -> Option<Price> {
        self.stop_price
    }

    pub fn time_in_force(&self) -> Option<TimeInForce> {
        self.time_in_force
    }

    pub fn position_side(&self) -> PositionSide {
        self.position_side
    }

    pub fn reduce_only(&self) -> bool {
        self.reduce_only
    }

    pub fn client_order_id(&self) -> Option<&str> {
        self.client_order_id.as_deref()
    }

    /// Notional value at the limit price, if any
    pub fn notional(&self) -> Option<Decimal> {
        self.price.map(|p| p * self.quantity)
    }

    /// Validate against static limits and, when known, the exchange's symbol filters
    pub fn validate(
        &self,
        limits: &ValidationLimits,
        filters: Option<&SymbolFilters>,
    ) -> ValidationResult<()> {
        validation::validate_order_spec(self, limits, filters)
    }
}
