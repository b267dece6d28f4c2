use serde::{Deserialize, Serialize};
use std::fmt;

/// Order types supported by the futures venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Execute at current market price
    Market,
    /// Execute at specified price or better
    Limit,
    /// Limit order triggered when price reaches stop price
    StopLimit,
    /// Market order triggered when price reaches stop price
    StopMarket,
}

impl OrderType {
    /// Exchange wire representation (USDT-M futures naming)
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::StopLimit => "STOP",
            OrderType::StopMarket => "STOP_MARKET",
        }
    }

    /// Inverse of [`as_str`](Self::as_str). Types this crate never submits
    /// (take-profit, trailing stop) are `None`.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "MARKET" => Some(OrderType::Market),
            "LIMIT" => Some(OrderType::Limit),
            "STOP" => Some(OrderType::StopLimit),
            "STOP_MARKET" => Some(OrderType::StopMarket),
            _ => None,
        }
    }

    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderType::StopLimit | OrderType::StopMarket)
    }

    /// Resting order types carry a time-in-force
    pub fn uses_time_in_force(&self) -> bool {
        self.requires_price()
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
