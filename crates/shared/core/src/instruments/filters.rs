use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::values::{Price, Quantity};

/// Trading rules the exchange reports for a symbol
///
/// Mirrors the `PRICE_FILTER` and `LOT_SIZE` filters of the futures
/// `exchangeInfo` endpoint. A zero tick or step disables the corresponding
/// rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFilters {
    /// Minimum price increment
    pub tick_size: Price,
    /// Minimum quantity increment
    pub step_size: Quantity,
    /// Smallest accepted order quantity
    pub min_qty: Quantity,
    /// Smallest accepted price
    pub min_price: Price,
}

impl Default for SymbolFilters {
    fn default() -> Self {
        Self {
            tick_size: dec!(0.01),
            step_size: dec!(0.001),
            min_qty: dec!(0.001),
            min_price: dec!(0.01),
        }
    }
}

impl SymbolFilters {
    pub fn new(tick_size: Price, step_size: Quantity, min_qty: Quantity, min_price: Price) -> Self {
        Self {
            tick_size,
            step_size,
            min_qty,
            min_price,
        }
    }

    /// Validate that a price conforms to tick size
    pub fn is_price_aligned(&self, price: Price) -> bool {
        if self.tick_size == Decimal::ZERO {
            return true;
        }
        (price % self.tick_size) == Decimal::ZERO
    }

    /// Validate that a quantity conforms to step size
    pub fn is_quantity_aligned(&self, quantity: Quantity) -> bool {
        if self.step_size == Decimal::ZERO {
            return true;
        }
        (quantity % self.step_size) == Decimal::ZERO
    }

    /// Round a price down to the nearest valid tick
    pub fn round_price_down(&self, price: Price) -> Price {
        if self.tick_size == Decimal::ZERO {
            return price;
        }
        ((price / self.tick_size).floor() * self.tick_size).normalize()
    }

    /// Round a price up to the nearest valid tick
    pub fn round_price_up(&self, price: Price) -> Price {
        if self.tick_size == Decimal::ZERO {
            return price;
        }
        ((price / self.tick_size).ceil() * self.tick_size).normalize()
    }

    /// Round a price to the closest valid tick
    pub fn round_price(&self, price: Price) -> Price {
        if self.tick_size == Decimal::ZERO {
            return price;
        }
        ((price / self.tick_size).round() * self.tick_size).normalize()
    }

    /// Truncate a quantity to the step size
    pub fn floor_quantity(&self, quantity: Quantity) -> Quantity {
        if self.step_size == Decimal::ZERO {
            return quantity;
        }
        ((quantity / self.step_size).floor() * self.step_size).normalize()
    }
}
