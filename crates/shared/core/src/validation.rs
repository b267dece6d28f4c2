//! Order validation
//!
//! Pure checks run before anything is sent to the exchange. A failure here
//! aborts the whole command: no order of a run is placed if any input is bad.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::entities::{OrderSpec, OrderType, Side};
use crate::instruments::SymbolFilters;
use crate::values::{Price, Quantity};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid symbol '{0}': must be uppercase and end with the quote asset (e.g. BTCUSDT)")]
    InvalidSymbol(String),

    #[error("Invalid side '{0}': must be BUY or SELL")]
    InvalidSide(String),

    #[error("Invalid position side '{0}': must be BOTH, LONG or SHORT")]
    InvalidPositionSide(String),

    #[error("Invalid time in force '{0}': must be GTC, IOC, FOK or GTX")]
    InvalidTimeInForce(String),

    #[error("Quantity {quantity} is below the minimum of {min}")]
    QuantityTooSmall { quantity: Quantity, min: Quantity },

    #[error("Quantity {quantity} is not a multiple of the step size {step}")]
    QuantityNotAligned { quantity: Quantity, step: Quantity },

    #[error("Price {price} is below the minimum of {min}")]
    PriceTooSmall { price: Price, min: Price },

    #[error("Price {price} is not a multiple of the tick size {tick}")]
    PriceNotAligned { price: Price, tick: Price },

    #[error("{0} order requires a price")]
    MissingPrice(OrderType),

    #[error("{0} order requires a stop price")]
    MissingStopPrice(OrderType),

    #[error("Slice count must be at least 1, got {0}")]
    InvalidSliceCount(usize),

    #[error("Per-slice quantity {per_slice} is below the minimum of {min}")]
    SliceTooSmall { per_slice: Quantity, min: Quantity },

    #[error("Price offset must be between 0 and 100 percent, got {0}")]
    InvalidOffset(Decimal),

    #[error("Lower bound {lower} must be below upper bound {upper}")]
    InvalidRange { lower: Price, upper: Price },

    #[error("Grid needs at least 2 levels, got {0}")]
    InvalidLevelCount(usize),

    #[error("Grid step {step} is smaller than the tick size {tick}")]
    GridStepTooSmall { step: Price, tick: Price },

    #[error("Poll interval must be greater than zero")]
    InvalidPollInterval,

    #[error("{side} exit needs take profit {take_profit} on the other side of stop loss {stop_loss}")]
    InvalidOcoPrices {
        side: Side,
        take_profit: Price,
        stop_loss: Price,
    },
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Static validation limits applied before exchange filters are known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationLimits {
    pub min_quantity: Quantity,
    pub min_price: Price,
    /// Symbols must end with this quote asset (USDT-M futures)
    pub quote_asset: String,
    pub min_symbol_len: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            min_quantity: dec!(0.001),
            min_price: dec!(0.01),
            quote_asset: "USDT".to_string(),
            min_symbol_len: 5,
        }
    }
}

pub fn validate_symbol(symbol: &str, limits: &ValidationLimits) -> ValidationResult<()> {
    let well_formed = symbol.len() >= limits.min_symbol_len
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && symbol.ends_with(limits.quote_asset.as_str())
        && symbol.len() > limits.quote_asset.len();

    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::InvalidSymbol(symbol.to_string()))
    }
}

pub fn validate_quantity(
    quantity: Quantity,
    limits: &ValidationLimits,
    filters: Option<&SymbolFilters>,
) -> ValidationResult<()> {
    let min = filters
        .map(|f| f.min_qty.max(limits.min_quantity))
        .unwrap_or(limits.min_quantity);
    if quantity < min {
        return Err(ValidationError::QuantityTooSmall { quantity, min });
    }
    if let Some(f) = filters {
        if !f.is_quantity_aligned(quantity) {
            return Err(ValidationError::QuantityNotAligned {
                quantity,
                step: f.step_size,
            });
        }
    }
    Ok(())
}

pub fn validate_price(
    price: Price,
    limits: &ValidationLimits,
    filters: Option<&SymbolFilters>,
) -> ValidationResult<()> {
    let min = filters
        .map(|f| f.min_price.max(limits.min_price))
        .unwrap_or(limits.min_price);
    if price < min {
        return Err(ValidationError::PriceTooSmall { price, min });
    }
    if let Some(f) = filters {
        if !f.is_price_aligned(price) {
            return Err(ValidationError::PriceNotAligned {
                price,
                tick: f.tick_size,
            });
        }
    }
    Ok(())
}

/// Validate a complete order specification
pub fn validate_order_spec(
    spec: &OrderSpec,
    limits: &ValidationLimits,
    filters: Option<&SymbolFilters>,
) -> ValidationResult<()> {
    validate_symbol(spec.symbol(), limits)?;
    validate_quantity(spec.quantity(), limits, filters)?;

    let order_type = spec.order_type();
    if order_type.requires_price() {
        let price = spec
            .price()
            .ok_or(ValidationError::MissingPrice(order_type))?;
        validate_price(price, limits, filters)?;
    }
    if order_type.requires_stop_price() {
        let stop = spec
            .stop_price()
            .ok_or(ValidationError::MissingStopPrice(order_type))?;
        validate_price(stop, limits, filters)?;
    }
    Ok(())
}

/// Bracket prices for closing a position: a SELL exit (long position) takes
/// profit above the stop, a BUY exit (short position) below it.
pub fn validate_oco_prices(side: Side, take_profit: Price, stop_loss: Price) -> ValidationResult<()> {
    let ordered = match side {
        Side::Sell => take_profit > stop_loss,
        Side::Buy => take_profit < stop_loss,
    };
    if ordered {
        Ok(())
    } else {
        Err(ValidationError::InvalidOcoPrices {
            side,
            take_profit,
            stop_loss,
        })
    }
}
