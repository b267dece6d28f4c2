//! Tranche Core Domain
//!
//! Pure domain types for the tranche order execution toolkit.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod instruments;
pub mod validation;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    OrderId, OrderSpec, OrderStatus, OrderType, PositionSide, Side, TimeInForce,
};
pub use instruments::SymbolFilters;
pub use validation::{ValidationError, ValidationLimits, ValidationResult};
pub use values::{Price, Quantity, Symbol, Timestamp};
