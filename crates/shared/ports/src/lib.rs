//! Tranche Ports
//!
//! Port definitions (traits) for the tranche toolkit.
//! These define the boundaries between strategy logic and infrastructure:
//! the exchange, the audit log, and the clock.

mod audit;
mod clock;
mod error;
mod exchange;

pub use audit::{AuditEvent, AuditLevel, AuditSink};
pub use clock::Clock;
pub use error::{CODE_DUPLICATE_CLIENT_ORDER_ID, CODE_UNKNOWN_ORDER, ExchangeError, ExchangeResult};
pub use exchange::{ExchangeClient, OpenOrder, OrderAck};
