//! Execution errors
//!
//! Only failures that stop a run before (or instead of) its schedule surface
//! here. A slice or level that fails mid-run is recorded in the run's state
//! and never raised.

use thiserror::Error;
use tranche_core::ValidationError;
use tranche_ports::ExchangeError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Market data or symbol rules needed to plan the run were unavailable
    #[error("Failed to fetch {what} for {symbol}: {source}")]
    Setup {
        what: &'static str,
        symbol: String,
        #[source]
        source: ExchangeError,
    },

    /// A single direct order failed at the exchange
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

impl Error {
    pub(crate) fn setup(what: &'static str, symbol: &str, source: ExchangeError) -> Self {
        Error::Setup {
            what,
            symbol: symbol.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
