use thiserror::Error;

/// Rejection code for a reused client order id
pub const CODE_DUPLICATE_CLIENT_ORDER_ID: i64 = -4116;
/// Rejection code for an order the exchange does not know
pub const CODE_UNKNOWN_ORDER: i64 = -2013;

/// Errors returned by an [`ExchangeClient`](crate::ExchangeClient)
///
/// The split matters to callers: transport failures and rate limits may be
/// retried, a rejection is final for the order it concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Rejected by exchange: {code} - {message}")]
    Rejected { code: i64, message: String },

    #[error("Could not decode exchange response: {0}")]
    Decode(String),
}

impl ExchangeError {
    pub fn transport(msg: impl Into<String>) -> Self {
        ExchangeError::Transport(msg.into())
    }

    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        ExchangeError::Rejected {
            code,
            message: message.into(),
        }
    }

    /// The exchange already holds an order with this client order id
    pub fn is_duplicate_order(&self) -> bool {
        matches!(self, ExchangeError::Rejected { code, .. } if *code == CODE_DUPLICATE_CLIENT_ORDER_ID)
    }

    /// The order the call referred to is unknown to the exchange
    pub fn is_unknown_order(&self) -> bool {
        matches!(self, ExchangeError::Rejected { code, .. } if *code == CODE_UNKNOWN_ORDER)
    }

    /// Returns true if the same call may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::Transport(_) | ExchangeError::RateLimited { .. }
        )
    }
}

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
