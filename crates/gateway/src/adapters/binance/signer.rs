//! HMAC-SHA256 request signing for the Binance REST API

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tranche_ports::{ExchangeError, ExchangeResult};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct Signer {
    secret: String,
}

impl Signer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex-encoded signature of `payload`
    pub fn sign(&self, payload: &str) -> ExchangeResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ExchangeError::transport(format!("invalid signing key: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Append `timestamp`, `recvWindow` and `signature` to a parameter list
    /// and return the encoded query string.
    pub fn signed_query(
        &self,
        params: &[(&str, String)],
        timestamp_ms: i64,
        recv_window_ms: u64,
    ) -> ExchangeResult<String> {
        let mut query = encode_query(params);
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!("recvWindow={recv_window_ms}&timestamp={timestamp_ms}"));
        let signature = self.sign(&query)?;
        query.push_str("&signature=");
        query.push_str(&signature);
        Ok(query)
    }
}

/// `k=v&k=v` in the given order. Values are symbols, enums and decimals, none
/// of which need percent-encoding except the client order id, which is
/// restricted to `[.A-Z:/a-z0-9_-]` by the exchange.
pub fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}
