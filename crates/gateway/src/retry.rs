//! Bounded retry for exchange calls
//!
//! Only errors classified retryable by [`ExchangeError::is_retryable`]
//! (transport failures and rate limits) are repeated. A rejection is returned
//! on the first attempt. Once `max_attempts` is spent the last error is
//! returned to the caller, which then treats the unit of work as failed.
//!
//! Order submission is the exception to "last error wins": a submission can
//! reach the exchange even though its response is lost. When an order that
//! carries a client order id fails with a duplicate-id rejection or with
//! retries exhausted, the exchange is asked for the order by that id and an
//! order it already holds is returned as the result of the submission.

use async_trait::async_trait;
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;
use tranche_core::{OrderId, OrderSpec, OrderStatus, Price, SymbolFilters};
use tranche_ports::{ExchangeClient, ExchangeError, ExchangeResult, OpenOrder, OrderAck};

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// `base_delay * n` before the n-th retry
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            backoff: Backoff::Linear,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay to wait before `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay * (attempt - 1),
        }
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> ExchangeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ExchangeResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    attempt += 1;
                    let delay = match &err {
                        ExchangeError::RateLimited {
                            retry_after_ms: Some(ms),
                        } => Duration::from_millis(*ms).max(self.delay_before(attempt)),
                        _ => self.delay_before(attempt),
                    };
                    warn!(
                        "{} failed ({}), retrying in {:?} (attempt {}/{})",
                        operation, err, delay, attempt, max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_retryable() {
                        debug!("{} giving up after {} attempts: {}", operation, attempt, err);
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// [`ExchangeClient`] decorator applying a [`RetryPolicy`] to every call
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: ExchangeClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Find the order a failed submission may still have opened
    async fn recover_submission(
        &self,
        symbol: &str,
        client_order_id: &str,
        err: ExchangeError,
    ) -> ExchangeResult<OrderAck> {
        let lookup = self
            .policy
            .run("query_order_by_client_id", || {
                self.inner.query_order_by_client_id(symbol, client_order_id)
            })
            .await;
        match lookup {
            Ok(ack) => {
                warn!(
                    "order {} ({}) was accepted although submission reported: {}",
                    ack.order_id, client_order_id, err
                );
                Ok(ack)
            }
            Err(lookup_err) => {
                debug!("no order found for {}: {}", client_order_id, lookup_err);
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<C: ExchangeClient> ExchangeClient for RetryingClient<C> {
    // A resubmission after a lost response is rejected as a duplicate rather
    // than opening a second order; the first one is then looked up.
    async fn place_order(&self, spec: &OrderSpec) -> ExchangeResult<OrderAck> {
        let result = self
            .policy
            .run("place_order", || self.inner.place_order(spec))
            .await;
        match (result, spec.client_order_id()) {
            (Err(err), Some(client_id)) if err.is_duplicate_order() || err.is_retryable() => {
                self.recover_submission(spec.symbol(), client_id, err).await
            }
            (result, _) => result,
        }
    }

    async fn cancel_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<bool> {
        self.policy
            .run("cancel_order", || self.inner.cancel_order(symbol, order_id))
            .await
    }

    async fn query_order(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<OrderAck> {
        self.policy
            .run("query_order", || self.inner.query_order(symbol, order_id))
            .await
    }

    async fn query_order_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> ExchangeResult<OrderAck> {
        self.policy
            .run("query_order_by_client_id", || {
                self.inner.query_order_by_client_id(symbol, client_order_id)
            })
            .await
    }

    async fn order_status(&self, symbol: &str, order_id: &OrderId) -> ExchangeResult<OrderStatus> {
        self.policy
            .run("order_status", || self.inner.order_status(symbol, order_id))
            .await
    }

    async fn list_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<OpenOrder>> {
        self.policy
            .run("list_open_orders", || self.inner.list_open_orders(symbol))
            .await
    }

    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<()> {
        self.policy
            .run("cancel_all_orders", || self.inner.cancel_all_orders(symbol))
            .await
    }

    async fn current_price(&self, symbol: &str) -> ExchangeResult<Price> {
        self.policy
            .run("current_price", || self.inner.current_price(symbol))
            .await
    }

    async fn symbol_filters(&self, symbol: &str) -> ExchangeResult<SymbolFilters> {
        self.policy
            .run("symbol_filters", || self.inner.symbol_filters(symbol))
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
