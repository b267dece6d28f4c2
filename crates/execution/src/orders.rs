//! Direct order placement
//!
//! Single orders go through the same validation as strategy children before
//! reaching the exchange. OCO brackets are emulated: futures have no native
//! OCO, so a reduce-only take-profit limit and a reduce-only stop-market are
//! placed together and a monitor cancels the survivor once one fills.

use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tranche_core::validation::validate_oco_prices;
use tranche_core::{
    OrderId, OrderSpec, OrderStatus, PositionSide, Price, Quantity, Side, SymbolFilters,
    TimeInForce, ValidationError, ValidationLimits,
};
use tranche_ports::{AuditEvent, AuditSink, Clock, ExchangeClient, OpenOrder, OrderAck};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::ids::ClientOrderIds;

const COMPONENT: &str = "orders";

/// Take-profit / stop-loss bracket closing a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcoRequest {
    pub symbol: String,
    /// Closing side: SELL closes a long, BUY closes a short
    pub side: Side,
    pub quantity: Quantity,
    pub take_profit: Price,
    pub stop_loss: Price,
    pub position_side: PositionSide,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcoOrders {
    pub symbol: String,
    pub take_profit: OrderAck,
    pub stop_loss: OrderAck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OcoOutcome {
    /// Take-profit filled, stop-loss cancelled
    TakeProfit,
    /// Stop-loss triggered, take-profit cancelled
    StopLoss,
    /// Both legs were cancelled or expired at the exchange
    Cancelled,
    /// Monitoring stopped before either leg resolved
    Unresolved,
}

pub struct OrderPlacer {
    client: Arc<dyn ExchangeClient>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    limits: ValidationLimits,
    ids: ClientOrderIds,
}

impl OrderPlacer {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            audit,
            clock,
            limits: ValidationLimits::default(),
            ids: ClientOrderIds::new("cli"),
        }
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    async fn filters(&self, symbol: &str) -> Result<SymbolFilters> {
        self.client
            .symbol_filters(symbol)
            .await
            .map_err(|e| Error::setup("symbol filters", symbol, e))
    }

    /// Validate against the exchange's symbol rules and submit
    pub async fn place(&self, spec: OrderSpec) -> Result<OrderAck> {
        tranche_core::validation::validate_symbol(spec.symbol(), &self.limits)?;
        let filters = self.filters(spec.symbol()).await?;
        spec.validate(&self.limits, Some(&filters))?;

        let spec = match spec.client_order_id() {
            Some(_) => spec,
            None => spec.with_client_order_id(self.ids.next_id()),
        };

        match self.client.place_order(&spec).await {
            Ok(ack) => {
                info!(
                    "{} {} {} {} -> order {} ({})",
                    spec.order_type(),
                    spec.side(),
                    spec.quantity(),
                    spec.symbol(),
                    ack.order_id,
                    ack.status
                );
                self.audit.record(
                    AuditEvent::info(self.clock.now(), COMPONENT, "order_placed")
                        .with("symbol", spec.symbol())
                        .with("side", spec.side())
                        .with("type", spec.order_type().as_str())
                        .with("quantity", spec.quantity())
                        .with("price", spec.price())
                        .with("stopPrice", spec.stop_price())
                        .with("orderId", &ack.order_id)
                        .with("status", ack.status.to_string()),
                );
                Ok(ack)
            }
            Err(e) => {
                self.audit.record(
                    AuditEvent::error(self.clock.now(), COMPONENT, "order_failed")
                        .with("symbol", spec.symbol())
                        .with("type", spec.order_type().as_str())
                        .with("error", e.to_string()),
                );
                Err(e.into())
            }
        }
    }

    pub async fn market(
        &self,
        symbol: &str,
        side: Side,
        quantity: Quantity,
        position_side: PositionSide,
    ) -> Result<OrderAck> {
        self.place(OrderSpec::market(symbol, side, quantity).with_position_side(position_side))
            .await
    }

    pub async fn limit(
        &self,
        symbol: &str,
        side: Side,
        quantity: Quantity,
        price: Price,
        time_in_force: TimeInForce,
        position_side: PositionSide,
    ) -> Result<OrderAck> {
        self.place(
            OrderSpec::limit(symbol, side, quantity, price)
                .with_time_in_force(time_in_force)
                .with_position_side(position_side),
        )
        .await
    }

    /// Limit order at `price` that activates once `stop_price` trades
    #[allow(clippy::too_many_arguments)]
    pub async fn stop_limit(
        &self,
        symbol: &str,
        side: Side,
        quantity: Quantity,
        stop_price: Price,
        price: Price,
        time_in_force: TimeInForce,
        position_side: PositionSide,
    ) -> Result<OrderAck> {
        self.place(
            OrderSpec::stop_limit(symbol, side, quantity, stop_price, price)
                .with_time_in_force(time_in_force)
                .with_position_side(position_side),
        )
        .await
    }

    /// Place both legs of a bracket. If the stop-loss leg fails the
    /// take-profit leg is cancelled again and the error returned.
    pub async fn oco(&self, request: &OcoRequest) -> Result<OcoOrders> {
        validate_oco_prices(request.side, request.take_profit, request.stop_loss)?;

        let take_profit = self
            .place(
                OrderSpec::limit(
                    &request.symbol,
                    request.side,
                    request.quantity,
                    request.take_profit,
                )
                .with_reduce_only(true)
                .with_position_side(request.position_side),
            )
            .await?;

        let stop_loss = match self
            .place(
                OrderSpec::stop_market(
                    &request.symbol,
                    request.side,
                    request.quantity,
                    request.stop_loss,
                )
                .with_reduce_only(true)
                .with_position_side(request.position_side),
            )
            .await
        {
            Ok(ack) => ack,
            Err(e) => {
                warn!(
                    "Stop-loss leg failed, cancelling take-profit {}: {}",
                    take_profit.order_id, e
                );
                if let Err(cancel_err) = self
                    .client
                    .cancel_order(&request.symbol, &take_profit.order_id)
                    .await
                {
                    warn!("Failed to cancel take-profit {}: {}", take_profit.order_id, cancel_err);
                }
                return Err(e);
            }
        };

        self.audit.record(
            AuditEvent::info(self.clock.now(), COMPONENT, "oco_placed")
                .with("symbol", &request.symbol)
                .with("side", request.side)
                .with("quantity", request.quantity)
                .with("takeProfitPrice", request.take_profit)
                .with("stopLossPrice", request.stop_loss)
                .with("tpOrderId", &take_profit.order_id)
                .with("slOrderId", &stop_loss.order_id),
        );
        Ok(OcoOrders {
            symbol: request.symbol.to_ascii_uppercase(),
            take_profit,
            stop_loss,
        })
    }

    /// Poll both legs until one fills, then cancel the other.
    ///
    /// Stops with [`OcoOutcome::Unresolved`] after `max_checks` polls (if set)
    /// or when `cancel` fires; both legs are then left as they are.
    pub async fn monitor_oco(
        &self,
        orders: &OcoOrders,
        poll_interval: Duration,
        max_checks: Option<u64>,
        cancel: &CancelToken,
    ) -> Result<OcoOutcome> {
        if poll_interval.is_zero() {
            return Err(ValidationError::InvalidPollInterval.into());
        }
        let symbol = orders.symbol.as_str();
        let tp_id = &orders.take_profit.order_id;
        let sl_id = &orders.stop_loss.order_id;

        let mut checks = 0;
        loop {
            if cancel.is_cancelled() || max_checks.is_some_and(|max| checks >= max) {
                warn!("OCO monitoring on {} ended unresolved", symbol);
                return Ok(OcoOutcome::Unresolved);
            }
            checks += 1;

            match self.leg_statuses(symbol, tp_id, sl_id).await {
                Some((OrderStatus::Filled, _)) => {
                    self.cancel_leg(symbol, sl_id, "stop-loss").await;
                    return Ok(self.resolved(orders, OcoOutcome::TakeProfit));
                }
                Some((_, OrderStatus::Filled)) => {
                    self.cancel_leg(symbol, tp_id, "take-profit").await;
                    return Ok(self.resolved(orders, OcoOutcome::StopLoss));
                }
                Some((tp, sl)) if is_dead(tp) && is_dead(sl) => {
                    return Ok(self.resolved(orders, OcoOutcome::Cancelled));
                }
                _ => {}
            }

            if !cancel.sleep(poll_interval).await {
                return Ok(OcoOutcome::Unresolved);
            }
        }
    }

    async fn leg_statuses(
        &self,
        symbol: &str,
        tp_id: &OrderId,
        sl_id: &OrderId,
    ) -> Option<(OrderStatus, OrderStatus)> {
        let tp = self.client.order_status(symbol, tp_id).await;
        let sl = self.client.order_status(symbol, sl_id).await;
        match (tp, sl) {
            (Ok(tp), Ok(sl)) => Some((tp, sl)),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Error checking OCO legs on {}: {}", symbol, e);
                None
            }
        }
    }

    async fn cancel_leg(&self, symbol: &str, order_id: &OrderId, leg: &str) {
        match self.client.cancel_order(symbol, order_id).await {
            Ok(true) => info!("Cancelled {} order {}", leg, order_id),
            Ok(false) => warn!("{} order {} was no longer open", leg, order_id),
            Err(e) => warn!("Failed to cancel {} order {}: {}", leg, order_id, e),
        }
    }

    fn resolved(&self, orders: &OcoOrders, outcome: OcoOutcome) -> OcoOutcome {
        info!("OCO on {} resolved: {:?}", orders.symbol, outcome);
        self.audit.record(
            AuditEvent::info(self.clock.now(), COMPONENT, "oco_resolved")
                .with("symbol", &orders.symbol)
                .with("outcome", outcome)
                .with("tpOrderId", &orders.take_profit.order_id)
                .with("slOrderId", &orders.stop_loss.order_id),
        );
        outcome
    }

    pub async fn cancel(&self, symbol: &str, order_id: &OrderId) -> Result<bool> {
        let cancelled = self.client.cancel_order(symbol, order_id).await?;
        self.audit.record(
            AuditEvent::info(self.clock.now(), COMPONENT, "cancel_requested")
                .with("symbol", symbol)
                .with("orderId", order_id)
                .with("cancelled", cancelled),
        );
        Ok(cancelled)
    }

    pub async fn current_price(&self, symbol: &str) -> Result<Price> {
        Ok(self.client.current_price(symbol).await?)
    }

    /// Orders still working on `symbol`
    pub async fn open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>> {
        tranche_core::validation::validate_symbol(symbol, &self.limits)?;
        Ok(self.client.list_open_orders(symbol).await?)
    }

    /// Cancel everything working on `symbol`. Returns how many orders were
    /// open just before the request.
    pub async fn cancel_all(&self, symbol: &str) -> Result<usize> {
        tranche_core::validation::validate_symbol(symbol, &self.limits)?;
        let open = self.client.list_open_orders(symbol).await?.len();
        self.client.cancel_all_orders(symbol).await?;
        info!("Cancelled all open orders on {} ({} were open)", symbol, open);
        self.audit.record(
            AuditEvent::info(self.clock.now(), COMPONENT, "cancel_all_requested")
                .with("symbol", symbol)
                .with("openOrders", open),
        );
        Ok(open)
    }
}

fn is_dead(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Canceled | OrderStatus::Expired)
}
