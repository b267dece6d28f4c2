//! TWAP scheduler
//!
//! Slices fire strictly one after another at `start + i * interval`. A slice
//! that fails is recorded and the schedule moves on; the run only aborts if
//! its inputs are invalid or the symbol rules cannot be fetched before the
//! first order.

use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tranche_core::validation::{validate_quantity, validate_symbol};
use tranche_core::{
    OrderSpec, PositionSide, Price, Quantity, Side, SymbolFilters, TimeInForce, ValidationError,
    ValidationLimits,
};
use tranche_ports::{AuditEvent, AuditSink, Clock, ExchangeClient};

use super::plan::{PlannedSlice, SlicePlan};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::ids::ClientOrderIds;
use crate::record::{ExecutionRecord, ExecutionSummary, SliceState};

const COMPONENT: &str = "twap";

/// How each child order is priced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SliceOrderKind {
    #[default]
    Market,
    /// Resting limit at `offset_pct` percent away from the market, on the
    /// passive side: below for BUY, above for SELL
    Limit { offset_pct: Decimal },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwapRequest {
    pub symbol: String,
    pub side: Side,
    pub total_quantity: Quantity,
    pub duration: Duration,
    pub slice_count: usize,
    pub order_kind: SliceOrderKind,
    pub position_side: PositionSide,
}

impl TwapRequest {
    pub fn market(
        symbol: impl Into<String>,
        side: Side,
        total_quantity: Quantity,
        duration: Duration,
        slice_count: usize,
    ) -> Self {
        Self {
            symbol: symbol.into().trim().to_ascii_uppercase(),
            side,
            total_quantity,
            duration,
            slice_count,
            order_kind: SliceOrderKind::Market,
            position_side: PositionSide::Both,
        }
    }

    pub fn with_limit_offset(mut self, offset_pct: Decimal) -> Self {
        self.order_kind = SliceOrderKind::Limit { offset_pct };
        self
    }

    pub fn with_position_side(mut self, position_side: PositionSide) -> Self {
        self.position_side = position_side;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwapConfig {
    pub limits: ValidationLimits,
    /// Time in force for limit slices
    pub time_in_force: TimeInForce,
    /// Poll resting limit slices once after the last slice
    pub reconcile: bool,
    pub client_id_prefix: String,
}

impl Default for TwapConfig {
    fn default() -> Self {
        Self {
            limits: ValidationLimits::default(),
            time_in_force: TimeInForce::GTC,
            reconcile: true,
            client_id_prefix: COMPONENT.to_string(),
        }
    }
}

impl TwapConfig {
    pub fn with_reconcile(mut self, reconcile: bool) -> Self {
        self.reconcile = reconcile;
        self
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }
}

/// Limit price `offset_pct` percent on the passive side of `market`,
/// rounded to the tick away from the market.
pub fn passive_limit_price(
    side: Side,
    market: Price,
    offset_pct: Decimal,
    filters: &SymbolFilters,
) -> Price {
    let ratio = offset_pct / Decimal::ONE_HUNDRED;
    match side {
        Side::Buy => filters.round_price_down(market * (Decimal::ONE - ratio)),
        Side::Sell => filters.round_price_up(market * (Decimal::ONE + ratio)),
    }
}

pub struct TwapScheduler {
    client: Arc<dyn ExchangeClient>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    config: TwapConfig,
}

impl TwapScheduler {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_config(client, audit, clock, TwapConfig::default())
    }

    pub fn with_config(
        client: Arc<dyn ExchangeClient>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: TwapConfig,
    ) -> Self {
        Self {
            client,
            audit,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &TwapConfig {
        &self.config
    }

    /// Validate the request and partition it. No order is sent.
    pub async fn plan(&self, request: &TwapRequest) -> Result<(SlicePlan, SymbolFilters)> {
        let limits = &self.config.limits;
        validate_symbol(&request.symbol, limits)?;
        if let SliceOrderKind::Limit { offset_pct } = request.order_kind {
            if offset_pct < Decimal::ZERO || offset_pct >= Decimal::ONE_HUNDRED {
                return Err(ValidationError::InvalidOffset(offset_pct).into());
            }
        }

        let filters = self
            .client
            .symbol_filters(&request.symbol)
            .await
            .map_err(|e| Error::setup("symbol filters", &request.symbol, e))?;
        validate_quantity(request.total_quantity, limits, Some(&filters))?;

        let template = OrderSpec::market(&request.symbol, request.side, Decimal::ZERO)
            .with_position_side(request.position_side);
        let plan = SlicePlan::build(
            &template,
            request.total_quantity,
            request.duration,
            request.slice_count,
            &filters,
        )?;
        for slice in plan.slices() {
            validate_quantity(slice.child.quantity(), limits, Some(&filters))?;
        }
        Ok((plan, filters))
    }

    /// Execute the schedule until it completes or `cancel` fires
    pub async fn run(&self, request: TwapRequest, cancel: &CancelToken) -> Result<ExecutionSummary> {
        let (plan, filters) = self.plan(&request).await?;
        let ids = ClientOrderIds::new(&self.config.client_id_prefix);

        let mut records: Vec<ExecutionRecord> = plan
            .slices()
            .iter()
            .map(|s| ExecutionRecord::pending(s.index, s.offset, s.child.quantity(), ids.next_id()))
            .collect();

        info!(
            "TWAP {} {} {} over {:?} in {} slices (every {:?}, {:?})",
            request.side,
            request.total_quantity,
            request.symbol,
            request.duration,
            plan.len(),
            plan.interval(),
            request.order_kind
        );
        self.audit.record(
            AuditEvent::info(self.clock.now(), COMPONENT, "twap_started")
                .with("symbol", &request.symbol)
                .with("side", request.side)
                .with("totalQuantity", request.total_quantity)
                .with("durationSecs", request.duration.as_secs_f64())
                .with("slices", plan.len()),
        );

        let start = Instant::now();
        let mut stopped_early = false;
        for (slice, record) in plan.slices().iter().zip(records.iter_mut()) {
            if cancel.is_cancelled() || !cancel.sleep_until(start + slice.offset).await {
                stopped_early = true;
                break;
            }
            self.execute_slice(&request, slice, record, &filters).await;
        }

        if stopped_early {
            let skipped = records
                .iter()
                .filter(|r| r.state == SliceState::Pending)
                .count();
            warn!("TWAP on {} cancelled, {} slices not sent", request.symbol, skipped);
            records.iter_mut().for_each(ExecutionRecord::mark_cancelled);
        }

        if self.config.reconcile {
            self.reconcile(&request.symbol, &mut records).await;
        }

        let summary = ExecutionSummary::from_records(&request.symbol, request.side, records, stopped_early);
        info!(
            "TWAP on {} finished: {}/{} filled, {} failed, {} filled qty",
            summary.symbol,
            summary.filled_slices,
            summary.total_slices,
            summary.failed_slices,
            summary.total_quantity_filled
        );
        self.audit.record(
            AuditEvent::info(self.clock.now(), COMPONENT, "twap_completed")
                .with("symbol", &summary.symbol)
                .with("filledSlices", summary.filled_slices)
                .with("failedSlices", summary.failed_slices)
                .with("failedIndices", summary.failed_indices())
                .with("totalQuantityFilled", summary.total_quantity_filled)
                .with("averageFillPrice", summary.average_fill_price)
                .with("stoppedEarly", summary.stopped_early),
        );
        Ok(summary)
    }

    async fn execute_slice(
        &self,
        request: &TwapRequest,
        slice: &PlannedSlice,
        record: &mut ExecutionRecord,
        filters: &SymbolFilters,
    ) {
        let child = &slice.child;
        let spec = match request.order_kind {
            SliceOrderKind::Market => child.clone(),
            SliceOrderKind::Limit { offset_pct } => {
                // Sampled per slice, never reused from an earlier one
                let market = match self.client.current_price(child.symbol()).await {
                    Ok(price) => price,
                    Err(e) => {
                        self.fail_slice(record, format!("price unavailable: {e}"));
                        return;
                    }
                };
                let price = passive_limit_price(child.side(), market, offset_pct, filters);
                record.limit_price = Some(price);
                debug!("slice {}: market {} -> limit {}", slice.index, market, price);
                OrderSpec::limit(child.symbol(), child.side(), child.quantity(), price)
                    .with_time_in_force(self.config.time_in_force)
                    .with_position_side(child.position_side())
            }
        }
        .with_client_order_id(record.client_order_id.clone());

        if let Err(e) = spec.validate(&self.config.limits, Some(filters)) {
            self.fail_slice(record, e.to_string());
            return;
        }

        match self.client.place_order(&spec).await {
            Ok(ack) => {
                record.mark_submitted(self.clock.now(), &ack);
                info!(
                    "Slice {}/{}: {} {} -> order {} ({:?})",
                    slice.index + 1,
                    request.slice_count,
                    spec.side(),
                    spec.quantity(),
                    ack.order_id,
                    record.state
                );
                self.audit.record(
                    AuditEvent::info(self.clock.now(), COMPONENT, "slice_submitted")
                        .with("index", slice.index)
                        .with("orderId", &ack.order_id)
                        .with("clientOrderId", &record.client_order_id)
                        .with("quantity", spec.quantity())
                        .with("price", spec.price())
                        .with("status", ack.status.to_string()),
                );
            }
            Err(e) => self.fail_slice(record, e.to_string()),
        }
    }

    fn fail_slice(&self, record: &mut ExecutionRecord, reason: String) {
        error!("Slice {} failed: {}", record.index + 1, reason);
        self.audit.record(
            AuditEvent::error(self.clock.now(), COMPONENT, "slice_failed")
                .with("index", record.index)
                .with("clientOrderId", &record.client_order_id)
                .with("error", &reason),
        );
        record.mark_failed(self.clock.now(), reason);
    }

    /// Refresh resting slices so the summary counts fills that happened
    /// while the schedule was still running
    async fn reconcile(&self, symbol: &str, records: &mut [ExecutionRecord]) {
        for record in records.iter_mut().filter(|r| r.state == SliceState::Submitted) {
            let Some(order_id) = record.order_id.clone() else {
                continue;
            };
            match self.client.query_order(symbol, &order_id).await {
                Ok(report) => {
                    record.apply_report(&report);
                    debug!(
                        "slice {} order {} is {} ({} filled)",
                        record.index + 1,
                        order_id,
                        report.status,
                        report.executed_qty
                    );
                }
                Err(e) => warn!("could not refresh slice {} order {}: {}", record.index + 1, order_id, e),
            }
        }
    }
}
