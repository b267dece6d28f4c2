//! Grid submission, monitoring and shutdown
//!
//! All ladder levels are placed up front as resting GTC limits. The monitor
//! then polls open orders on a fixed interval; a fill at ladder index `i`
//! places the opposite side one level away (BUY fill → SELL at `i + 1`,
//! SELL fill → BUY at `i - 1`). Counter-orders re-grid in turn when they
//! fill. The ladder's own sides never change.

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tranche_core::validation::{validate_quantity, validate_symbol};
use tranche_core::{
    OrderSpec, PositionSide, Price, Quantity, Side, SymbolFilters, TimeInForce, ValidationError,
    ValidationLimits,
};
use tranche_ports::{AuditEvent, AuditSink, Clock, ExchangeClient, ExchangeError};

use super::level::{GridLevel, LevelState};
use super::planner::GridPlanner;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::ids::ClientOrderIds;

const COMPONENT: &str = "grid";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRequest {
    pub symbol: String,
    pub lower: Price,
    pub upper: Price,
    pub level_count: usize,
    pub quantity_per_level: Quantity,
    pub position_side: PositionSide,
}

impl GridRequest {
    pub fn new(
        symbol: impl Into<String>,
        lower: Price,
        upper: Price,
        level_count: usize,
        quantity_per_level: Quantity,
    ) -> Self {
        Self {
            symbol: symbol.into().trim().to_ascii_uppercase(),
            lower,
            upper,
            level_count,
            quantity_per_level,
            position_side: PositionSide::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridConfig {
    pub limits: ValidationLimits,
    /// Pause between consecutive level submissions
    pub level_gap: Duration,
    /// Stop monitoring after this many polls; `None` runs until cancelled
    pub max_polls: Option<u64>,
    pub client_id_prefix: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            limits: ValidationLimits::default(),
            level_gap: Duration::from_millis(100),
            max_polls: None,
            client_id_prefix: COMPONENT.to_string(),
        }
    }
}

impl GridConfig {
    pub fn with_level_gap(mut self, gap: Duration) -> Self {
        self.level_gap = gap;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u64) -> Self {
        self.max_polls = Some(max_polls);
        self
    }
}

/// Everything a grid run owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridRunState {
    pub symbol: String,
    pub position_side: PositionSide,
    /// Exchange rules every order of the run is checked against
    pub filters: SymbolFilters,
    pub market_price: Price,
    /// The ladder with the initial order at each level
    pub levels: Vec<GridLevel>,
    /// Counter-orders placed after fills, in placement order
    pub orders: Vec<GridLevel>,
    pub polls: u64,
    pub regrids: u64,
}

impl GridRunState {
    /// Ladder orders followed by counter-orders
    pub fn all_orders(&self) -> impl Iterator<Item = &GridLevel> {
        self.levels.iter().chain(self.orders.iter())
    }

    pub fn count(&self, state: LevelState) -> usize {
        self.all_orders().filter(|l| l.state == state).count()
    }

    pub fn open_count(&self) -> usize {
        self.count(LevelState::Open)
    }

    pub fn filled_count(&self) -> usize {
        self.count(LevelState::Filled)
    }

    pub fn failed_count(&self) -> usize {
        self.count(LevelState::Failed)
    }
}

/// Location of an order inside [`GridRunState`]
#[derive(Debug, Clone, Copy)]
enum Slot {
    Ladder(usize),
    Counter(usize),
}

pub struct GridRunner {
    client: Arc<dyn ExchangeClient>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    config: GridConfig,
    ids: ClientOrderIds,
}

impl GridRunner {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: GridConfig,
    ) -> Self {
        let ids = ClientOrderIds::new(&config.client_id_prefix);
        Self {
            client,
            audit,
            clock,
            config,
            ids,
        }
    }

    /// Validate, build the ladder and assign sides against the current price.
    /// No order is sent.
    pub async fn plan(&self, request: &GridRequest) -> Result<GridRunState> {
        let limits = &self.config.limits;
        validate_symbol(&request.symbol, limits)?;

        let filters: SymbolFilters = self
            .client
            .symbol_filters(&request.symbol)
            .await
            .map_err(|e| Error::setup("symbol filters", &request.symbol, e))?;
        validate_quantity(request.quantity_per_level, limits, Some(&filters))?;

        let mut levels = GridPlanner::build_levels(
            request.lower,
            request.upper,
            request.level_count,
            request.quantity_per_level,
            &filters,
        )?;
        if let Some(lowest) = levels.first() {
            let min = filters.min_price.max(limits.min_price);
            if lowest.price < min {
                return Err(ValidationError::PriceTooSmall {
                    price: lowest.price,
                    min,
                }
                .into());
            }
        }

        let market_price = self
            .client
            .current_price(&request.symbol)
            .await
            .map_err(|e| Error::setup("market price", &request.symbol, e))?;
        GridPlanner::assign_sides(&mut levels, market_price);

        info!(
            "Grid on {}: {} levels {}..{}, market {}",
            request.symbol, request.level_count, request.lower, request.upper, market_price
        );
        Ok(GridRunState {
            symbol: request.symbol.clone(),
            position_side: request.position_side,
            filters,
            market_price,
            levels,
            orders: Vec::new(),
            polls: 0,
            regrids: 0,
        })
    }

    /// Place every pending ladder level. A failed level is marked and skipped.
    /// Once `cancel` fires no further level is sent; the rest stay pending.
    pub async fn submit_all(&self, state: &mut GridRunState, cancel: &CancelToken) {
        let mut first = true;
        for i in 0..state.levels.len() {
            if state.levels[i].state != LevelState::Pending {
                continue;
            }
            if cancel.is_cancelled() {
                break;
            }
            if !first
                && !self.config.level_gap.is_zero()
                && !cancel.sleep(self.config.level_gap).await
            {
                break;
            }
            first = false;
            self.place(state, Slot::Ladder(i)).await;
        }
        let pending = state.count(LevelState::Pending);
        if pending > 0 {
            warn!("Grid on {} cancelled, {} levels not sent", state.symbol, pending);
        }
        info!(
            "Grid on {}: {} open, {} failed",
            state.symbol,
            state.open_count(),
            state.failed_count()
        );
    }

    /// Poll open orders every `poll_interval` until cancelled or `max_polls`
    pub async fn monitor(
        &self,
        state: &mut GridRunState,
        poll_interval: Duration,
        cancel: &CancelToken,
    ) -> Result<()> {
        if poll_interval.is_zero() {
            return Err(ValidationError::InvalidPollInterval.into());
        }
        info!("Monitoring grid on {} every {:?}", state.symbol, poll_interval);

        loop {
            if cancel.is_cancelled() {
                break;
            }
            if self.config.max_polls.is_some_and(|max| state.polls >= max) {
                info!("Grid on {}: poll limit reached", state.symbol);
                break;
            }
            self.poll_once(state).await;
            if !cancel.sleep(poll_interval).await {
                break;
            }
        }
        Ok(())
    }

    /// One status sweep over every open order. Returns the number of fills.
    pub async fn poll_once(&self, state: &mut GridRunState) -> usize {
        state.polls += 1;
        let open: Vec<Slot> = state
            .levels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_open())
            .map(|(i, _)| Slot::Ladder(i))
            .chain(
                state
                    .orders
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| l.is_open())
                    .map(|(i, _)| Slot::Counter(i)),
            )
            .collect();

        let mut fills = Vec::new();
        for slot in open {
            let level = slot_mut(state, slot);
            let Some(order_id) = level.order_id.clone() else {
                continue;
            };
            match self.client.order_status(&state.symbol, &order_id).await {
                Ok(status) => {
                    let level = slot_mut(state, slot);
                    if level.apply_status(status) {
                        fills.push((level.index, level.side));
                    } else if level.state == LevelState::Cancelled {
                        warn!("Grid order {} at {} is {}", order_id, level.price, status);
                    }
                }
                Err(ExchangeError::Rejected { code, message }) => {
                    let level = slot_mut(state, slot);
                    warn!("Grid order {} unknown to exchange: {} {}", order_id, code, message);
                    level.mark_failed(format!("{code}: {message}"));
                }
                // Left open; retried on the next poll
                Err(e) => warn!("Status of grid order {} unavailable: {}", order_id, e),
            }
        }

        for (index, side) in &fills {
            let Some(side) = side else { continue };
            self.audit.record(
                AuditEvent::info(self.clock.now(), COMPONENT, "level_filled")
                    .with("index", index)
                    .with("side", side)
                    .with("price", state.levels[*index].price),
            );
            self.regrid(state, *index, *side).await;
        }
        fills.len()
    }

    /// Counter-order for a fill at ladder `index`
    async fn regrid(&self, state: &mut GridRunState, index: usize, filled_side: Side) {
        let target = match filled_side {
            Side::Buy => index.checked_add(1).filter(|i| *i < state.levels.len()),
            Side::Sell => index.checked_sub(1),
        };
        let Some(target) = target else {
            info!(
                "Grid on {}: {} fill at edge level {}, no counter-order",
                state.symbol, filled_side, index
            );
            return;
        };

        let counter = GridLevel::counter(&state.levels[target], filled_side.opposite());
        state.orders.push(counter);
        let slot = Slot::Counter(state.orders.len() - 1);
        if self.place(state, slot).await {
            state.regrids += 1;
            info!(
                "Re-grid on {}: {} fill at level {} -> {} at level {}",
                state.symbol,
                filled_side,
                index,
                filled_side.opposite(),
                target
            );
        }
    }

    /// Submit the order at `slot`. Returns true if it is now open.
    async fn place(&self, state: &mut GridRunState, slot: Slot) -> bool {
        let symbol = state.symbol.clone();
        let position_side = state.position_side;
        let filters = state.filters;
        let level = slot_mut(state, slot);
        let Some(side) = level.side else {
            level.mark_failed("side not assigned");
            return false;
        };

        let client_order_id = self.ids.next_id();
        level.client_order_id = Some(client_order_id.clone());
        let spec = OrderSpec::limit(&symbol, side, level.quantity, level.price)
            .with_time_in_force(TimeInForce::GTC)
            .with_position_side(position_side)
            .with_client_order_id(client_order_id);

        let result = match spec.validate(&self.config.limits, Some(&filters)) {
            Ok(()) => self.client.place_order(&spec).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(ack) => {
                let level = slot_mut(state, slot);
                // An immediate fill stays open until the next poll sees it,
                // so it re-grids like any other fill.
                level.mark_open(ack.order_id.clone());
                debug!("Grid {} {} @ {} -> {}", side, level.quantity, level.price, ack.order_id);
                self.audit.record(
                    AuditEvent::info(self.clock.now(), COMPONENT, "level_submitted")
                        .with("index", level.index)
                        .with("side", side)
                        .with("price", level.price)
                        .with("quantity", level.quantity)
                        .with("orderId", &ack.order_id),
                );
                true
            }
            Err(reason) => {
                let level = slot_mut(state, slot);
                warn!("Grid level {} @ {} failed: {}", level.index, level.price, reason);
                self.audit.record(
                    AuditEvent::error(self.clock.now(), COMPONENT, "level_failed")
                        .with("index", level.index)
                        .with("side", side)
                        .with("price", level.price)
                        .with("error", &reason),
                );
                level.mark_failed(reason);
                false
            }
        }
    }

    /// Cancel every open order; filled ones are left alone. Returns the
    /// number of orders cancelled.
    pub async fn shutdown(&self, state: &mut GridRunState) -> usize {
        let snapshot: &GridRunState = state;
        let open: Vec<Slot> = (0..snapshot.levels.len())
            .map(Slot::Ladder)
            .chain((0..snapshot.orders.len()).map(Slot::Counter))
            .filter(|slot| slot_ref(snapshot, *slot).is_open())
            .collect();

        let mut cancelled = 0;
        for slot in open {
            let Some(order_id) = slot_ref(state, slot).order_id.clone() else {
                continue;
            };
            match self.client.cancel_order(&state.symbol, &order_id).await {
                Ok(true) => {
                    slot_mut(state, slot).state = LevelState::Cancelled;
                    cancelled += 1;
                }
                Ok(false) => {
                    // No longer open: find out whether it filled
                    if let Ok(status) = self.client.order_status(&state.symbol, &order_id).await {
                        slot_mut(state, slot).apply_status(status);
                    }
                }
                Err(e) => warn!("Failed to cancel grid order {}: {}", order_id, e),
            }
        }

        info!(
            "Grid on {} stopped: {} cancelled, {} filled, {} still open",
            state.symbol,
            cancelled,
            state.filled_count(),
            state.open_count()
        );
        self.audit.record(
            AuditEvent::info(self.clock.now(), COMPONENT, "grid_stopped")
                .with("symbol", &state.symbol)
                .with("cancelled", cancelled)
                .with("filled", state.filled_count())
                .with("regrids", state.regrids)
                .with("polls", state.polls),
        );
        cancelled
    }
}

fn slot_ref(state: &GridRunState, slot: Slot) -> &GridLevel {
    match slot {
        Slot::Ladder(i) => &state.levels[i],
        Slot::Counter(i) => &state.orders[i],
    }
}

fn slot_mut(state: &mut GridRunState, slot: Slot) -> &mut GridLevel {
    match slot {
        Slot::Ladder(i) => &mut state.levels[i],
        Slot::Counter(i) => &mut state.orders[i],
    }
}
