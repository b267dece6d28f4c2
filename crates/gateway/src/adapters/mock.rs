//! In-process exchange double
//!
//! Keeps a book of submitted orders and a single market price. Market orders
//! fill at the current price; limit and stop orders rest until a price move
//! crosses them ([`MockExchange::set_price`]) or a test forces a status with
//! [`MockExchange::set_status`]. Failures can be scripted per operation and
//! call number, which is how retry and failure-isolation paths are tested. A
//! failure can also be scripted to hit after the call took effect, the way a
//! response lost in transit looks to the caller.
//! The `--paper` mode of the CLI runs against this type too.

use async_trait::async_trait;
use log::debug;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::ops::RangeInclusive;
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tranche_core::{OrderId, OrderSpec, OrderStatus, OrderType, Price, Side, SymbolFilters};
use tranche_ports::{
    CODE_DUPLICATE_CLIENT_ORDER_ID, CODE_UNKNOWN_ORDER, ExchangeClient, ExchangeError,
    ExchangeResult, OpenOrder, OrderAck,
};

/// Exchange operations that can be counted and scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    PlaceOrder,
    CancelOrder,
    /// `query_order` and `order_status`
    OrderStatus,
    /// `query_order_by_client_id`
    OrderLookup,
    OpenOrders,
    CancelAll,
    CurrentPrice,
    SymbolFilters,
}

/// An order as the mock exchange holds it
#[derive(Debug, Clone, PartialEq)]
pub struct MockOrder {
    pub order_id: OrderId,
    pub spec: OrderSpec,
    pub status: OrderStatus,
    pub executed_qty: Decimal,
    pub avg_price: Option<Price>,
    /// Runtime instant of submission (virtual under paused tokio time)
    pub placed_at: Instant,
}

impl MockOrder {
    /// Price at which a resting order fills once `market` reaches it
    fn crossed_at(&self, market: Price) -> Option<Price> {
        let side = self.spec.side();
        match self.spec.order_type() {
            OrderType::Market => Some(market),
            OrderType::Limit => {
                let limit = self.spec.price()?;
                let crossed = match side {
                    Side::Buy => market <= limit,
                    Side::Sell => market >= limit,
                };
                crossed.then_some(limit)
            }
            OrderType::StopMarket | OrderType::StopLimit => {
                let stop = self.spec.stop_price()?;
                let triggered = match side {
                    Side::Buy => market >= stop,
                    Side::Sell => market <= stop,
                };
                triggered.then(|| self.spec.price().unwrap_or(market))
            }
        }
    }

    fn fill(&mut self, price: Price) {
        self.status = OrderStatus::Filled;
        self.executed_qty = self.spec.quantity();
        self.avg_price = Some(price);
    }

    fn ack(&self) -> OrderAck {
        let ack = OrderAck::new(self.order_id.clone(), self.status);
        let ack = match self.avg_price {
            Some(price) => ack.with_fill(self.executed_qty, price),
            None => ack,
        };
        match self.spec.client_order_id() {
            Some(id) => ack.with_client_order_id(id),
            None => ack,
        }
    }

    fn open_order(&self) -> OpenOrder {
        OpenOrder {
            order_id: self.order_id.clone(),
            client_order_id: self.spec.client_order_id().map(str::to_string),
            side: self.spec.side(),
            order_type: self.spec.order_type(),
            quantity: self.spec.quantity(),
            price: self.spec.price(),
            stop_price: self.spec.stop_price(),
            executed_qty: self.executed_qty,
            status: self.status,
        }
    }
}

struct ScriptedFailure {
    op: MockOp,
    calls: RangeInclusive<u64>,
    error: ExchangeError,
    /// The call takes effect before the error is returned
    after_effect: bool,
}

struct MockState {
    price: Price,
    price_script: VecDeque<Price>,
    filters: SymbolFilters,
    next_order_id: i64,
    orders: Vec<MockOrder>,
    cancelled: Vec<OrderId>,
    calls: HashMap<MockOp, u64>,
    failures: Vec<ScriptedFailure>,
    rest_market_orders: bool,
}

impl MockState {
    /// Count the call and return the scripted error for it, if any
    fn enter(&mut self, op: MockOp) -> ExchangeResult<()> {
        let n = self.calls.entry(op).or_insert(0);
        *n += 1;
        self.scripted(op, false)
    }

    /// Return the error scripted to hit once the current call took effect
    fn leave(&self, op: MockOp) -> ExchangeResult<()> {
        self.scripted(op, true)
    }

    fn scripted(&self, op: MockOp, after_effect: bool) -> ExchangeResult<()> {
        let n = self.calls.get(&op).copied().unwrap_or(0);
        match self
            .failures
            .iter()
            .find(|f| f.op == op && f.after_effect == after_effect && f.calls.contains(&n))
        {
            Some(f) => {
                debug!("mock: {:?} call {} fails with {}", op, n, f.error);
                Err(f.error.clone())
            }
            None => Ok(()),
        }
    }

    fn order_mut(&mut self, order_id: &OrderId) -> Option<&mut MockOrder> {
        self.orders.iter_mut().find(|o| &o.order_id == order_id)
    }

    fn move_price(&mut self, price: Price) {
        self.price = price;
        for order in self.orders.iter_mut().filter(|o| o.status.is_active()) {
            if let Some(fill_price) = order.crossed_at(price) {
                debug!("mock: {} crossed at {}", order.order_id, fill_price);
                order.fill(fill_price);
            }
        }
    }
}

/// Scripted [`ExchangeClient`] for tests and paper trading
pub struct MockExchange {
    state: Mutex<MockState>,
}

impl MockExchange {
    pub fn new(price: Price) -> Self {
        Self {
            state: Mutex::new(MockState {
                price,
                price_script: VecDeque::new(),
                filters: SymbolFilters::default(),
                next_order_id: 1000,
                orders: Vec::new(),
                cancelled: Vec::new(),
                calls: HashMap::new(),
                failures: Vec::new(),
                rest_market_orders: false,
            }),
        }
    }

    pub fn with_filters(self, filters: SymbolFilters) -> Self {
        self.lock().filters = filters;
        self
    }

    /// Acknowledge market orders as NEW and fill them on the next price move
    /// (or [`set_status`](Self::set_status)), like a venue that reports the
    /// fill after the acknowledgement
    pub fn with_resting_market_orders(self) -> Self {
        self.lock().rest_market_orders = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move the market. Resting orders crossed by the new price fill.
    pub fn set_price(&self, price: Price) {
        self.lock().move_price(price);
    }

    /// Queue prices returned (and applied) by successive `current_price` calls.
    /// Once drained the last price stays in effect.
    pub fn push_prices(&self, prices: impl IntoIterator<Item = Price>) {
        self.lock().price_script.extend(prices);
    }

    /// Fail the `nth` call (1-based) of `op`
    pub fn fail_on(&self, op: MockOp, nth: u64, error: ExchangeError) {
        self.fail_on_calls(op, nth..=nth, error);
    }

    /// Fail every call of `op` whose number falls in `calls`
    pub fn fail_on_calls(&self, op: MockOp, calls: RangeInclusive<u64>, error: ExchangeError) {
        self.lock().failures.push(ScriptedFailure {
            op,
            calls,
            error,
            after_effect: false,
        });
    }

    /// Let the `nth` call of `op` take effect, then return `error` as if the
    /// response never arrived
    pub fn lose_response_on(&self, op: MockOp, nth: u64, error: ExchangeError) {
        self.lock().failures.push(ScriptedFailure {
            op,
            calls: nth..=nth,
            error,
            after_effect: true,
        });
    }

    /// Force an order's status. `Filled` fills the full quantity at the
    /// order's limit price, or the market price for market orders.
    pub fn set_status(&self, order_id: &OrderId, status: OrderStatus) -> bool {
        let mut state = self.lock();
        let market = state.price;
        match state.order_mut(order_id) {
            Some(order) => {
                if status == OrderStatus::Filled {
                    let price = order.spec.price().unwrap_or(market);
                    order.fill(price);
                } else {
                    order.status = status;
                }
                true
            }
            None => false,
        }
    }

    pub fn fill_order(&self, order_id: &OrderId) -> bool {
        self.set_status(order_id, OrderStatus::Filled)
    }

    pub fn call_count(&self, op: MockOp) -> u64 {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// All accepted orders, in submission order
    pub fn orders(&self) -> Vec<MockOrder> {
        self.lock().orders.clone()
    }

    pub fn order(&self, order_id: &OrderId) -> Option<MockOrder> {
        self.lock()
            .orders
            .iter()
            .find(|o| &o.order_id == order_id)
            .cloned()
    }

    pub fn placed_orders(&self) -> Vec<OrderSpec> {
        self.lock().orders.iter().map(|o| o.spec.clone()).collect()
    }

    pub fn open_orders(&self) -> Vec<MockOrder> {
        self.lock()
            .orders
            .iter()
            .filter(|o| o.status.is_active())
            .cloned()
            .collect()
    }

    pub fn cancelled_orders(&self) -> Vec<OrderId> {
        self.lock().cancelled.clone()
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn place_order(&self, spec: &OrderSpec) -> ExchangeResult<OrderAck> {
        let mut state = self.lock();
        state.enter(MockOp::PlaceOrder)?;

        if let Some(client_id) = spec.client_order_id() {
            if state
                .orders
                .iter()
                .any(|o| o.spec.client_order_id() == Some(client_id))
            {
                return Err(ExchangeError::rejected(
                    CODE_DUPLICATE_CLIENT_ORDER_ID,
                    "ClientOrderId is duplicated.",
                ));
            }
        }

        let order_id = OrderId::from(state.next_order_id);
        state.next_order_id += 1;

        let mut order = MockOrder {
            order_id,
            spec: spec.clone(),
            status: OrderStatus::New,
            executed_qty: Decimal::ZERO,
            avg_price: None,
            placed_at: Instant::now(),
        };
        if order.spec.order_type() == OrderType::Market && !state.rest_market_orders {
            order.fill(state.price);
        }

        debug!(
            "mock: accepted {} {} {} {} -> {}",
            spec.order_type(),
            spec.side(),
            spec.quantity(),
            spec.symbol(),
            order.status
        );
        let ack = order.ack();
        state.orders.push(order);
        state.leave(MockOp::PlaceOrder)?;
        Ok(ack)
    }

    async fn cancel_order(&self, _symbol: &str, order_id: &OrderId) -> ExchangeResult<bool> {
        let mut state = self.lock();
        state.enter(MockOp::CancelOrder)?;

        let cancelled = match state.order_mut(order_id) {
            Some(order) if order.status.is_active() => {
                order.status = OrderStatus::Canceled;
                true
            }
            _ => false,
        };
        if cancelled {
            state.cancelled.push(order_id.clone());
        }
        Ok(cancelled)
    }

    async fn query_order(&self, _symbol: &str, order_id: &OrderId) -> ExchangeResult<OrderAck> {
        let mut state = self.lock();
        state.enter(MockOp::OrderStatus)?;

        state
            .order_mut(order_id)
            .map(|o| o.ack())
            .ok_or_else(unknown_order)
    }

    async fn query_order_by_client_id(
        &self,
        _symbol: &str,
        client_order_id: &str,
    ) -> ExchangeResult<OrderAck> {
        let mut state = self.lock();
        state.enter(MockOp::OrderLookup)?;

        state
            .orders
            .iter()
            .find(|o| o.spec.client_order_id() == Some(client_order_id))
            .map(MockOrder::ack)
            .ok_or_else(unknown_order)
    }

    async fn list_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<OpenOrder>> {
        let mut state = self.lock();
        state.enter(MockOp::OpenOrders)?;

        Ok(state
            .orders
            .iter()
            .filter(|o| o.spec.symbol() == symbol && o.status.is_active())
            .map(MockOrder::open_order)
            .collect())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<()> {
        let mut state = self.lock();
        state.enter(MockOp::CancelAll)?;

        let mut cancelled = Vec::new();
        for order in state
            .orders
            .iter_mut()
            .filter(|o| o.spec.symbol() == symbol && o.status.is_active())
        {
            order.status = OrderStatus::Canceled;
            cancelled.push(order.order_id.clone());
        }
        debug!("mock: cancelled {} open orders on {}", cancelled.len(), symbol);
        state.cancelled.extend(cancelled);
        Ok(())
    }

    async fn current_price(&self, _symbol: &str) -> ExchangeResult<Price> {
        let mut state = self.lock();
        state.enter(MockOp::CurrentPrice)?;

        if let Some(next) = state.price_script.pop_front() {
            state.move_price(next);
        }
        Ok(state.price)
    }

    async fn symbol_filters(&self, _symbol: &str) -> ExchangeResult<SymbolFilters> {
        let mut state = self.lock();
        state.enter(MockOp::SymbolFilters)?;
        Ok(state.filters)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn unknown_order() -> ExchangeError {
    ExchangeError::rejected(CODE_UNKNOWN_ORDER, "Order does not exist.")
}
