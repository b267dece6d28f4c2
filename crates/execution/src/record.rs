//! Per-slice execution records and the run summary
//!
//! A record starts `Pending` when the plan is built and is only mutated by
//! the scheduler loop that owns it:
//!
//! ```text
//! Pending ──► Submitted ──► Filled
//!    │            └───────► Cancelled
//!    ├──► Filled     (marketable order filled on submission)
//!    ├──► Failed     (rejection, or retries exhausted)
//!    └──► Cancelled  (run cancelled before the slice fired)
//! ```

use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tranche_core::{OrderId, OrderStatus, Price, Quantity, Side, Timestamp};
use tranche_ports::OrderAck;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SliceState {
    Pending,
    Submitted,
    Filled,
    Failed,
    Cancelled,
}

impl SliceState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SliceState::Filled | SliceState::Failed | SliceState::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub index: usize,
    /// Offset from the start of the run at which the slice is due
    pub scheduled_offset: Duration,
    pub quantity: Quantity,
    pub client_order_id: String,
    /// Limit price derived at submission time (limit slices only)
    pub limit_price: Option<Price>,
    pub submitted_at: Option<Timestamp>,
    pub order_id: Option<OrderId>,
    pub state: SliceState,
    pub filled_qty: Quantity,
    pub avg_price: Option<Price>,
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn pending(
        index: usize,
        scheduled_offset: Duration,
        quantity: Quantity,
        client_order_id: String,
    ) -> Self {
        Self {
            index,
            scheduled_offset,
            quantity,
            client_order_id,
            limit_price: None,
            submitted_at: None,
            order_id: None,
            state: SliceState::Pending,
            filled_qty: Decimal::ZERO,
            avg_price: None,
            error: None,
        }
    }

    /// Apply the exchange acknowledgement of this slice's order
    pub fn mark_submitted(&mut self, at: Timestamp, ack: &OrderAck) {
        if self.state != SliceState::Pending {
            return;
        }
        self.submitted_at = Some(at);
        self.order_id = Some(ack.order_id.clone());
        self.filled_qty = ack.executed_qty;
        self.avg_price = ack.avg_price;
        self.state = match ack.status {
            OrderStatus::Filled => SliceState::Filled,
            OrderStatus::New | OrderStatus::PartiallyFilled => SliceState::Submitted,
            OrderStatus::Canceled | OrderStatus::Expired => SliceState::Cancelled,
            OrderStatus::Rejected => {
                self.error = Some("rejected on submission".to_string());
                SliceState::Failed
            }
        };
    }

    pub fn mark_failed(&mut self, at: Timestamp, error: impl Into<String>) {
        if self.state != SliceState::Pending {
            return;
        }
        self.submitted_at = Some(at);
        self.state = SliceState::Failed;
        self.error = Some(error.into());
    }

    /// Cancel a slice the run never reached
    pub fn mark_cancelled(&mut self) {
        if self.state == SliceState::Pending {
            self.state = SliceState::Cancelled;
        }
    }

    /// Apply a later query of a resting slice's order. The reported fill
    /// wins; a fill reported without a price is taken at the limit price.
    pub fn apply_report(&mut self, report: &OrderAck) {
        if self.state != SliceState::Submitted {
            return;
        }
        if report.executed_qty > Decimal::ZERO {
            self.filled_qty = report.executed_qty;
        }
        if report.avg_price.is_some() {
            self.avg_price = report.avg_price;
        }
        match report.status {
            OrderStatus::Filled => {
                self.state = SliceState::Filled;
                if self.filled_qty == Decimal::ZERO {
                    self.filled_qty = self.quantity;
                }
                if self.avg_price.is_none() {
                    self.avg_price = self.limit_price;
                }
            }
            OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::Rejected => {
                self.state = SliceState::Cancelled;
            }
            OrderStatus::New | OrderStatus::PartiallyFilled => {}
        }
    }

    /// True once an order for this slice reached (or was refused by) the exchange
    pub fn was_attempted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

/// Outcome of a TWAP run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub symbol: String,
    pub side: Side,
    pub total_slices: usize,
    pub filled_slices: usize,
    pub failed_slices: usize,
    pub cancelled_slices: usize,
    /// Slices still resting on the book when the run ended
    pub open_slices: usize,
    pub total_quantity_filled: Quantity,
    /// Volume-weighted average over all fills
    pub average_fill_price: Option<Price>,
    pub min_fill_price: Option<Price>,
    pub max_fill_price: Option<Price>,
    /// The run was stopped before its schedule completed
    pub stopped_early: bool,
    pub records: Vec<ExecutionRecord>,
}

impl ExecutionSummary {
    pub fn from_records(
        symbol: impl Into<String>,
        side: Side,
        records: Vec<ExecutionRecord>,
        stopped_early: bool,
    ) -> Self {
        let count = |state: SliceState| records.iter().filter(|r| r.state == state).count();

        let fills: Vec<(Quantity, Price)> = records
            .iter()
            .filter(|r| r.filled_qty > Decimal::ZERO)
            .filter_map(|r| r.avg_price.map(|p| (r.filled_qty, p)))
            .collect();
        let total_quantity_filled: Quantity = records.iter().map(|r| r.filled_qty).sum();
        let filled_with_price: Quantity = fills.iter().map(|(q, _)| *q).sum();
        let notional: Decimal = fills.iter().map(|(q, p)| q * p).sum();
        let average_fill_price =
            (filled_with_price > Decimal::ZERO).then(|| (notional / filled_with_price).normalize());

        Self {
            symbol: symbol.into(),
            side,
            total_slices: records.len(),
            filled_slices: count(SliceState::Filled),
            failed_slices: count(SliceState::Failed),
            cancelled_slices: count(SliceState::Cancelled),
            open_slices: count(SliceState::Submitted),
            total_quantity_filled,
            average_fill_price,
            min_fill_price: fills.iter().map(|(_, p)| *p).min(),
            max_fill_price: fills.iter().map(|(_, p)| *p).max(),
            stopped_early,
            records,
        }
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.records
            .iter()
            .filter(|r| r.state == SliceState::Failed)
            .map(|r| r.index)
            .collect()
    }

    /// Number of slices that reached the exchange, successfully or not
    pub fn attempted_slices(&self) -> usize {
        self.records.iter().filter(|r| r.was_attempted()).count()
    }
}
