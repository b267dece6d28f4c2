use serde::Serialize;
use tranche_core::{OrderId, OrderStatus, Price, Quantity, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelState {
    /// Planned, not yet sent
    Pending,
    /// Resting on the book
    Open,
    Filled,
    /// Submission failed; never re-grids
    Failed,
    /// Cancelled by shutdown, or cancelled/expired/rejected at the exchange
    Cancelled,
}

/// A price point of the ladder and the order placed there
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridLevel {
    /// Position in the ladder, 0 = lowest price
    pub index: usize,
    pub price: Price,
    /// Assigned once against the market price at planning time
    pub side: Option<Side>,
    pub quantity: Quantity,
    pub client_order_id: Option<String>,
    pub order_id: Option<OrderId>,
    pub state: LevelState,
    pub error: Option<String>,
}

impl GridLevel {
    pub fn new(index: usize, price: Price, quantity: Quantity) -> Self {
        Self {
            index,
            price,
            side: None,
            quantity,
            client_order_id: None,
            order_id: None,
            state: LevelState::Pending,
            error: None,
        }
    }

    /// Counter-order placed at a ladder level after a fill next to it
    pub fn counter(template: &GridLevel, side: Side) -> Self {
        Self {
            side: Some(side),
            ..Self::new(template.index, template.price, template.quantity)
        }
    }

    pub fn filled(&self) -> bool {
        self.state == LevelState::Filled
    }

    pub fn is_open(&self) -> bool {
        self.state == LevelState::Open
    }

    pub(crate) fn mark_open(&mut self, order_id: OrderId) {
        self.order_id = Some(order_id);
        self.state = LevelState::Open;
    }

    pub(crate) fn mark_failed(&mut self, error: impl Into<String>) {
        self.state = LevelState::Failed;
        self.error = Some(error.into());
    }

    /// Apply an exchange status to an open order. Returns true on a new fill.
    pub(crate) fn apply_status(&mut self, status: OrderStatus) -> bool {
        if self.state != LevelState::Open {
            return false;
        }
        match status {
            OrderStatus::Filled => {
                self.state = LevelState::Filled;
                true
            }
            OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::Rejected => {
                self.state = LevelState::Cancelled;
                false
            }
            OrderStatus::New | OrderStatus::PartiallyFilled => false,
        }
    }
}
