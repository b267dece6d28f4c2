mod order;
mod order_status;
mod order_type;
mod side;
mod time_in_force;

pub use order::{OrderId, OrderSpec};
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use side::{PositionSide, Side};
pub use time_in_force::TimeInForce;
