//! Grid trading
//!
//! [`GridPlanner`] computes a static ladder of price levels; [`GridRunner`]
//! places it, re-grids on fills and tears it down on cancellation.

mod level;
mod planner;
mod runner;

pub use level::{GridLevel, LevelState};
pub use planner::GridPlanner;
pub use runner::{GridConfig, GridRequest, GridRunState, GridRunner};
