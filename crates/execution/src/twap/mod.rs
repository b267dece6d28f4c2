//! Time-weighted order slicing
//!
//! [`SlicePlan`] partitions a parent quantity over time; [`TwapScheduler`]
//! walks the plan against an exchange and records each slice.

mod plan;
mod scheduler;

pub use plan::{PlannedSlice, SlicePlan};
pub use scheduler::{
    SliceOrderKind, TwapConfig, TwapRequest, TwapScheduler, passive_limit_price,
};
