//! Tranche Execution
//!
//! Strategies that turn one trading intent into a sequence of exchange
//! orders:
//! - **TWAP**: a parent quantity sliced evenly over time, slices sent strictly
//!   one after another
//! - **Grid**: a static ladder of resting limits that re-grids on fills
//! - **Direct orders**: market, limit, stop-limit and emulated OCO brackets
//!
//! Every strategy takes its collaborators explicitly: an
//! [`ExchangeClient`](tranche_ports::ExchangeClient) (normally wrapped in a
//! retrying decorator), an [`AuditSink`](tranche_ports::AuditSink) and a
//! [`Clock`](tranche_ports::Clock). Long-running loops stop cooperatively
//! through a [`CancelToken`].
//!
//! ## Failure model
//!
//! Bad input aborts a run before any order is sent. Once a run has started,
//! a failed slice or level is recorded and the run carries on; the summary
//! reports what failed.

pub mod cancel;
pub mod error;
pub mod grid;
pub mod ids;
pub mod orders;
pub mod record;
pub mod twap;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use grid::{GridConfig, GridLevel, GridPlanner, GridRequest, GridRunState, GridRunner, LevelState};
pub use orders::{OcoOrders, OcoOutcome, OcoRequest, OrderPlacer};
pub use record::{ExecutionRecord, ExecutionSummary, SliceState};
pub use twap::{SliceOrderKind, SlicePlan, TwapConfig, TwapRequest, TwapScheduler};
