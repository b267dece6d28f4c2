//! Tranche Clock Infrastructure
//!
//! Time sources behind the [`Clock`] port:
//!
//! - [`SystemClock`]: wall-clock time, used by the binary
//! - [`FixedClock`]: frozen time that only moves when told to, used by tests
//!
//! ## Usage
//!
//! ```ignore
//! use tranche_clock::{FixedClock, SystemClock};
//! use chrono::Duration;
//!
//! let clock = FixedClock::at(start);
//! clock.advance(Duration::seconds(120));
//! ```

mod fixed;
mod system;

pub use fixed::FixedClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use tranche_ports::Clock;
