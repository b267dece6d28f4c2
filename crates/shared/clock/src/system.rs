use chrono::Utc;
use tranche_core::Timestamp;
use tranche_ports::Clock;

/// Wall-clock time for live and paper runs
///
/// Only stamps audit events and slice submission times. Slice and poll
/// scheduling run on tokio's monotonic clock, so an NTP step never shifts a
/// schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "system"
    }
}
