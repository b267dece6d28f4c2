use chrono::{Duration, Utc};
use std::sync::RwLock;
use tranche_core::Timestamp;
use tranche_ports::Clock;

/// Clock frozen at a point in time
///
/// Only moves when [`advance`](FixedClock::advance) or [`set`](FixedClock::set)
/// is called, which keeps audit timestamps deterministic in tests.
pub struct FixedClock {
    current: RwLock<Timestamp>,
}

impl FixedClock {
    /// Freeze at the given time
    pub fn at(time: Timestamp) -> Self {
        Self {
            current: RwLock::new(time),
        }
    }

    /// Freeze at the current wall-clock time
    pub fn now_frozen() -> Self {
        Self::at(Utc::now())
    }

    /// Jump forward by a duration
    pub fn advance(&self, by: Duration) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }

    /// Jump to an absolute time
    pub fn set(&self, time: Timestamp) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = time;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
