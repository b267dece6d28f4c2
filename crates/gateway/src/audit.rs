//! Audit sinks
//!
//! [`LogAuditSink`] renders each event as a single JSON line on the `audit`
//! log target, so `RUST_LOG=audit=info` isolates the order trail.
//! [`MemoryAuditSink`] keeps events in memory for assertions.

use log::Level;
use std::sync::{Mutex, MutexGuard};
use tranche_ports::{AuditEvent, AuditLevel, AuditSink};

pub const AUDIT_TARGET: &str = "audit";

#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl LogAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for LogAuditSink {
    fn record(&self, event: AuditEvent) {
        let level = match event.level {
            AuditLevel::Info => Level::Info,
            AuditLevel::Warn => Level::Warn,
            AuditLevel::Error => Level::Error,
        };
        match serde_json::to_string(&event) {
            Ok(line) => log::log!(target: AUDIT_TARGET, level, "{}", line),
            Err(e) => log::error!(
                target: AUDIT_TARGET,
                "failed to serialize audit event {}/{}: {}",
                event.component,
                event.event,
                e
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AuditEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.lock().clone()
    }

    /// Events with the given name, in emission order
    pub fn named(&self, event: &str) -> Vec<AuditEvent> {
        self.lock()
            .iter()
            .filter(|e| e.event == event)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.lock().push(event);
    }
}
