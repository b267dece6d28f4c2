use serde::Serialize;
use serde_json::{Map, Value};
use tranche_core::Timestamp;

/// Severity of an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

/// One structured audit record: what happened to which order, and when
///
/// Records are written for humans and log shippers; nothing in the
/// toolkit reads them back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub timestamp: Timestamp,
    /// Emitting component, e.g. `twap` or `grid`
    pub component: String,
    pub level: AuditLevel,
    /// Short event name, e.g. `slice_submitted`
    pub event: String,
    pub attributes: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(
        timestamp: Timestamp,
        component: impl Into<String>,
        level: AuditLevel,
        event: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            component: component.into(),
            level,
            event: event.into(),
            attributes: Map::new(),
        }
    }

    pub fn info(timestamp: Timestamp, component: impl Into<String>, event: impl Into<String>) -> Self {
        Self::new(timestamp, component, AuditLevel::Info, event)
    }

    pub fn warn(timestamp: Timestamp, component: impl Into<String>, event: impl Into<String>) -> Self {
        Self::new(timestamp, component, AuditLevel::Warn, event)
    }

    pub fn error(timestamp: Timestamp, component: impl Into<String>, event: impl Into<String>) -> Self {
        Self::new(timestamp, component, AuditLevel::Error, event)
    }

    /// Attach an attribute. Values that fail to serialize are stored as null.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Append-only sink for audit records
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}
