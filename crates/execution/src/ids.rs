use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Client order ids of the form `{prefix}-{run}-{n}`
///
/// `run` is the first eight hex digits of a v4 UUID, fixed for the lifetime
/// of the generator, and `n` counts up from zero.
#[derive(Debug)]
pub struct ClientOrderIds {
    prefix: String,
    run: String,
    next: AtomicU64,
}

impl ClientOrderIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        let run = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            prefix: prefix.into(),
            run,
            next: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", self.prefix, self.run, n)
    }
}
