//! The daemon side of the backend contract: flush and status events.

use crate::metrics::MetricSnapshot;

/// Status sink handed to backends: `(error, backend, stat, value)`.
pub type StatusEmit<'a> = dyn FnMut(Option<&dyn std::error::Error>, &str, &str, u64) + 'a;

pub type FlushHandler = Box<dyn Fn(u64, &MetricSnapshot) + Send + Sync>;
pub type StatusHandler = Box<dyn Fn(&mut StatusEmit<'_>) + Send + Sync>;

/// Where a backend subscribes its handlers during init.
pub trait EventSource {
    fn on_flush(&mut self, handler: FlushHandler);
    fn on_status(&mut self, handler: StatusHandler);
}

/// In-process event source. Handlers run synchronously in subscription order.
#[derive(Default)]
pub struct EventBus {
    flush: Vec<FlushHandler>,
    status: Vec<StatusHandler>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// `timestamp` is in seconds.
    pub fn emit_flush(&self, timestamp: u64, snapshot: &MetricSnapshot) {
        for handler in &self.flush {
            handler(timestamp, snapshot);
        }
    }

    pub fn emit_status(&self, emit: &mut StatusEmit<'_>) {
        for handler in &self.status {
            handler(emit);
        }
    }

    pub fn subscribers(&self) -> (usize, usize) {
        (self.flush.len(), self.status.len())
    }
}

impl EventSource for EventBus {
    fn on_flush(&mut self, handler: FlushHandler) {
        self.flush.push(handler);
    }

    fn on_status(&mut self, handler: StatusHandler) {
        self.status.push(handler);
    }
}
