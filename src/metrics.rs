use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Collaborator for recording operational measurements.
///
/// Held in managed state and passed explicitly to the components that
/// produce measurements, so tests can substitute their own recorder.
pub trait Metrics: Send + Sync {
    /// Record a completed HTTP response and its latency.
    fn record_response(&self, status: u16, elapsed: Duration);

    /// Record a storage operation against a named collection.
    fn record_storage_op(&self, op: &str, collection: &str, elapsed: Duration);
}

/// The default recorder: plain monotonic counters.
#[derive(Debug, Default)]
pub struct CounterMetrics {
    responses: AtomicU64,
    client_errors: AtomicU64,
    server_errors: AtomicU64,
    storage_ops: AtomicU64,
}

impl CounterMetrics {
    pub fn responses(&self) -> u64 {
        self.responses.load(Ordering::Relaxed)
    }

    pub fn client_errors(&self) -> u64 {
        self.client_errors.load(Ordering::Relaxed)
    }

    pub fn server_errors(&self) -> u64 {
        self.server_errors.load(Ordering::Relaxed)
    }

    pub fn storage_ops(&self) -> u64 {
        self.storage_ops.load(Ordering::Relaxed)
    }
}

impl Metrics for CounterMetrics {
    fn record_response(&self, status: u16, _elapsed: Duration) {
        self.responses.fetch_add(1, Ordering::Relaxed);
        match status {
            400..=499 => {
                self.client_errors.fetch_add(1, Ordering::Relaxed);
            }
            500..=599 => {
                self.server_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn record_storage_op(&self, _op: &str, _collection: &str, _elapsed: Duration) {
        self.storage_ops.fetch_add(1, Ordering::Relaxed);
    }
}
