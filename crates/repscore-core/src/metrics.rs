//! Atomic counters for routing and feedback activity.
//!
//! Each [`RepScoreService`](crate::service::RepScoreService) owns one
//! [`Metrics`]. Counters are incremented silently at the call site; call
//! [`Metrics::flush`] to emit current values as a single `tracing::info!`
//! event (e.g. at the end of a simulation).

use std::sync::atomic::{AtomicU64, Ordering};

/// Lightweight atomic counters, no allocations, no locking.
#[derive(Debug)]
pub struct Metrics {
    routes_selected: AtomicU64,
    routes_blocked: AtomicU64,
    feedback_committed: AtomicU64,
    feedback_rejected: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            routes_selected: AtomicU64::new(0),
            routes_blocked: AtomicU64::new(0),
            feedback_committed: AtomicU64::new(0),
            feedback_rejected: AtomicU64::new(0),
        }
    }

    pub fn inc_routes_selected(&self) {
        self.routes_selected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "routes_selected", "counter incremented");
    }

    pub fn inc_routes_blocked(&self) {
        self.routes_blocked.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "routes_blocked", "counter incremented");
    }

    pub fn inc_feedback_committed(&self) {
        self.feedback_committed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "feedback_committed", "counter incremented");
    }

    pub fn inc_feedback_rejected(&self) {
        self.feedback_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "feedback_rejected", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            routes_selected = self.routes_selected(),
            routes_blocked = self.routes_blocked(),
            feedback_committed = self.feedback_committed(),
            feedback_rejected = self.feedback_rejected(),
        );
    }

    pub fn routes_selected(&self) -> u64 {
        self.routes_selected.load(Ordering::Relaxed)
    }

    pub fn routes_blocked(&self) -> u64 {
        self.routes_blocked.load(Ordering::Relaxed)
    }

    pub fn feedback_committed(&self) -> u64 {
        self.feedback_committed.load(Ordering::Relaxed)
    }

    pub fn feedback_rejected(&self) -> u64 {
        self.feedback_rejected.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.routes_selected.store(0, Ordering::Relaxed);
        self.routes_blocked.store(0, Ordering::Relaxed);
        self.feedback_committed.store(0, Ordering::Relaxed);
        self.feedback_rejected.store(0, Ordering::Relaxed);
    }
}
