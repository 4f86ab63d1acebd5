//! Global atomic counters for recorder diagnostics.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (the recorder does so after every dump).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    messages_ingested: AtomicU64,
    messages_dropped: AtomicU64,
    messages_exported: AtomicU64,
    dumps_completed: AtomicU64,
    dumps_failed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            messages_ingested: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            messages_exported: AtomicU64::new(0),
            dumps_completed: AtomicU64::new(0),
            dumps_failed: AtomicU64::new(0),
        }
    }

    /// Count one buffered message and return the new total.
    pub fn inc_messages_ingested(&self) -> u64 {
        self.messages_ingested.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one message dropped by the gate or a pending subscription.
    pub fn inc_messages_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_messages_exported(&self, n: u64) {
        self.messages_exported.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_dumps_completed(&self) {
        self.dumps_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "dumps_completed", "counter incremented");
    }

    pub fn inc_dumps_failed(&self) {
        self.dumps_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "dumps_failed", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            messages_ingested = self.messages_ingested(),
            messages_dropped = self.messages_dropped(),
            messages_exported = self.messages_exported(),
            dumps_completed = self.dumps_completed(),
            dumps_failed = self.dumps_failed(),
        );
    }

    pub fn messages_ingested(&self) -> u64 {
        self.messages_ingested.load(Ordering::Relaxed)
    }

    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    pub fn messages_exported(&self) -> u64 {
        self.messages_exported.load(Ordering::Relaxed)
    }

    pub fn dumps_completed(&self) -> u64 {
        self.dumps_completed.load(Ordering::Relaxed)
    }

    pub fn dumps_failed(&self) -> u64 {
        self.dumps_failed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.messages_ingested.store(0, Ordering::Relaxed);
        self.messages_dropped.store(0, Ordering::Relaxed);
        self.messages_exported.store(0, Ordering::Relaxed);
        self.dumps_completed.store(0, Ordering::Relaxed);
        self.dumps_failed.store(0, Ordering::Relaxed);
    }
}
