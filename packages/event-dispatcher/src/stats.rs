//! Per-type delivery counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of one event type's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeStats {
    /// Events accepted into the queue.
    pub enqueued: u64,
    /// Events taken off the queue and fanned out to every handler.
    pub dispatched: u64,
    /// Accepted events that never completed fan-out: no handlers were
    /// registered, a handler panicked on it, or the type's worker had died
    /// while it was queued.
    ///
    /// `enqueued == dispatched + discarded + pending` once no fan-out is in
    /// progress.
    pub discarded: u64,
    /// Events refused at enqueue: the dispatcher was already stopped, or the
    /// type's worker had died.
    pub rejected: u64,
    /// Total `handle` calls that returned normally.
    pub handler_invocations: u64,
    /// Events currently waiting in the queue.
    pub pending: usize,
}

/// Lock-free counters owned by a type slot.
#[derive(Debug, Default)]
pub(crate) struct AtomicTypeStats {
    enqueued: AtomicU64,
    dispatched: AtomicU64,
    discarded: AtomicU64,
    rejected: AtomicU64,
    handler_invocations: AtomicU64,
}

impl AtomicTypeStats {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invocation(&self) {
        self.handler_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.record_discarded_n(1);
    }

    pub fn record_discarded_n(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, pending: usize) -> TypeStats {
        TypeStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            handler_invocations: self.handler_invocations.load(Ordering::Relaxed),
            pending,
        }
    }
}
