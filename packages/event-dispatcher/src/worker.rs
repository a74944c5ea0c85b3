//! Per-type slots and the worker loop.
//!
//! Every event type gets one [`TypeSlot`] holding its queue, handler list and
//! counters. All slots are created together when the dispatcher is built,
//! keyed by [`EventType::all`], and the slot map is never mutated afterwards,
//! so producers and workers look slots up without any lock.
//!
//! A worker owns nothing but an `Arc` to the shared slots and the type it
//! serves:
//!
//! ```text
//! loop {
//!     pop_or_wait()  ── None (shutdown + empty) ──► exit
//!        │
//!        ▼ Some(event)
//!     snapshot handlers ──► handle(&payload) for each, in order
//! }
//! ```

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, info_span, trace};

use crate::config::FanoutMode;
use crate::core::{Event, EventType, Payload};
use crate::handler::HandlerList;
use crate::queue::EventQueue;
use crate::stats::AtomicTypeStats;

/// Everything the dispatcher keeps for one event type.
pub(crate) struct TypeSlot<P: Payload> {
    pub event_type: P::Type,
    pub queue: EventQueue<P>,
    pub handlers: HandlerList<P>,
    pub stats: AtomicTypeStats,
    /// Set when the worker for this type died from a handler panic.
    pub failed: AtomicBool,
}

impl<P: Payload> TypeSlot<P> {
    fn new(event_type: P::Type) -> Self {
        Self {
            event_type,
            queue: EventQueue::new(),
            handlers: HandlerList::new(),
            stats: AtomicTypeStats::default(),
            failed: AtomicBool::new(false),
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

/// State shared between the dispatcher handle and its workers.
pub(crate) struct Shared<P: Payload> {
    slots: HashMap<P::Type, TypeSlot<P>>,
    fanout: FanoutMode,
    /// Held across fan-out in [`FanoutMode::Serialized`]; unused otherwise.
    fanout_lock: Mutex<()>,
}

impl<P: Payload> Shared<P> {
    pub fn new(fanout: FanoutMode) -> Self {
        let slots = P::Type::all()
            .iter()
            .map(|&event_type| (event_type, TypeSlot::new(event_type)))
            .collect();

        Self {
            slots,
            fanout,
            fanout_lock: Mutex::new(()),
        }
    }

    pub fn slot(&self, event_type: P::Type) -> Option<&TypeSlot<P>> {
        self.slots.get(&event_type)
    }

    pub fn slots(&self) -> impl Iterator<Item = &TypeSlot<P>> {
        self.slots.values()
    }

    /// Invoke every handler registered for the event's type, in order.
    fn fan_out(&self, slot: &TypeSlot<P>, event: Event<P>) {
        let handlers = slot.handlers.snapshot();
        if handlers.is_empty() {
            trace!(
                event_type = slot.event_type.name(),
                sequence = event.sequence(),
                "no handlers registered, discarding event"
            );
            slot.stats.record_discarded();
            return;
        }

        let _serial = match self.fanout {
            FanoutMode::Serialized => Some(self.fanout_lock.lock()),
            FanoutMode::Concurrent => None,
        };

        trace!(
            event_type = slot.event_type.name(),
            sequence = event.sequence(),
            handlers = handlers.len(),
            "dispatching event"
        );

        let payload = event.payload();
        for handler in handlers.iter() {
            trace!(handler = handler.name(), "invoking handler");
            handler.handle(payload);
            slot.stats.record_invocation();
        }

        slot.stats.record_dispatched();
    }
}

/// Marks the slot as failed if the worker unwinds out of a handler.
struct PanicGuard<'a, P: Payload> {
    slot: &'a TypeSlot<P>,
    /// Set while an event taken off the queue is being fanned out.
    in_flight: Cell<bool>,
}

impl<P: Payload> Drop for PanicGuard<'_, P> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }

        self.slot.failed.store(true, Ordering::Release);
        let dropped = self.slot.queue.close() as u64;
        let in_flight = u64::from(self.in_flight.get());
        self.slot.stats.record_discarded_n(dropped + in_flight);

        error!(
            event_type = self.slot.event_type.name(),
            dropped_events = dropped,
            in_flight,
            "handler panicked; worker terminated and no further events of this type will be processed"
        );
    }
}

/// Body of a worker thread: drain the queue for `event_type` until shutdown.
pub(crate) fn run<P: Payload>(shared: &Shared<P>, event_type: P::Type) {
    let span = info_span!("worker", event_type = event_type.name());
    let _enter = span.enter();

    let Some(slot) = shared.slot(event_type) else {
        error!("no slot for event type, worker exiting");
        return;
    };

    debug!(thread = ?thread::current().id(), "worker started");
    let guard = PanicGuard {
        slot,
        in_flight: Cell::new(false),
    };

    while let Some(event) = slot.queue.pop_or_wait() {
        guard.in_flight.set(true);
        shared.fan_out(slot, event);
        guard.in_flight.set(false);
    }

    debug!("queue drained, worker exiting");
}

pub(crate) fn extract_panic_message(panic_info: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
