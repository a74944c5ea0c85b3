//! Per-type event queue.
//!
//! Each event type owns one [`EventQueue`]: an unbounded FIFO guarded by its
//! own mutex and paired with its own condition variable. Producers never
//! contend with other types' queues, and a worker only ever waits on its own.
//!
//! # Lifecycle
//!
//! ```text
//! open ──shutdown()──► draining ──(empty)──► closed
//!   │                                          ▲
//!   └──────────────close() (worker died)───────┘
//! ```
//!
//! The worker closes the queue itself while holding the lock, at the moment
//! it observes "shutdown and empty". A push either lands before that point
//! (and is drained) or is refused; it is never silently stranded.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::core::{Event, Payload};

struct QueueState<P: Payload> {
    events: VecDeque<Event<P>>,
    next_sequence: u64,
    shutdown: bool,
    closed: bool,
}

/// Unbounded FIFO with a wait/notify primitive for a single consumer.
pub(crate) struct EventQueue<P: Payload> {
    state: Mutex<QueueState<P>>,
    available: Condvar,
}

impl<P: Payload> EventQueue<P> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                events: VecDeque::new(),
                next_sequence: 0,
                shutdown: false,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append an event and wake the consumer.
    ///
    /// Returns the event's sequence number, or hands the payload back if the
    /// queue no longer has a consumer.
    pub fn push(&self, event_type: P::Type, payload: P) -> Result<u64, P> {
        let sequence = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(payload);
            }
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.events.push_back(Event::new(event_type, payload, sequence));
            sequence
        };
        self.available.notify_one();
        Ok(sequence)
    }

    /// Block until an event is available or the queue is shut down and empty.
    ///
    /// Returns `None` exactly once per queue lifetime: the call that observes
    /// shutdown with nothing left also closes the queue.
    pub fn pop_or_wait(&self) -> Option<Event<P>> {
        let mut state = self.state.lock();
        loop {
            if let Some(event) = state.events.pop_front() {
                return Some(event);
            }
            if state.shutdown || state.closed {
                state.closed = true;
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Ask the consumer to drain and exit.
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.available.notify_all();
    }

    /// Refuse further pushes and drop whatever is still queued.
    ///
    /// Returns the number of events dropped.
    pub fn close(&self) -> usize {
        let dropped = {
            let mut state = self.state.lock();
            state.closed = true;
            let dropped = state.events.len();
            state.events.clear();
            dropped
        };
        self.available.notify_all();
        dropped
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
