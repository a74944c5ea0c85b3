//! Testing utilities for code built on the dispatcher.
//!
//! # Feature Flag
//!
//! This module is only available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! event-dispatcher = { version = "0.1", features = ["testing"] }
//! ```
//!
//! ## Recording deliveries
//!
//! ```ignore
//! use event_dispatcher::testing::RecordingHandler;
//!
//! let recorder = RecordingHandler::new();
//! dispatcher.register(Kind::Orders, recorder.clone());
//!
//! dispatcher.start()?;
//! dispatcher.add_event(Data::Order(1));
//! dispatcher.stop();
//!
//! assert_eq!(recorder.recorded(), vec![Data::Order(1)]);
//! ```
//!
//! ## Waiting for a number of deliveries
//!
//! ```ignore
//! use event_dispatcher::testing::CountDownLatch;
//!
//! let latch = CountDownLatch::new(3);
//! let l = latch.clone();
//! dispatcher.register(Kind::Audit, move |_: &Data| l.count_down());
//!
//! // ... enqueue three audit events ...
//!
//! assert!(latch.wait_timeout(Duration::from_secs(1)));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::handler::Handler;

/// Handler that stores a clone of every payload it receives.
///
/// Clones share the same buffer, so register one clone and keep another to
/// inspect.
pub struct RecordingHandler<P> {
    recorded: Arc<Mutex<Vec<P>>>,
}

impl<P> RecordingHandler<P> {
    pub fn new() -> Self {
        Self {
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of payloads received so far.
    pub fn len(&self) -> usize {
        self.recorded.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.lock().is_empty()
    }
}

impl<P: Clone> RecordingHandler<P> {
    /// Copy of every payload received, in delivery order.
    pub fn recorded(&self) -> Vec<P> {
        self.recorded.lock().clone()
    }
}

impl<P> Clone for RecordingHandler<P> {
    fn clone(&self) -> Self {
        Self {
            recorded: self.recorded.clone(),
        }
    }
}

impl<P> Default for RecordingHandler<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + Send + 'static> Handler<P> for RecordingHandler<P> {
    fn handle(&self, payload: &P) {
        self.recorded.lock().push(payload.clone());
    }

    fn name(&self) -> &'static str {
        "RecordingHandler"
    }
}

/// Blocking countdown latch: threads wait until `count_down` has been called
/// the configured number of times.
#[derive(Clone)]
pub struct CountDownLatch {
    inner: Arc<LatchInner>,
}

struct LatchInner {
    remaining: Mutex<usize>,
    zero: Condvar,
}

impl CountDownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(LatchInner {
                remaining: Mutex::new(count),
                zero: Condvar::new(),
            }),
        }
    }

    /// Decrement the count, waking waiters when it reaches zero.
    pub fn count_down(&self) {
        let mut remaining = self.inner.remaining.lock();
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.inner.zero.notify_all();
            }
        }
    }

    pub fn remaining(&self) -> usize {
        *self.inner.remaining.lock()
    }

    /// Wait until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `true` if the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut remaining = self.inner.remaining.lock();
        while *remaining > 0 {
            if self
                .inner
                .zero
                .wait_until(&mut remaining, deadline)
                .timed_out()
            {
                return *remaining == 0;
            }
        }
        true
    }
}

impl std::fmt::Debug for CountDownLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountDownLatch")
            .field("remaining", &self.remaining())
            .finish()
    }
}
