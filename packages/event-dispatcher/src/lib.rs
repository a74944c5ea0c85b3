//! # Event Dispatcher
//!
//! An in-process, typed publish/dispatch engine. Producers submit typed
//! events; one worker thread per event type drains that type's queue and fans
//! each event out to every handler registered for the type.
//!
//! ## Core Concepts
//!
//! - [`EventType`] = a closed enumeration of tags; each tag gets its own queue
//!   and worker
//! - [`Payload`] = a tagged union with one variant per tag
//! - [`Handler`] = a capability invoked with every payload of the types it is
//!   registered for
//! - [`Dispatcher`] = owns the queues, the handler registry and the workers
//!
//! ## Architecture
//!
//! ```text
//! producer threads
//!     │ enqueue(type, payload)
//!     ▼
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │ queue A      │  │ queue B      │  │ queue C      │   one slot per type,
//! │ + condvar    │  │ + condvar    │  │ + condvar    │   built at construction
//! └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!        ▼                 ▼                 ▼
//!   worker A          worker B          worker C         one OS thread per type
//!        │                 │                 │
//!        ▼                 ▼                 ▼
//!   H1 → H2 → …       H3 → …            (none: discard)  registration order
//! ```
//!
//! ## Key Invariants
//!
//! 1. **FIFO per type** - handlers see events of one type in enqueue order
//! 2. **No cross-type ordering** - types are drained independently
//! 3. **Sequential fan-out** - all handlers finish one event before the next
//! 4. **Snapshot registry** - a registration during dispatch applies to later events
//! 5. **Drain on stop** - `stop()` returns only after every queued event is handled
//! 6. **No retention** - an event is dropped as soon as its fan-out completes
//!
//! ## Failure Model
//!
//! A panic escaping a handler is not caught. It terminates the worker of that
//! event type: the event being handled and those still queued are discarded
//! with a logged error, later enqueues of the type are rejected, and every
//! other type keeps running. Handlers that can fail
//! should handle their own errors.
//!
//! ## Example
//!
//! ```ignore
//! use event_dispatcher::{Dispatcher, FanoutMode};
//!
//! let dispatcher = Dispatcher::<SensorData>::builder()
//!     .fanout(FanoutMode::Concurrent)
//!     .with_handler(Sensor::Temperature, TemperatureAlarm::new(30.0))
//!     .with_handler(Sensor::Temperature, TemperatureLog::default())
//!     .build();
//!
//! dispatcher.start()?;
//! dispatcher.add_event(SensorData::Temperature(31.2));
//! dispatcher.stop();
//! ```
//!
//! ## What This Is Not
//!
//! - Cross-process or durable delivery
//! - Prioritized across event types
//! - Bounded: queues grow without backpressure

// Core modules
mod config;
mod core;
mod dispatcher;
mod error;
mod handler;
mod queue;
mod stats;
mod worker;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Stress tests (test-only)
#[cfg(test)]
mod stress_tests;

pub use crate::config::{
    DispatcherConfig, FanoutMode, ParseFanoutModeError, DEFAULT_THREAD_NAME_PREFIX,
};
pub use crate::core::{Event, EventType, Payload};
pub use crate::dispatcher::{Dispatcher, DispatcherBuilder, State};
pub use crate::error::DispatchError;
pub use crate::handler::Handler;
pub use crate::stats::TypeStats;
