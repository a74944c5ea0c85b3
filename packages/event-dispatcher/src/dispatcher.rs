//! The dispatcher: lifecycle, registration and enqueueing.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()──► Running ──stop()──► Stopping ──(all joined)──► Stopped
//!   │                                                                 ▲
//!   └────────────────start() fails to spawn a worker──────────────────┘
//! ```
//!
//! - Per-type queues, handler lists and counters exist from construction.
//!   Events enqueued while `Idle` wait in their queues and are delivered
//!   once the workers start.
//! - `start()` spawns every worker on the calling thread before it returns.
//! - `stop()` asks every worker to drain its queue, then joins them all.
//!   One caller does the joining; concurrent callers wait until it is done.
//!   It is a no-op when the dispatcher never started or is already stopped.
//! - A `stop()` issued from a handler only signals shutdown: a worker cannot
//!   join itself or the workers that may be waiting on it. The dispatcher
//!   stays `Stopping` until `stop()` is called from another thread (or the
//!   dispatcher is dropped), which joins every worker.
//! - `Stopped` is terminal.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use crate::config::{DispatcherConfig, FanoutMode};
use crate::core::{EventType, Payload};
use crate::error::DispatchError;
use crate::handler::Handler;
use crate::stats::TypeStats;
use crate::worker::{self, extract_panic_message, Shared};

/// Lifecycle state of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed; no workers yet. Events accumulate.
    Idle,
    /// Workers are running.
    Running,
    /// Shutdown signalled; workers are draining or waiting to be joined.
    Stopping,
    /// All workers have exited. Terminal.
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "idle"),
            State::Running => write!(f, "running"),
            State::Stopping => write!(f, "stopping"),
            State::Stopped => write!(f, "stopped"),
        }
    }
}

struct WorkerHandle {
    type_name: &'static str,
    handle: JoinHandle<()>,
}

struct Lifecycle {
    state: State,
    workers: Vec<WorkerHandle>,
    /// Every thread `start()` spawned. Kept after the handles are joined.
    worker_threads: Vec<ThreadId>,
    /// Set while one `stop()` caller is joining the workers.
    joining: bool,
}

/// Typed event dispatcher with one worker thread per event type.
///
/// `Dispatcher` is `Send + Sync`; share it between producer threads with an
/// `Arc`. Dropping it performs [`stop`](Self::stop).
///
/// # Example
///
/// ```
/// use event_dispatcher::{Dispatcher, EventType, Payload};
/// use std::sync::{Arc, Mutex};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Kind { Count, Name }
///
/// impl EventType for Kind {
///     fn all() -> &'static [Self] { &[Kind::Count, Kind::Name] }
///     fn name(&self) -> &'static str {
///         match self { Kind::Count => "count", Kind::Name => "name" }
///     }
/// }
///
/// enum Data { Count(i64), Name(String) }
///
/// impl Payload for Data {
///     type Type = Kind;
///     fn event_type(&self) -> Kind {
///         match self { Data::Count(_) => Kind::Count, Data::Name(_) => Kind::Name }
///     }
/// }
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let dispatcher = Dispatcher::<Data>::new();
///
/// let sink = seen.clone();
/// dispatcher.register(Kind::Count, move |data: &Data| {
///     if let Data::Count(n) = data {
///         sink.lock().unwrap().push(*n);
///     }
/// });
///
/// dispatcher.start()?;
/// for n in [0, 3, 6, 9] {
///     dispatcher.add_event(Data::Count(n));
/// }
/// dispatcher.stop();
///
/// assert_eq!(*seen.lock().unwrap(), vec![0, 3, 6, 9]);
/// # Ok::<(), event_dispatcher::DispatchError>(())
/// ```
pub struct Dispatcher<P: Payload> {
    shared: Arc<Shared<P>>,
    config: DispatcherConfig,
    lifecycle: Mutex<Lifecycle>,
    /// Notified when `lifecycle.state` reaches `Stopped`.
    stopped: Condvar,
}

impl<P: Payload> Dispatcher<P> {
    /// Create an idle dispatcher with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    /// Create an idle dispatcher.
    ///
    /// Every per-type structure is allocated here, one per
    /// [`EventType::all`] entry.
    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config.fanout)),
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: State::Idle,
                workers: Vec::new(),
                worker_threads: Vec::new(),
                joining: false,
            }),
            stopped: Condvar::new(),
        }
    }

    /// Start a [`DispatcherBuilder`].
    pub fn builder() -> DispatcherBuilder<P> {
        DispatcherBuilder::new()
    }

    /// Spawn one worker per event type.
    ///
    /// Returns once every worker exists. Fails with
    /// [`DispatchError::InvalidState`] unless the dispatcher is idle. If a
    /// worker cannot be spawned, the ones already running are drained and
    /// joined, the dispatcher ends up stopped, and the spawn error is returned.
    pub fn start(&self) -> Result<(), DispatchError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != State::Idle {
            return Err(DispatchError::InvalidState {
                operation: "start",
                state: lifecycle.state,
            });
        }

        for &event_type in P::Type::all() {
            match self.spawn_worker(event_type) {
                Ok(worker) => {
                    lifecycle.worker_threads.push(worker.handle.thread().id());
                    lifecycle.workers.push(worker);
                }
                Err(source) => {
                    warn!(
                        event_type = event_type.name(),
                        error = %source,
                        "failed to spawn worker, shutting down workers already started"
                    );
                    lifecycle.state = State::Stopping;
                    lifecycle.joining = true;
                    let workers = std::mem::take(&mut lifecycle.workers);
                    drop(lifecycle);

                    self.join_workers(workers);
                    return Err(DispatchError::WorkerSpawn {
                        event_type: event_type.name(),
                        source,
                    });
                }
            }
        }

        lifecycle.state = State::Running;
        info!(
            workers = lifecycle.workers.len(),
            fanout = %self.config.fanout,
            "dispatcher started"
        );
        Ok(())
    }

    fn spawn_worker(&self, event_type: P::Type) -> std::io::Result<WorkerHandle> {
        let mut builder =
            thread::Builder::new().name(self.config.thread_name(event_type.name()));
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let shared = self.shared.clone();
        let handle = builder.spawn(move || worker::run(&shared, event_type))?;
        debug!(event_type = event_type.name(), "spawned worker");

        Ok(WorkerHandle {
            type_name: event_type.name(),
            handle,
        })
    }

    /// Drain every queue and wait for all workers to exit.
    ///
    /// Every event enqueued before this call is dispatched before it returns.
    /// Safe to call repeatedly, before `start()`, and concurrently: the first
    /// call on a running dispatcher joins the workers and every other caller
    /// blocks until it has finished.
    ///
    /// Called from inside a handler, `stop()` only signals shutdown and
    /// returns: the worker threads keep draining, and the next `stop()` from
    /// a non-worker thread (or `Drop`) joins them.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            State::Running => {
                lifecycle.state = State::Stopping;
                info!(workers = lifecycle.workers.len(), "stopping dispatcher");
                for slot in self.shared.slots() {
                    slot.queue.shutdown();
                }
            }
            State::Stopping => {}
            State::Idle | State::Stopped => {
                trace!(state = %lifecycle.state, "stop() is a no-op");
                return;
            }
        }

        if lifecycle.worker_threads.contains(&thread::current().id()) {
            debug!("stop() called from a handler; leaving the join to a non-worker thread");
            return;
        }

        if lifecycle.joining {
            trace!("another stop() is joining workers, waiting for it");
            while lifecycle.state != State::Stopped {
                self.stopped.wait(&mut lifecycle);
            }
            return;
        }

        lifecycle.joining = true;
        let workers = std::mem::take(&mut lifecycle.workers);
        drop(lifecycle);

        self.join_workers(workers);
        info!("dispatcher stopped");
    }

    /// Shut down every queue, join `workers`, then mark the dispatcher
    /// stopped and wake any `stop()` callers waiting on it.
    ///
    /// Must not run on a worker thread.
    fn join_workers(&self, workers: Vec<WorkerHandle>) {
        for slot in self.shared.slots() {
            slot.queue.shutdown();
        }

        for worker in workers {
            match worker.handle.join() {
                Ok(()) => debug!(event_type = worker.type_name, "worker joined"),
                Err(panic_info) => warn!(
                    event_type = worker.type_name,
                    panic = %extract_panic_message(&panic_info),
                    "worker had terminated from a handler panic"
                ),
            }
        }

        // Queues whose worker never started still hold their events.
        for slot in self.shared.slots() {
            let dropped = slot.queue.close();
            if dropped > 0 {
                warn!(
                    event_type = slot.event_type.name(),
                    dropped_events = dropped,
                    "discarding events for a type that had no worker"
                );
                slot.stats.record_discarded_n(dropped as u64);
            }
        }

        let mut lifecycle = self.lifecycle.lock();
        lifecycle.state = State::Stopped;
        lifecycle.joining = false;
        self.stopped.notify_all();
    }

    /// Append `handler` to the handlers of `event_type`.
    ///
    /// Valid in any state, including from inside another handler. The new
    /// handler sees events dispatched after this call returns.
    pub fn register<H>(&self, event_type: P::Type, handler: H)
    where
        H: Handler<P>,
    {
        self.register_shared(event_type, Arc::new(handler));
    }

    /// Append an already shared handler, e.g. one registered for several types.
    pub fn register_shared(&self, event_type: P::Type, handler: Arc<dyn Handler<P>>) {
        let Some(slot) = self.shared.slot(event_type) else {
            warn!(
                event_type = event_type.name(),
                "EventType::all() does not list this type; handler ignored"
            );
            return;
        };

        debug!(
            event_type = event_type.name(),
            handler = handler.name(),
            "registering handler"
        );
        slot.handlers.push(handler);
    }

    /// Queue `payload` for delivery under `event_type`.
    ///
    /// Never blocks on handlers. The payload shape is not checked against
    /// `event_type`; handlers ignore variants they do not expect.
    ///
    /// Enqueueing after [`stop`](Self::stop) has returned is unsupported: the
    /// payload is dropped with a warning and counted as rejected. The same
    /// happens when the type's worker died from a handler panic.
    pub fn enqueue(&self, event_type: P::Type, payload: P) {
        let Some(slot) = self.shared.slot(event_type) else {
            warn!(
                event_type = event_type.name(),
                "EventType::all() does not list this type; event dropped"
            );
            return;
        };

        match slot.queue.push(event_type, payload) {
            Ok(sequence) => {
                slot.stats.record_enqueued();
                trace!(event_type = event_type.name(), sequence, "event enqueued");
            }
            Err(_payload) if slot.has_failed() => {
                slot.stats.record_rejected();
                warn!(
                    event_type = event_type.name(),
                    "worker for this type has failed; event rejected"
                );
            }
            Err(_payload) => {
                slot.stats.record_rejected();
                warn!(
                    event_type = event_type.name(),
                    "dispatcher is stopped; event rejected"
                );
            }
        }
    }

    /// Queue `payload` under the type its variant reports.
    pub fn add_event(&self, payload: P) {
        let event_type = payload.event_type();
        self.enqueue(event_type, payload);
    }

    pub fn state(&self) -> State {
        self.lifecycle.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == State::Running
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Number of handlers currently registered for `event_type`.
    pub fn handler_count(&self, event_type: P::Type) -> usize {
        self.shared
            .slot(event_type)
            .map_or(0, |slot| slot.handlers.len())
    }

    /// Number of events waiting in the queue for `event_type`.
    pub fn pending(&self, event_type: P::Type) -> usize {
        self.shared
            .slot(event_type)
            .map_or(0, |slot| slot.queue.len())
    }

    /// Snapshot of the counters for `event_type`.
    pub fn stats(&self, event_type: P::Type) -> TypeStats {
        self.shared
            .slot(event_type)
            .map(|slot| slot.stats.snapshot(slot.queue.len()))
            .unwrap_or_default()
    }

    /// Whether the worker for `event_type` died from a handler panic.
    pub fn has_failed(&self, event_type: P::Type) -> bool {
        self.shared
            .slot(event_type)
            .is_some_and(|slot| slot.has_failed())
    }
}

impl<P: Payload> Default for Dispatcher<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> Drop for Dispatcher<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<P: Payload> fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state())
            .field("event_types", &P::Type::all().len())
            .field("fanout", &self.config.fanout)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Dispatcher`] with handlers registered up front.
///
/// # Example
///
/// ```ignore
/// let dispatcher = Dispatcher::builder()
///     .fanout(FanoutMode::Serialized)
///     .thread_name_prefix("orders")
///     .with_handler(Kind::Created, AuditHandler::new())
///     .with_handler(Kind::Created, EmailHandler::new())
///     .build();
///
/// dispatcher.start()?;
/// ```
pub struct DispatcherBuilder<P: Payload> {
    config: DispatcherConfig,
    handlers: Vec<(P::Type, Arc<dyn Handler<P>>)>,
}

impl<P: Payload> DispatcherBuilder<P> {
    pub fn new() -> Self {
        Self {
            config: DispatcherConfig::default(),
            handlers: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fanout(mut self, fanout: FanoutMode) -> Self {
        self.config.fanout = fanout;
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = Some(bytes);
        self
    }

    /// Register a handler; handlers for a type keep the order they are added.
    pub fn with_handler<H: Handler<P>>(mut self, event_type: P::Type, handler: H) -> Self {
        self.handlers.push((event_type, Arc::new(handler)));
        self
    }

    /// Build an idle dispatcher.
    pub fn build(self) -> Dispatcher<P> {
        let dispatcher = Dispatcher::with_config(self.config);
        for (event_type, handler) in self.handlers {
            dispatcher.register_shared(event_type, handler);
        }
        dispatcher
    }
}

impl<P: Payload> Default for DispatcherBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}
