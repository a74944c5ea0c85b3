//! Handlers and the per-type handler registry.
//!
//! A [`Handler`] receives every payload of the event types it was registered
//! for. The dispatcher does not validate payload shape beyond the routing tag,
//! so handlers match on the variant they expect and ignore the rest.
//!
//! # Example
//!
//! ```
//! use event_dispatcher::Handler;
//!
//! #[derive(Debug)]
//! enum Reading {
//!     Temperature(f64),
//!     Label(String),
//! }
//!
//! struct TemperatureLogger;
//!
//! impl Handler<Reading> for TemperatureLogger {
//!     fn handle(&self, payload: &Reading) {
//!         if let Reading::Temperature(celsius) = payload {
//!             println!("{celsius:.1}°C");
//!         }
//!     }
//! }
//!
//! TemperatureLogger.handle(&Reading::Temperature(21.5));
//! TemperatureLogger.handle(&Reading::Label("ignored".into()));
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

/// Capability invoked for each event of the types it is registered for.
///
/// `handle` runs on the worker thread of the event's type, so it should not
/// block indefinitely: every later event of that type waits behind it.
///
/// A panic escaping `handle` is **not** caught. It unwinds through the worker
/// and ends processing for that event type; see the crate docs.
pub trait Handler<P>: Send + Sync + 'static {
    fn handle(&self, payload: &P);

    /// Name used in trace logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<P, F> Handler<P> for F
where
    F: Fn(&P) + Send + Sync + 'static,
{
    fn handle(&self, payload: &P) {
        self(payload)
    }
}

/// Immutable view of a type's handlers, in registration order.
pub(crate) type HandlerSnapshot<P> = Arc<Vec<Arc<dyn Handler<P>>>>;

/// Append-only, copy-on-write handler list for one event type.
///
/// Registration takes the write lock and never overlaps a snapshot read.
/// Dispatch holds the read lock only while cloning the outer `Arc`, so a
/// registration arriving mid-dispatch affects the next event, not this one.
pub(crate) struct HandlerList<P> {
    handlers: RwLock<HandlerSnapshot<P>>,
}

impl<P: 'static> HandlerList<P> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn push(&self, handler: Arc<dyn Handler<P>>) {
        let mut handlers = self.handlers.write();
        Arc::make_mut(&mut handlers).push(handler);
    }

    pub fn snapshot(&self) -> HandlerSnapshot<P> {
        self.handlers.read().clone()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_types::Data;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(Arc<AtomicUsize>);

    impl Handler<Data> for Counter {
        fn handle(&self, _payload: &Data) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_closure_is_a_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let handler = move |payload: &Data| {
            if let Data::A(n) = payload {
                seen_clone.fetch_add(*n as usize, Ordering::SeqCst);
            }
        };

        handler.handle(&Data::A(5));
        handler.handle(&Data::B("skip".into()));
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_default_name_is_type_name() {
        let counter = Counter(Arc::new(AtomicUsize::new(0)));
        assert!(counter.name().ends_with("Counter"));
    }

    #[test]
    fn test_push_preserves_registration_order() {
        let list: HandlerList<Data> = HandlerList::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = order.clone();
            list.push(Arc::new(move |_: &Data| order.lock().push(id)));
        }

        for handler in list.snapshot().iter() {
            handler.handle(&Data::A(0));
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_snapshot_is_stable_across_later_registrations() {
        let list: HandlerList<Data> = HandlerList::new();
        let count = Arc::new(AtomicUsize::new(0));
        list.push(Arc::new(Counter(count.clone())));

        let snapshot = list.snapshot();
        list.push(Arc::new(Counter(count.clone())));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(list.len(), 2);
        assert_eq!(list.snapshot().len(), 2);
    }
}
