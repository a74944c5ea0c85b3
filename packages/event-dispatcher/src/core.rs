//! Core traits for the typed event model.
//!
//! # Overview
//!
//! The dispatcher routes on a **closed** set of event types:
//! - [`EventType`] = the tag (which queue, which worker, which handlers)
//! - [`Payload`] = the data, one variant per tag
//! - [`Event`] = a payload paired with its tag plus delivery metadata
//!
//! Because the set of tags is closed, every per-type structure can be built
//! up front from [`EventType::all`] and never materialized lazily.

use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};

/// A closed enumeration of event tags.
///
/// Adding a type means adding a variant and listing it in [`all`](Self::all).
///
/// # Example
///
/// ```
/// use event_dispatcher::EventType;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Topic {
///     Orders,
///     Audit,
/// }
///
/// impl EventType for Topic {
///     fn all() -> &'static [Self] {
///         &[Topic::Orders, Topic::Audit]
///     }
///
///     fn name(&self) -> &'static str {
///         match self {
///             Topic::Orders => "orders",
///             Topic::Audit => "audit",
///         }
///     }
/// }
///
/// assert_eq!(Topic::all().len(), 2);
/// ```
pub trait EventType: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Every variant of the enumeration, each listed exactly once.
    fn all() -> &'static [Self];

    /// Stable, human-readable name used for thread names and logs.
    fn name(&self) -> &'static str;
}

/// A tagged union carrying one payload shape per [`EventType`].
///
/// Handlers pattern-match on the variant instead of type-checking at runtime.
pub trait Payload: Send + Sync + 'static {
    /// The tag enumeration this payload belongs to.
    type Type: EventType;

    /// The tag matching this payload's variant.
    fn event_type(&self) -> Self::Type;
}

/// An enqueued event: a payload routed under an event type.
///
/// Immutable once constructed. The event is owned by its queue until a worker
/// takes it, and is dropped as soon as fan-out completes.
pub struct Event<P: Payload> {
    event_type: P::Type,
    payload: P,
    sequence: u64,
    enqueued_at: DateTime<Utc>,
}

impl<P: Payload> Event<P> {
    pub(crate) fn new(event_type: P::Type, payload: P, sequence: u64) -> Self {
        Self {
            event_type,
            payload,
            sequence,
            enqueued_at: Utc::now(),
        }
    }

    /// The type this event was routed under.
    pub fn event_type(&self) -> P::Type {
        self.event_type
    }

    /// The payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Position of this event in its type's queue (0-based, per type).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the event was enqueued.
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Consume the event, returning its payload.
    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl<P: Payload + fmt::Debug> fmt::Debug for Event<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("sequence", &self.sequence)
            .field("payload", &self.payload)
            .finish()
    }
}
