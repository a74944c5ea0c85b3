//! Structured error types for the dispatcher.
//!
//! Only lifecycle operations can fail. Registration and enqueueing never
//! return errors: conditions such as "no handlers registered" are absorbed
//! locally and surfaced through logs and [`TypeStats`](crate::TypeStats).
//!
//! # Example
//!
//! ```ignore
//! use event_dispatcher::DispatchError;
//!
//! match dispatcher.start() {
//!     Ok(()) => {}
//!     Err(DispatchError::InvalidState { operation, state }) => {
//!         eprintln!("cannot {} a {} dispatcher", operation, state);
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! ```

use thiserror::Error;

use crate::dispatcher::State;

/// Errors returned by dispatcher lifecycle operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The operation is not valid in the dispatcher's current state.
    #[error("cannot {operation} dispatcher in state {state}")]
    InvalidState {
        /// The attempted operation (e.g. `"start"`).
        operation: &'static str,
        /// The state the dispatcher was in.
        state: State,
    },

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker for event type {event_type}")]
    WorkerSpawn {
        /// Name of the event type whose worker could not be created.
        event_type: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
