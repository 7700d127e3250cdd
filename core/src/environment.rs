//! Collaborator traits injected into the dispatcher.
//!
//! The dispatcher owns no application state and no downstream pipeline; both
//! are abstracted behind traits so production wiring and tests inject their
//! own implementations.

use crate::event::Event;

/// Read access to the current application state.
///
/// Called once when resolving computed transport configs and once per
/// computed payload evaluation, always returning a fresh snapshot.
pub trait StateSource: Send + Sync {
    /// The application state type.
    type State;

    /// Snapshot the current state.
    fn current(&self) -> Self::State;
}

/// The next pipeline stage: receives every emitted lifecycle event.
///
/// Emission is synchronous and happens on the dispatching task; implementors
/// must not block.
pub trait EventSink: Send + Sync {
    /// Deliver one event downstream.
    fn emit(&self, event: Event);
}
