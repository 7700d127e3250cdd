//! Lifecycle descriptors and payload formatting.
//!
//! A [`Descriptor`] names the event to emit at a lifecycle stage and how to
//! build its payload. Payloads are either static values or computed
//! functions, modelled as an explicit tagged variant and resolved through a
//! single evaluation step in [`Descriptor::format`].

use crate::directive::RequestDirective;
use crate::event::{Event, RequestId};
use crate::transport::Outcome;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Event type used when a request was cancelled but no CANCELLED descriptor
/// was configured.
pub const DEFAULT_CANCELLED_TYPE: &str = "CANCELLED";

/// Payload declaration on a descriptor: a static value or a computed
/// function over `(response, directive, state)`, in that exact order.
#[derive(Clone)]
pub enum Payload<St> {
    /// Use this value unchanged.
    Static(Value),
    /// Invoke the function and use its result.
    Computed(Arc<dyn Fn(Option<&Outcome>, &RequestDirective<St>, &St) -> Value + Send + Sync>),
}

impl<St> fmt::Debug for Payload<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Payload::Static").field(value).finish(),
            Self::Computed(_) => write!(f, "Payload::Computed(<fn>)"),
        }
    }
}

/// What to emit when a request reaches a lifecycle stage.
#[derive(Clone)]
pub struct Descriptor<St> {
    /// Event discriminator.
    pub event_type: String,
    /// Optional payload declaration.
    pub payload: Option<Payload<St>>,
    /// Additional properties carried through onto the emitted event.
    pub extra: Map<String, Value>,
}

impl<St> Descriptor<St> {
    /// Descriptor emitting `event_type` with no payload.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: None,
            extra: Map::new(),
        }
    }

    /// Attach a static payload value.
    #[must_use]
    pub fn with_static(mut self, value: Value) -> Self {
        self.payload = Some(Payload::Static(value));
        self
    }

    /// Attach a computed payload function.
    #[must_use]
    pub fn with_computed<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Outcome>, &RequestDirective<St>, &St) -> Value + Send + Sync + 'static,
    {
        self.payload = Some(Payload::Computed(Arc::new(f)));
        self
    }

    /// Attach a pass-through metadata property.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Fallback descriptor for cancelled requests with no CANCELLED
    /// descriptor configured.
    #[must_use]
    pub fn cancelled_default() -> Self {
        Self::new(DEFAULT_CANCELLED_TYPE)
    }

    /// Resolve this descriptor into a concrete [`Event`].
    ///
    /// Computed payloads are invoked with `(response, directive, state)`;
    /// a descriptor without payload yields an event without one.
    #[must_use]
    pub fn format(
        &self,
        uid: RequestId,
        directive: &RequestDirective<St>,
        state: &St,
        outcome: Option<&Outcome>,
    ) -> Event {
        let payload = self.payload.as_ref().map(|payload| match payload {
            Payload::Static(value) => value.clone(),
            Payload::Computed(f) => f(outcome, directive, state),
        });

        Event {
            event_type: self.event_type.clone(),
            payload,
            request_id: uid,
            extra: self.extra.clone(),
        }
    }
}

/// Per-stage descriptors for one directive.
///
/// Every stage is optional; a directive with no descriptors at all runs in
/// bypass mode, resolving its caller with the raw response instead of
/// emitting events.
#[derive(Clone)]
pub struct Lifecycle<St> {
    /// Emitted synchronously at registration, before any async work.
    pub pending: Option<Descriptor<St>>,
    /// Emitted when the transport call succeeds.
    pub fulfilled: Option<Descriptor<St>>,
    /// Emitted when the transport call fails.
    pub rejected: Option<Descriptor<St>>,
    /// Emitted after the terminal event, whatever the outcome.
    pub settled: Option<Descriptor<St>>,
    /// Emitted instead of fulfilled/rejected when the request was cancelled.
    pub cancelled: Option<Descriptor<St>>,
}

impl<St> Default for Lifecycle<St> {
    fn default() -> Self {
        Self {
            pending: None,
            fulfilled: None,
            rejected: None,
            settled: None,
            cancelled: None,
        }
    }
}

impl<St> Lifecycle<St> {
    /// Whether any terminal descriptor (fulfilled, rejected or settled) is
    /// configured. This gates terminal event emission.
    #[must_use]
    pub const fn has_terminal(&self) -> bool {
        self.fulfilled.is_some() || self.rejected.is_some() || self.settled.is_some()
    }

    /// Whether no descriptor is configured at all (bypass mode).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pending.is_none() && !self.has_terminal() && self.cancelled.is_none()
    }
}
