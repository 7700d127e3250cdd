//! Lifecycle events emitted into the downstream pipeline.
//!
//! Every request that reaches a lifecycle stage with a configured descriptor
//! produces one [`Event`]. Events carry the resolved payload (when one was
//! resolved), the [`RequestId`] of the originating request, and any
//! pass-through metadata the descriptor declared.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier assigned to every intercepted request.
///
/// Globally unique across the whole ledger at any instant. The id is attached
/// to every event emitted for the request, so downstream consumers can
/// correlate PENDING with its terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A lifecycle event, ready to hand to the downstream [`EventSink`].
///
/// `payload` is omitted entirely when the descriptor resolved no value; an
/// absent payload is never serialized as an explicit `null`.
///
/// [`EventSink`]: crate::environment::EventSink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Event discriminator, taken verbatim from the descriptor.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Resolved payload, if the descriptor declared one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Id of the request this event belongs to.
    #[serde(rename = "requestId")]
    pub request_id: RequestId,

    /// Pass-through metadata copied verbatim from the descriptor.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
