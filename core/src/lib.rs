//! # reqcycle Core
//!
//! Core types and pure logic for the reqcycle request-lifecycle pipeline.
//!
//! reqcycle intercepts request directives flowing through an action-dispatch
//! pipeline, executes the underlying remote call, and emits lifecycle events
//! (pending, fulfilled, rejected, settled, cancelled) back into the pipeline.
//! This crate holds everything that is pure and stateless:
//!
//! - [`directive`]: the inbound directive model: transport config sources,
//!   namespaces, polling and concurrency options
//! - [`lifecycle`]: per-stage event descriptors and payload formatting
//! - [`routes`]: ordered status-code override tables
//! - [`event`]: the emitted event shape and request ids
//! - [`transport`]: the remote-call abstraction and response model
//! - [`environment`]: collaborator traits (state access, event sink)
//! - [`error`]: the error taxonomy
//!
//! The stateful orchestration (ledger, poller and dispatcher) lives in
//! `reqcycle-runtime`.
//!
//! ## Example
//!
//! ```rust
//! use reqcycle_core::directive::{Action, RequestDirective};
//! use reqcycle_core::lifecycle::Descriptor;
//! use reqcycle_core::transport::TransportConfig;
//! use serde_json::json;
//!
//! let directive: RequestDirective<serde_json::Value> = RequestDirective::builder()
//!     .options(TransportConfig::get("https://api.example.com/jobs/1"))
//!     .namespace("jobs")
//!     .concurrent(false)
//!     .on_pending(Descriptor::new("JOB_REQUESTED"))
//!     .on_fulfilled(
//!         Descriptor::new("JOB_LOADED")
//!             .with_computed(|outcome, _directive, _state| {
//!                 json!({ "status": outcome.and_then(|o| o.status()) })
//!             }),
//!     )
//!     .build();
//!
//! let action = Action::request(directive);
//! # let _ = action;
//! ```

/// Request directives and the pipeline action union.
pub mod directive;

/// Collaborator traits injected into the dispatcher.
pub mod environment;

/// Error taxonomy.
pub mod error;

/// Emitted lifecycle events and request ids.
pub mod event;

/// Lifecycle descriptors and payload formatting.
pub mod lifecycle;

/// Status-code routing tables.
pub mod routes;

/// Transport abstraction and response model.
pub mod transport;

pub use directive::{
    Action, CancelHandle, ConfigSource, Namespace, NamespaceKey, PollSpec, RequestDirective,
};
pub use environment::{EventSink, StateSource};
pub use error::RequestError;
pub use event::{Event, RequestId};
pub use lifecycle::{Descriptor, Lifecycle, Payload};
pub use routes::StatusRoutes;
pub use transport::{Outcome, Response, Transport, TransportConfig, TransportConfigs};
