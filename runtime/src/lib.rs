//! # reqcycle Runtime
//!
//! Stateful orchestration for the reqcycle request-lifecycle pipeline.
//!
//! This crate drives the directives described by `reqcycle-core`:
//!
//! - [`ledger`]: the concurrency-control ledger tracking in-flight requests
//!   per namespace and governing cancellation-by-replacement
//! - [`poll`]: the cooperative polling combinator with checkpoint timeouts
//! - [`dispatcher`]: the lifecycle state machine tying it all together
//!
//! ## Concurrency model
//!
//! All orchestration runs as non-blocking tasks on the async runtime.
//! Cancellation is cooperative and pull-based: registering a new request
//! under a non-concurrent namespace flips siblings' recorded status in the
//! ledger, and each sibling observes the flip at its own classification
//! checkpoint; no signal interrupts an in-flight call. The ledger sits
//! behind a mutex whose critical sections never span an await; correctness
//! rests on register-before-async-work and clear-on-every-exit-path, not on
//! lock ordering.
//!
//! ## Example
//!
//! ```rust,ignore
//! use reqcycle_core::directive::{Action, RequestDirective};
//! use reqcycle_core::lifecycle::Descriptor;
//! use reqcycle_core::transport::TransportConfig;
//! use reqcycle_runtime::dispatcher::{Intercepted, RequestDispatcher};
//!
//! let dispatcher = RequestDispatcher::new(transport, state, sink);
//!
//! let directive = RequestDirective::builder()
//!     .options(TransportConfig::get("https://api.example.com/jobs/1"))
//!     .on_pending(Descriptor::new("JOB_REQUESTED"))
//!     .on_fulfilled(Descriptor::new("JOB_LOADED"))
//!     .build();
//!
//! match dispatcher.intercept(Action::request(directive))? {
//!     Intercepted::InFlight(in_flight) => { in_flight.await?; }
//!     Intercepted::Forwarded(action) => { /* hand to the next stage */ }
//! }
//! ```

/// The lifecycle dispatcher state machine.
pub mod dispatcher;

/// The concurrency-control request ledger.
pub mod ledger;

/// Cooperative polling with timeout checkpoints.
pub mod poll;

pub use dispatcher::{InFlight, Intercepted, RequestDispatcher, Settled};
pub use ledger::{RequestLedger, RequestRecord, RequestStatus};
pub use poll::poll;
