//! # reqcycle Testing
//!
//! Mock collaborators for exercising the reqcycle pipeline without real
//! state, transport or downstream stages:
//!
//! - [`MockTransport`]: scripted responses and failures, with an optional
//!   per-call delay and call bookkeeping
//! - [`CollectingSink`]: records every emitted event for assertions
//! - [`FixedState`]: a state source returning clones of a fixed value
//!
//! ## Example
//!
//! ```rust
//! use reqcycle_testing::{CollectingSink, FixedState, MockTransport};
//! use reqcycle_core::transport::Response;
//! use serde_json::{json, Value};
//!
//! let transport = MockTransport::new().respond(Response::new(200, json!({"ok": true})));
//! let sink = CollectingSink::new();
//! let state = FixedState::new(Value::Null);
//! # let _ = (transport, sink, state);
//! ```

use reqcycle_core::environment::{EventSink, StateSource};
use reqcycle_core::error::RequestError;
use reqcycle_core::event::Event;
use reqcycle_core::transport::{Response, Transport, TransportConfig};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct MockScript {
    steps: Mutex<VecDeque<Result<Response, RequestError>>>,
    fallback: Mutex<Option<Response>>,
    requests: Mutex<Vec<TransportConfig>>,
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

/// Scripted transport: resolves each call with the next queued step.
///
/// When the script runs out, the fallback response (see
/// [`always`](Self::always)) is used; without one, further calls fail with a
/// transport error naming the exhausted script.
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<MockScript>,
}

impl MockTransport {
    /// Transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    #[must_use]
    pub fn respond(self, response: Response) -> Self {
        locked(&self.script.steps).push_back(Ok(response));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn fail(self, error: RequestError) -> Self {
        locked(&self.script.steps).push_back(Err(error));
        self
    }

    /// Response used for every call once the script is exhausted.
    #[must_use]
    pub fn always(self, response: Response) -> Self {
        *locked(&self.script.fallback) = Some(response);
        self
    }

    /// Delay applied to every call before it resolves.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *locked(&self.script.delay) = Some(delay);
        self
    }

    /// Number of calls issued so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    /// Configs of every call issued so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<TransportConfig> {
        locked(&self.script.requests).clone()
    }
}

impl Transport for MockTransport {
    fn issue<'a>(
        &'a self,
        config: &'a TransportConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Response, RequestError>> + Send + 'a>> {
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.script.requests).push(config.clone());

        let step = locked(&self.script.steps).pop_front().unwrap_or_else(|| {
            locked(&self.script.fallback)
                .clone()
                .map_or_else(
                    || Err(RequestError::transport("mock transport script exhausted")),
                    Ok,
                )
        });
        let delay = *locked(&self.script.delay);

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            step
        })
    }
}

/// Event sink that records everything emitted into it.
#[derive(Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl CollectingSink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event emitted so far, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        locked(&self.events).clone()
    }

    /// Event types emitted so far, in emission order.
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        locked(&self.events)
            .iter()
            .map(|event| event.event_type.clone())
            .collect()
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        locked(&self.events).len()
    }

    /// Whether nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        locked(&self.events).is_empty()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: Event) {
        locked(&self.events).push(event);
    }
}

/// State source returning clones of a fixed value.
#[derive(Clone)]
pub struct FixedState<St> {
    state: St,
}

impl<St> FixedState<St> {
    /// Source always yielding `state`.
    #[must_use]
    pub const fn new(state: St) -> Self {
        Self { state }
    }
}

impl<St> StateSource for FixedState<St>
where
    St: Clone + Send + Sync,
{
    type State = St;

    fn current(&self) -> St {
        self.state.clone()
    }
}
