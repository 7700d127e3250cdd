//! The lifecycle dispatcher: top-level orchestration of one request.
//!
//! [`RequestDispatcher::intercept`] takes a pipeline action. Non-request
//! actions are forwarded unchanged. Request directives run a fixed state
//! machine:
//!
//! ```text
//! validate → resolve config → register (ledger) → emit PENDING
//!          → transport / poller → classify (ledger status re-check)
//!          → route (status codes) → emit terminal [+ SETTLED] → clear
//! ```
//!
//! The phase up to and including the PENDING emission runs synchronously
//! inside `intercept`, before any asynchronous work. That ordering is what
//! guarantees PENDING is observed before any terminal event of the same
//! request, and that sibling registrations are strictly ordered by call
//! order. Everything after is returned as an [`InFlight`] future; the ledger
//! entry is cleared on every exit path of that future.
//!
//! Cancellation is pull-based: the dispatcher re-reads the ledger status at
//! its classification checkpoint and never inspects error shapes for
//! transport-level cancellation.

use crate::ledger::{RequestLedger, RequestStatus};
use crate::poll::poll;
use futures::future::try_join_all;
use reqcycle_core::directive::{Action, NamespaceKey, RequestDirective};
use reqcycle_core::environment::{EventSink, StateSource};
use reqcycle_core::error::RequestError;
use reqcycle_core::event::RequestId;
use reqcycle_core::lifecycle::Descriptor;
use reqcycle_core::transport::{Outcome, Transport, TransportConfigs};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

/// How an intercepted request finally settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    /// Lifecycle events were emitted downstream.
    Emitted,
    /// No lifecycle was configured; the raw outcome is handed back to the
    /// caller instead of the pipeline.
    Bypassed(Outcome),
}

/// Result of handing an action to the dispatcher.
pub enum Intercepted<St> {
    /// The action was not a request directive; pass it on unchanged.
    Forwarded(Action<St>),
    /// The request was registered and PENDING emitted; await the rest.
    InFlight(InFlight),
}

/// The asynchronous remainder of an intercepted request.
///
/// Resolves once the request has settled and its ledger entry is cleared.
pub struct InFlight {
    id: RequestId,
    fut: Pin<Box<dyn Future<Output = Result<Settled, RequestError>> + Send>>,
}

impl InFlight {
    /// Id assigned to the request at registration.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.id
    }
}

impl Future for InFlight {
    type Output = Result<Settled, RequestError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().fut.as_mut().poll(cx)
    }
}

struct Inner<T, S, E> {
    ledger: Mutex<RequestLedger>,
    transport: T,
    state: S,
    sink: E,
}

impl<T, S, E> Inner<T, S, E> {
    fn ledger(&self) -> MutexGuard<'_, RequestLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Orchestrator for request directives.
///
/// Owns the request ledger for the lifetime of the pipeline and holds the
/// injected collaborators: the transport, a state source and the downstream
/// event sink. Cheap to clone; clones share the same ledger.
pub struct RequestDispatcher<T, S, E> {
    inner: Arc<Inner<T, S, E>>,
}

impl<T, S, E> Clone for RequestDispatcher<T, S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, S, E> RequestDispatcher<T, S, E>
where
    T: Transport + 'static,
    S: StateSource + 'static,
    S::State: 'static,
    E: EventSink + 'static,
{
    /// Assemble a dispatcher with a fresh, empty ledger.
    #[must_use]
    pub fn new(transport: T, state: S, sink: E) -> Self {
        Self {
            inner: Arc::new(Inner {
                ledger: Mutex::new(RequestLedger::new()),
                transport,
                state,
                sink,
            }),
        }
    }

    /// Intercept one pipeline action.
    ///
    /// Non-request actions come back as [`Intercepted::Forwarded`]. For a
    /// request directive, validation, config resolution, ledger registration
    /// and the PENDING emission all complete before this method returns; the
    /// returned [`InFlight`] future performs the transport work, the
    /// classification checkpoint, terminal emission and the unconditional
    /// ledger clear.
    ///
    /// # Errors
    ///
    /// [`RequestError::Config`] when the directive carries no transport
    /// configuration, or combines polling with a batch. Configuration errors
    /// always surface here and are never converted into events.
    pub fn intercept(
        &self,
        action: Action<S::State>,
    ) -> Result<Intercepted<S::State>, RequestError> {
        let directive = match action {
            Action::Request(directive) => *directive,
            other @ Action::Other(_) => return Ok(Intercepted::Forwarded(other)),
        };

        let source = directive.options.as_ref().ok_or_else(|| {
            RequestError::Config(
                "request directive carries no transport configuration".to_string(),
            )
        })?;

        let state = self.inner.state.current();
        let configs = source.resolve(&state);

        if directive.poll.is_some() && matches!(configs, TransportConfigs::Many(_)) {
            return Err(RequestError::Config(
                "polling requires a single transport configuration".to_string(),
            ));
        }

        let uid = RequestId::new();
        let key = directive.namespace.resolve(&configs, uid);
        self.inner
            .ledger()
            .register(&key, uid, directive.concurrent, directive.cancel.clone());

        if let Some(pending) = &directive.lifecycle.pending {
            self.inner
                .sink
                .emit(pending.format(uid, &directive, &state, None));
        }

        let inner = Arc::clone(&self.inner);
        let fut = Box::pin(async move {
            let executed = execute(&inner, &directive, &configs).await;
            let settled = complete(&inner, &directive, &key, uid, executed);
            inner.ledger().clear(&key, uid);
            settled
        });

        Ok(Intercepted::InFlight(InFlight { id: uid, fut }))
    }

    /// Number of requests currently tracked by the ledger.
    #[must_use]
    pub fn active_requests(&self) -> usize {
        self.inner.ledger().len()
    }

    /// Administrative reset: drop every ledger record.
    pub fn reset(&self) {
        self.inner.ledger().clear_all();
    }
}

/// Run the transport work for one directive: poll loop, single call, or
/// batch awaited as one unit (first failure rejects the batch).
async fn execute<T, S, E>(
    inner: &Inner<T, S, E>,
    directive: &RequestDirective<S::State>,
    configs: &TransportConfigs,
) -> Result<Outcome, RequestError>
where
    T: Transport,
    S: StateSource,
{
    match (&directive.poll, configs) {
        (Some(spec), TransportConfigs::One(config)) => {
            poll(|| inner.transport.issue(config), spec)
                .await
                .map(Outcome::Single)
        }
        (_, TransportConfigs::One(config)) => {
            inner.transport.issue(config).await.map(Outcome::Single)
        }
        (_, TransportConfigs::Many(list)) => {
            try_join_all(list.iter().map(|config| inner.transport.issue(config)))
                .await
                .map(Outcome::Batch)
        }
    }
}

/// Classify the executed outcome, route status-code overrides, and emit the
/// terminal and settled events, or hand the raw result back in bypass mode.
fn complete<T, S, E>(
    inner: &Inner<T, S, E>,
    directive: &RequestDirective<S::State>,
    key: &NamespaceKey,
    uid: RequestId,
    executed: Result<Outcome, RequestError>,
) -> Result<Settled, RequestError>
where
    S: StateSource,
    E: EventSink,
{
    if let Err(error) = &executed {
        tracing::warn!(request_id = %uid, namespace = %key, error = %error, "request failed");
    }

    let lifecycle = &directive.lifecycle;
    if !lifecycle.has_terminal() {
        // bypass mode: no events; the caller gets the raw response or error
        return executed.map(Settled::Bypassed);
    }

    let (outcome, error) = match executed {
        Ok(outcome) => (Some(outcome), None),
        Err(error) => (error.response().map(Outcome::Single), Some(error)),
    };

    let cancelled =
        inner.ledger().status(key, uid) == Some(RequestStatus::Cancelled);
    let cancelled_default = Descriptor::cancelled_default();
    let mut chosen = if cancelled {
        Some(lifecycle.cancelled.as_ref().unwrap_or(&cancelled_default))
    } else if error.is_some() {
        lifecycle.rejected.as_ref()
    } else {
        lifecycle.fulfilled.as_ref()
    };

    if let (Some(routes), Some(status)) = (
        &directive.status_routes,
        outcome.as_ref().and_then(Outcome::status),
    ) {
        if let Some(overriding) = routes.route(status) {
            chosen = Some(overriding);
        }
    }

    let state = inner.state.current();
    if let Some(descriptor) = chosen {
        inner
            .sink
            .emit(descriptor.format(uid, directive, &state, outcome.as_ref()));
    }
    if let Some(settled) = &lifecycle.settled {
        inner
            .sink
            .emit(settled.format(uid, directive, &state, outcome.as_ref()));
    }

    Ok(Settled::Emitted)
}
