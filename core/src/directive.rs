//! Request directives: the inbound description of one remote call (or one
//! fixed batch) plus the lifecycle, namespace, polling and routing options
//! governing it.
//!
//! Directives arrive wrapped in an [`Action`], an explicit tagged union that
//! the dispatcher matches exhaustively: request actions are handled,
//! everything else is forwarded unchanged to the next pipeline stage.

use crate::event::RequestId;
use crate::lifecycle::{Descriptor, Lifecycle};
use crate::routes::StatusRoutes;
use crate::transport::{Response, TransportConfigs};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default poll interval when the directive does not set one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Caller-supplied hook that aborts the underlying transport call.
///
/// The core stores it on the request record and never invokes it; the caller
/// that holds it decides whether to abort an in-flight sibling. Cancellation
/// detection must never rely on the handle having been invoked.
pub type CancelHandle = Arc<dyn Fn() + Send + Sync>;

/// Where the transport configuration for a directive comes from.
pub enum ConfigSource<St> {
    /// A fixed config (or batch of configs).
    Static(TransportConfigs),
    /// A function of application state, evaluated once at dispatch.
    Computed(Arc<dyn Fn(&St) -> TransportConfigs + Send + Sync>),
}

impl<St> ConfigSource<St> {
    /// Evaluate the source against the current application state.
    #[must_use]
    pub fn resolve(&self, state: &St) -> TransportConfigs {
        match self {
            Self::Static(configs) => configs.clone(),
            Self::Computed(f) => f(state),
        }
    }
}

impl<St> Clone for ConfigSource<St> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(configs) => Self::Static(configs.clone()),
            Self::Computed(f) => Self::Computed(Arc::clone(f)),
        }
    }
}

impl<St> fmt::Debug for ConfigSource<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(configs) => f.debug_tuple("ConfigSource::Static").field(configs).finish(),
            Self::Computed(_) => write!(f, "ConfigSource::Computed(<fn>)"),
        }
    }
}

/// Namespace declaration on a directive.
///
/// Namespaces group related requests for concurrency control. Directives
/// without one share the reserved generic bucket, whose members never cancel
/// each other.
#[derive(Clone, Default)]
pub enum Namespace {
    /// The reserved default bucket.
    #[default]
    Generic,
    /// A caller-supplied bucket name.
    Named(String),
    /// A bucket name derived from the resolved configs and the request id.
    Derived(Arc<dyn Fn(&TransportConfigs, RequestId) -> String + Send + Sync>),
}

impl Namespace {
    /// Resolve to a concrete ledger key.
    ///
    /// Resolution happens exactly once per request; the resolved key is then
    /// reused for every later status check and for clearing, so a `Derived`
    /// namespace sees the same `(configs, uid)` pair it was registered with.
    #[must_use]
    pub fn resolve(&self, configs: &TransportConfigs, uid: RequestId) -> NamespaceKey {
        match self {
            Self::Generic => NamespaceKey::Generic,
            Self::Named(name) => NamespaceKey::Named(name.clone()),
            Self::Derived(f) => NamespaceKey::Named(f(configs, uid)),
        }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => write!(f, "Namespace::Generic"),
            Self::Named(name) => f.debug_tuple("Namespace::Named").field(name).finish(),
            Self::Derived(_) => write!(f, "Namespace::Derived(<fn>)"),
        }
    }
}

/// Resolved ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceKey {
    /// The reserved default bucket. Never subject to sibling cancellation.
    Generic,
    /// A named bucket.
    Named(String),
}

impl fmt::Display for NamespaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => write!(f, "generic"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Polling configuration for a directive.
#[derive(Clone)]
pub struct PollSpec {
    /// Predicate over a response deciding whether polling should stop.
    pub condition: Arc<dyn Fn(&Response) -> bool + Send + Sync>,
    /// Delay between poll ticks.
    pub interval: Duration,
    /// Deadline after which polling gives up at the next checkpoint.
    pub timeout: Option<Duration>,
}

impl PollSpec {
    /// Poll until `condition` holds, at the default interval, with no
    /// timeout.
    #[must_use]
    pub fn until<F>(condition: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        Self {
            condition: Arc::new(condition),
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }

    /// Set the delay between poll ticks.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the poll deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for PollSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSpec")
            .field("condition", &"<fn>")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Everything the dispatcher needs to run one request.
#[derive(Clone)]
pub struct RequestDirective<St> {
    /// Transport configuration. Required; a directive without one fails
    /// synchronously at dispatch.
    pub options: Option<ConfigSource<St>>,
    /// Whether siblings in the same named bucket may run concurrently.
    /// Only an explicit `Some(false)` cancels siblings.
    pub concurrent: Option<bool>,
    /// Concurrency-control bucket.
    pub namespace: Namespace,
    /// Per-stage event descriptors.
    pub lifecycle: Lifecycle<St>,
    /// Polling configuration; absent means a single transport call.
    pub poll: Option<PollSpec>,
    /// Status-code overrides for the terminal descriptor.
    pub status_routes: Option<StatusRoutes<St>>,
    /// Optional abort hook stored on the request record.
    pub cancel: Option<CancelHandle>,
}

impl<St> RequestDirective<St> {
    /// Start building a directive.
    #[must_use]
    pub fn builder() -> RequestDirectiveBuilder<St> {
        RequestDirectiveBuilder {
            directive: Self {
                options: None,
                concurrent: None,
                namespace: Namespace::Generic,
                lifecycle: Lifecycle::default(),
                poll: None,
                status_routes: None,
                cancel: None,
            },
        }
    }
}

/// Builder for [`RequestDirective`].
///
/// `build` performs no validation: a directive built without options is
/// rejected by the dispatcher with a configuration error, matching where the
/// pipeline surfaces that failure.
pub struct RequestDirectiveBuilder<St> {
    directive: RequestDirective<St>,
}

impl<St> RequestDirectiveBuilder<St> {
    /// Set a fixed transport config or batch.
    #[must_use]
    pub fn options(mut self, configs: impl Into<TransportConfigs>) -> Self {
        self.directive.options = Some(ConfigSource::Static(configs.into()));
        self
    }

    /// Derive the transport config from application state at dispatch time.
    #[must_use]
    pub fn options_from_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&St) -> TransportConfigs + Send + Sync + 'static,
    {
        self.directive.options = Some(ConfigSource::Computed(Arc::new(f)));
        self
    }

    /// Set the concurrency flag. Only an explicit `false` cancels siblings.
    #[must_use]
    pub const fn concurrent(mut self, concurrent: bool) -> Self {
        self.directive.concurrent = Some(concurrent);
        self
    }

    /// Put the request in a named bucket.
    #[must_use]
    pub fn namespace(mut self, name: impl Into<String>) -> Self {
        self.directive.namespace = Namespace::Named(name.into());
        self
    }

    /// Derive the bucket name from the resolved configs and request id.
    #[must_use]
    pub fn namespace_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&TransportConfigs, RequestId) -> String + Send + Sync + 'static,
    {
        self.directive.namespace = Namespace::Derived(Arc::new(f));
        self
    }

    /// Emit this descriptor when the request is issued.
    #[must_use]
    pub fn on_pending(mut self, descriptor: Descriptor<St>) -> Self {
        self.directive.lifecycle.pending = Some(descriptor);
        self
    }

    /// Emit this descriptor when the transport call succeeds.
    #[must_use]
    pub fn on_fulfilled(mut self, descriptor: Descriptor<St>) -> Self {
        self.directive.lifecycle.fulfilled = Some(descriptor);
        self
    }

    /// Emit this descriptor when the transport call fails.
    #[must_use]
    pub fn on_rejected(mut self, descriptor: Descriptor<St>) -> Self {
        self.directive.lifecycle.rejected = Some(descriptor);
        self
    }

    /// Emit this descriptor after the terminal event, whatever the outcome.
    #[must_use]
    pub fn on_settled(mut self, descriptor: Descriptor<St>) -> Self {
        self.directive.lifecycle.settled = Some(descriptor);
        self
    }

    /// Emit this descriptor when the request was cancelled by a sibling.
    #[must_use]
    pub fn on_cancelled(mut self, descriptor: Descriptor<St>) -> Self {
        self.directive.lifecycle.cancelled = Some(descriptor);
        self
    }

    /// Drive the call through the poller.
    #[must_use]
    pub fn poll(mut self, spec: PollSpec) -> Self {
        self.directive.poll = Some(spec);
        self
    }

    /// Override the terminal descriptor by response status code.
    #[must_use]
    pub fn status_routes(mut self, routes: StatusRoutes<St>) -> Self {
        self.directive.status_routes = Some(routes);
        self
    }

    /// Store an abort hook on the request record.
    #[must_use]
    pub fn cancel_handle<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.directive.cancel = Some(Arc::new(f));
        self
    }

    /// Finish the directive.
    #[must_use]
    pub fn build(self) -> RequestDirective<St> {
        self.directive
    }
}

/// Pipeline action: the explicit tagged union the dispatcher matches on.
pub enum Action<St> {
    /// A request directive to intercept and orchestrate.
    Request(Box<RequestDirective<St>>),
    /// Any other action, forwarded unchanged to the next stage.
    Other(Value),
}

impl<St> Action<St> {
    /// Wrap a directive for dispatch.
    #[must_use]
    pub fn request(directive: RequestDirective<St>) -> Self {
        Self::Request(Box::new(directive))
    }
}
