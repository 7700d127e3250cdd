//! Transport abstraction for the remote calls driven by the dispatcher.
//!
//! The core never performs I/O itself. It hands a [`TransportConfig`] to the
//! injected [`Transport`] implementation and interprets the [`Response`] (or
//! failure) it gets back. Production implementations wrap an HTTP client;
//! tests use the scripted mock from `reqcycle-testing`.
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it stays object-safe.

use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Sentinel status attached to poll timeouts, mirroring HTTP 418.
pub const TIMEOUT_STATUS: u16 = 418;

/// Description of a single remote call.
///
/// The core treats this as opaque; only the transport interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Request method (e.g. `GET`, `POST`).
    pub method: String,
    /// Target URL.
    pub url: String,
    /// Optional request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl TransportConfig {
    /// Convenience constructor for a `GET` request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            body: None,
        }
    }

    /// Convenience constructor for a `POST` request with a body.
    #[must_use]
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            body: Some(body),
        }
    }
}

/// One or several transport configs for a single directive.
///
/// A batch is executed as one unit: all calls are awaited together and the
/// first failure rejects the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportConfigs {
    /// A single remote call.
    One(TransportConfig),
    /// A fixed batch of remote calls, awaited together.
    Many(Vec<TransportConfig>),
}

impl From<TransportConfig> for TransportConfigs {
    fn from(config: TransportConfig) -> Self {
        Self::One(config)
    }
}

impl From<Vec<TransportConfig>> for TransportConfigs {
    fn from(configs: Vec<TransportConfig>) -> Self {
        Self::Many(configs)
    }
}

/// What a transport resolves with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Status code of the response.
    pub status: u16,
    /// Human-readable status line.
    pub status_text: String,
    /// Response body.
    pub body: Value,
}

impl Response {
    /// Build a response with an empty status line.
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            status_text: String::new(),
            body,
        }
    }

    /// The sentinel response carried by a poll timeout.
    #[must_use]
    pub fn timeout_sentinel() -> Self {
        Self {
            status: TIMEOUT_STATUS,
            status_text: "request timeout".to_string(),
            body: Value::Null,
        }
    }
}

/// The settled result of executing a directive's transport work.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Result of a single call (or a poll loop).
    Single(Response),
    /// Results of a batch, in config order.
    Batch(Vec<Response>),
}

impl Outcome {
    /// Status code usable for status routing.
    ///
    /// Only a single response carries one; a batch has no aggregate status.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Single(response) => Some(response.status),
            Self::Batch(_) => None,
        }
    }
}

/// Capability to issue a remote call.
///
/// Implementations must be cheap to call repeatedly: the poll combinator
/// invokes [`issue`](Self::issue) once per tick.
pub trait Transport: Send + Sync {
    /// Issue one remote call described by `config`.
    ///
    /// # Errors
    ///
    /// Resolves to [`RequestError::Transport`] when the call fails, carrying
    /// the failure response when the remote produced one.
    fn issue<'a>(
        &'a self,
        config: &'a TransportConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Response, RequestError>> + Send + 'a>>;
}
