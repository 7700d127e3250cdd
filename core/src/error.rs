//! Error taxonomy for the request pipeline.

use crate::transport::Response;
use thiserror::Error;

/// Errors that can occur while a directive moves through the pipeline.
///
/// Cancellation is deliberately absent: it is detected via the ledger status
/// re-check at classification time and is never represented as an error.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The directive carried no usable request configuration.
    ///
    /// Returned synchronously from `intercept` and never converted into a
    /// lifecycle event.
    #[error("invalid request configuration: {0}")]
    Config(String),

    /// The remote call failed.
    ///
    /// Carries the failure response when the remote produced one, so status
    /// routing and computed payloads can still inspect it.
    #[error("transport failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
        /// Response attached to the failure, if any.
        response: Option<Response>,
    },

    /// The poll condition was not met before the timeout elapsed.
    #[error("request timeout")]
    Timeout,
}

impl RequestError {
    /// Response associated with this error, if one exists.
    ///
    /// Timeouts yield the 418 sentinel so status routing can match on them.
    #[must_use]
    pub fn response(&self) -> Option<Response> {
        match self {
            Self::Config(_) => None,
            Self::Transport { response, .. } => response.clone(),
            Self::Timeout => Some(Response::timeout_sentinel()),
        }
    }

    /// Shorthand for a transport failure without an attached response.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            response: None,
        }
    }

    /// Shorthand for a transport failure with an attached response.
    #[must_use]
    pub fn transport_with_response(message: impl Into<String>, response: Response) -> Self {
        Self::Transport {
            message: message.into(),
            response: Some(response),
        }
    }
}
