//! Cooperative polling with timeout checkpoints.
//!
//! [`poll`] repeatedly invokes a request function until the configured
//! condition holds. The timeout is cooperative, not preemptive: the deadline
//! is only observed **between** iterations, so a call already in flight when
//! the deadline passes is allowed to finish, and still resolves if its
//! response satisfies the condition. Only the next iteration is skipped.
//! This checkpoint behavior is load-bearing and must not be replaced with
//! preemptive cancellation.

use reqcycle_core::directive::PollSpec;
use reqcycle_core::error::RequestError;
use reqcycle_core::transport::Response;
use std::future::Future;
use tokio::time::{Instant, sleep};

/// Drive `request` until `spec.condition` holds or the deadline elapses.
///
/// Each iteration waits `spec.interval`, then invokes `request`. A transport
/// error propagates immediately; there is no retry on failure.
///
/// # Errors
///
/// - [`RequestError::Timeout`] when the deadline is observed at an
///   iteration checkpoint; carries the 418 "request timeout" sentinel via
///   [`RequestError::response`].
/// - Any error the request function resolves with, unchanged.
pub async fn poll<F, Fut>(mut request: F, spec: &PollSpec) -> Result<Response, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Response, RequestError>>,
{
    let deadline = spec.timeout.map(|timeout| Instant::now() + timeout);
    let mut attempt: usize = 0;

    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            tracing::warn!(attempt, "poll deadline elapsed before condition was met");
            return Err(RequestError::Timeout);
        }

        sleep(spec.interval).await;
        attempt += 1;

        let response = request().await?;
        if (spec.condition)(&response) {
            tracing::debug!(attempt, status = response.status, "poll condition met");
            return Ok(response);
        }
    }
}
