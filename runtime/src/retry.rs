//! Retry-before-fail loop.
//!
//! The loop owns the mechanics of re-issuing a request; the configured
//! [`RetryHook`](api_lifecycle_core::config::RetryHook) owns the policy.
//!
//! ```text
//! build ─▶ send ─▶ ok or no hook? ──yes──▶ accept
//!                      │ no
//!                      ▼
//!                hook(request, response) ──Stop──▶ accept current
//!                      │ Retry(next)
//!                      ▼
//!                  send(next) ──▶ hook(next, new response) ─▶ ...
//! ```
//!
//! Once the loop is entered the hook is consulted after every attempt,
//! including attempts that come back ok, until it answers `Stop`. There is
//! no attempt cap and no backoff here; the hook bounds the loop.

use crate::metrics::LifecycleMetrics;
use api_lifecycle_core::config::{RetryContext, RetryDecision};
use api_lifecycle_core::error::{LifecycleError, TransportError};
use api_lifecycle_core::record::{SettledAttempt, StartParams};
use api_lifecycle_core::request::{RequestDescriptor, build_request};
use api_lifecycle_core::response::{BodySource, Response};
use api_lifecycle_core::transport::Transport;
use tokio_util::sync::CancellationToken;

/// Run the retry-before-fail loop for an invocation.
///
/// Returns the accepted attempt together with the unread body of its
/// response. Bodies of responses the loop moves past are dropped unread.
///
/// # Errors
///
/// Returns [`LifecycleError`] if the request cannot be built, a transport
/// call fails, the retry hook fails, or the invocation is cancelled. A
/// cancellation is never retried.
pub async fn attempt(
    params: &StartParams,
    transport: &dyn Transport,
) -> Result<(SettledAttempt, BodySource), LifecycleError> {
    let cancel = &params.cancellation;
    let original_request = build_request(&params.action, params.config.settings())?;

    let mut request = original_request.clone();
    let mut response = send(transport, request.clone(), cancel).await?;
    let mut attempts: u32 = 1;

    if let Some(hook) = params.config.retry_hook().filter(|_| !response.ok()) {
        tracing::warn!(
            invocation_id = %params.invocation_id,
            status = response.status(),
            "Non-ok response, consulting retry hook"
        );

        loop {
            let context = RetryContext {
                request: request.clone(),
                original_request: original_request.clone(),
                response: response.head().clone(),
                attempt: attempts,
                params: params.clone(),
            };

            let decision = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
                decision = hook(context) => decision?,
            };

            let RetryDecision::Retry(next) = decision else {
                tracing::debug!(
                    invocation_id = %params.invocation_id,
                    attempts,
                    "Retry hook stopped"
                );
                break;
            };

            tracing::info!(
                invocation_id = %params.invocation_id,
                attempt = attempts + 1,
                url = next.url(),
                "Retrying request"
            );
            LifecycleMetrics::record_retry();

            response = send(transport, next.clone(), cancel).await?;
            request = next;
            attempts += 1;
        }
    }

    let (head, body) = response.into_parts();
    let settled = SettledAttempt {
        request,
        original_request,
        response: head,
        attempts,
    };
    Ok((settled, body))
}

/// One transport call, raced against the invocation's cancellation token.
async fn send(
    transport: &dyn Transport,
    request: RequestDescriptor,
    cancel: &CancellationToken,
) -> Result<Response, TransportError> {
    if cancel.is_cancelled() {
        return Err(TransportError::Cancelled);
    }
    LifecycleMetrics::record_attempt();

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TransportError::Cancelled),
        result = transport.send(request, cancel) => result,
    }
}
