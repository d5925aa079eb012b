//! The network capability the orchestrator drives.

use crate::error::TransportError;
use crate::request::RequestDescriptor;
use crate::response::Response;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Performs one network exchange per call.
///
/// The orchestrator calls `send` once per physical attempt. Implementations
/// should stop work and return [`TransportError::Cancelled`] once `cancel`
/// fires; the orchestrator also races every call against the token, so a
/// transport that ignores it is still abandoned promptly.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the response head with its unread body
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on network failure or cancellation.
    async fn send(
        &self,
        request: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError>;
}
