//! A transport that replays a script of outcomes.

use api_lifecycle_core::error::TransportError;
use api_lifecycle_core::request::RequestDescriptor;
use api_lifecycle_core::response::{BodySource, Response, ResponseHead};
use api_lifecycle_core::transport::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// One scripted transport outcome
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Respond with a status, headers and body
    Respond {
        /// Status code
        status: u16,
        /// Response headers
        headers: Vec<(String, String)>,
        /// Response body
        body: Bytes,
    },
    /// Fail with a transport error
    Fail(TransportError),
    /// Never respond; resolves only through cancellation
    Pending,
    /// Respond with `status`, then stall forever after the first body chunk
    StalledBody {
        /// Status code
        status: u16,
    },
}

impl Scripted {
    /// Respond with `status` and `body`
    #[must_use]
    pub fn status(status: u16, body: impl Into<Bytes>) -> Self {
        Self::Respond {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Fail the attempt
    #[must_use]
    pub const fn error(error: TransportError) -> Self {
        Self::Fail(error)
    }

    /// Hang until the invocation is cancelled
    #[must_use]
    pub const fn pending() -> Self {
        Self::Pending
    }

    /// Respond, but never finish delivering the body
    #[must_use]
    pub const fn stalled_body(status: u16) -> Self {
        Self::StalledBody { status }
    }

    /// Add a response header (ignored for non-response steps)
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Self::Respond { headers, .. } = &mut self {
            headers.push((name.to_ascii_lowercase(), value.to_string()));
        }
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RequestDescriptor>>,
    body_reads: Arc<AtomicUsize>,
    entered_pending: Notify,
}

/// Transport replaying [`Scripted`] outcomes in order.
///
/// Clones share the script and the request log, so a test can hand one
/// clone to the orchestrator and inspect the other afterwards. Once the
/// script runs out every further call fails with a network error.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Create a transport that replays `script`
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        let inner = Inner {
            script: Mutex::new(script.into_iter().collect()),
            ..Inner::default()
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Number of transport calls made
    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.inner.requests).len()
    }

    /// Every request sent, in order
    #[must_use]
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        lock(&self.inner.requests).clone()
    }

    /// Number of response bodies that were actually read
    #[must_use]
    pub fn body_reads(&self) -> usize {
        self.inner.body_reads.load(Ordering::SeqCst)
    }

    /// Wait until a [`Scripted::Pending`] step has been reached, or the
    /// body of a [`Scripted::StalledBody`] step has started to be read
    pub async fn entered_pending(&self) {
        self.inner.entered_pending.notified().await;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        lock(&self.inner.requests).push(request);
        let step = lock(&self.inner.script).pop_front();

        match step {
            Some(Scripted::Respond {
                status,
                headers,
                body,
            }) => {
                let mut head = ResponseHead::new(status);
                head.headers.extend(headers);
                Ok(Response::new(head, self.counted_body(body)))
            },
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Pending) => {
                self.inner.entered_pending.notify_one();
                cancel.cancelled().await;
                Err(TransportError::Cancelled)
            },
            Some(Scripted::StalledBody { status }) => {
                Ok(Response::new(ResponseHead::new(status), self.stalled_body()))
            },
            None => Err(TransportError::Network("script exhausted".to_string())),
        }
    }
}

impl MockTransport {
    /// Body that bumps `body_reads` when first polled
    fn counted_body(&self, body: Bytes) -> BodySource {
        if body.is_empty() {
            return BodySource::Empty;
        }
        let reads = Arc::clone(&self.inner.body_reads);
        let stream = futures::stream::once(async move {
            reads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TransportError>(body)
        });
        BodySource::Stream(stream.boxed())
    }

    /// Body that yields one chunk, signals `entered_pending`, then never ends
    fn stalled_body(&self) -> BodySource {
        let inner = Arc::clone(&self.inner);
        let stream = futures::stream::once(async move {
            inner.body_reads.fetch_add(1, Ordering::SeqCst);
            inner.entered_pending.notify_one();
            Ok::<_, TransportError>(Bytes::from_static(b"{"))
        })
        .chain(futures::stream::pending());
        BodySource::Stream(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_lifecycle_core::action::Method;

    #[tokio::test]
    async fn replays_script_in_order_then_fails() {
        let transport = MockTransport::new([
            Scripted::status(500, "a").with_header("Retry-After", "1"),
            Scripted::error(TransportError::Network("reset".into())),
        ]);
        let cancel = CancellationToken::new();
        let request = RequestDescriptor::new(Method::Get, "/x");

        let first = transport.send(request.clone(), &cancel).await.unwrap();
        assert_eq!(first.status(), 500);
        assert_eq!(first.head().header("retry-after"), Some("1"));

        let second = transport.send(request.clone(), &cancel).await.unwrap_err();
        assert_eq!(second, TransportError::Network("reset".into()));

        let third = transport.send(request, &cancel).await.unwrap_err();
        assert!(matches!(third, TransportError::Network(_)));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn bodies_count_only_when_read() {
        let transport = MockTransport::new([Scripted::status(200, "x"), Scripted::status(200, "y")]);
        let cancel = CancellationToken::new();
        let request = RequestDescriptor::new(Method::Get, "/x");

        let _unread = transport.send(request.clone(), &cancel).await.unwrap();
        let read = transport.send(request, &cancel).await.unwrap();
        let (_, body) = read.into_parts();
        if let BodySource::Stream(mut stream) = body {
            while stream.next().await.is_some() {}
        }

        assert_eq!(transport.body_reads(), 1);
    }

    #[tokio::test]
    async fn pending_resolves_on_cancel() {
        let transport = MockTransport::new([Scripted::pending()]);
        let cancel = CancellationToken::new();
        let handle = {
            let transport = transport.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                transport
                    .send(RequestDescriptor::new(Method::Get, "/x"), &cancel)
                    .await
            })
        };

        transport.entered_pending().await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap().unwrap_err(), TransportError::Cancelled);
    }

    #[tokio::test]
    async fn stalled_body_yields_one_chunk_then_never_ends() {
        let transport = MockTransport::new([Scripted::stalled_body(200)]);
        let response = transport
            .send(RequestDescriptor::new(Method::Get, "/x"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let (_, body) = response.into_parts();
        let BodySource::Stream(mut stream) = body else {
            panic!("expected a streamed body");
        };
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"{"));
        transport.entered_pending().await;

        let next = tokio::time::timeout(std::time::Duration::from_millis(20), stream.next()).await;
        assert!(next.is_err());
        assert_eq!(transport.body_reads(), 1);
    }
}
