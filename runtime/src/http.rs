//! `reqwest`-backed transport.

use api_lifecycle_core::action::Method;
use api_lifecycle_core::error::TransportError;
use api_lifecycle_core::request::RequestDescriptor;
use api_lifecycle_core::response::{BodySource, Response, ResponseHead};
use api_lifecycle_core::transport::Transport;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Transport performing real HTTP exchanges.
///
/// The response body is left as a stream; it is read only if the response
/// is the one the lifecycle accepts.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an existing client (connection pool, TLS and timeout settings)
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

const fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        let url = reqwest::Url::parse(request.url())
            .map_err(|e| TransportError::Network(format!("invalid URL {:?}: {e}", request.url())))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::Network(format!(
                "unsupported URL scheme {:?}, expected http:// or https://",
                url.scheme()
            )));
        }

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method()), url);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = builder.send() => result.map_err(|e| TransportError::Network(e.to_string()))?,
        };

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let head = ResponseHead {
            status: response.status().as_u16(),
            headers,
        };

        tracing::trace!(status = head.status, url = request.url(), "Response received");

        let body = response
            .bytes_stream()
            .map_err(|e| TransportError::Body(e.to_string()))
            .boxed();

        Ok(Response::new(head, BodySource::Stream(body)))
    }
}
