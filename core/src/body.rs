//! Body resolution for the final response of a lifecycle.

use crate::action::ParseMode;
use crate::error::{LifecycleError, ParseError};
use crate::response::{BodySource, ResponseHead};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;

/// A response body decoded according to the action's [`ParseMode`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedBody {
    /// Nothing was read, or there was nothing to read
    Empty,
    /// Parsed JSON document
    Json(serde_json::Value),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Binary(Bytes),
}

impl ResolvedBody {
    /// The JSON document, if the body resolved to one
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The text, if the body resolved to text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Whether nothing was resolved
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Resolve a response body.
///
/// Takes the body by value, so it can run at most once per response.
///
/// - [`ParseMode::None`] drops the body unread
/// - an empty body resolves to [`ResolvedBody::Empty`] in every mode
/// - under [`ParseMode::Json`], a non-ok response whose body is not JSON is
///   kept as [`ResolvedBody::Text`] rather than failing
///
/// # Errors
///
/// Returns [`LifecycleError::Transport`] if the body stream fails and
/// [`LifecycleError::Parse`] if the body does not match the parse mode.
pub async fn resolve_body(
    mode: ParseMode,
    head: &ResponseHead,
    body: BodySource,
) -> Result<ResolvedBody, LifecycleError> {
    if mode == ParseMode::None {
        return Ok(ResolvedBody::Empty);
    }

    let bytes = collect(body).await?;
    if bytes.is_empty() {
        return Ok(ResolvedBody::Empty);
    }

    let parse_error = |message: String| ParseError {
        mode,
        status: head.status,
        message,
    };

    match mode {
        ParseMode::Json => match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(ResolvedBody::Json(value)),
            Err(_) if !head.ok() => Ok(ResolvedBody::Text(
                String::from_utf8_lossy(&bytes).into_owned(),
            )),
            Err(e) => Err(parse_error(e.to_string()).into()),
        },
        ParseMode::Text => String::from_utf8(bytes.to_vec())
            .map(ResolvedBody::Text)
            .map_err(|e| parse_error(e.to_string()).into()),
        ParseMode::Binary => Ok(ResolvedBody::Binary(bytes)),
        ParseMode::None => Ok(ResolvedBody::Empty),
    }
}

async fn collect(body: BodySource) -> Result<Bytes, LifecycleError> {
    match body {
        BodySource::Empty => Ok(Bytes::new()),
        BodySource::Buffered(bytes) => Ok(bytes),
        BodySource::Stream(mut stream) => {
            let mut buffer = BytesMut::new();
            while let Some(chunk) = stream.next().await {
                buffer.extend_from_slice(&chunk?);
            }
            Ok(buffer.freeze())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use futures::stream;
    use serde_json::json;

    fn buffered(text: &'static str) -> BodySource {
        BodySource::from(Bytes::from_static(text.as_bytes()))
    }

    #[tokio::test]
    async fn json_ok_body_parses() {
        let body = resolve_body(ParseMode::Json, &ResponseHead::new(200), buffered(r#"{"id":1}"#))
            .await
            .unwrap();
        assert_eq!(body, ResolvedBody::Json(json!({ "id": 1 })));
    }

    #[tokio::test]
    async fn malformed_json_on_ok_response_is_a_parse_error() {
        let err = resolve_body(ParseMode::Json, &ResponseHead::new(200), buffered("oops"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Parse(ParseError { mode: ParseMode::Json, status: 200, .. })
        ));
    }

    #[tokio::test]
    async fn malformed_json_on_error_response_is_kept_as_text() {
        let body = resolve_body(ParseMode::Json, &ResponseHead::new(500), buffered("oops"))
            .await
            .unwrap();
        assert_eq!(body, ResolvedBody::Text("oops".into()));
    }

    #[tokio::test]
    async fn empty_body_resolves_empty_in_json_mode() {
        let body = resolve_body(ParseMode::Json, &ResponseHead::new(204), BodySource::Empty)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn none_mode_never_polls_the_stream() {
        let poisoned = BodySource::Stream(Box::pin(stream::once(async {
            Err(TransportError::Body("must not be read".into()))
        })));
        let body = resolve_body(ParseMode::None, &ResponseHead::new(200), poisoned)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn streamed_chunks_are_concatenated() {
        let chunks = vec![Ok(Bytes::from_static(b"hel")), Ok(Bytes::from_static(b"lo"))];
        let body = resolve_body(
            ParseMode::Text,
            &ResponseHead::new(200),
            BodySource::Stream(Box::pin(stream::iter(chunks))),
        )
        .await
        .unwrap();
        assert_eq!(body.as_text(), Some("hello"));
    }

    #[tokio::test]
    async fn stream_failure_is_a_transport_error() {
        let chunks = vec![
            Ok(Bytes::from_static(b"{")),
            Err(TransportError::Body("connection reset".into())),
        ];
        let err = resolve_body(
            ParseMode::Json,
            &ResponseHead::new(200),
            BodySource::Stream(Box::pin(stream::iter(chunks))),
        )
        .await
        .unwrap_err();
        assert_eq!(err, LifecycleError::Transport(TransportError::Body("connection reset".into())));
    }

    #[tokio::test]
    async fn invalid_utf8_text_is_a_parse_error() {
        let body = BodySource::from(Bytes::from_static(&[0xff, 0xfe]));
        let err = resolve_body(ParseMode::Text, &ResponseHead::new(200), body)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Parse(_)));
    }
}
