//! Responses returned by a transport.
//!
//! A [`Response`] couples a cloneable [`ResponseHead`] with a [`BodySource`]
//! that can be taken exactly once, by value. Nothing in the lifecycle can
//! read a body twice because nothing can hold a second owner of it.

use crate::error::TransportError;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::collections::BTreeMap;
use std::fmt;

/// Status line and headers of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status code
    pub status: u16,
    /// Headers, keyed by lower-cased name
    pub headers: BTreeMap<String, String>,
}

impl ResponseHead {
    /// Create a head with no headers
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
        }
    }

    /// Whether the status is in the 2xx range
    #[must_use]
    pub const fn ok(&self) -> bool {
        self.status >= 200 && self.status <= 299
    }

    /// Look up a header case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Readable body of a response
pub enum BodySource {
    /// No body
    Empty,
    /// Fully buffered body
    Buffered(Bytes),
    /// Body still arriving from the network
    Stream(BoxStream<'static, Result<Bytes, TransportError>>),
}

impl fmt::Debug for BodySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "BodySource::Empty"),
            Self::Buffered(bytes) => f
                .debug_tuple("BodySource::Buffered")
                .field(&bytes.len())
                .finish(),
            Self::Stream(_) => write!(f, "BodySource::Stream(<stream>)"),
        }
    }
}

impl From<Bytes> for BodySource {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::Empty
        } else {
            Self::Buffered(bytes)
        }
    }
}

/// The physical outcome of one transport attempt
#[derive(Debug)]
pub struct Response {
    head: ResponseHead,
    body: BodySource,
}

impl Response {
    /// Assemble a response from its parts
    #[must_use]
    pub const fn new(head: ResponseHead, body: BodySource) -> Self {
        Self { head, body }
    }

    /// Convenience constructor for a buffered response
    #[must_use]
    pub fn buffered(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(ResponseHead::new(status), BodySource::from(body.into()))
    }

    /// Set a header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.head
            .headers
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Status line and headers
    #[must_use]
    pub const fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// HTTP status code
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.head.status
    }

    /// Whether the status is in the 2xx range
    #[must_use]
    pub const fn ok(&self) -> bool {
        self.head.ok()
    }

    /// Split into head and the single-use body
    #[must_use]
    pub fn into_parts(self) -> (ResponseHead, BodySource) {
        (self.head, self.body)
    }
}
