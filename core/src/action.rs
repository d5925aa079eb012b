//! API actions - the intents this orchestrator owns.
//!
//! An [`ApiAction`] describes one HTTP-style call: where to send it, what to
//! send, how to read the answer and what the dispatching caller gets back.
//! Application action types opt in through [`ApiIntent`]; values that are
//! not API actions pass through the middleware untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl Method {
    /// Canonical upper-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload carried by an API action
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RequestBody {
    /// No payload
    #[default]
    None,
    /// JSON document, sent with `content-type: application/json`
    Json(serde_json::Value),
    /// Plain text
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

/// How the final response body is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Parse as JSON
    #[default]
    Json,
    /// Decode as UTF-8 text
    Text,
    /// Keep the raw bytes
    Binary,
    /// Do not read the body at all
    None,
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Text => write!(f, "text"),
            Self::Binary => write!(f, "binary"),
            Self::None => write!(f, "none"),
        }
    }
}

/// What a dispatching caller receives back from the middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchReturns {
    /// The original action is echoed back
    #[default]
    Action,
    /// The terminal lifecycle record is returned
    EndAction,
}

/// A request to perform one API call through the lifecycle.
///
/// # Example
///
/// ```
/// use api_lifecycle_core::action::{ApiAction, DispatchReturns, ParseMode};
/// use serde_json::json;
///
/// let action = ApiAction::post("/items")
///     .with_json(json!({ "name": "widget" }))
///     .with_header("x-request-source", "inventory")
///     .parse_as(ParseMode::Json)
///     .returning(DispatchReturns::EndAction);
///
/// assert_eq!(action.endpoint, "/items");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAction {
    /// Absolute URL, or a path joined onto the configured base URL
    pub endpoint: String,
    /// HTTP method
    #[serde(default)]
    pub method: Method,
    /// Request payload
    #[serde(default)]
    pub body: RequestBody,
    /// Headers layered over the configured default headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// How the final response body is resolved
    #[serde(default)]
    pub parse_mode: ParseMode,
    /// What the dispatching caller receives back
    #[serde(default)]
    pub dispatch_returns: DispatchReturns,
}

impl ApiAction {
    /// Create an action for the given method and endpoint
    #[must_use]
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body: RequestBody::None,
            headers: BTreeMap::new(),
            parse_mode: ParseMode::default(),
            dispatch_returns: DispatchReturns::default(),
        }
    }

    /// GET request
    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    /// POST request
    #[must_use]
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Post, endpoint)
    }

    /// PUT request
    #[must_use]
    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Put, endpoint)
    }

    /// DELETE request
    #[must_use]
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    /// Attach a JSON payload
    #[must_use]
    pub fn with_json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Attach a text payload
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = RequestBody::Text(text.into());
        self
    }

    /// Attach a raw payload
    #[must_use]
    pub fn with_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = RequestBody::Bytes(bytes.into());
        self
    }

    /// Add a header, replacing any previous value under the same name
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body parse mode
    #[must_use]
    pub const fn parse_as(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    /// Set what the dispatching caller receives back
    #[must_use]
    pub const fn returning(mut self, returns: DispatchReturns) -> Self {
        self.dispatch_returns = returns;
        self
    }
}

/// Discriminates API actions from the rest of an application's actions.
///
/// Values for which `as_api` returns `None` pass through the middleware
/// untouched. Values that do carry an API action are kept intact, so the
/// middleware can echo the original value back to the dispatching caller.
///
/// ```
/// use api_lifecycle_core::action::{ApiAction, ApiIntent};
///
/// enum AppAction {
///     Api(ApiAction),
///     Logout,
/// }
///
/// impl ApiIntent for AppAction {
///     fn as_api(&self) -> Option<&ApiAction> {
///         match self {
///             Self::Api(action) => Some(action),
///             Self::Logout => None,
///         }
///     }
/// }
/// ```
pub trait ApiIntent {
    /// The API action carried by this value, if any
    fn as_api(&self) -> Option<&ApiAction>;
}

impl ApiIntent for ApiAction {
    fn as_api(&self) -> Option<&ApiAction> {
        Some(self)
    }
}
