//! Error taxonomy for the request lifecycle.
//!
//! Every error raised between the start stage and the terminal stage is folded
//! into a fail-stage [`LifecycleRecord`](crate::record::LifecycleRecord). The
//! only error that escapes an invocation is a [`HookError`] raised by the
//! fail-stage hook itself, since there is no later stage to route it to.

use crate::action::ParseMode;
use crate::record::Stage;
use thiserror::Error;

/// The intent's request parameters could not be turned into a request descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The intent carried no endpoint
    #[error("Request endpoint is empty")]
    EmptyEndpoint,

    /// A header name is not a valid token
    #[error("Invalid header name: {0:?}")]
    InvalidHeaderName(String),

    /// A header value contains a line break
    #[error("Invalid value for header {0:?}")]
    InvalidHeaderValue(String),

    /// The JSON payload could not be serialized
    #[error("Failed to serialize JSON payload: {0}")]
    Payload(String),
}

/// A single network exchange failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The invocation's cancellation token fired while the attempt was in flight
    #[error("Request was cancelled")]
    Cancelled,

    /// Connection, TLS, DNS or protocol failure
    #[error("Network error: {0}")]
    Network(String),

    /// The response body stream failed part way through
    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// The final response body did not match the intent's declared parse mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to parse {mode} body of response with status {status}: {message}")]
pub struct ParseError {
    /// Declared parse mode
    pub mode: ParseMode,
    /// Status of the response whose body failed to parse
    pub status: u16,
    /// Parser diagnostic
    pub message: String,
}

/// A caller-supplied hook failed.
///
/// Hooks must not fail during the fail stage; when they do, the error is
/// returned from the orchestrator instead of being folded into a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} hook failed: {message}")]
pub struct HookError {
    /// Stage whose hook failed (retry hooks report [`Stage::Fail`])
    pub stage: Stage,
    /// Description supplied by the hook
    pub message: String,
}

impl HookError {
    /// Create a hook error for the given stage
    #[must_use]
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Any failure folded into the fail path of a lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Request descriptor could not be built
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Network exchange failed or was cancelled
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Final body failed to parse
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A start, success or retry hook failed
    #[error(transparent)]
    Hook(#[from] HookError),
}

impl LifecycleError {
    /// Whether this failure was caused by the invocation's cancellation token
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Cancelled))
    }
}

/// Settings could not be loaded or failed validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML document is malformed
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment variable holds an unusable value
    #[error("Invalid environment variable {name}: {reason}")]
    InvalidEnv {
        /// Variable name
        name: String,
        /// What was wrong with it
        reason: String,
    },

    /// Settings are well-formed but inconsistent
    #[error("Settings validation failed: {0}")]
    Validation(String),
}
