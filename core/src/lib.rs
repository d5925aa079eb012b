//! # API Lifecycle Core
//!
//! Core traits and types for the API request lifecycle orchestrator.
//!
//! An application dispatches an [`ApiAction`](action::ApiAction). The
//! orchestrator (in the runtime crate) drives it through a fixed sequence of
//! stages and delivers a [`LifecycleRecord`](record::LifecycleRecord) to the
//! application's [`ActionSink`](sink::ActionSink) at each one.
//!
//! ## Core Concepts
//!
//! - **Action**: the intent describing one HTTP-style call
//! - **Request Descriptor**: immutable request built from an action and the settings
//! - **Transport**: performs one network exchange per attempt
//! - **Stage**: `start`, then exactly one of `success` / `fail`
//! - **Stage Parameter Bundle**: grows from stage to stage, never shrinks
//! - **Lifecycle Record**: the tagged value delivered at each stage
//!
//! ## Lifecycle
//!
//! ```text
//! build ─▶ start ─▶ transport ─▶ (retry hook ─▶ transport)* ─▶ body ─▶ success | fail
//!   └──────────────────────── any error ────────────────────────────────▶ fail
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use tokio_util::sync::CancellationToken;

/// API actions and the intent discriminator
pub mod action;

/// Response body resolution
pub mod body;

/// Settings, hooks and the configuration builder
pub mod config;

/// Injected environment (clock)
pub mod environment;

/// Error taxonomy
pub mod error;

/// Stages, parameter bundles and lifecycle records
pub mod record;

/// Request descriptors and the request builder
pub mod request;

/// Responses and single-use body sources
pub mod response;

/// Record sinks
pub mod sink;

/// Transport trait
pub mod transport;

pub use action::{ApiAction, ApiIntent, DispatchReturns, Method, ParseMode, RequestBody};
pub use body::{ResolvedBody, resolve_body};
pub use config::{Config, ConfigBuilder, RetryContext, RetryDecision, RetryHook, Settings, StageHook};
pub use error::{BuildError, ConfigError, HookError, LifecycleError, ParseError, TransportError};
pub use record::{EndParams, ErrorParams, LifecycleRecord, Stage, StageParams, StartParams};
pub use request::{RequestDescriptor, build_request};
pub use response::{BodySource, Response, ResponseHead};
pub use sink::{ActionSink, NoopSink};
pub use transport::Transport;
