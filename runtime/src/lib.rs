//! # API Lifecycle Runtime
//!
//! Runtime implementation for the API request lifecycle orchestrator.
//!
//! This crate drives [`ApiAction`](api_lifecycle_core::action::ApiAction)s
//! through the start / success / fail stages defined in the core crate.
//!
//! ## Core Components
//!
//! - **Orchestrator**: owns one invocation from start stage to terminal stage
//! - **Stage Dispatcher**: runs the stage hook and delivers the record to the sink
//! - **Retry Loop**: re-issues requests while the retry hook asks for it
//! - **Middleware**: separates API actions from everything else in a dispatch pipeline
//! - **Transports and Sinks**: `reqwest` transport, broadcast sink
//!
//! ## Example
//!
//! ```ignore
//! use api_lifecycle_core::{ApiAction, Config, NoopSink};
//! use api_lifecycle_runtime::{Orchestrator, ReqwestTransport};
//! use std::sync::Arc;
//!
//! let config = Config::builder()
//!     .base_url("https://api.example.com")
//!     .default_header("accept", "application/json")
//!     .build();
//! let orchestrator = Orchestrator::new(config, ReqwestTransport::default());
//!
//! let record = orchestrator
//!     .run(ApiAction::get("/items"), Arc::new(NoopSink))
//!     .await?;
//! ```

/// Stage hook execution and record delivery
pub mod dispatcher;

/// `reqwest`-backed transport
pub mod http;

/// Prometheus metrics for observability
pub mod metrics;

/// Routing of dispatched values
pub mod middleware;

/// The lifecycle orchestrator
pub mod orchestrator;

/// Retry-before-fail loop
pub mod retry;

/// Broadcast sink
pub mod sink;

pub use dispatcher::dispatch_stage;
pub use http::ReqwestTransport;
pub use crate::metrics::{LifecycleMetrics, MetricsError, MetricsServer};
pub use middleware::{ApiMiddleware, Dispatched};
pub use orchestrator::{Invocation, Orchestrator};
pub use sink::BroadcastSink;
