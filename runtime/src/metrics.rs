//! Prometheus metrics for the request lifecycle.
//!
//! Counters and histograms are recorded through the `metrics` facade on every
//! invocation. They are no-ops until a recorder is installed, e.g. with
//! [`MetricsServer::start`].
//!
//! # Example
//!
//! The server does not listen on a socket; serve [`MetricsServer::render`]
//! from the application's own scrape endpoint.
//!
//! ```rust,no_run
//! use api_lifecycle_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new();
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use api_lifecycle_core::record::Stage;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder and renderer.
#[derive(Default)]
pub struct MetricsServer {
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server with no recorder installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder can only be installed once per process. A second call (e.g.
    /// from another test) logs a warning and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Lifecycle metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "api_lifecycle_invocations_total",
        "Total number of API actions entering the lifecycle"
    );
    describe_counter!(
        "api_lifecycle_transport_attempts_total",
        "Total number of physical transport calls"
    );
    describe_counter!(
        "api_lifecycle_retries_total",
        "Total number of transport calls requested by the retry hook"
    );
    describe_counter!(
        "api_lifecycle_success_total",
        "Total number of lifecycles ending in the success stage"
    );
    describe_counter!(
        "api_lifecycle_fail_total",
        "Total number of lifecycles ending in the fail stage"
    );
    describe_counter!(
        "api_lifecycle_cancelled_total",
        "Total number of lifecycles failed by cancellation"
    );
    describe_histogram!(
        "api_lifecycle_duration_seconds",
        "Time from start stage to terminal stage"
    );
}

/// Lifecycle metrics recorder.
pub struct LifecycleMetrics;

impl LifecycleMetrics {
    /// Record an action entering the lifecycle.
    pub fn record_invocation() {
        counter!("api_lifecycle_invocations_total").increment(1);
    }

    /// Record one physical transport call.
    pub fn record_attempt() {
        counter!("api_lifecycle_transport_attempts_total").increment(1);
    }

    /// Record a transport call requested by the retry hook.
    pub fn record_retry() {
        counter!("api_lifecycle_retries_total").increment(1);
    }

    /// Record the terminal stage of a lifecycle.
    pub fn record_outcome(stage: Stage, cancelled: bool, duration: Duration) {
        match stage {
            Stage::Success => counter!("api_lifecycle_success_total").increment(1),
            Stage::Fail => counter!("api_lifecycle_fail_total").increment(1),
            Stage::Start => {},
        }
        if cancelled {
            counter!("api_lifecycle_cancelled_total").increment(1);
        }
        histogram!("api_lifecycle_duration_seconds").record(duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_server_creation() {
        let server = MetricsServer::new();
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_metrics_render() {
        let mut server = MetricsServer::new();
        server.start().unwrap();

        LifecycleMetrics::record_invocation();
        LifecycleMetrics::record_attempt();
        LifecycleMetrics::record_retry();
        LifecycleMetrics::record_outcome(Stage::Fail, true, Duration::from_millis(20));

        // Another test may have installed the recorder first; metrics are
        // still recorded, this server just has no handle to render them.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("api_lifecycle_invocations_total"));
            assert!(rendered.contains("api_lifecycle_transport_attempts_total"));
            assert!(rendered.contains("api_lifecycle_fail_total"));
            assert!(rendered.contains("api_lifecycle_cancelled_total"));
        }
    }
}
