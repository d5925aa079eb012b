//! The orchestrator: owns the full lifecycle of one API action.
//!
//! ```text
//! start ─▶ retry::attempt ─▶ resolve body ─▶ success | fail
//!   │            │                 │
//!   └────────────┴── error ────────┴──────▶ fail (error bundle)
//! ```
//!
//! Every failure up to and including the success hook is folded into a
//! fail-stage record. The single exception is the fail hook itself: if it
//! fails there is nowhere left to route the error, so it is returned.

use crate::dispatcher::dispatch_stage;
use crate::metrics::LifecycleMetrics;
use crate::retry;
use api_lifecycle_core::action::ApiAction;
use api_lifecycle_core::body::{ResolvedBody, resolve_body};
use api_lifecycle_core::config::Config;
use api_lifecycle_core::environment::Clock;
use api_lifecycle_core::error::{HookError, LifecycleError, TransportError};
use api_lifecycle_core::record::{LifecycleRecord, SettledAttempt, Stage, StartParams};
use api_lifecycle_core::sink::ActionSink;
use api_lifecycle_core::transport::Transport;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Runs API actions through the lifecycle.
///
/// Cheap to clone; invocations share nothing mutable except what the sink
/// exposes.
///
/// # Example
///
/// ```ignore
/// let orchestrator = Orchestrator::new(config, ReqwestTransport::default());
///
/// let record = orchestrator
///     .run(ApiAction::get("/items"), Arc::new(NoopSink))
///     .await?;
///
/// match record.stage() {
///     Stage::Success => println!("{:?}", record.body()),
///     _ => eprintln!("failed: {:?} {:?}", record.status(), record.error()),
/// }
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
}

impl Orchestrator {
    /// Create an orchestrator from a configuration and a transport
    #[must_use]
    pub fn new(config: Config, transport: impl Transport + 'static) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    /// Create an orchestrator from already shared parts
    #[must_use]
    pub fn from_shared(config: Arc<Config>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Configuration in effect
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Prepare an invocation with a fresh cancellation token.
    ///
    /// Take [`Invocation::cancellation_token`] before calling
    /// [`Invocation::run`] to be able to abort it, e.g. after a deadline.
    #[must_use]
    pub fn invocation(&self, action: ApiAction) -> Invocation {
        Invocation {
            id: Uuid::new_v4(),
            action: Arc::new(action),
            cancellation: CancellationToken::new(),
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
        }
    }

    /// Run one action through the lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`HookError`] only when the fail-stage hook fails. All other
    /// failures are reported as a fail-stage record.
    pub async fn run(
        &self,
        action: ApiAction,
        sink: Arc<dyn ActionSink>,
    ) -> Result<LifecycleRecord, HookError> {
        self.invocation(action).run(sink).await
    }
}

/// One pending run of an action, owning its cancellation token.
///
/// `run` consumes the invocation, so a token is never reused.
pub struct Invocation {
    id: Uuid,
    action: Arc<ApiAction>,
    cancellation: CancellationToken,
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
}

impl Invocation {
    /// Id used in logs and records
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// A handle to this invocation's cancellation token
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Drive the lifecycle to its terminal stage.
    ///
    /// # Errors
    ///
    /// Returns [`HookError`] only when the fail-stage hook fails.
    pub async fn run(self, sink: Arc<dyn ActionSink>) -> Result<LifecycleRecord, HookError> {
        let span = tracing::info_span!(
            "api_lifecycle",
            invocation_id = %self.id,
            method = %self.action.method,
            endpoint = %self.action.endpoint,
        );
        self.run_inner(sink).instrument(span).await
    }

    async fn run_inner(self, sink: Arc<dyn ActionSink>) -> Result<LifecycleRecord, HookError> {
        LifecycleMetrics::record_invocation();
        let clock_start = Instant::now();

        let params = StartParams {
            invocation_id: self.id,
            action: self.action,
            cancellation: self.cancellation,
            sink,
            started_at: self.config.clock().now(),
            config: self.config,
        };

        let result = match dispatch_stage(LifecycleRecord::start(params.clone())).await {
            Ok(_) => match exchange(&params, self.transport.as_ref()).await {
                Ok((settled, body)) => finish_settled(params, settled, body).await,
                Err(error) => finish_failed(params, error).await,
            },
            Err(error) => finish_failed(params, error.into()).await,
        };

        match &result {
            Ok(record) => {
                LifecycleMetrics::record_outcome(
                    record.stage(),
                    record.is_cancelled(),
                    clock_start.elapsed(),
                );
                tracing::debug!(stage = %record.stage(), status = ?record.status(), "Lifecycle finished");
            },
            Err(error) => {
                LifecycleMetrics::record_outcome(Stage::Fail, false, clock_start.elapsed());
                tracing::error!(%error, "Fail-stage hook failed; no further stage to route to");
            },
        }
        result
    }
}

/// Transport with retries, then exactly one body resolution on the accepted response.
async fn exchange(
    params: &StartParams,
    transport: &dyn Transport,
) -> Result<(SettledAttempt, ResolvedBody), LifecycleError> {
    let (settled, body) = retry::attempt(params, transport).await?;

    let body = tokio::select! {
        biased;
        () = params.cancellation.cancelled() => return Err(TransportError::Cancelled.into()),
        body = resolve_body(params.action.parse_mode, &settled.response, body) => body?,
    };

    Ok((settled, body))
}

async fn finish_settled(
    params: StartParams,
    settled: SettledAttempt,
    body: ResolvedBody,
) -> Result<LifecycleRecord, HookError> {
    let fallback = params.clone();
    let record = LifecycleRecord::settled(params.settle(settled, body));

    match (record.stage(), dispatch_stage(record).await) {
        (_, Ok(record)) => Ok(record),
        (Stage::Success, Err(error)) => finish_failed(fallback, error.into()).await,
        (_, Err(error)) => Err(error),
    }
}

async fn finish_failed(
    params: StartParams,
    error: LifecycleError,
) -> Result<LifecycleRecord, HookError> {
    if error.is_cancelled() {
        tracing::info!("Lifecycle cancelled");
    } else {
        tracing::warn!(%error, "Lifecycle failed");
    }
    dispatch_stage(LifecycleRecord::errored(params.fail(error))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_lifecycle_core::action::ParseMode;
    use api_lifecycle_testing::{MockTransport, RecordingSink, Scripted};
    use serde_json::json;

    #[tokio::test]
    async fn success_path_resolves_body() {
        let transport = MockTransport::new([Scripted::status(200, r#"{"id":1}"#)]);
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = Orchestrator::new(Config::default(), transport.clone());

        let record = orchestrator
            .run(ApiAction::get("/items"), sink.clone())
            .await
            .unwrap();

        assert_eq!(record.stage(), Stage::Success);
        assert_eq!(record.body(), Some(&ResolvedBody::Json(json!({ "id": 1 }))));
        assert_eq!(sink.stages(), vec![Stage::Start, Stage::Success]);
    }

    #[tokio::test]
    async fn parse_failure_folds_into_fail_path() {
        let transport = MockTransport::new([Scripted::status(200, "not json")]);
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = Orchestrator::new(Config::default(), transport);

        let record = orchestrator
            .run(ApiAction::get("/items").parse_as(ParseMode::Json), sink.clone())
            .await
            .unwrap();

        assert_eq!(record.stage(), Stage::Fail);
        assert!(matches!(record.error(), Some(LifecycleError::Parse(_))));
        assert_eq!(record.status(), None);
        assert_eq!(sink.stages(), vec![Stage::Start, Stage::Fail]);
    }

    #[tokio::test]
    async fn start_hook_failure_skips_transport() {
        let transport = MockTransport::new([Scripted::status(200, "{}")]);
        let config = Config::builder()
            .on_start(|_| async { Err(HookError::new(Stage::Start, "not signed in")) })
            .build();
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = Orchestrator::new(config, transport.clone());

        let record = orchestrator
            .run(ApiAction::get("/items"), sink.clone())
            .await
            .unwrap();

        assert_eq!(record.stage(), Stage::Fail);
        assert_eq!(
            record.error(),
            Some(&LifecycleError::Hook(HookError::new(Stage::Start, "not signed in")))
        );
        assert_eq!(transport.calls(), 0);
        assert_eq!(sink.stages(), vec![Stage::Fail]);
    }

    #[tokio::test]
    async fn success_hook_failure_becomes_fail_record() {
        let transport = MockTransport::new([Scripted::status(200, "{}")]);
        let config = Config::builder()
            .on_success(|_| async { Err(HookError::new(Stage::Success, "reducer rejected")) })
            .build();
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = Orchestrator::new(config, transport);

        let record = orchestrator
            .run(ApiAction::get("/items"), sink.clone())
            .await
            .unwrap();

        assert_eq!(record.stage(), Stage::Fail);
        assert!(matches!(record.error(), Some(LifecycleError::Hook(_))));
        assert_eq!(sink.stages(), vec![Stage::Start, Stage::Fail]);
    }

    #[tokio::test]
    async fn fail_hook_failure_propagates() {
        let transport = MockTransport::new([Scripted::status(500, "oops")]);
        let config = Config::builder()
            .on_fail(|_| async { Err(HookError::new(Stage::Fail, "cannot record failure")) })
            .build();
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = Orchestrator::new(config, transport);

        let err = orchestrator
            .run(ApiAction::get("/items"), sink.clone())
            .await
            .unwrap_err();

        assert_eq!(err, HookError::new(Stage::Fail, "cannot record failure"));
        assert_eq!(sink.stages(), vec![Stage::Start]);
    }

    #[tokio::test]
    async fn each_invocation_gets_a_fresh_token() {
        let orchestrator = Orchestrator::new(Config::default(), MockTransport::new([]));
        let first = orchestrator.invocation(ApiAction::get("/a"));
        let second = orchestrator.invocation(ApiAction::get("/a"));

        first.cancellation_token().cancel();

        assert!(!second.cancellation_token().is_cancelled());
        assert_ne!(first.id(), second.id());
    }
}
