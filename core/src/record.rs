//! Lifecycle stages, stage parameter bundles and lifecycle records.
//!
//! The parameter bundle only grows. [`StartParams`] is what every stage sees;
//! [`EndParams`] and [`ErrorParams`] each own the `StartParams` they grew
//! from, so a later stage can never observe less than an earlier one. Both
//! deref to `StartParams`.

use crate::action::ApiAction;
use crate::body::ResolvedBody;
use crate::config::Config;
use crate::environment::Clock;
use crate::error::LifecycleError;
use crate::request::RequestDescriptor;
use crate::response::ResponseHead;
use crate::sink::ActionSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A visible checkpoint of the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Dispatched before the first transport call
    Start,
    /// The final response was ok
    Success,
    /// The final response was not ok, or the lifecycle failed
    Fail,
}

impl Stage {
    /// Whether this stage ends the lifecycle
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Fail)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Success => write!(f, "success"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Bundle available from the start stage onwards
#[derive(Clone)]
pub struct StartParams {
    /// Unique id of this invocation (used in logs)
    pub invocation_id: Uuid,
    /// The action being executed
    pub action: Arc<ApiAction>,
    /// This invocation's cancellation token
    pub cancellation: CancellationToken,
    /// Where lifecycle records are delivered
    pub sink: Arc<dyn ActionSink>,
    /// Configuration in effect
    pub config: Arc<Config>,
    /// When the invocation started
    pub started_at: DateTime<Utc>,
}

impl StartParams {
    /// Grow into the bundle for a settled (response received) lifecycle
    #[must_use]
    pub fn settle(self, attempt: SettledAttempt, body: ResolvedBody) -> EndParams {
        let finished_at = self.config.clock().now();
        EndParams {
            start: self,
            request: attempt.request,
            original_request: attempt.original_request,
            response: attempt.response,
            attempts: attempt.attempts,
            body,
            finished_at,
        }
    }

    /// Grow into the bundle for a lifecycle that failed with an error
    #[must_use]
    pub fn fail(self, error: LifecycleError) -> ErrorParams {
        let finished_at = self.config.clock().now();
        ErrorParams {
            start: self,
            error: Arc::new(error),
            finished_at,
        }
    }
}

impl fmt::Debug for StartParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartParams")
            .field("invocation_id", &self.invocation_id)
            .field("action", &self.action)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// Outcome of the retry-before-fail loop, before body resolution
#[derive(Debug, Clone)]
pub struct SettledAttempt {
    /// Request of the accepted attempt
    pub request: RequestDescriptor,
    /// Request built from the action
    pub original_request: RequestDescriptor,
    /// Head of the accepted response
    pub response: ResponseHead,
    /// Total transport calls made
    pub attempts: u32,
}

/// Bundle for a lifecycle whose final response was received
#[derive(Debug, Clone)]
pub struct EndParams {
    /// Everything the start stage saw
    pub start: StartParams,
    /// Request of the accepted attempt
    pub request: RequestDescriptor,
    /// Request built from the action, before any retry
    pub original_request: RequestDescriptor,
    /// Head of the accepted response
    pub response: ResponseHead,
    /// Total transport calls made
    pub attempts: u32,
    /// Resolved body of the accepted response
    pub body: ResolvedBody,
    /// When the lifecycle settled
    pub finished_at: DateTime<Utc>,
}

impl Deref for EndParams {
    type Target = StartParams;

    fn deref(&self) -> &StartParams {
        &self.start
    }
}

/// Bundle for a lifecycle that failed with an error
#[derive(Debug, Clone)]
pub struct ErrorParams {
    /// Everything the start stage saw
    pub start: StartParams,
    /// What went wrong
    pub error: Arc<LifecycleError>,
    /// When the lifecycle failed
    pub finished_at: DateTime<Utc>,
}

impl Deref for ErrorParams {
    type Target = StartParams;

    fn deref(&self) -> &StartParams {
        &self.start
    }
}

/// Parameter bundle carried by a record
#[derive(Debug, Clone)]
pub enum StageParams {
    /// Start stage
    Start(StartParams),
    /// A final response was received and its body resolved
    Settled(EndParams),
    /// The lifecycle failed with an error
    Errored(ErrorParams),
}

impl StageParams {
    /// The start bundle every variant carries
    #[must_use]
    pub const fn start(&self) -> &StartParams {
        match self {
            Self::Start(params) => params,
            Self::Settled(params) => &params.start,
            Self::Errored(params) => &params.start,
        }
    }
}

/// The tagged value delivered at each stage.
///
/// Records are only built through [`LifecycleRecord::start`],
/// [`LifecycleRecord::settled`] and [`LifecycleRecord::errored`], so the
/// stage always agrees with the bundle: `Success` only ever carries a
/// settled ok response.
#[derive(Debug, Clone)]
pub struct LifecycleRecord {
    stage: Stage,
    params: StageParams,
    payload: Option<serde_json::Value>,
}

impl LifecycleRecord {
    /// Start-stage record
    #[must_use]
    pub const fn start(params: StartParams) -> Self {
        Self {
            stage: Stage::Start,
            params: StageParams::Start(params),
            payload: None,
        }
    }

    /// Terminal record for a received response: success if ok, fail otherwise
    #[must_use]
    pub const fn settled(params: EndParams) -> Self {
        let stage = if params.response.ok() {
            Stage::Success
        } else {
            Stage::Fail
        };
        Self {
            stage,
            params: StageParams::Settled(params),
            payload: None,
        }
    }

    /// Fail-stage record for an error
    #[must_use]
    pub const fn errored(params: ErrorParams) -> Self {
        Self {
            stage: Stage::Fail,
            params: StageParams::Errored(params),
            payload: None,
        }
    }

    /// Attach an application-defined payload
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Stage of this record
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Parameter bundle
    #[must_use]
    pub const fn params(&self) -> &StageParams {
        &self.params
    }

    /// Application-defined payload attached by a hook
    #[must_use]
    pub const fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    /// The action this record belongs to
    #[must_use]
    pub fn action(&self) -> &ApiAction {
        &self.params.start().action
    }

    /// Id of the invocation that produced this record
    #[must_use]
    pub const fn invocation_id(&self) -> Uuid {
        self.params.start().invocation_id
    }

    /// Status of the accepted response, if one was received
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match &self.params {
            StageParams::Settled(params) => Some(params.response.status),
            _ => None,
        }
    }

    /// Resolved body, if a response was received
    #[must_use]
    pub const fn body(&self) -> Option<&ResolvedBody> {
        match &self.params {
            StageParams::Settled(params) => Some(&params.body),
            _ => None,
        }
    }

    /// Request of the accepted attempt, if a response was received
    #[must_use]
    pub const fn request(&self) -> Option<&RequestDescriptor> {
        match &self.params {
            StageParams::Settled(params) => Some(&params.request),
            _ => None,
        }
    }

    /// Request built from the action, if a response was received
    #[must_use]
    pub const fn original_request(&self) -> Option<&RequestDescriptor> {
        match &self.params {
            StageParams::Settled(params) => Some(&params.original_request),
            _ => None,
        }
    }

    /// Error that failed the lifecycle, if any
    #[must_use]
    pub fn error(&self) -> Option<&LifecycleError> {
        match &self.params {
            StageParams::Errored(params) => Some(&params.error),
            _ => None,
        }
    }

    /// Whether this record failed because the invocation was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.error().is_some_and(LifecycleError::is_cancelled)
    }
}
