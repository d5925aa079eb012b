//! Dispatch interception.
//!
//! [`ApiMiddleware`] sits in an application's dispatch pipeline. Values that
//! carry an API action are run through the lifecycle; everything else is
//! handed to `next` untouched and without any transport call.
//!
//! # Example
//!
//! ```ignore
//! let middleware = ApiMiddleware::new(orchestrator, store_sink);
//!
//! let outcome = middleware
//!     .handle(AppAction::Logout, |action| async move { reducer.send(action).await })
//!     .await?;
//! assert!(matches!(outcome, Dispatched::Forwarded(_)));
//! ```

use crate::orchestrator::Orchestrator;
use api_lifecycle_core::action::{ApiIntent, DispatchReturns};
use api_lifecycle_core::error::HookError;
use api_lifecycle_core::record::LifecycleRecord;
use api_lifecycle_core::sink::ActionSink;
use std::future::Future;
use std::sync::Arc;

/// What the dispatching caller gets back
#[derive(Debug)]
pub enum Dispatched<A, T> {
    /// Not an API action: the value `next` produced
    Forwarded(T),
    /// API action with [`DispatchReturns::Action`]: the original value, echoed
    Intent(A),
    /// API action with [`DispatchReturns::EndAction`]: the terminal record
    Record(LifecycleRecord),
}

/// Routes API actions to the orchestrator and everything else to `next`.
#[derive(Clone)]
pub struct ApiMiddleware {
    orchestrator: Orchestrator,
    sink: Arc<dyn ActionSink>,
}

impl ApiMiddleware {
    /// Create a middleware delivering lifecycle records to `sink`
    #[must_use]
    pub fn new(orchestrator: Orchestrator, sink: Arc<dyn ActionSink>) -> Self {
        Self { orchestrator, sink }
    }

    /// Handle one dispatched value.
    ///
    /// The terminal record is always delivered to the sink; the echo mode
    /// only decides what is returned here.
    ///
    /// # Errors
    ///
    /// Returns [`HookError`] only when the fail-stage hook of an API action
    /// fails.
    pub async fn handle<A, N, Fut>(
        &self,
        value: A,
        next: N,
    ) -> Result<Dispatched<A, Fut::Output>, HookError>
    where
        A: ApiIntent,
        N: FnOnce(A) -> Fut,
        Fut: Future,
    {
        let Some(action) = value.as_api().cloned() else {
            return Ok(Dispatched::Forwarded(next(value).await));
        };

        let returns = action.dispatch_returns;
        let record = self.orchestrator.run(action, Arc::clone(&self.sink)).await?;

        Ok(match returns {
            DispatchReturns::Action => Dispatched::Intent(value),
            DispatchReturns::EndAction => Dispatched::Record(record),
        })
    }
}
