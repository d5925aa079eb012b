//! Destinations for lifecycle records.

use crate::record::LifecycleRecord;
use async_trait::async_trait;

/// The state container side of the lifecycle.
///
/// Every record the stage dispatcher produces (start and terminal) is handed
/// to the invocation's sink. Implementations must not block for long: the
/// lifecycle awaits each delivery before moving on.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Accept one lifecycle record
    async fn dispatch(&self, record: LifecycleRecord);
}

/// Sink that discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl ActionSink for NoopSink {
    async fn dispatch(&self, _record: LifecycleRecord) {}
}
