//! Broadcast sink for observing lifecycle records.

use api_lifecycle_core::record::LifecycleRecord;
use api_lifecycle_core::sink::ActionSink;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Publishes every lifecycle record on a broadcast channel.
///
/// Delivery never blocks the lifecycle: records sent while nobody is
/// subscribed are dropped, and slow subscribers observe a lag.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<LifecycleRecord>,
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` records per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to records dispatched from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleRecord> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl ActionSink for BroadcastSink {
    async fn dispatch(&self, record: LifecycleRecord) {
        // No subscribers is not an error
        let _ = self.sender.send(record);
    }
}
