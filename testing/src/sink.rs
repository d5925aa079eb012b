//! A sink that records what it receives.

use api_lifecycle_core::record::{LifecycleRecord, Stage};
use api_lifecycle_core::sink::ActionSink;
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

/// Sink that keeps every record it receives, in delivery order
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<LifecycleRecord>>,
}

impl RecordingSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records delivered so far
    #[must_use]
    pub fn records(&self) -> Vec<LifecycleRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stages delivered so far
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(LifecycleRecord::stage)
            .collect()
    }

    /// The most recent record
    #[must_use]
    pub fn last(&self) -> Option<LifecycleRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

#[async_trait]
impl ActionSink for RecordingSink {
    async fn dispatch(&self, record: LifecycleRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}
