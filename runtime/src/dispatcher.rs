//! Stage dispatch.
//!
//! A record enters default-shaped (stage + bundle). If a hook is registered
//! for its stage the hook decides the record actually delivered; either way
//! the result is handed to the invocation's sink and returned to the
//! orchestrator.

use api_lifecycle_core::error::HookError;
use api_lifecycle_core::record::LifecycleRecord;
use std::sync::Arc;

/// Dispatch one stage.
///
/// The config and sink are taken from the record's own bundle, so a record
/// is always delivered to the invocation that produced it.
///
/// # Errors
///
/// Returns the [`HookError`] of a failing stage hook. Nothing is delivered to
/// the sink in that case.
pub async fn dispatch_stage(record: LifecycleRecord) -> Result<LifecycleRecord, HookError> {
    let stage = record.stage();
    let start = record.params().start();
    let config = Arc::clone(&start.config);
    let sink = Arc::clone(&start.sink);
    let invocation_id = start.invocation_id;

    let record = match config.stage_hook(stage) {
        Some(hook) => {
            tracing::debug!(%invocation_id, %stage, "Running stage hook");
            hook(record).await?
        },
        None => record,
    };

    if record.stage() != stage {
        tracing::warn!(
            %invocation_id,
            dispatched = %stage,
            returned = %record.stage(),
            "Stage hook returned a record for a different stage"
        );
    }

    sink.dispatch(record.clone()).await;
    tracing::debug!(%invocation_id, %stage, "Stage dispatched");

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_lifecycle_core::action::ApiAction;
    use api_lifecycle_core::CancellationToken;
    use api_lifecycle_core::config::Config;
    use api_lifecycle_core::environment::Clock;
    use api_lifecycle_core::record::{Stage, StartParams};
    use api_lifecycle_testing::{RecordingSink, test_clock};
    use serde_json::json;

    fn start_params(config: Config, sink: Arc<RecordingSink>) -> StartParams {
        StartParams {
            invocation_id: uuid::Uuid::new_v4(),
            action: Arc::new(ApiAction::get("/items")),
            cancellation: CancellationToken::new(),
            sink,
            config: Arc::new(config),
            started_at: test_clock().now(),
        }
    }

    #[tokio::test]
    async fn without_hook_delivers_default_record() {
        let sink = Arc::new(RecordingSink::new());
        let params = start_params(Config::default(), Arc::clone(&sink));

        let record = dispatch_stage(LifecycleRecord::start(params)).await.unwrap();

        assert_eq!(record.stage(), Stage::Start);
        assert!(record.payload().is_none());
        assert_eq!(sink.stages(), vec![Stage::Start]);
    }

    #[tokio::test]
    async fn hook_result_becomes_the_record() {
        let sink = Arc::new(RecordingSink::new());
        let config = Config::builder()
            .on_start(|record| async move { Ok(record.with_payload(json!({ "loading": true }))) })
            .build();
        let params = start_params(config, Arc::clone(&sink));

        let record = dispatch_stage(LifecycleRecord::start(params)).await.unwrap();

        assert_eq!(record.payload(), Some(&json!({ "loading": true })));
        assert_eq!(sink.records()[0].payload(), Some(&json!({ "loading": true })));
    }

    #[tokio::test]
    async fn failing_hook_delivers_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let config = Config::builder()
            .on_start(|_| async { Err(HookError::new(Stage::Start, "denied")) })
            .build();
        let params = start_params(config, Arc::clone(&sink));

        let err = dispatch_stage(LifecycleRecord::start(params)).await.unwrap_err();

        assert_eq!(err, HookError::new(Stage::Start, "denied"));
        assert!(sink.records().is_empty());
    }
}
