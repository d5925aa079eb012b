//! # API Lifecycle Testing
//!
//! Testing utilities and helpers for the API request lifecycle orchestrator.
//!
//! This crate provides:
//! - Mock implementations of the injected capabilities (clock, transport, sink)
//! - Test helpers and builders
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use api_lifecycle_testing::{MockTransport, RecordingSink, Scripted};
//!
//! #[tokio::test]
//! async fn retries_once() {
//!     let transport = MockTransport::new([
//!         Scripted::status(500, "oops"),
//!         Scripted::status(200, r#"{"id":1}"#),
//!     ]);
//!     let sink = Arc::new(RecordingSink::new());
//!     let orchestrator = Orchestrator::new(config, transport.clone());
//!
//!     orchestrator.run(ApiAction::get("/items"), sink.clone()).await?;
//!
//!     assert_eq!(transport.calls(), 2);
//!     assert_eq!(sink.stages(), vec![Stage::Start, Stage::Success]);
//! }
//! ```

use api_lifecycle_core::environment::Clock;
use chrono::{DateTime, Utc};

/// Scripted transport
pub mod transport;

/// Recording sink
pub mod sink;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making records reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use api_lifecycle_testing::mocks::FixedClock;
    /// use api_lifecycle_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and fixtures.
pub mod helpers {
    use super::Clock;
    use super::mocks::test_clock;
    use api_lifecycle_core::action::{ApiAction, ApiIntent};
    use api_lifecycle_core::config::Config;
    use api_lifecycle_core::record::StartParams;
    use api_lifecycle_core::sink::ActionSink;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    /// Start bundle for driving runtime pieces directly, with a fresh token
    /// and the fixed test time.
    #[must_use]
    pub fn start_params(action: ApiAction, config: Config, sink: Arc<dyn ActionSink>) -> StartParams {
        StartParams {
            invocation_id: Uuid::new_v4(),
            action: Arc::new(action),
            cancellation: CancellationToken::new(),
            sink,
            config: Arc::new(config),
            started_at: test_clock().now(),
        }
    }

    /// Install a test-friendly tracing subscriber (honours `RUST_LOG`).
    ///
    /// Safe to call from every test; only the first call installs anything.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    /// A small application action type mixing API and plain actions
    #[derive(Debug, Clone, PartialEq)]
    pub enum AppAction {
        /// Carries an API action
        Api(ApiAction),
        /// Plain action
        Logout,
        /// Plain action with data
        Increment(u32),
    }

    impl ApiIntent for AppAction {
        fn as_api(&self) -> Option<&ApiAction> {
            match self {
                Self::Api(action) => Some(action),
                Self::Logout | Self::Increment(_) => None,
            }
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use api_lifecycle_core::action::{ApiAction, Method, ParseMode};
    use proptest::prelude::*;

    /// Any HTTP method
    pub fn arb_method() -> impl Strategy<Value = Method> {
        prop_oneof![
            Just(Method::Get),
            Just(Method::Post),
            Just(Method::Put),
            Just(Method::Patch),
            Just(Method::Delete),
            Just(Method::Head),
            Just(Method::Options),
        ]
    }

    /// Any parse mode
    pub fn arb_parse_mode() -> impl Strategy<Value = ParseMode> {
        prop_oneof![
            Just(ParseMode::Json),
            Just(ParseMode::Text),
            Just(ParseMode::Binary),
            Just(ParseMode::None),
        ]
    }

    /// Relative endpoints such as `/items/42`
    pub fn arb_endpoint() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z0-9]{1,8}", 1..4).prop_map(|segments| {
            format!("/{}", segments.join("/"))
        })
    }

    /// Buildable API actions without a body
    pub fn arb_api_action() -> impl Strategy<Value = ApiAction> {
        (arb_method(), arb_endpoint(), arb_parse_mode()).prop_map(|(method, endpoint, mode)| {
            let mut action = ApiAction::new(method, endpoint);
            action.parse_mode = mode;
            action
        })
    }

    /// Any status outside the 2xx range
    pub fn arb_failure_status() -> impl Strategy<Value = u16> {
        prop_oneof![100u16..200, 300u16..600]
    }
}

pub use helpers::{AppAction, init_test_tracing, start_params};
pub use mocks::{FixedClock, test_clock};
pub use sink::RecordingSink;
pub use transport::{MockTransport, Scripted};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn app_action_exposes_only_api_variant() {
        use api_lifecycle_core::action::{ApiAction, ApiIntent};

        assert!(AppAction::Logout.as_api().is_none());
        assert!(AppAction::Increment(1).as_api().is_none());
        assert_eq!(
            AppAction::Api(ApiAction::get("/me")).as_api(),
            Some(&ApiAction::get("/me"))
        );
    }
}
