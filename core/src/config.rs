//! Orchestrator configuration.
//!
//! Configuration has two layers:
//!
//! - [`Settings`]: plain data (base URL, default headers), loadable from TOML
//!   or environment variables
//! - [`Config`]: settings plus the caller-supplied hooks and the clock,
//!   assembled with [`Config::builder`]
//!
//! Every option is optional. `Config::default()` runs the bare lifecycle:
//! no hooks, no retries, default-shaped records.
//!
//! # Example
//!
//! ```
//! use api_lifecycle_core::config::{Config, RetryDecision};
//! use api_lifecycle_core::error::HookError;
//! use api_lifecycle_core::record::Stage;
//!
//! let config = Config::builder()
//!     .base_url("https://api.example.com")
//!     .default_header("accept", "application/json")
//!     .retry_hook(|ctx| async move {
//!         // Give up after the second attempt.
//!         if ctx.attempt >= 2 || ctx.response.status != 401 {
//!             return Ok(RetryDecision::Stop);
//!         }
//!         match ctx.request.with_header("authorization", "Bearer refreshed") {
//!             Ok(next) => Ok(RetryDecision::Retry(next)),
//!             Err(e) => Err(HookError::new(Stage::Fail, e.to_string())),
//!         }
//!     })
//!     .build();
//!
//! assert!(config.retry_hook().is_some());
//! ```

use crate::environment::{Clock, SystemClock};
use crate::error::{ConfigError, HookError};
use crate::record::{LifecycleRecord, Stage, StartParams};
use crate::request::{RequestDescriptor, validate_header};
use crate::response::ResponseHead;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Environment variable holding the base URL
pub const BASE_URL_ENV: &str = "API_LIFECYCLE_BASE_URL";

/// Environment variable holding default headers as `name=value;name=value`
pub const HEADERS_ENV: &str = "API_LIFECYCLE_HEADERS";

/// Boxed future returned by hooks
pub type HookFuture<T> = Pin<Box<dyn Future<Output = Result<T, HookError>> + Send>>;

/// Stage hook: receives the default-shaped record for its stage and returns
/// the record to deliver (the same one, an augmented one, or a new one).
pub type StageHook = Arc<dyn Fn(LifecycleRecord) -> HookFuture<LifecycleRecord> + Send + Sync>;

/// Retry-before-fail hook.
///
/// Called with every non-ok response before the fail stage is finalized.
/// The loop has no attempt cap and no backoff: bounding retries (by count,
/// time, or by giving up on repeated failures) is the hook's responsibility.
/// A hook that always answers [`RetryDecision::Retry`] against a server that
/// always fails loops until the invocation is cancelled.
pub type RetryHook = Arc<dyn Fn(RetryContext) -> HookFuture<RetryDecision> + Send + Sync>;

/// What a retry hook sees
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// The request that produced `response`
    pub request: RequestDescriptor,
    /// The request built from the action, before any retry
    pub original_request: RequestDescriptor,
    /// Head of the rejected response (its body is never read)
    pub response: ResponseHead,
    /// Number of transport calls made so far in this invocation
    pub attempt: u32,
    /// The invocation's start bundle
    pub params: StartParams,
}

/// A retry hook's answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Issue another transport call with this request
    Retry(RequestDescriptor),
    /// Accept the current response
    Stop,
}

/// Plain-data settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix for endpoints that start with `/`
    pub base_url: Option<String>,
    /// Headers applied to every request (action headers override them)
    pub default_headers: BTreeMap<String, String>,
}

impl Settings {
    /// Parse settings from a TOML document
    ///
    /// ```
    /// use api_lifecycle_core::config::Settings;
    ///
    /// let settings = Settings::from_toml_str(r#"
    ///     base_url = "https://api.example.com"
    ///
    ///     [default_headers]
    ///     accept = "application/json"
    /// "#).unwrap();
    /// assert_eq!(settings.default_headers["accept"], "application/json");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document is malformed or fails validation.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `API_LIFECYCLE_BASE_URL` and `API_LIFECYCLE_HEADERS`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is malformed or validation fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is malformed or validation fails.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(BASE_URL_ENV).filter(|url| !url.trim().is_empty());

        let mut default_headers = BTreeMap::new();
        if let Some(raw) = lookup(HEADERS_ENV) {
            for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                let (name, value) = pair.split_once('=').ok_or_else(|| ConfigError::InvalidEnv {
                    name: HEADERS_ENV.to_string(),
                    reason: format!("expected name=value, got {pair:?}"),
                })?;
                default_headers.insert(name.trim().to_string(), value.trim().to_string());
            }
        }

        let settings = Self {
            base_url,
            default_headers,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the base URL is not http(s) or a
    /// default header is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.base_url {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "base_url must start with http:// or https://, got {base:?}"
                )));
            }
        }
        for (name, value) in &self.default_headers {
            validate_header(name, value).map_err(|e| ConfigError::Validation(e.to_string()))?;
        }
        Ok(())
    }
}

/// Full orchestrator configuration
#[derive(Clone)]
pub struct Config {
    settings: Settings,
    retry_hook: Option<RetryHook>,
    on_start: Option<StageHook>,
    on_success: Option<StageHook>,
    on_fail: Option<StageHook>,
    clock: Arc<dyn Clock>,
}

impl Config {
    /// Start building a configuration
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: Self::default(),
        }
    }

    /// Plain-data settings
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The retry-before-fail hook, if configured
    #[must_use]
    pub const fn retry_hook(&self) -> Option<&RetryHook> {
        self.retry_hook.as_ref()
    }

    /// The hook registered for a stage, if any
    #[must_use]
    pub const fn stage_hook(&self, stage: Stage) -> Option<&StageHook> {
        match stage {
            Stage::Start => self.on_start.as_ref(),
            Stage::Success => self.on_success.as_ref(),
            Stage::Fail => self.on_fail.as_ref(),
        }
    }

    /// Clock used to timestamp records
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            retry_hook: None,
            on_start: None,
            on_success: None,
            on_fail: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("settings", &self.settings)
            .field("retry_hook", &self.retry_hook.is_some())
            .field("on_start", &self.on_start.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_fail", &self.on_fail.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Config`]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Replace the plain-data settings
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.config.settings = settings;
        self
    }

    /// Set the base URL for relative endpoints
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.settings.base_url = Some(url.into());
        self
    }

    /// Add a default header
    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .settings
            .default_headers
            .insert(name.into(), value.into());
        self
    }

    /// Install the retry-before-fail hook
    #[must_use]
    pub fn retry_hook<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RetryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RetryDecision, HookError>> + Send + 'static,
    {
        self.config.retry_hook = Some(Arc::new(move |ctx| {
            Box::pin(hook(ctx)) as HookFuture<RetryDecision>
        }));
        self
    }

    /// Install the start-stage hook
    #[must_use]
    pub fn on_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(LifecycleRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<LifecycleRecord, HookError>> + Send + 'static,
    {
        self.config.on_start = Some(stage_hook(hook));
        self
    }

    /// Install the success-stage hook
    #[must_use]
    pub fn on_success<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(LifecycleRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<LifecycleRecord, HookError>> + Send + 'static,
    {
        self.config.on_success = Some(stage_hook(hook));
        self
    }

    /// Install the fail-stage hook
    ///
    /// This hook must not fail: an error here cannot be routed to a later
    /// stage and is returned from the orchestrator instead.
    #[must_use]
    pub fn on_fail<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(LifecycleRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<LifecycleRecord, HookError>> + Send + 'static,
    {
        self.config.on_fail = Some(stage_hook(hook));
        self
    }

    /// Replace the clock used for record timestamps
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.config.clock = Arc::new(clock);
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }
}

fn stage_hook<F, Fut>(hook: F) -> StageHook
where
    F: Fn(LifecycleRecord) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<LifecycleRecord, HookError>> + Send + 'static,
{
    Arc::new(move |record| Box::pin(hook(record)) as HookFuture<LifecycleRecord>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_config_has_no_hooks() {
        let config = Config::default();
        assert!(config.retry_hook().is_none());
        for stage in [Stage::Start, Stage::Success, Stage::Fail] {
            assert!(config.stage_hook(stage).is_none());
        }
    }

    #[test]
    fn builder_registers_hooks_per_stage() {
        let config = Config::builder()
            .on_success(|record| async move { Ok(record) })
            .build();
        assert!(config.stage_hook(Stage::Success).is_some());
        assert!(config.stage_hook(Stage::Start).is_none());
        assert!(config.stage_hook(Stage::Fail).is_none());
    }

    #[test]
    fn settings_from_toml() {
        let settings = Settings::from_toml_str(
            r#"
            base_url = "https://api.example.com"

            [default_headers]
            accept = "application/json"
            x-client = "lifecycle"
            "#,
        )
        .unwrap();
        assert_eq!(settings.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(settings.default_headers.len(), 2);
    }

    #[test]
    fn settings_from_toml_rejects_non_http_base() {
        let err = Settings::from_toml_str(r#"base_url = "ftp://files""#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn settings_from_lookup_parses_header_pairs() {
        let vars = HashMap::from([
            (BASE_URL_ENV, "http://localhost:8080"),
            (HEADERS_ENV, "accept=application/json; x-tenant = acme ;"),
        ]);
        let settings = Settings::from_lookup(|name| vars.get(name).map(|v| (*v).to_string())).unwrap();

        assert_eq!(settings.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(settings.default_headers["accept"], "application/json");
        assert_eq!(settings.default_headers["x-tenant"], "acme");
    }

    #[test]
    fn settings_from_lookup_rejects_malformed_pair() {
        let err = Settings::from_lookup(|name| {
            (name == HEADERS_ENV).then(|| "no-equals-sign".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }
}
