//! Injected environment dependencies.
//!
//! Lifecycle records are timestamped through a [`Clock`] so that tests can
//! pin time instead of reading the system clock.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```ignore
/// // Test - fixed time for deterministic tests
/// struct FixedClock { time: DateTime<Utc> }
/// impl Clock for FixedClock {
///     fn now(&self) -> DateTime<Utc> {
///         self.time
///     }
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
