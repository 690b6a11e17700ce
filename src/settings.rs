//! Declarative engine configuration (feature `serde`).
//!
//! [`RetrySettings`] describes the common strategies as plain data so an
//! engine can be loaded from a config file. Missing fields take their
//! defaults: unlimited attempts, no elapsed limit, no backoff, no logging.
//!
//! ```rust
//! use rebound::RetrySettings;
//!
//! let settings: RetrySettings = serde_json::from_str(
//!     r#"{
//!         "max_attempts": 5,
//!         "backoff": { "kind": "exponential", "initial_ms": 100, "max_ms": 2000 },
//!         "log_failures": true
//!     }"#,
//! ).unwrap();
//!
//! let engine = settings.into_engine().unwrap();
//! assert_eq!(engine.retry_condition().to_string(), "context.attemptCount < 5");
//! ```

use std::fmt;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;
use crate::condition::Condition;
use crate::listener::LoggingFailureListener;
use crate::retry::{RetryBuilder, RetryEngine};

/// Plain-data description of a retry strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Total number of attempts allowed. Must be greater than 1.
    pub max_attempts: Option<u32>,
    /// Stop retrying once this many milliseconds have passed since the first
    /// attempt started. Must be greater than 0.
    pub max_elapsed_ms: Option<u64>,
    /// Wait between attempts.
    pub backoff: BackoffSettings,
    /// Attach a [`LoggingFailureListener`] with default settings.
    pub log_failures: bool,
}

/// Plain-data description of a backoff policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffSettings {
    /// Retry immediately.
    #[default]
    None,
    /// The same delay before every retry.
    Fixed {
        /// Delay in milliseconds.
        delay_ms: u64,
    },
    /// Doubling delay, capped.
    Exponential {
        /// Delay after the first failure.
        initial_ms: u64,
        /// Upper bound.
        max_ms: u64,
    },
    /// Uniformly random delay, bounds included.
    Random {
        /// Lower bound, may be negative.
        min_ms: i64,
        /// Upper bound.
        max_ms: i64,
    },
    /// Keep attempts on a fixed grid measured from the first attempt.
    FixedInterval {
        /// Grid spacing in milliseconds.
        period_ms: u64,
    },
}

/// Rejected settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// `max_attempts` was 0 or 1.
    MaxAttemptsTooSmall(u32),
    /// `max_elapsed_ms` was 0.
    ZeroElapsedLimit,
    /// Random backoff with `min_ms > max_ms`.
    InvertedRange {
        /// Configured lower bound.
        min_ms: i64,
        /// Configured upper bound.
        max_ms: i64,
    },
    /// Random backoff bound beyond the representable millisecond range.
    BoundOutOfRange(i64),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxAttemptsTooSmall(n) => {
                write!(f, "max_attempts must be greater than 1, got {}", n)
            }
            Self::ZeroElapsedLimit => f.write_str("max_elapsed_ms must be greater than 0"),
            Self::InvertedRange { min_ms, max_ms } => write!(
                f,
                "random backoff min_ms ({}) must not exceed max_ms ({})",
                min_ms, max_ms
            ),
            Self::BoundOutOfRange(ms) => write!(
                f,
                "random backoff bound {}ms is outside ±{}ms",
                ms,
                TimeDelta::MAX.num_milliseconds()
            ),
        }
    }
}

impl std::error::Error for SettingsError {}

impl RetrySettings {
    /// Check every value that an engine constructor would panic on.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(n) = self.max_attempts {
            if n <= 1 {
                return Err(SettingsError::MaxAttemptsTooSmall(n));
            }
        }
        if self.max_elapsed_ms == Some(0) {
            return Err(SettingsError::ZeroElapsedLimit);
        }
        if let BackoffSettings::Random { min_ms, max_ms } = self.backoff {
            if min_ms > max_ms {
                return Err(SettingsError::InvertedRange { min_ms, max_ms });
            }
            for bound in [min_ms, max_ms] {
                if TimeDelta::try_milliseconds(bound).is_none() {
                    return Err(SettingsError::BoundOutOfRange(bound));
                }
            }
        }
        Ok(())
    }

    /// The retry condition: every configured limit must still hold.
    fn retry_condition(&self) -> Condition {
        let attempts = self.max_attempts.map(Condition::attempt_count_below);
        let elapsed = self
            .max_elapsed_ms
            .map(|ms| Condition::elapsed_below(Duration::from_millis(ms)));
        match (attempts, elapsed) {
            (Some(a), Some(e)) => a & e,
            (Some(a), None) => a,
            (None, Some(e)) => e,
            (None, None) => Condition::TRUE,
        }
    }

    /// A builder preloaded with these settings, for further customization.
    pub fn into_builder(self) -> Result<RetryBuilder, SettingsError> {
        self.validate()?;
        let builder = RetryEngine::builder()
            .with_retry_condition(self.retry_condition())
            .with_backoff(self.backoff.to_policy());
        Ok(if self.log_failures {
            builder.with_failure_listener(LoggingFailureListener::default())
        } else {
            builder
        })
    }

    /// Build the engine these settings describe.
    pub fn into_engine(self) -> Result<RetryEngine, SettingsError> {
        self.into_builder().map(RetryBuilder::build)
    }
}

impl BackoffSettings {
    fn to_policy(&self) -> BackoffPolicy {
        match *self {
            Self::None => BackoffPolicy::NONE,
            Self::Fixed { delay_ms } => BackoffPolicy::fixed(Duration::from_millis(delay_ms)),
            Self::Exponential { initial_ms, max_ms } => BackoffPolicy::exponential(
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
            ),
            // Bounds are checked by `validate`; saturate rather than panic.
            Self::Random { min_ms, max_ms } => BackoffPolicy::random_uniform(
                TimeDelta::try_milliseconds(min_ms).unwrap_or(TimeDelta::MIN),
                TimeDelta::try_milliseconds(max_ms).unwrap_or(TimeDelta::MAX),
            ),
            Self::FixedInterval { period_ms } => {
                BackoffPolicy::fixed_interval(Duration::from_millis(period_ms))
            }
        }
    }
}
