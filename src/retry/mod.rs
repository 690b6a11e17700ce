//! The retry engine.
//!
//! A [`RetryEngine`] bundles the declarative pieces of a retry strategy:
//!
//! - **retry condition**: must hold for another attempt to be made
//! - **abort condition**: vetoes retrying whenever it holds
//! - **backoff policy**: how long to wait before the next attempt
//! - **failure listeners**: hooks run after every failed attempt
//!
//! and runs units of work under it, either on the calling thread
//! ([`call`](RetryEngine::call)) or through a [`Scheduler`](crate::Scheduler)
//! ([`submit`](RetryEngine::submit)). Both paths make identical decisions:
//!
//! 1. build a [`Context`] for the failure
//! 2. evaluate `!abort && retry`
//! 3. compute the backoff (zero when no retry is allowed)
//! 4. notify every listener in registration order
//! 5. wait, then evaluate `!abort && retry` again on the *same* context so a
//!    listener's side effect can still veto the retry
//!
//! # Quick Start
//!
//! ```rust
//! use rebound::{BackoffPolicy, Condition, RetryEngine};
//! use std::io;
//! use std::time::Duration;
//!
//! let engine = RetryEngine::builder()
//!     .with_retry_condition(Condition::attempt_count_below(5))
//!     .with_backoff(BackoffPolicy::exponential(Duration::from_millis(1), Duration::from_millis(10)))
//!     .build();
//!
//! let mut attempts = 0;
//! let value = engine.call(|| {
//!     attempts += 1;
//!     if attempts < 3 {
//!         Err(io::Error::other("transient"))
//!     } else {
//!         Ok(attempts)
//!     }
//! });
//!
//! assert_eq!(value.unwrap(), 3);
//! ```
//!
//! # Error Types
//!
//! - [`RetryError`]: the last failure, untouched, or why retrying stopped early

mod blocking;
mod error;
mod scheduled;

pub use error::RetryError;
pub use scheduled::{CancelHandle, RetryFuture};

use std::fmt;
use std::sync::Arc;

use chrono::TimeDelta;

use crate::backoff::BackoffPolicy;
use crate::condition::Condition;
use crate::context::Context;
use crate::listener::FailureListener;
use crate::sleep::{Interrupt, Interrupted, Sleeper, ThreadSleeper};

/// Runs units of work under a retry strategy.
///
/// The configuration is immutable once built and shared behind an `Arc`, so
/// cloning an engine is cheap and one engine can serve any number of
/// concurrent calls. Per-call state (attempt counter, start time) never leaves
/// the call.
#[derive(Clone)]
pub struct RetryEngine {
    inner: Arc<Inner>,
}

struct Inner {
    retry_condition: Condition,
    abort_condition: Condition,
    admissibility: Condition,
    backoff_policy: BackoffPolicy,
    failure_listeners: Vec<Arc<dyn FailureListener>>,
    sleeper: Arc<dyn Sleeper>,
}

/// Outcome of steps 2-4 for one failure.
#[derive(Debug, Clone, Copy)]
struct Decision {
    allow_retry: bool,
    backoff: TimeDelta,
}

impl RetryEngine {
    /// Start configuring an engine.
    pub fn builder() -> RetryBuilder {
        RetryBuilder::default()
    }

    /// An engine that never retries: the unit of work runs exactly once.
    pub fn none() -> Self {
        Self::builder().with_retry_condition(Condition::FALSE).build()
    }

    /// Up to `max_attempts` attempts in total, without waiting in between.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts <= 1`.
    pub fn times(max_attempts: u32) -> Self {
        Self::builder()
            .with_retry_condition(Condition::attempt_count_below(max_attempts))
            .build()
    }

    /// The retry condition.
    pub fn retry_condition(&self) -> &Condition {
        &self.inner.retry_condition
    }

    /// The abort condition.
    pub fn abort_condition(&self) -> &Condition {
        &self.inner.abort_condition
    }

    /// The effective gate, `!abort && retry`.
    pub fn admissibility(&self) -> &Condition {
        &self.inner.admissibility
    }

    /// The backoff policy.
    pub fn backoff_policy(&self) -> &BackoffPolicy {
        &self.inner.backoff_policy
    }

    /// Number of registered failure listeners.
    pub fn failure_listener_count(&self) -> usize {
        self.inner.failure_listeners.len()
    }

    fn decide(&self, context: &Context<'_>) -> Decision {
        let inner = &*self.inner;
        let allow_retry = inner.admissibility.evaluate(context);
        let backoff = if allow_retry {
            inner.backoff_policy.compute(context)
        } else {
            TimeDelta::zero()
        };
        tracing::trace!(
            condition = %inner.admissibility.explain(context),
            allow_retry,
            backoff_ms = backoff.num_milliseconds(),
            "retry decision"
        );
        for listener in &inner.failure_listeners {
            listener.on_failure(context, allow_retry, backoff);
        }
        Decision {
            allow_retry,
            backoff,
        }
    }

    fn still_admissible(&self, context: &Context<'_>) -> bool {
        self.inner.admissibility.evaluate(context)
    }

    fn pause(&self, backoff: TimeDelta, interrupt: &Interrupt) -> Result<(), Interrupted> {
        match backoff.to_std() {
            Ok(wait) if !wait.is_zero() => self.inner.sleeper.sleep(wait, interrupt),
            _ => interrupt.check(),
        }
    }
}

impl Default for RetryEngine {
    /// Retries every failure, forever, without waiting.
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for RetryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryEngine")
            .field("retry_condition", &self.inner.retry_condition)
            .field("abort_condition", &self.inner.abort_condition)
            .field("backoff_policy", &self.inner.backoff_policy)
            .field("failure_listeners", &self.inner.failure_listeners.len())
            .finish()
    }
}

/// Assembles a [`RetryEngine`].
///
/// Every `with_*` method consumes the builder and returns it, so a builder
/// is never shared or mutated behind anyone's back.
///
/// Defaults: retry [`Condition::TRUE`], abort [`Condition::FALSE`], backoff
/// [`BackoffPolicy::NONE`], no listeners, [`ThreadSleeper`].
///
/// # Examples
///
/// ```rust
/// use rebound::{BackoffPolicy, Condition, LoggingFailureListener, RetryEngine};
/// use std::time::Duration;
///
/// let engine = RetryEngine::builder()
///     .with_retry_condition(Condition::elapsed_below(Duration::from_secs(30)))
///     .with_abort_condition(Condition::failure_is::<std::fmt::Error>())
///     .with_backoff(BackoffPolicy::fixed(Duration::from_millis(200)))
///     .with_failure_listener(LoggingFailureListener::default())
///     .build();
///
/// assert_eq!(engine.failure_listener_count(), 1);
/// ```
pub struct RetryBuilder {
    retry_condition: Condition,
    abort_condition: Condition,
    backoff_policy: BackoffPolicy,
    failure_listeners: Vec<Arc<dyn FailureListener>>,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryBuilder {
    /// Set the condition that must hold for another attempt.
    pub fn with_retry_condition(mut self, condition: Condition) -> Self {
        self.retry_condition = condition;
        self
    }

    /// Set the condition that vetoes retrying.
    pub fn with_abort_condition(mut self, condition: Condition) -> Self {
        self.abort_condition = condition;
        self
    }

    /// Set the backoff policy.
    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff_policy = policy;
        self
    }

    /// Append a failure listener. Listeners run in the order they are added.
    pub fn with_failure_listener(mut self, listener: impl FailureListener + 'static) -> Self {
        self.failure_listeners.push(Arc::new(listener));
        self
    }

    /// Append a listener instance that is also held elsewhere.
    pub fn with_shared_failure_listener(mut self, listener: Arc<dyn FailureListener>) -> Self {
        self.failure_listeners.push(listener);
        self
    }

    /// Replace the backoff sleeper of the blocking path.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Freeze the configuration.
    pub fn build(self) -> RetryEngine {
        let admissibility = !self.abort_condition.clone() & self.retry_condition.clone();
        RetryEngine {
            inner: Arc::new(Inner {
                retry_condition: self.retry_condition,
                abort_condition: self.abort_condition,
                admissibility,
                backoff_policy: self.backoff_policy,
                failure_listeners: self.failure_listeners,
                sleeper: self.sleeper,
            }),
        }
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self {
            retry_condition: Condition::TRUE,
            abort_condition: Condition::FALSE,
            backoff_policy: BackoffPolicy::NONE,
            failure_listeners: Vec::new(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }
}

impl fmt::Debug for RetryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryBuilder")
            .field("retry_condition", &self.retry_condition)
            .field("abort_condition", &self.abort_condition)
            .field("backoff_policy", &self.backoff_policy)
            .field("failure_listeners", &self.failure_listeners.len())
            .finish()
    }
}
