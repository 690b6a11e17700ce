//! Failure listeners: hooks run after every failed attempt.
//!
//! Listeners see the [`Context`] of the failure, whether a retry was granted
//! and the backoff about to be applied. They run synchronously, in
//! registration order, before the engine waits. A listener may change state
//! that the next attempt (or the engine's re-check of the retry decision)
//! observes; that is how "repair, then retry" flows are built.
//!
//! Any `Fn(&Context, bool, TimeDelta)` closure is a listener:
//!
//! ```rust
//! use rebound::{Condition, RetryEngine};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! let broken = Arc::new(AtomicBool::new(true));
//! let engine = RetryEngine::builder()
//!     .with_retry_condition(Condition::attempt_count_below(10))
//!     .with_failure_listener({
//!         let broken = broken.clone();
//!         move |_: &rebound::Context<'_>, _: bool, _: chrono::TimeDelta| broken.store(false, Ordering::SeqCst)
//!     })
//!     .build();
//!
//! let result = engine.call(|| {
//!     if broken.load(Ordering::SeqCst) {
//!         Err(std::io::Error::other("still broken"))
//!     } else {
//!         Ok("fixed")
//!     }
//! });
//! assert_eq!(result.unwrap(), "fixed");
//! ```

use chrono::TimeDelta;

use crate::condition::Condition;
use crate::context::Context;

/// Observer notified after each failed attempt.
///
/// Instances may be shared by concurrent calls; implementations carrying
/// mutable state must synchronize it themselves.
pub trait FailureListener: Send + Sync {
    /// Called once per failed attempt.
    fn on_failure(&self, context: &Context<'_>, allow_retry: bool, backoff: TimeDelta);
}

impl<F> FailureListener for F
where
    F: Fn(&Context<'_>, bool, TimeDelta) + Send + Sync,
{
    fn on_failure(&self, context: &Context<'_>, allow_retry: bool, backoff: TimeDelta) {
        self(context, allow_retry, backoff)
    }
}

/// Logs failed attempts through `tracing`.
///
/// `log` decides whether a failure is logged at all; `chain` decides whether
/// the failure's `source()` chain is included.
#[derive(Debug, Clone)]
pub struct LoggingFailureListener {
    log: Condition,
    chain: Condition,
}

impl LoggingFailureListener {
    /// Log when `log` holds, include the source chain when `chain` holds.
    pub fn new(log: Condition, chain: Condition) -> Self {
        Self { log, chain }
    }

    /// Log every failure, include the source chain only for the first.
    pub fn first_chain() -> Self {
        Self::new(Condition::TRUE, Condition::attempt_count_below(2))
    }

    /// Log only the first failure of each call.
    pub fn first_only() -> Self {
        Self::new(Condition::attempt_count_below(2), Condition::FALSE)
    }

    /// Log nothing.
    pub fn silent() -> Self {
        Self::new(Condition::FALSE, Condition::FALSE)
    }
}

impl Default for LoggingFailureListener {
    fn default() -> Self {
        Self::new(Condition::TRUE, Condition::FALSE)
    }
}

impl FailureListener for LoggingFailureListener {
    fn on_failure(&self, context: &Context<'_>, allow_retry: bool, backoff: TimeDelta) {
        if !self.log.evaluate(context) {
            return;
        }
        let backoff_ms = backoff.num_milliseconds();
        if self.chain.evaluate(context) {
            let chain = context
                .failure_chain()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(" <- ");
            tracing::info!(
                context = %context,
                retry = allow_retry,
                backoff_ms,
                chain = %chain,
                "invocation failed"
            );
        } else {
            tracing::info!(
                context = %context,
                retry = allow_retry,
                backoff_ms,
                "invocation failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;
    use std::fmt;
    use std::io;
    use std::sync::Mutex;
    use std::time::Instant;
    use tracing_test::traced_test;

    #[derive(Debug)]
    struct Outer(io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("request failed")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    fn notify(listener: &dyn FailureListener, attempt_count: u32) {
        let failure = Outer(io::Error::other("socket closed"));
        let now = Instant::now();
        let ctx = Context::new(now, now, attempt_count, &failure);
        listener.on_failure(&ctx, true, TimeDelta::milliseconds(1500));
    }

    #[test]
    fn test_closure_listener() {
        let seen = Mutex::new(Vec::new());
        let listener = |ctx: &Context<'_>, allow: bool, backoff: TimeDelta| {
            seen.lock().unwrap().push((ctx.attempt_count(), allow, backoff));
        };
        notify(&listener, 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(2, true, TimeDelta::milliseconds(1500))]
        );
    }

    #[traced_test]
    #[test]
    fn test_logs_failure() {
        notify(&LoggingFailureListener::default(), 1);
        assert!(logs_contain("invocation failed"));
        assert!(logs_contain("retry=true"));
        assert!(logs_contain("backoff_ms=1500"));
        assert!(!logs_contain("socket closed"));
    }

    #[traced_test]
    #[test]
    fn test_logs_source_chain() {
        notify(&LoggingFailureListener::first_chain(), 1);
        assert!(logs_contain("request failed <- socket closed"));
    }

    #[traced_test]
    #[test]
    fn test_first_only_skips_later_attempts() {
        notify(&LoggingFailureListener::first_only(), 2);
        assert!(!logs_contain("invocation failed"));
    }

    #[traced_test]
    #[test]
    fn test_silent() {
        notify(&LoggingFailureListener::silent(), 1);
        assert!(!logs_contain("invocation failed"));
    }
}
