//! Snapshot of a single failed attempt
//!
//! A [`Context`] is built by the retry engine right after an attempt fails and
//! is handed, unchanged, to every condition, backoff policy and failure
//! listener that takes part in the retry decision for that attempt. The next
//! failure produces a fresh `Context`; nothing is ever updated in place.
//!
//! # Examples
//!
//! ```
//! use rebound::Context;
//! use std::io;
//! use std::time::{Duration, Instant};
//!
//! let failure = io::Error::new(io::ErrorKind::TimedOut, "read timed out");
//! let start = Instant::now();
//! let ctx = Context::new(start, start + Duration::from_millis(250), 3, &failure);
//!
//! assert_eq!(ctx.attempt_count(), 3);
//! assert_eq!(ctx.elapsed(), Duration::from_millis(250));
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::time::{Duration, Instant};

/// Immutable description of one failed attempt.
///
/// `attempt_count` is 1-based: the N-th failure of a call is reported with
/// `attempt_count == N`.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    start_time: Instant,
    now: Instant,
    attempt_count: u32,
    failure: &'a (dyn StdError + 'static),
}

impl<'a> Context<'a> {
    /// Create a context for a failed attempt.
    ///
    /// # Panics
    ///
    /// Panics if `attempt_count` is zero. Every context describes an attempt
    /// that actually ran, so the count starts at one.
    pub fn new(
        start_time: Instant,
        now: Instant,
        attempt_count: u32,
        failure: &'a (dyn StdError + 'static),
    ) -> Self {
        assert!(attempt_count > 0, "attempt_count must be greater than 0");
        Self {
            start_time,
            now,
            attempt_count,
            failure,
        }
    }

    /// Instant the first attempt began.
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Instant the current failure was observed.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Number of attempts made so far, including the one that just failed.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// The failure captured from the attempt.
    pub fn failure(&self) -> &'a (dyn StdError + 'static) {
        self.failure
    }

    /// The failure followed by every error in its `source()` chain.
    pub fn failure_chain(&self) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
        std::iter::successors(Some(self.failure), |&e| e.source())
    }

    /// Time between the first attempt and this failure.
    ///
    /// Never negative: a `now` earlier than `start_time` yields zero.
    pub fn elapsed(&self) -> Duration {
        self.now.saturating_duration_since(self.start_time)
    }
}

impl fmt::Display for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(attemptCount={}, elapsed={:?}, failure: {})",
            self.attempt_count,
            self.elapsed(),
            self.failure
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn failure() -> io::Error {
        io::Error::other("boom")
    }

    #[test]
    fn test_accessors() {
        let err = failure();
        let start = Instant::now();
        let now = start + Duration::from_secs(2);
        let ctx = Context::new(start, now, 4, &err);

        assert_eq!(ctx.start_time(), start);
        assert_eq!(ctx.now(), now);
        assert_eq!(ctx.attempt_count(), 4);
        assert_eq!(ctx.failure().to_string(), "boom");
        assert_eq!(ctx.elapsed(), Duration::from_secs(2));
    }

    #[test]
    #[should_panic(expected = "attempt_count must be greater than 0")]
    fn test_zero_attempt_count_panics() {
        let err = failure();
        let now = Instant::now();
        let _ = Context::new(now, now, 0, &err);
    }

    #[test]
    fn test_elapsed_saturates() {
        let err = failure();
        let now = Instant::now();
        let ctx = Context::new(now + Duration::from_secs(1), now, 1, &err);
        assert_eq!(ctx.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_failure_chain() {
        #[derive(Debug)]
        struct Outer(io::Error);

        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("outer")
            }
        }

        impl StdError for Outer {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let err = Outer(failure());
        let now = Instant::now();
        let ctx = Context::new(now, now, 1, &err);
        let chain: Vec<String> = ctx.failure_chain().map(|e| e.to_string()).collect();
        assert_eq!(chain, vec!["outer".to_string(), "boom".to_string()]);
    }

    #[test]
    fn test_display() {
        let err = failure();
        let now = Instant::now();
        let ctx = Context::new(now, now, 1, &err);
        assert_eq!(ctx.to_string(), "(attemptCount=1, elapsed=0ns, failure: boom)");
    }
}
