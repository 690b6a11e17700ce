//! Blocking execution: the retry loop runs on the calling thread.

use std::error::Error as StdError;
use std::time::Instant;

use super::{RetryEngine, RetryError};
use crate::context::Context;
use crate::sleep::Interrupt;

const DEFAULT_CALL_NAME: &str = "call";

impl RetryEngine {
    /// Run `work` until it succeeds or retrying is no longer permitted.
    ///
    /// `work` runs at least once. Backoff waits block the calling thread.
    /// On failure the error of the last attempt is returned unchanged inside
    /// [`RetryError::Failure`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use rebound::RetryEngine;
    /// use std::io;
    ///
    /// let engine = RetryEngine::times(10);
    /// let mut calls = 0;
    /// let result: Result<(), _> = engine.call(|| {
    ///     calls += 1;
    ///     Err(io::Error::other("always fails"))
    /// });
    ///
    /// assert!(result.is_err());
    /// assert_eq!(calls, 10);
    /// ```
    pub fn call<T, E, F>(&self, work: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: StdError + 'static,
    {
        self.call_interruptible(None, &Interrupt::new(), work)
    }

    /// Like [`call`](Self::call), labelling log output with `name`.
    pub fn call_named<T, E, F>(&self, name: &str, work: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: StdError + 'static,
    {
        self.call_interruptible(Some(name), &Interrupt::new(), work)
    }

    /// Like [`call`](Self::call), with backoff waits that `interrupt` can cut
    /// short.
    ///
    /// An interruption observed at a backoff point ends the call with
    /// [`RetryError::Interrupted`]; the unit of work is not run again.
    pub fn call_interruptible<T, E, F>(
        &self,
        name: Option<&str>,
        interrupt: &Interrupt,
        mut work: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: StdError + 'static,
    {
        let span = tracing::debug_span!("retry", call = name.unwrap_or(DEFAULT_CALL_NAME));
        let _entered = span.enter();

        let start_time = Instant::now();
        let mut attempt_count: u32 = 1;

        loop {
            let failure = match work() {
                Ok(value) => {
                    tracing::debug!(attempts = attempt_count, "succeeded");
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let context = Context::new(start_time, Instant::now(), attempt_count, &failure);
            let decision = self.decide(&context);

            if decision.allow_retry {
                if self.pause(decision.backoff, interrupt).is_err() {
                    tracing::debug!(attempts = attempt_count, "interrupted during backoff");
                    return Err(RetryError::Interrupted);
                }
                if self.still_admissible(&context) {
                    attempt_count = attempt_count.saturating_add(1);
                    continue;
                }
            }

            tracing::debug!(attempts = attempt_count, failure = %failure, "giving up");
            return Err(RetryError::Failure(failure));
        }
    }
}
