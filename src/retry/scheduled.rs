//! Scheduled execution: each attempt is a task handed to a [`Scheduler`].
//!
//! Per-call state lives in a [`ScheduledAttempt`] that owns the unit of work,
//! the attempt counter and the promise. Running the attempt consumes it; on a
//! retryable failure it moves itself into the next task, so exactly one copy
//! of the state exists at any time and no locking is needed even on a
//! multi-threaded scheduler.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::{Duration, Instant};

use futures::channel::oneshot;
use futures::task::AtomicWaker;

use super::{RetryEngine, RetryError};
use crate::context::Context;
use crate::scheduler::Scheduler;

const DEFAULT_SUBMIT_NAME: &str = "submit";

type Promise<T, E> = oneshot::Sender<Result<T, RetryError<E>>>;

impl RetryEngine {
    /// Run `work` on `scheduler`, retrying under this engine's strategy.
    ///
    /// Returns immediately. The first attempt is scheduled without delay;
    /// retries are scheduled after their backoff. Nothing blocks between
    /// attempts.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rebound::{RetryEngine, ThreadScheduler};
    /// use std::io;
    ///
    /// let engine = RetryEngine::times(5);
    /// let mut calls = 0;
    /// let future = engine.submit(ThreadScheduler, move || {
    ///     calls += 1;
    ///     if calls < 3 { Err(io::Error::other("not yet")) } else { Ok(calls) }
    /// });
    ///
    /// assert_eq!(future.wait().unwrap(), 3);
    /// ```
    pub fn submit<T, E, F, S>(&self, scheduler: S, work: F) -> RetryFuture<T, E>
    where
        T: Send + 'static,
        E: StdError + Send + 'static,
        F: FnMut() -> Result<T, E> + Send + 'static,
        S: Scheduler + 'static,
    {
        self.submit_inner(Arc::new(scheduler), Arc::from(DEFAULT_SUBMIT_NAME), work)
    }

    /// Like [`submit`](Self::submit), labelling log output with `name`.
    pub fn submit_named<T, E, F, S>(
        &self,
        scheduler: S,
        name: &str,
        work: F,
    ) -> RetryFuture<T, E>
    where
        T: Send + 'static,
        E: StdError + Send + 'static,
        F: FnMut() -> Result<T, E> + Send + 'static,
        S: Scheduler + 'static,
    {
        self.submit_inner(Arc::new(scheduler), Arc::from(name), work)
    }

    fn submit_inner<T, E, F>(
        &self,
        scheduler: Arc<dyn Scheduler>,
        name: Arc<str>,
        work: F,
    ) -> RetryFuture<T, E>
    where
        T: Send + 'static,
        E: StdError + Send + 'static,
        F: FnMut() -> Result<T, E> + Send + 'static,
    {
        let (promise, receiver) = oneshot::channel();
        let cancel = CancelHandle::default();
        let attempt = ScheduledAttempt {
            engine: self.clone(),
            scheduler: scheduler.clone(),
            name,
            work,
            start_time: Instant::now(),
            attempt_count: 1,
            pending: None,
            promise,
            cancelled: cancel.state.clone(),
        };
        scheduler.schedule(Box::new(move || attempt.run()), Duration::ZERO);
        RetryFuture { receiver, cancel }
    }
}

/// A failure waiting for its backoff to elapse.
struct PendingRetry<E> {
    failure: E,
    observed_at: Instant,
}

struct ScheduledAttempt<T, E, F> {
    engine: RetryEngine,
    scheduler: Arc<dyn Scheduler>,
    name: Arc<str>,
    work: F,
    start_time: Instant,
    attempt_count: u32,
    pending: Option<PendingRetry<E>>,
    promise: Promise<T, E>,
    cancelled: Arc<CancelState>,
}

impl<T, E, F> ScheduledAttempt<T, E, F>
where
    T: Send + 'static,
    E: StdError + Send + 'static,
    F: FnMut() -> Result<T, E> + Send + 'static,
{
    fn run(mut self) {
        let span = tracing::debug_span!("retry", call = &*self.name);
        let _entered = span.enter();

        if self.cancelled.is_cancelled() || self.promise.is_canceled() {
            tracing::debug!(attempts = self.attempt_count, "cancelled");
            let _ = self.promise.send(Err(RetryError::Cancelled));
            return;
        }

        // Re-check the previous failure after its backoff, as the blocking
        // path does, so a listener can still veto the retry.
        if let Some(pending) = self.pending.take() {
            let context = Context::new(
                self.start_time,
                pending.observed_at,
                self.attempt_count,
                &pending.failure,
            );
            if !self.engine.still_admissible(&context) {
                tracing::debug!(attempts = self.attempt_count, failure = %pending.failure, "giving up");
                let _ = self.promise.send(Err(RetryError::Failure(pending.failure)));
                return;
            }
            self.attempt_count = self.attempt_count.saturating_add(1);
        }

        let failure = match (self.work)() {
            Ok(value) => {
                tracing::debug!(attempts = self.attempt_count, "succeeded");
                let _ = self.promise.send(Ok(value));
                return;
            }
            Err(failure) => failure,
        };

        let observed_at = Instant::now();
        let context = Context::new(self.start_time, observed_at, self.attempt_count, &failure);
        let decision = self.engine.decide(&context);

        if !decision.allow_retry {
            tracing::debug!(attempts = self.attempt_count, failure = %failure, "giving up");
            let _ = self.promise.send(Err(RetryError::Failure(failure)));
            return;
        }

        let delay = decision.backoff.to_std().unwrap_or(Duration::ZERO);
        self.pending = Some(PendingRetry {
            failure,
            observed_at,
        });
        let scheduler = self.scheduler.clone();
        scheduler.schedule(Box::new(move || self.run()), delay);
    }
}

/// The eventual result of [`RetryEngine::submit`].
///
/// Resolves to the first successful value, to the last failure once retrying
/// is no longer permitted, or to [`RetryError::Cancelled`]. Cancelling
/// resolves the future at once, even while a backoff is still pending.
/// Dropping the future stops further attempts from starting.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct RetryFuture<T, E> {
    receiver: oneshot::Receiver<Result<T, RetryError<E>>>,
    cancel: CancelHandle,
}

impl<T, E> RetryFuture<T, E> {
    /// Resolve this future with [`RetryError::Cancelled`] and prevent any
    /// further attempt from starting.
    ///
    /// An attempt already running is allowed to finish, but its outcome is
    /// discarded unless it was delivered before the cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that can cancel this call from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Block the current thread until the call completes.
    pub fn wait(self) -> Result<T, RetryError<E>> {
        futures::executor::block_on(self)
    }
}

impl<T, E> Future for RetryFuture<T, E> {
    type Output = Result<T, RetryError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(RetryError::Cancelled)),
            Poll::Pending => {
                // Register before checking so a concurrent cancel is not missed.
                this.cancel.state.waker.register(cx.waker());
                if this.cancel.is_cancelled() {
                    Poll::Ready(Err(RetryError::Cancelled))
                } else {
                    Poll::Pending
                }
            }
        }
    }
}

impl<T, E> fmt::Debug for RetryFuture<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFuture")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Cancels a scheduled call.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

/// Shared between the handle, the future and the pending attempt.
#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    waker: AtomicWaker,
}

impl CancelState {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl CancelHandle {
    /// Resolve the call's future with [`RetryError::Cancelled`] and prevent
    /// any further attempt from starting.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.waker.wake();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}
