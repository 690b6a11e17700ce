//! Task schedulers for [`RetryEngine::submit`](crate::RetryEngine::submit).
//!
//! The scheduled execution path never blocks a thread between attempts. It
//! hands each attempt to a [`Scheduler`] together with the delay to observe
//! before running it. Anything that can "run this task once, no earlier than
//! `delay` from now" can be a scheduler.
//!
//! Two are provided:
//!
//! - [`ThreadScheduler`]: a short-lived thread per task
//! - `TokioScheduler` (feature `async`): tokio timers, with the unit of work
//!   on tokio's blocking pool

use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after a delay.
///
/// Implementations must run each task at most once and never earlier than
/// `delay` after `schedule` was called. Dropping a task without running it is
/// allowed (e.g. on shutdown); the pending retry then resolves as cancelled.
pub trait Scheduler: Send + Sync {
    /// Run `task` once, at least `delay` from now.
    fn schedule(&self, task: Task, delay: Duration);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule(&self, task: Task, delay: Duration) {
        (**self).schedule(task, delay)
    }
}

/// Spawns a named OS thread per task that sleeps for the delay, then runs it.
///
/// Each pending retry holds a sleeping thread for the whole backoff, and a
/// cancelled call keeps that thread until the delay ends. It suits tests and
/// low-volume callers without a runtime; prefer `TokioScheduler` (feature
/// `async`), which waits on timers instead of threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, task: Task, delay: Duration) {
        let spawned = thread::Builder::new()
            .name("rebound-retry".to_string())
            .spawn(move || {
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                task();
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "failed to spawn retry thread; dropping task");
        }
    }
}

/// Schedules tasks on a tokio runtime.
///
/// The delay is observed with `tokio::time::sleep`; the task itself runs on
/// the runtime's blocking pool since units of work are synchronous.
#[cfg(feature = "async")]
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "async")]
impl TokioScheduler {
    /// Schedule on the runtime behind `handle`.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Schedule on the runtime the caller is running in.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

#[cfg(feature = "async")]
impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Task, delay: Duration) {
        let handle = self.handle.clone();
        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = handle.spawn_blocking(task).await {
                tracing::warn!(error = %e, "scheduled retry task did not complete");
            }
        });
    }
}
