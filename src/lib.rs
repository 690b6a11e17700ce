//! # Rebound
//!
//! > *"What fails once may land the second time"*
//!
//! A small engine for retrying fallible operations under declarative
//! strategies.
//!
//! ## Philosophy
//!
//! A retry strategy is **data**, not control flow:
//! - **Conditions** decide whether another attempt is allowed
//! - **Backoff policies** decide how long to wait first
//! - **Listeners** observe every failure as it happens
//!
//! All three are plain values that compose with operators, print themselves
//! in readable form, and are evaluated against a [`Context`] describing the
//! failure at hand. A [`RetryEngine`] freezes one strategy and runs any number
//! of calls under it, blocking or scheduled.
//!
//! ## Quick Example
//!
//! ```rust
//! use rebound::prelude::*;
//! use std::io;
//! use std::time::Duration;
//!
//! let engine = RetryEngine::builder()
//!     .with_retry_condition(Condition::attempt_count_below(5) & Condition::elapsed_below(Duration::from_secs(10)))
//!     .with_abort_condition(Condition::failure_is::<std::fmt::Error>())
//!     .with_backoff(BackoffPolicy::fixed(Duration::from_millis(1)))
//!     .with_failure_listener(LoggingFailureListener::first_chain())
//!     .build();
//!
//! let mut attempts = 0;
//! let result = engine.call(|| {
//!     attempts += 1;
//!     if attempts < 3 {
//!         Err(io::Error::other("connection reset"))
//!     } else {
//!         Ok("payload")
//!     }
//! });
//!
//! assert_eq!(result.unwrap(), "payload");
//! ```
//!
//! ## Feature Flags
//!
//! - `async`: [`TokioScheduler`] for running scheduled retries on tokio
//! - `serde`: [`RetrySettings`] for loading strategies from configuration

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backoff;
pub mod condition;
pub mod context;
pub mod listener;
pub mod proxy;
pub mod retry;
pub mod scheduler;
#[cfg(feature = "serde")]
pub mod settings;
pub mod sleep;

// Re-exports
pub use backoff::BackoffPolicy;
pub use condition::{Condition, ErrorKind};
pub use context::Context;
pub use listener::{FailureListener, LoggingFailureListener};
pub use proxy::RetryProxy;
pub use retry::{CancelHandle, RetryBuilder, RetryEngine, RetryError, RetryFuture};
#[cfg(feature = "async")]
pub use scheduler::TokioScheduler;
pub use scheduler::{Scheduler, Task, ThreadScheduler};
#[cfg(feature = "serde")]
pub use settings::{BackoffSettings, RetrySettings, SettingsError};
pub use sleep::{Interrupt, Interrupted, Sleeper, ThreadSleeper};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backoff::BackoffPolicy;
    pub use crate::condition::{Condition, ErrorKind};
    pub use crate::context::Context;
    pub use crate::listener::{FailureListener, LoggingFailureListener};
    pub use crate::proxy::RetryProxy;
    pub use crate::retry::{RetryEngine, RetryError, RetryFuture};
    pub use crate::scheduler::{Scheduler, ThreadScheduler};
}
