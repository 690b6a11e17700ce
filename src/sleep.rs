//! Interruptible backoff waits for the blocking engine.
//!
//! The blocking engine never calls `std::thread::sleep` directly. It asks a
//! [`Sleeper`] to wait, passing the call's [`Interrupt`] handle. The default
//! [`ThreadSleeper`] parks on a condition variable owned by that handle, so
//! another thread can cut a backoff short with [`Interrupt::interrupt`].

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Returned when a wait was cut short by an [`Interrupt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("backoff wait interrupted")
    }
}

impl std::error::Error for Interrupted {}

/// A cloneable, sticky interruption flag.
///
/// Clones share state: interrupting any clone interrupts them all, and wakes
/// every thread currently waiting on one of them. Once set the flag stays set.
///
/// # Example
///
/// ```rust
/// use rebound::Interrupt;
/// use std::time::Duration;
///
/// let interrupt = Interrupt::new();
/// let remote = interrupt.clone();
///
/// let waiter = std::thread::spawn(move || interrupt.wait(Duration::from_secs(3600)));
/// remote.interrupt();
///
/// assert!(waiter.join().unwrap().is_err());
/// ```
#[derive(Clone, Default)]
pub struct Interrupt {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl Interrupt {
    /// A fresh, not yet interrupted handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake all waiters.
    pub fn interrupt(&self) {
        let (flag, wakeup) = &*self.state;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wakeup.notify_all();
    }

    /// Whether [`interrupt`](Self::interrupt) has been called.
    pub fn is_interrupted(&self) -> bool {
        let (flag, _) = &*self.state;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Err(Interrupted)` if the flag is set.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_interrupted() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Block for `timeout`, returning early with `Err(Interrupted)` if the
    /// flag is or becomes set.
    pub fn wait(&self, timeout: Duration) -> Result<(), Interrupted> {
        let (flag, wakeup) = &*self.state;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = wakeup
            .wait_timeout_while(guard, timeout, |interrupted| !*interrupted)
            .unwrap_or_else(PoisonError::into_inner);
        if *guard {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

/// Performs the backoff wait of the blocking engine.
///
/// Implementations must return `Err(Interrupted)` promptly once `interrupt`
/// is set. Only called with positive durations.
pub trait Sleeper: Send + Sync {
    /// Wait for `duration` unless interrupted.
    fn sleep(&self, duration: Duration, interrupt: &Interrupt) -> Result<(), Interrupted>;
}

/// The default [`Sleeper`]: parks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration, interrupt: &Interrupt) -> Result<(), Interrupted> {
        interrupt.wait(duration)
    }
}

impl<F> Sleeper for F
where
    F: Fn(Duration, &Interrupt) -> Result<(), Interrupted> + Send + Sync,
{
    fn sleep(&self, duration: Duration, interrupt: &Interrupt) -> Result<(), Interrupted> {
        self(duration, interrupt)
    }
}
