//! Forwarding decorator that runs every method call through an engine.
//!
//! [`RetryProxy`] pairs a target with a [`RetryEngine`]. Each
//! [`invoke`](RetryProxy::invoke) runs one method of the target as a unit of
//! work named `"<target>.<method>"`. To retry a whole interface, implement
//! the trait for `RetryProxy<YourType>` and forward each method:
//!
//! ```rust
//! use rebound::{RetryEngine, RetryError, RetryProxy};
//! use std::cell::Cell;
//! use std::io;
//!
//! trait Inventory {
//!     fn reserve(&self, sku: &str) -> Result<u32, RetryError<io::Error>>;
//! }
//!
//! struct Warehouse {
//!     flaky: Cell<u32>,
//! }
//!
//! impl Warehouse {
//!     fn reserve(&self, _sku: &str) -> Result<u32, io::Error> {
//!         if self.flaky.get() > 0 {
//!             self.flaky.set(self.flaky.get() - 1);
//!             return Err(io::Error::other("lock timeout"));
//!         }
//!         Ok(42)
//!     }
//! }
//!
//! impl Inventory for RetryProxy<Warehouse> {
//!     fn reserve(&self, sku: &str) -> Result<u32, RetryError<io::Error>> {
//!         self.invoke("reserve", |w| w.reserve(sku))
//!     }
//! }
//!
//! let inventory = RetryProxy::new(RetryEngine::times(5), Warehouse { flaky: Cell::new(2) }, "warehouse");
//! assert_eq!(inventory.reserve("sku-1").unwrap(), 42);
//! ```

use std::error::Error as StdError;
use std::fmt;

use crate::retry::{RetryEngine, RetryError};

/// A target whose method calls are retried by an engine.
pub struct RetryProxy<T> {
    engine: RetryEngine,
    target: T,
    name: String,
}

impl<T> RetryProxy<T> {
    /// Wrap `target`, naming units of work `"<name>.<method>"`.
    pub fn new(engine: RetryEngine, target: T, name: impl Into<String>) -> Self {
        Self {
            engine,
            target,
            name: name.into(),
        }
    }

    /// Run `method` against the target under the engine.
    pub fn invoke<R, E, F>(&self, method: &str, mut f: F) -> Result<R, RetryError<E>>
    where
        F: FnMut(&T) -> Result<R, E>,
        E: StdError + 'static,
    {
        let call = format!("{}.{}", self.name, method);
        self.engine.call_named(&call, || f(&self.target))
    }

    /// Run a mutating `method` against the target under the engine.
    pub fn invoke_mut<R, E, F>(&mut self, method: &str, mut f: F) -> Result<R, RetryError<E>>
    where
        F: FnMut(&mut T) -> Result<R, E>,
        E: StdError + 'static,
    {
        let call = format!("{}.{}", self.name, method);
        let target = &mut self.target;
        self.engine.call_named(&call, || f(&mut *target))
    }

    /// The wrapped target.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// The name used as prefix for units of work.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine calls are run under.
    pub fn engine(&self) -> &RetryEngine {
        &self.engine
    }

    /// Unwrap the target.
    pub fn into_inner(self) -> T {
        self.target
    }
}

impl<T: fmt::Display> RetryProxy<T> {
    /// Wrap `target`, using its `Display` form as the name.
    pub fn named_after(engine: RetryEngine, target: T) -> Self {
        let name = target.to_string();
        Self::new(engine, target, name)
    }
}

impl<T: fmt::Debug> fmt::Debug for RetryProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryProxy")
            .field("name", &self.name)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl RetryEngine {
    /// Wrap `target` in a [`RetryProxy`] driven by this engine.
    pub fn proxy<T>(&self, target: T, name: impl Into<String>) -> RetryProxy<T> {
        RetryProxy::new(self.clone(), target, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use std::io;
    use tracing_test::traced_test;

    trait Counter {
        fn next(&mut self) -> Result<u32, RetryError<io::Error>>;
        fn peek(&self) -> Result<u32, RetryError<io::Error>>;
    }

    #[derive(Debug)]
    struct FlakyCounter {
        value: u32,
        failures_left: u32,
    }

    impl FlakyCounter {
        fn next(&mut self) -> Result<u32, io::Error> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(io::Error::other("counter busy"));
            }
            self.value += 1;
            Ok(self.value)
        }

        fn peek(&self) -> Result<u32, io::Error> {
            if self.value == 0 {
                Err(io::Error::new(io::ErrorKind::NotFound, "never incremented"))
            } else {
                Ok(self.value)
            }
        }
    }

    impl fmt::Display for FlakyCounter {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("counter")
        }
    }

    impl Counter for RetryProxy<FlakyCounter> {
        fn next(&mut self) -> Result<u32, RetryError<io::Error>> {
            self.invoke_mut("next", |c| c.next())
        }

        fn peek(&self) -> Result<u32, RetryError<io::Error>> {
            self.invoke("peek", |c| c.peek())
        }
    }

    #[traced_test]
    #[test]
    fn test_forwards_through_engine() {
        let mut counter = RetryProxy::named_after(
            RetryEngine::times(5),
            FlakyCounter {
                value: 0,
                failures_left: 3,
            },
        );

        assert_eq!(counter.name(), "counter");
        assert_eq!(counter.next().unwrap(), 1);
        assert_eq!(counter.target().failures_left, 0);
        assert!(logs_contain("counter.next"));
    }

    #[test]
    fn test_surfaces_original_failure() {
        let engine = RetryEngine::builder()
            .with_retry_condition(Condition::attempt_count_below(3))
            .build();
        let counter = engine.proxy(
            FlakyCounter {
                value: 0,
                failures_left: 0,
            },
            "counter",
        );

        let err = counter.peek().unwrap_err();
        assert_eq!(err.into_failure().map(|e| e.kind()), Some(io::ErrorKind::NotFound));
        assert_eq!(counter.into_inner().value, 0);
    }
}
