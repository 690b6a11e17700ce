//! Composable retry conditions
//!
//! A [`Condition`] is a boolean predicate over a failed attempt's [`Context`].
//! The engine uses two of them: a *retry* condition that must hold for another
//! attempt to be made, and an *abort* condition that vetoes retrying whenever it
//! holds.
//!
//! Conditions are closed under AND, OR and NOT. Combinators take their operands
//! by value and return a new condition, so a condition never changes after it is
//! built and can be shared freely across threads.
//!
//! Besides evaluating, every condition can [`explain`](Condition::explain)
//! itself against a context, rendering the values it actually compared. That
//! is what ends up in log lines.
//!
//! # Example
//!
//! ```rust
//! use rebound::{Condition, Context};
//! use std::io;
//! use std::time::{Duration, Instant};
//!
//! let retry = Condition::attempt_count_below(5) & Condition::elapsed_below(Duration::from_secs(60));
//!
//! let failure = io::Error::other("connection reset");
//! let now = Instant::now();
//! let ctx = Context::new(now, now, 3, &failure);
//!
//! assert!(retry.evaluate(&ctx));
//! assert_eq!(
//!     retry.explain(&ctx),
//!     "((context.attemptCount=3 < 5) && (context.elapsed=0ns < 60s))"
//! );
//! ```

use std::any::{self, TypeId};
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;

type PredicateFn = dyn Fn(&Context<'_>) -> bool + Send + Sync;

/// A boolean predicate over a [`Context`].
#[derive(Clone)]
pub struct Condition(Node);

#[derive(Clone)]
enum Node {
    Always(bool),
    AttemptCountBelow(u32),
    ElapsedBelow(Duration),
    FailureIsInstanceOf(Vec<ErrorKind>),
    Custom {
        description: Cow<'static, str>,
        predicate: Arc<PredicateFn>,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Always holds.
    pub const TRUE: Condition = Condition(Node::Always(true));

    /// Never holds.
    pub const FALSE: Condition = Condition(Node::Always(false));

    /// A constant condition.
    pub fn always(value: bool) -> Self {
        Condition(Node::Always(value))
    }

    /// Holds while `context.attempt_count() < max_attempts`.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts <= 1`: such a condition could never allow a
    /// single retry.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rebound::{Condition, Context};
    /// use std::time::Instant;
    ///
    /// let below_three = Condition::attempt_count_below(3);
    /// let failure = std::io::Error::other("boom");
    /// let now = Instant::now();
    ///
    /// assert!(below_three.evaluate(&Context::new(now, now, 2, &failure)));
    /// assert!(!below_three.evaluate(&Context::new(now, now, 3, &failure)));
    /// ```
    pub fn attempt_count_below(max_attempts: u32) -> Self {
        assert!(max_attempts > 1, "max_attempts must be greater than 1");
        Condition(Node::AttemptCountBelow(max_attempts))
    }

    /// Holds while `context.elapsed() < limit`.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    pub fn elapsed_below(limit: Duration) -> Self {
        assert!(!limit.is_zero(), "elapsed limit must be greater than 0");
        Condition(Node::ElapsedBelow(limit))
    }

    /// Holds when the failure, or any error in its `source()` chain, is one of
    /// the given kinds.
    pub fn failure_is_instance_of(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        let mut unique: Vec<ErrorKind> = Vec::new();
        for kind in kinds {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        Condition(Node::FailureIsInstanceOf(unique))
    }

    /// Shorthand for a single-kind [`failure_is_instance_of`](Self::failure_is_instance_of).
    ///
    /// # Example
    ///
    /// ```rust
    /// use rebound::{Condition, Context};
    /// use std::time::Instant;
    ///
    /// let io_failure = Condition::failure_is::<std::io::Error>();
    /// let failure = std::io::Error::other("disk on fire");
    /// let now = Instant::now();
    ///
    /// assert!(io_failure.evaluate(&Context::new(now, now, 1, &failure)));
    /// ```
    pub fn failure_is<T: StdError + 'static>() -> Self {
        Self::failure_is_instance_of([ErrorKind::of::<T>()])
    }

    /// Wrap an arbitrary predicate.
    ///
    /// `description` is used both for [`Display`](fmt::Display) and for
    /// [`explain`](Self::explain).
    pub fn custom<F>(description: impl Into<Cow<'static, str>>, predicate: F) -> Self
    where
        F: Fn(&Context<'_>) -> bool + Send + Sync + 'static,
    {
        Condition(Node::Custom {
            description: description.into(),
            predicate: Arc::new(predicate),
        })
    }

    /// Holds when both conditions hold. `other` is not consulted when `self`
    /// is false.
    pub fn and(self, other: Condition) -> Self {
        Condition(Node::And(Box::new(self), Box::new(other)))
    }

    /// Holds when either condition holds. `other` is not consulted when
    /// `self` is true.
    pub fn or(self, other: Condition) -> Self {
        Condition(Node::Or(Box::new(self), Box::new(other)))
    }

    /// Evaluate against a failed attempt.
    pub fn evaluate(&self, context: &Context<'_>) -> bool {
        match &self.0 {
            Node::Always(value) => *value,
            Node::AttemptCountBelow(max) => context.attempt_count() < *max,
            Node::ElapsedBelow(limit) => context.elapsed() < *limit,
            Node::FailureIsInstanceOf(kinds) => context
                .failure_chain()
                .any(|e| kinds.iter().any(|kind| kind.matches(e))),
            Node::Custom { predicate, .. } => predicate(context),
            Node::And(a, b) => a.evaluate(context) && b.evaluate(context),
            Node::Or(a, b) => a.evaluate(context) || b.evaluate(context),
            Node::Not(a) => !a.evaluate(context),
        }
    }

    /// Render this condition with the values taken from `context`.
    ///
    /// Composites render every operand, so the output has the same shape as
    /// the static [`Display`](fmt::Display) form.
    pub fn explain(&self, context: &Context<'_>) -> String {
        match &self.0 {
            Node::Always(value) => value.to_string(),
            Node::AttemptCountBelow(max) => {
                format!("context.attemptCount={} < {}", context.attempt_count(), max)
            }
            Node::ElapsedBelow(limit) => {
                format!("context.elapsed={:?} < {:?}", context.elapsed(), limit)
            }
            Node::FailureIsInstanceOf(kinds) => format!(
                "context.failure={} is in {}",
                context.failure(),
                KindList(kinds)
            ),
            Node::Custom { description, .. } => description.to_string(),
            Node::And(a, b) => format!("(({}) && ({}))", a.explain(context), b.explain(context)),
            Node::Or(a, b) => format!("(({}) || ({}))", a.explain(context), b.explain(context)),
            Node::Not(a) => format!("!({})", a.explain(context)),
        }
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition(Node::Not(Box::new(self)))
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        self.and(rhs)
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        self.or(rhs)
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::TRUE
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Node::Always(value) => write!(f, "{}", value),
            Node::AttemptCountBelow(max) => write!(f, "context.attemptCount < {}", max),
            Node::ElapsedBelow(limit) => write!(f, "context.elapsed < {:?}", limit),
            Node::FailureIsInstanceOf(kinds) => {
                write!(f, "context.failure is in {}", KindList(kinds))
            }
            Node::Custom { description, .. } => f.write_str(description),
            Node::And(a, b) => write!(f, "(({}) && ({}))", a, b),
            Node::Or(a, b) => write!(f, "(({}) || ({}))", a, b),
            Node::Not(a) => write!(f, "!({})", a),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Condition")
            .field(&format_args!("{}", self))
            .finish()
    }
}

/// A failure type that [`Condition::failure_is_instance_of`] matches against.
///
/// Kinds are identified by their concrete Rust type.
#[derive(Clone, Copy)]
pub struct ErrorKind {
    name: &'static str,
    type_id: TypeId,
    matches: fn(&(dyn StdError + 'static)) -> bool,
}

impl ErrorKind {
    /// The kind of errors of type `T`.
    pub fn of<T: StdError + 'static>() -> Self {
        Self {
            name: any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            matches: is_type::<T>,
        }
    }

    /// Fully qualified type name of this kind.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether `error` itself is of this kind. Does not follow `source()`.
    pub fn matches(&self, error: &(dyn StdError + 'static)) -> bool {
        (self.matches)(error)
    }
}

fn is_type<T: StdError + 'static>(error: &(dyn StdError + 'static)) -> bool {
    error.is::<T>()
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ErrorKind {}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorKind").field(&self.name).finish()
    }
}

struct KindList<'a>(&'a [ErrorKind]);

impl fmt::Display for KindList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, kind) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(kind.name)?;
        }
        f.write_str("]")
    }
}
