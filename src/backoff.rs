//! Backoff policies: how long to wait before the next attempt.
//!
//! A [`BackoffPolicy`] maps a failed attempt's [`Context`] to a wait duration.
//! Policies are pure data apart from [`BackoffPolicy::random_uniform`], and
//! compose by addition:
//!
//! ```rust
//! use rebound::{BackoffPolicy, Context};
//! use chrono::TimeDelta;
//! use std::time::{Duration, Instant};
//!
//! let policy = BackoffPolicy::fixed(Duration::from_secs(1)) + BackoffPolicy::fixed(Duration::from_secs(1));
//!
//! let failure = std::io::Error::other("boom");
//! let now = Instant::now();
//! assert_eq!(policy.compute(&Context::new(now, now, 1, &failure)), TimeDelta::seconds(2));
//! ```
//!
//! # Durations
//!
//! Results are signed [`TimeDelta`]s covering ±`i64::MAX` milliseconds.
//! Only [`random_uniform`](BackoffPolicy::random_uniform) with negative bounds
//! (or a custom policy) can yield a negative value; the engine treats anything
//! at or below zero as "do not wait".

use std::fmt;
use std::ops::Add;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use rand::Rng;

use crate::context::Context;

type BackoffFn = dyn Fn(&Context<'_>) -> TimeDelta + Send + Sync;

/// Computes the wait before the next attempt.
#[derive(Clone)]
pub struct BackoffPolicy(Node);

#[derive(Clone)]
enum Node {
    None,
    Fixed(TimeDelta),
    Exponential { init_millis: i64, max_millis: i64 },
    RandomUniform { min_millis: i64, max_millis: i64 },
    FixedInterval { period_millis: i64 },
    Custom(Arc<BackoffFn>),
    Sum(Box<BackoffPolicy>, Box<BackoffPolicy>),
}

impl BackoffPolicy {
    /// Never wait.
    pub const NONE: BackoffPolicy = BackoffPolicy(Node::None);

    /// Always wait `delay`.
    pub fn fixed(delay: Duration) -> Self {
        BackoffPolicy(Node::Fixed(delta_from_std(delay)))
    }

    /// Start at `init` and double per attempt, never exceeding `max`.
    ///
    /// The first failure waits `init`, the second `2 * init`, and so on.
    /// Doubling is done in whole milliseconds and stops before it can overflow,
    /// so very large attempt counts settle at `max` instead of wrapping.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rebound::{BackoffPolicy, Context};
    /// use chrono::TimeDelta;
    /// use std::time::{Duration, Instant};
    ///
    /// let policy = BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_millis(500));
    /// let failure = std::io::Error::other("boom");
    /// let now = Instant::now();
    /// let wait = |n| policy.compute(&Context::new(now, now, n, &failure));
    ///
    /// assert_eq!(wait(1), TimeDelta::milliseconds(100));
    /// assert_eq!(wait(3), TimeDelta::milliseconds(400));
    /// assert_eq!(wait(4), TimeDelta::milliseconds(500));
    /// ```
    pub fn exponential(init: Duration, max: Duration) -> Self {
        BackoffPolicy(Node::Exponential {
            init_millis: millis_from_std(init),
            max_millis: millis_from_std(max),
        })
    }

    /// A uniformly random wait in `[min, max]`, inclusive, at millisecond
    /// resolution. Negative bounds are allowed.
    ///
    /// # Panics
    ///
    /// Panics if `min > max`.
    pub fn random_uniform(min: TimeDelta, max: TimeDelta) -> Self {
        assert!(min <= max, "min must be less than or equal to max");
        BackoffPolicy(Node::RandomUniform {
            min_millis: min.num_milliseconds(),
            max_millis: max.num_milliseconds(),
        })
    }

    /// Aim for attempts at `start_time + period * attempt_count`.
    ///
    /// Returns the gap between the failure and that target, or zero when the
    /// target has already passed. Slow attempts therefore eat into the wait
    /// rather than pushing the schedule back.
    pub fn fixed_interval(period: Duration) -> Self {
        BackoffPolicy(Node::FixedInterval {
            period_millis: millis_from_std(period),
        })
    }

    /// Wrap an arbitrary function.
    pub fn custom<F>(backoff: F) -> Self
    where
        F: Fn(&Context<'_>) -> TimeDelta + Send + Sync + 'static,
    {
        BackoffPolicy(Node::Custom(Arc::new(backoff)))
    }

    /// Wait for the sum of both policies' durations.
    pub fn plus(self, other: BackoffPolicy) -> Self {
        BackoffPolicy(Node::Sum(Box::new(self), Box::new(other)))
    }

    /// Compute the wait for a failed attempt.
    pub fn compute(&self, context: &Context<'_>) -> TimeDelta {
        match &self.0 {
            Node::None => TimeDelta::zero(),
            Node::Fixed(delay) => *delay,
            Node::Exponential {
                init_millis,
                max_millis,
            } => delta_from_millis(exponential_millis(
                *init_millis,
                *max_millis,
                context.attempt_count(),
            )),
            Node::RandomUniform {
                min_millis,
                max_millis,
            } => delta_from_millis(rand::rng().random_range(*min_millis..=*max_millis)),
            Node::FixedInterval { period_millis } => {
                let target = period_millis.saturating_mul(i64::from(context.attempt_count()));
                let elapsed = millis_from_std(context.elapsed());
                delta_from_millis(target.saturating_sub(elapsed).max(0))
            }
            Node::Custom(backoff) => backoff(context),
            Node::Sum(a, b) => saturating_add(a.compute(context), b.compute(context)),
        }
    }
}

impl Add for BackoffPolicy {
    type Output = BackoffPolicy;

    fn add(self, rhs: BackoffPolicy) -> BackoffPolicy {
        self.plus(rhs)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::NONE
    }
}

impl fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Node::None => f.write_str("None"),
            Node::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            Node::Exponential {
                init_millis,
                max_millis,
            } => f
                .debug_struct("Exponential")
                .field("init_millis", init_millis)
                .field("max_millis", max_millis)
                .finish(),
            Node::RandomUniform {
                min_millis,
                max_millis,
            } => f
                .debug_struct("RandomUniform")
                .field("min_millis", min_millis)
                .field("max_millis", max_millis)
                .finish(),
            Node::FixedInterval { period_millis } => f
                .debug_struct("FixedInterval")
                .field("period_millis", period_millis)
                .finish(),
            Node::Custom(_) => f.write_str("Custom(..)"),
            Node::Sum(a, b) => f.debug_tuple("Sum").field(a).field(b).finish(),
        }
    }
}

/// Doubles `init` once per retry already made, stopping before overflow.
fn exponential_millis(init: i64, max: i64, attempt_count: u32) -> i64 {
    let mut value = init;
    for _ in 1..attempt_count {
        if value < i64::MAX / 2 {
            value <<= 1;
        } else {
            value = i64::MAX;
            break;
        }
        if value > max {
            break;
        }
    }
    value.min(max)
}

fn millis_from_std(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn delta_from_std(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn delta_from_millis(millis: i64) -> TimeDelta {
    TimeDelta::try_milliseconds(millis).unwrap_or(if millis < 0 {
        TimeDelta::MIN
    } else {
        TimeDelta::MAX
    })
}

fn saturating_add(a: TimeDelta, b: TimeDelta) -> TimeDelta {
    a.checked_add(&b).unwrap_or(if b < TimeDelta::zero() {
        TimeDelta::MIN
    } else {
        TimeDelta::MAX
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Instant;

    const MAX: i64 = i64::MAX;

    fn compute_at(policy: &BackoffPolicy, attempt_count: u32, elapsed: Duration) -> TimeDelta {
        let failure = io::Error::other("boom");
        let start = Instant::now();
        policy.compute(&Context::new(start, start + elapsed, attempt_count, &failure))
    }

    fn compute(policy: &BackoffPolicy, attempt_count: u32) -> TimeDelta {
        compute_at(policy, attempt_count, Duration::ZERO)
    }

    #[test]
    fn test_none() {
        assert_eq!(compute(&BackoffPolicy::NONE, 1), TimeDelta::zero());
        assert_eq!(compute(&BackoffPolicy::default(), 7), TimeDelta::zero());
    }

    #[test]
    fn test_fixed() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(250));
        assert_eq!(compute(&policy, 1), TimeDelta::milliseconds(250));
        assert_eq!(compute(&policy, 100), TimeDelta::milliseconds(250));
    }

    #[test]
    fn test_exponential_doubles_then_clamps() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(1), Duration::from_millis(5));
        let waits: Vec<i64> = (1..=5)
            .map(|n| compute(&policy, n).num_milliseconds())
            .collect();
        assert_eq!(waits, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn test_exponential_does_not_overflow() {
        let init = (MAX / 2 + 1) as u64;
        let max = (MAX / 2 + 2) as u64;
        let policy =
            BackoffPolicy::exponential(Duration::from_millis(init), Duration::from_millis(max));

        assert_eq!(compute(&policy, 1).num_milliseconds(), MAX / 2 + 1);
        assert_eq!(compute(&policy, 2).num_milliseconds(), MAX / 2 + 2);
        assert_eq!(compute(&policy, u32::MAX).num_milliseconds(), MAX / 2 + 2);
    }

    #[test]
    fn test_exponential_huge_attempt_count_settles_at_max() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(1), Duration::from_secs(60));
        assert_eq!(compute(&policy, u32::MAX), TimeDelta::seconds(60));
    }

    #[test]
    fn test_exponential_millis_unbounded_max() {
        assert_eq!(exponential_millis(3, MAX, 1), 3);
        assert_eq!(exponential_millis(3, MAX, 4), 24);
        assert_eq!(exponential_millis(MAX / 2, MAX, 2), MAX);
    }

    #[test]
    fn test_random_uniform_stays_in_range() {
        let policy =
            BackoffPolicy::random_uniform(TimeDelta::seconds(-100), TimeDelta::seconds(100));
        for _ in 0..10_000 {
            let millis = compute(&policy, 1).num_milliseconds();
            assert!((-100_000..=100_000).contains(&millis), "{} out of range", millis);
        }
    }

    #[test]
    fn test_random_uniform_degenerate_range() {
        let policy =
            BackoffPolicy::random_uniform(TimeDelta::milliseconds(7), TimeDelta::milliseconds(7));
        assert_eq!(compute(&policy, 1), TimeDelta::milliseconds(7));
    }

    #[test]
    #[should_panic(expected = "min must be less than or equal to max")]
    fn test_random_uniform_inverted_bounds_panics() {
        let _ = BackoffPolicy::random_uniform(TimeDelta::seconds(2), TimeDelta::seconds(1));
    }

    #[test]
    fn test_fixed_interval() {
        let policy = BackoffPolicy::fixed_interval(Duration::from_secs(10));

        // target for the 2nd attempt is start + 20s
        assert_eq!(
            compute_at(&policy, 2, Duration::from_secs(5)),
            TimeDelta::seconds(15)
        );
        assert_eq!(
            compute_at(&policy, 1, Duration::from_secs(10)),
            TimeDelta::zero()
        );
        assert_eq!(
            compute_at(&policy, 1, Duration::from_secs(30)),
            TimeDelta::zero()
        );
    }

    #[test]
    fn test_sum() {
        let policy = BackoffPolicy::fixed(Duration::from_secs(1))
            + BackoffPolicy::fixed(Duration::from_secs(1));
        assert_eq!(compute(&policy, 1), TimeDelta::seconds(2));
        assert_eq!(compute(&policy, 9), TimeDelta::seconds(2));
    }

    #[test]
    fn test_sum_saturates() {
        let huge = BackoffPolicy::fixed(Duration::MAX);
        let policy = huge.clone().plus(huge);
        assert_eq!(compute(&policy, 1), TimeDelta::MAX);
    }

    #[test]
    fn test_custom() {
        let policy =
            BackoffPolicy::custom(|ctx| TimeDelta::milliseconds(i64::from(ctx.attempt_count()) * 10));
        assert_eq!(compute(&policy, 3), TimeDelta::milliseconds(30));
    }

    #[test]
    fn test_debug() {
        let policy = BackoffPolicy::fixed(Duration::from_secs(1)) + BackoffPolicy::NONE;
        let debug = format!("{:?}", policy);
        assert!(debug.starts_with("Sum(Fixed("));
        assert!(debug.ends_with("None)"));
    }
}
