//! Property-based tests for conditions and backoff policies

use chrono::TimeDelta;
use proptest::prelude::*;
use rebound::{BackoffPolicy, Condition, Context};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Sample;

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sample")
    }
}

impl std::error::Error for Sample {}

/// Evaluate `f` against a context `elapsed_ms` into a call at `attempt`.
fn with_context<R>(attempt: u32, elapsed_ms: u64, f: impl FnOnce(&Context<'_>) -> R) -> R {
    let start = Instant::now();
    let failure = Sample;
    let context = Context::new(start, start + Duration::from_millis(elapsed_ms), attempt, &failure);
    f(&context)
}

fn base_condition() -> impl Strategy<Value = Condition> {
    prop_oneof![
        any::<bool>().prop_map(Condition::always),
        (2u32..20).prop_map(Condition::attempt_count_below),
        (1u64..5_000).prop_map(|ms| Condition::elapsed_below(Duration::from_millis(ms))),
        Just(Condition::failure_is::<Sample>()),
        Just(Condition::failure_is::<std::io::Error>()),
    ]
}

proptest! {
    #[test]
    fn prop_and_or_not_follow_boolean_logic(
        a in base_condition(),
        b in base_condition(),
        attempt in 1u32..30,
        elapsed in 0u64..6_000,
    ) {
        with_context(attempt, elapsed, |ctx| {
            let (x, y) = (a.evaluate(ctx), b.evaluate(ctx));
            prop_assert_eq!((a.clone() & b.clone()).evaluate(ctx), x && y);
            prop_assert_eq!((a.clone() | b.clone()).evaluate(ctx), x || y);
            prop_assert_eq!((!a.clone()).evaluate(ctx), !x);
            prop_assert_eq!((!!a.clone()).evaluate(ctx), x);
            prop_assert_eq!(
                (!(a.clone() & b.clone())).evaluate(ctx),
                ((!a.clone()) | (!b.clone())).evaluate(ctx)
            );
            Ok(())
        })?;
    }

    #[test]
    fn prop_attempt_count_below_matches_bound(max in 2u32..1_000, attempt in 1u32..2_000) {
        let holds = with_context(attempt, 0, |ctx| Condition::attempt_count_below(max).evaluate(ctx));
        prop_assert_eq!(holds, attempt < max);
    }

    #[test]
    fn prop_explain_mentions_attempt(max in 2u32..100, attempt in 1u32..200) {
        let explained =
            with_context(attempt, 0, |ctx| Condition::attempt_count_below(max).explain(ctx));
        prop_assert_eq!(explained, format!("context.attemptCount={} < {}", attempt, max));
    }

    #[test]
    fn prop_exponential_is_capped_and_monotonic(
        init_ms in 1u64..10_000,
        extra_ms in 0u64..100_000,
        attempt in 1u32..80,
    ) {
        let max_ms = init_ms + extra_ms;
        let policy = BackoffPolicy::exponential(
            Duration::from_millis(init_ms),
            Duration::from_millis(max_ms),
        );
        let current = with_context(attempt, 0, |ctx| policy.compute(ctx));
        let next = with_context(attempt + 1, 0, |ctx| policy.compute(ctx));

        prop_assert!(current >= TimeDelta::milliseconds(init_ms as i64));
        prop_assert!(current <= TimeDelta::milliseconds(max_ms as i64));
        prop_assert!(next >= current);
    }

    #[test]
    fn prop_random_uniform_stays_in_range(
        min_ms in -1_000i64..1_000,
        width in 0i64..5_000,
        attempt in 1u32..10,
    ) {
        let (min, max) = (TimeDelta::milliseconds(min_ms), TimeDelta::milliseconds(min_ms + width));
        let policy = BackoffPolicy::random_uniform(min, max);
        let delay = with_context(attempt, 0, |ctx| policy.compute(ctx));
        prop_assert!(delay >= min && delay <= max);
    }

    #[test]
    fn prop_fixed_interval_aligns_to_grid(
        period_ms in 1u64..1_000,
        attempt in 1u32..50,
        elapsed in 0u64..60_000,
    ) {
        let policy = BackoffPolicy::fixed_interval(Duration::from_millis(period_ms));
        let delay = with_context(attempt, elapsed, |ctx| policy.compute(ctx));
        let target = period_ms as i64 * attempt as i64;

        prop_assert!(delay >= TimeDelta::zero());
        prop_assert_eq!(delay, TimeDelta::milliseconds((target - elapsed as i64).max(0)));
    }

    #[test]
    fn prop_sum_adds_components(a_ms in 0u64..100_000, b_ms in 0u64..100_000) {
        let policy = BackoffPolicy::fixed(Duration::from_millis(a_ms))
            + BackoffPolicy::fixed(Duration::from_millis(b_ms));
        let delay = with_context(1, 0, |ctx| policy.compute(ctx));
        prop_assert_eq!(delay, TimeDelta::milliseconds((a_ms + b_ms) as i64));
    }
}
