//! Blocking Retry Example
//!
//! Demonstrates composing conditions and backoff policies, watching failures
//! through the logging listener, and repairing state from a custom listener.
//!
//! Run with: cargo run --example retry_demo

use chrono::TimeDelta;
use rebound::prelude::*;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// A flaky connection
// ============================================================================

#[derive(Debug)]
struct ConnectionError {
    attempt: u32,
    cause: io::Error,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connect attempt {} failed", self.attempt)
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

struct Connection {
    healthy: AtomicBool,
    attempts: AtomicU32,
}

impl Connection {
    fn query(&self) -> Result<&'static str, ConnectionError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.healthy.load(Ordering::SeqCst) {
            Ok("42 rows")
        } else {
            Err(ConnectionError {
                attempt,
                cause: io::Error::new(io::ErrorKind::ConnectionReset, "peer reset"),
            })
        }
    }
}

// ============================================================================
// Strategies
// ============================================================================

fn exhausting_strategy() {
    println!("\n--- Exponential backoff until attempts run out ---");

    let engine = RetryEngine::builder()
        .with_retry_condition(
            Condition::attempt_count_below(4) & Condition::elapsed_below(Duration::from_secs(5)),
        )
        .with_backoff(BackoffPolicy::exponential(
            Duration::from_millis(10),
            Duration::from_millis(40),
        ))
        .with_failure_listener(LoggingFailureListener::first_chain())
        .build();

    println!("retrying while: {}", engine.admissibility());

    let connection = Connection {
        healthy: AtomicBool::new(false),
        attempts: AtomicU32::new(0),
    };
    match engine.call_named("db.query", || connection.query()) {
        Ok(rows) => println!("got {}", rows),
        Err(e) => println!("gave up: {}", e),
    }
}

fn self_healing_strategy() {
    println!("\n--- Listener repairs the connection between attempts ---");

    let connection = Arc::new(Connection {
        healthy: AtomicBool::new(false),
        attempts: AtomicU32::new(0),
    });
    let repair = connection.clone();

    let engine = RetryEngine::builder()
        .with_retry_condition(Condition::attempt_count_below(10))
        .with_backoff(BackoffPolicy::fixed(Duration::from_millis(5)))
        .with_failure_listener(move |ctx: &Context<'_>, allow_retry: bool, backoff: TimeDelta| {
            println!(
                "  {} (retry={}, backoff={}ms), reconnecting",
                ctx,
                allow_retry,
                backoff.num_milliseconds()
            );
            repair.healthy.store(true, Ordering::SeqCst);
        })
        .build();

    let rows = engine.call_named("db.query", || connection.query());
    println!(
        "result: {:?} after {} attempts",
        rows.map_err(|e| e.to_string()),
        connection.attempts.load(Ordering::SeqCst)
    );
}

fn jittered_strategy() {
    println!("\n--- Fixed delay plus random jitter ---");

    let backoff = BackoffPolicy::fixed(Duration::from_millis(20))
        + BackoffPolicy::random_uniform(TimeDelta::milliseconds(-10), TimeDelta::milliseconds(10));
    let engine = RetryEngine::builder()
        .with_retry_condition(Condition::attempt_count_below(3))
        .with_abort_condition(Condition::failure_is::<fmt::Error>())
        .with_backoff(backoff)
        .with_failure_listener(|ctx: &Context<'_>, _: bool, backoff: TimeDelta| {
            println!("  attempt {} waits {}ms", ctx.attempt_count(), backoff.num_milliseconds());
        })
        .build();

    let result: Result<(), _> = engine.call(|| Err(io::Error::other("timeout")));
    println!("final: {:?}", result.map_err(|e| e.to_string()));
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    exhausting_strategy();
    self_healing_strategy();
    jittered_strategy();
}
