//! Scheduled Retry Example
//!
//! Demonstrates non-blocking retries on a tokio runtime: several calls share
//! one engine, none of them holds a thread while waiting out its backoff, and
//! one is cancelled mid-flight.
//!
//! Run with: cargo run --example scheduled_demo --features async

use rebound::{BackoffPolicy, Condition, LoggingFailureListener, RetryEngine, TokioScheduler};
use std::io;
use std::time::Duration;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let engine = RetryEngine::builder()
        .with_retry_condition(Condition::attempt_count_below(5))
        .with_backoff(BackoffPolicy::fixed_interval(Duration::from_millis(100)))
        .with_failure_listener(LoggingFailureListener::first_only())
        .build();

    tracing::info!("submitting three jobs");

    let jobs: Vec<_> = ["alpha", "beta", "gamma"]
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let mut attempts = 0;
            engine.submit_named(TokioScheduler::current(), name, move || {
                attempts += 1;
                if attempts <= i {
                    Err(io::Error::other(format!("{} not ready", name)))
                } else {
                    Ok(format!("{} done after {} attempts", name, attempts))
                }
            })
        })
        .collect();

    for result in futures::future::join_all(jobs).await {
        match result {
            Ok(message) => tracing::info!("{}", message),
            Err(e) => tracing::error!("job failed: {}", e),
        }
    }

    let stuck = engine.submit_named(TokioScheduler::current(), "stuck", || -> Result<(), _> {
        Err(io::Error::other("never recovers"))
    });
    tokio::time::sleep(Duration::from_millis(150)).await;
    stuck.cancel();

    match stuck.await {
        Err(e) if e.is_cancelled() => tracing::info!("stuck job cancelled"),
        other => tracing::warn!("unexpected outcome: {:?}", other),
    }
}
