//! Tests for `RetryPolicy` and the `with_retry` helpers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use enclave_bridge::retry::{with_retry, with_retry_observed};
use enclave_bridge::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
struct Flaky(u32);

impl std::fmt::Display for Flaky {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "attempt {} failed", self.0)
    }
}

fn policy(max_attempts: u32, initial_ms: u64, multiplier: f64) -> RetryPolicy {
    RetryPolicy::exponential(max_attempts, Duration::from_millis(initial_ms), multiplier)
}

// ---------------------------------------------------------------------------
// RetryPolicy unit tests
// ---------------------------------------------------------------------------

#[test]
fn retry_policy_default_values() {
    let p = RetryPolicy::default();
    assert_eq!(p.max_attempts, 3);
    assert_eq!(p.initial_delay, Duration::from_secs(1));
    assert_eq!(p.max_delay, Duration::from_secs(30));
    assert!((p.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    assert!(!p.jitter);
}

#[test]
fn retry_policy_none_is_single_attempt() {
    let p = RetryPolicy::none();
    assert_eq!(p.max_attempts, 1);
    assert!(p.validate().is_ok());
}

#[test]
fn delay_for_attempt_is_exponential() {
    let p = policy(5, 100, 2.0);
    assert_eq!(p.delay_for_attempt(0), Duration::from_millis(100));
    assert_eq!(p.delay_for_attempt(1), Duration::from_millis(200));
    assert_eq!(p.delay_for_attempt(2), Duration::from_millis(400));
}

#[test]
fn delay_capped_at_max() {
    let p = RetryPolicy {
        max_attempts: 10,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_millis(500),
        backoff_multiplier: 10.0,
        jitter: false,
    };
    assert_eq!(p.delay_for_attempt(5), Duration::from_millis(500));
    assert_eq!(p.delay_for_attempt(u32::MAX), Duration::from_millis(500));
}

#[test]
fn default_cap_is_thirty_seconds() {
    let p = policy(10, 1000, 2.0);
    // 1s * 2^5 = 32s, held at the default cap.
    assert_eq!(p.delay_for_attempt(4), Duration::from_secs(16));
    assert_eq!(p.delay_for_attempt(5), Duration::from_secs(30));
}

#[test]
fn lifting_cap_restores_plain_exponential() {
    let p = RetryPolicy {
        max_delay: Duration::MAX,
        ..policy(10, 1000, 2.0)
    };
    assert_eq!(p.delay_for_attempt(5), Duration::from_secs(32));
    assert_eq!(p.delay_for_attempt(8), Duration::from_secs(256));
}

#[test]
fn jittered_delay_stays_in_range() {
    let p = RetryPolicy {
        jitter: true,
        ..policy(5, 100, 2.0)
    };
    for _ in 0..32 {
        // attempt 2 base = 400ms, jittered into [200ms, 400ms].
        let d = p.delay_for_attempt(2);
        assert!(d >= Duration::from_millis(200), "{d:?}");
        assert!(d <= Duration::from_millis(400), "{d:?}");
    }
}

#[test]
fn validate_rejects_bad_parameters() {
    assert!(policy(0, 10, 2.0).validate().is_err());
    assert!(policy(3, 10, 0.5).validate().is_err());
    assert!(policy(3, 10, f64::NAN).validate().is_err());
    assert!(policy(3, 0, 1.0).validate().is_ok());
}

// ---------------------------------------------------------------------------
// with_retry tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn retry_succeeds_after_failures() {
    let counter = Arc::new(AtomicU32::new(0));

    let counter_clone = Arc::clone(&counter);
    let result = with_retry(&policy(3, 1, 1.0), || {
        let c = Arc::clone(&counter_clone);
        async move {
            let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt < 3 {
                Err(Flaky(attempt))
            } else {
                Ok("success")
            }
        }
    })
    .await;

    assert_eq!(result, Ok("success"));
    assert_eq!(counter.load(Ordering::SeqCst), 3); // 2 failures + 1 success
}

#[tokio::test(start_paused = true)]
async fn retry_exhausted_returns_last_error_unchanged() {
    let counter = Arc::new(AtomicU32::new(0));

    let counter_clone = Arc::clone(&counter);
    let result: Result<(), Flaky> = with_retry(&policy(3, 100, 2.0), || {
        let c = Arc::clone(&counter_clone);
        async move { Err(Flaky(c.fetch_add(1, Ordering::SeqCst) + 1)) }
    })
    .await;

    assert_eq!(result, Err(Flaky(3)));
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn backoff_waits_between_attempts_only() {
    let times = Arc::new(Mutex::new(Vec::new()));
    let started = Instant::now();

    let times_clone = Arc::clone(&times);
    let result: Result<(), Flaky> = with_retry(&policy(3, 100, 2.0), || {
        let t = Arc::clone(&times_clone);
        async move {
            let mut t = t.lock().unwrap();
            t.push(Instant::now());
            Err(Flaky(t.len() as u32))
        }
    })
    .await;
    let total = started.elapsed();

    assert!(result.is_err());
    let times = times.lock().unwrap();
    assert_eq!(times.len(), 3);
    // No delay before the first attempt.
    assert!(times[0] - started < Duration::from_millis(1));
    let gap1 = times[1] - times[0];
    let gap2 = times[2] - times[1];
    assert!(gap1 >= Duration::from_millis(100) && gap1 < Duration::from_millis(105), "{gap1:?}");
    assert!(gap2 >= Duration::from_millis(200) && gap2 < Duration::from_millis(205), "{gap2:?}");
    // No delay after the final failure.
    assert!(total < Duration::from_millis(310), "{total:?}");
}

#[tokio::test(start_paused = true)]
async fn single_attempt_incurs_no_delay() {
    let counter = Arc::new(AtomicU32::new(0));
    let started = Instant::now();

    let counter_clone = Arc::clone(&counter);
    let result: Result<(), Flaky> = with_retry(&policy(1, 100, 2.0), || {
        let c = Arc::clone(&counter_clone);
        async move { Err(Flaky(c.fetch_add(1, Ordering::SeqCst) + 1)) }
    })
    .await;

    assert_eq!(result, Err(Flaky(1)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn observer_sees_only_non_final_failures() {
    let counter = Arc::new(AtomicU32::new(0));
    let mut seen = Vec::new();

    let counter_clone = Arc::clone(&counter);
    let result: Result<(), Flaky> = with_retry_observed(
        &policy(3, 10, 2.0),
        || {
            let c = Arc::clone(&counter_clone);
            async move { Err(Flaky(c.fetch_add(1, Ordering::SeqCst) + 1)) }
        },
        |attempt, err: &Flaky| seen.push((attempt, err.clone())),
    )
    .await;

    assert_eq!(result, Err(Flaky(3)));
    assert_eq!(seen, vec![(1, Flaky(1)), (2, Flaky(2))]);
}
