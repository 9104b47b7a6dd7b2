use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Policy for retrying a failing operation with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Must be at least 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay (default: 30s).
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt. Must be >= 1.
    pub backoff_multiplier: f64,
    /// Scale each delay by a random factor in [0.5, 1.0].
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that performs a single attempt with no delay.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Bounded attempts with exponential backoff and no jitter.
    ///
    /// The wait after failed attempt `k` (1-based) is
    /// `initial_delay * backoff_multiplier^(k-1)`, capped at `max_delay`
    /// (30s unless overridden). Set `max_delay` to `Duration::MAX` to lift
    /// the cap.
    pub fn exponential(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_multiplier,
            ..Default::default()
        }
    }

    /// Check the policy's parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be >= 1".into());
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(format!(
                "backoff_multiplier must be a finite value >= 1, got {}",
                self.backoff_multiplier
            ));
        }
        Ok(())
    }

    /// Compute the delay after the given failed attempt (0-indexed).
    ///
    /// `initial_delay * backoff_multiplier^attempt`, capped at `max_delay`,
    /// then jittered into [0.5x, 1.0x] when `jitter` is set.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());
        let scaled = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            capped
        };
        Duration::try_from_secs_f64(scaled).unwrap_or(self.max_delay)
    }
}

/// Execute a closure with retry logic according to the given policy.
///
/// Calls `f` up to `policy.max_attempts` times. On failure, sleeps with
/// exponential backoff before the next attempt. Returns the first success or
/// the last error, unchanged.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_observed(policy, f, |_, _| {}).await
}

/// Like [`with_retry`], additionally handing each non-final failure to
/// `observer` along with its 1-based attempt number.
///
/// The observer sees the error before the backoff sleep and cannot influence
/// whether another attempt is made.
pub async fn with_retry_observed<F, Fut, T, E, O>(
    policy: &RetryPolicy,
    mut f: F,
    mut observer: O,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    O: FnMut(u32, &E),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    attempt,
                    max = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, retrying"
                );
                observer(attempt, &e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if max_attempts > 1 {
                    tracing::warn!(attempt, error = %e, "final attempt failed");
                }
                return Err(e);
            }
        }
    }
}
