//! Bounded retry with exponential backoff for transient remote-store failures.

use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Describes how many times, and how patiently, an operation is retried when it fails with a
/// transient error (see `LedgerError::is_transient`). Any other error is returned immediately.
///
/// The delay before attempt `n + 1` is `min(max_delay, base_delay * multiplier^(n - 1))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryPolicy {
    max_attempts: u32,
    #[serde(with = "millis")]
    base_delay: Duration,
    multiplier: f64,
    #[serde(with = "millis")]
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one attempt.
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier,
            max_delay,
        }
    }

    /// Policy used when establishing a session: 5 attempts, 2s doubling up to 60s.
    pub fn connect_default() -> Self {
        Self::new(5, Duration::from_secs(2), 2.0, Duration::from_secs(60))
    }

    /// Policy used for reads and appends: 3 attempts, 1s doubling up to 10s.
    pub fn operation_default() -> Self {
        Self::new(3, Duration::from_secs(1), 2.0, Duration::from_secs(10))
    }

    /// A policy that never waits between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, 1.0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The backoff delay that follows failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(0.0).powi(exponent);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Runs `operation` until it succeeds, fails with a non-transient error, or the attempts run
    /// out. In the last case the result is `LedgerError::RetryExhausted` wrapping the final error.
    pub async fn execute<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };
            if attempt >= self.max_attempts {
                debug!("'{name}' giving up after {attempt} attempts");
                return Err(LedgerError::RetryExhausted {
                    operation: name.to_string(),
                    attempts: attempt,
                    last: Box::new(error),
                });
            }
            let delay = self.delay(attempt);
            warn!(
                "'{name}' attempt {attempt}/{} failed: {error}. Retrying in {:.1}s",
                self.max_attempts,
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::operation_default()
    }
}

/// Durations are stored in config.json as whole milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(d.as_millis().min(u64::MAX as u128) as u64)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_is_exponential_and_capped() {
        let policy = RetryPolicy::new(5, Duration::from_secs(2), 2.0, Duration::from_secs(10));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(4), Duration::from_secs(10));
        assert_eq!(policy.delay(40), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_always_transient_exhausts_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::immediate(4);
        let result: Result<()> = policy
            .execute("append", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::RateLimited("quota".into()))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(LedgerError::RetryExhausted {
                operation,
                attempts,
                last,
            }) => {
                assert_eq!(operation, "append");
                assert_eq!(attempts, 4);
                assert!(matches!(*last, LedgerError::RateLimited(_)));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_transient_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::immediate(5)
            .execute("connect", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::Authentication("bad key".into()))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(LedgerError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .execute("read", move || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(LedgerError::Unavailable("reset".into())),
                    _ => Ok(7),
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts(), 1);
    }

    #[test]
    fn test_serde_millis() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1500), 2.0, Duration::from_secs(9));
        let json = serde_json::to_value(policy).unwrap();
        assert_eq!(json["base_delay"], 1500);
        let back: RetryPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, policy);
    }
}
