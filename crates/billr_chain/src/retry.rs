//! Retry with exponential backoff for one async operation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use billr_core::BillrConfig;
use tracing::{debug, warn};

/// How many times to retry and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    /// 3 retries at 1s, 2s, 4s.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &BillrConfig) -> Self {
        Self {
            max_retries: config.submit_max_retries,
            base_delay: Duration::from_millis(config.submit_base_delay_ms),
            ..Self::default()
        }
    }

    /// Delay before retry number `retry_index` (0-based).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry_index);
        self.base_delay.saturating_mul(factor)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy's attempts are used up.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, Exhausted<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(label, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(label, attempts = attempt, error = %e, "All attempts failed");
                return Err(Exhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[test]
    fn default_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn huge_indices_saturate() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(200), Duration::from_secs(1).saturating_mul(u32::MAX));
    }

    #[test]
    fn policy_from_config() {
        let config = BillrConfig {
            submit_max_retries: 5,
            submit_base_delay_ms: 250,
            ..BillrConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.multiplier, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_op_retries_three_times_with_backoff() {
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::default();
        let start = Instant::now();

        let recorded = calls.clone();
        let result: Result<(), _> = retry(&RetryPolicy::default(), "test", || {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(Instant::now());
                Err::<(), _>("node unavailable")
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 4);
        assert_eq!(err.last_error, "node unavailable");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        let gaps: Vec<u64> = calls.windows(2).map(|w| (w[1] - w[0]).as_secs()).collect();
        assert_eq!(gaps, vec![1, 2, 4]);
        assert_eq!((calls[3] - start).as_secs(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let mut remaining_failures = 2;
        let result = retry(&RetryPolicy::default(), "test", || {
            let outcome = if remaining_failures > 0 {
                remaining_failures -= 1;
                Err("transient")
            } else {
                Ok(42)
            };
            async move { outcome }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(remaining_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_one_attempt() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let start = Instant::now();
        let err = retry(&policy, "test", || async { Err::<(), _>("boom") })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
