use std::future::Future;
use std::time::Duration;

use log::warn;
use rand::Rng;
use tokio::time::{sleep_until, timeout_at, Instant};

use crate::config::AggregatorConfig;
use crate::error::{AppError, Result};

/// Exponential backoff with uniform jitter: `base * 2^attempt + U[0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AggregatorConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            base: config.backoff_base,
            jitter: config.backoff_jitter,
        }
    }

    /// Deterministic part of the wait after the failure of attempt `attempt_index` (zero-based).
    pub fn backoff(&self, attempt_index: u32) -> Duration {
        self.base.saturating_mul(1u32.checked_shl(attempt_index).unwrap_or(u32::MAX))
    }

    fn backoff_with_jitter(&self, attempt_index: u32) -> Duration {
        self.backoff(attempt_index) + random_jitter(self.jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AggregatorConfig::default())
    }
}

fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

/// Run `operation` up to `policy.attempts` times, sleeping between failures.
///
/// Every suspension point (the call itself and each backoff sleep) races against
/// `deadline`; once it passes the unit gives up with [`AppError::Cancelled`] without
/// finishing the sleep or starting another attempt. After the final failed attempt
/// the last error is returned as-is.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    deadline: Instant,
    label: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        if Instant::now() >= deadline {
            return Err(AppError::Cancelled);
        }

        let error = match timeout_at(deadline, operation()).await {
            Err(_elapsed) => return Err(AppError::Cancelled),
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) => error,
        };

        attempt += 1;
        if attempt >= attempts {
            warn!("{label}: giving up after {attempts} attempts: {error}");
            return Err(error);
        }

        let wait = policy.backoff_with_jitter(attempt - 1);
        warn!("{label}: attempt {attempt}/{attempts} failed ({error}), retrying in {wait:?}");

        let wake = Instant::now() + wait;
        if wake >= deadline {
            sleep_until(deadline).await;
            return Err(AppError::Cancelled);
        }
        sleep_until(wake).await;
    }
}
