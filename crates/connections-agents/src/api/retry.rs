//! Retry for transient endpoint failures.
//!
//! Which failures are transient is decided by
//! [`EndpointError::is_retryable`]. A retried request is invisible to the
//! solver and does not consume a negotiation attempt.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::EndpointError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra tries after the first failure. `0` disables retrying.
    pub max_retries: u32,
    /// Backoff ceiling before the first retry; doubles for each later one.
    pub base_delay: Duration,
    /// Cap on the backoff ceiling.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Longest wait before retry number `retry` (0-indexed).
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay)
    }

    /// Wait before retry number `retry`: half the ceiling plus a random
    /// share of the other half, so parallel games do not retry in lockstep.
    pub fn backoff(&self, retry: u32) -> Duration {
        let half = self.backoff_ceiling(retry) / 2;
        half + half.mul_f64(rand::random::<f64>())
    }
}

/// Run `call`, retrying retryable failures up to `config.max_retries` times.
pub async fn retry_api_call<T, F, Fut>(
    config: &RetryConfig,
    mut call: F,
) -> Result<T, EndpointError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EndpointError>>,
{
    let mut retry = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if retry < config.max_retries && e.is_retryable() => {
                let delay = config.backoff(retry);
                warn!(
                    "{e}; retry {}/{} in {delay:?}",
                    retry + 1,
                    config.max_retries
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
