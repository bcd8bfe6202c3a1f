//! Retry with exponential backoff for content API reads.
//!
//! Only transport errors (connection failures, timeouts) are retried; the
//! caller inspects status codes. Writes are never routed through here: a
//! resent PUT whose first attempt landed would come back as a conflict.

use std::time::Duration;

/// How many times, and how patiently, a read is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// 3 retries: 200ms → 400ms → 800ms.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Send once and give up on failure.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Send an HTTP request, retrying transport failures under `policy`.
///
/// The closure `f` is called up to `policy.max_retries + 1` times.
pub(crate) async fn retry_send<F, Fut>(
    policy: RetryPolicy,
    endpoint: &str,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..policy.max_retries {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    "content API request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    f().await
}
