//! Delivery executor - bounded retry around outbound platform calls.

mod retry;

pub use retry::RetryPolicy;

use std::future::Future;
use tracing::{error, warn};

use crossrelay_traits::{DeliveryError, Destination};

/// Runs one outbound call under a [`RetryPolicy`].
///
/// Rate-limit cooldowns are counted separately and never grow the transient
/// backoff. Permanent failures return on the first occurrence.
#[derive(Debug, Clone, Default)]
pub struct DeliveryExecutor {
    policy: RetryPolicy,
}

impl DeliveryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Call `call` until it succeeds, fails permanently, or exhausts the policy.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        dest: Destination,
        mut call: F,
    ) -> Result<T, DeliveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DeliveryError>>,
    {
        let mut attempt: u32 = 0;
        let mut rate_limit_waits: u32 = 0;

        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match &err {
                DeliveryError::RateLimited { retry_after_secs } => {
                    rate_limit_waits += 1;
                    if rate_limit_waits > self.policy.max_rate_limit_waits {
                        error!(
                            operation,
                            dest = %dest,
                            waits = rate_limit_waits - 1,
                            "Giving up after repeated rate limiting"
                        );
                        return Err(err);
                    }
                    let wait = self.policy.cooldown(*retry_after_secs);
                    warn!(
                        operation,
                        dest = %dest,
                        wait_secs = wait.as_secs(),
                        "Rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                }
                DeliveryError::Transient(message) => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts {
                        error!(
                            operation,
                            dest = %dest,
                            attempt,
                            error = %message,
                            "Delivery failed after exhausting retries"
                        );
                        return Err(err);
                    }
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        operation,
                        dest = %dest,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Transient delivery failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                DeliveryError::Permanent(_) => return Err(err),
            }
        }
    }
}
