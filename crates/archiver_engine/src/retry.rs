//! Bounded retry with a pluggable backoff.
//!
//! The policy only computes delays; [`retry_with_policy`] does the sleeping,
//! so tests can hand in [`RetryPolicy::immediate`] and never block.

use std::future::Future;
use std::time::Duration;

use engine_logging::{engine_info, engine_warn};

use crate::{FailureKind, FetchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same pause after every failed attempt.
    Fixed(Duration),
    /// Retry straight away.
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff: Backoff::Fixed(Duration::from_secs(1)),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Immediate,
        }
    }

    /// At least one attempt is always made.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Pause after the given (1-based) failed attempt.
    pub fn delay_after(&self, _attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Immediate => Duration::ZERO,
        }
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the policy runs out.
///
/// The closure receives the 1-based attempt number. Exhaustion is reported as
/// [`FailureKind::RetriesExhausted`] carrying the last error message.
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    url: &str,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    engine_info!("{} succeeded on attempt {}/{}", url, attempt, attempts);
                }
                return Ok(value);
            }
            Err(err) if !err.kind.is_retryable() => return Err(err),
            Err(err) => {
                engine_warn!("Retry {}/{} for {} ({})", attempt, attempts, url, err);
                if attempt >= attempts {
                    return Err(FetchError::new(
                        FailureKind::RetriesExhausted { attempts },
                        err.to_string(),
                    ));
                }
                let delay = policy.delay_after(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
