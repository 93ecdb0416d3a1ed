// Copyright (c) 2025 - Cowboy AI, Inc.
//! Retry policy for remote collaborator calls
//!
//! Transient failures (network errors, timeouts, 429/5xx) are retried a
//! bounded number of times with exponential backoff; a policy object is
//! injected into each adapter call site so the bound and schedule live in
//! one place.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{ProvisioningError, ProvisioningResult};

/// Bounded retry with exponential backoff over transient errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry; doubles each subsequent retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Policy that never retries, for tests and dry contexts
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff delay before retry attempt `n` (1-based)
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt bound
    /// is exhausted. An exhausted transient error escalates to permanent.
    pub async fn run<T, F, Fut>(&self, description: &str, mut op: F) -> ProvisioningResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProvisioningResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {} - retrying in {:?}",
                        description, attempt, self.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_transient() => {
                    debug!("{} exhausted {} attempts", description, self.max_attempts);
                    return Err(err.into_permanent());
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let policy = RetryPolicy::default();
        let result = policy.run("op", || async { Ok::<_, ProvisioningError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result = policy
            .run("op", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 1 {
                    Err(ProvisioningError::Transient("503".into()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_escalates_to_permanent() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result: ProvisioningResult<()> = policy
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProvisioningError::Transient("timeout".into()))
            })
            .await;
        assert!(matches!(result, Err(ProvisioningError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result: ProvisioningResult<()> = policy
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProvisioningError::Permanent("401".into()))
            })
            .await;
        assert!(matches!(result, Err(ProvisioningError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
