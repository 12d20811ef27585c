//! # Fixed-interval retry
//!
//! The VPC API answers "resource busy" whenever an interface is touched by
//! overlapping requests, so every remote action is wrapped in a bounded
//! number of attempts with a fixed sleep between them. Budgets are expressed
//! as attempts × interval, never as a wall-clock deadline.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Attempts and sleep interval for one kind of remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// Create a policy. An attempt count of zero is treated as one.
    #[must_use]
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Number of attempts, at least one
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Sleep between two consecutive attempts
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Total time spent sleeping when every attempt fails
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval * (self.attempts() - 1)
    }

    /// Run `op` until it succeeds or the attempts are used up
    ///
    /// `op` receives the zero-based attempt index. The error of the last
    /// attempt is returned on exhaustion.
    pub async fn retry<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(e);
                    }
                    warn!("{} attempt {}/{} failed: {}", operation, attempt, attempts, e);
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

/// Policy for discovering the address bound by an assign
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectPolicy {
    /// Wait before the first poll
    pub delay: Duration,
    /// Polls and the sleep between them
    pub poll: RetryPolicy,
}

/// Retry policies, one per operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationPolicies {
    /// Assign calls
    pub assign: RetryPolicy,
    /// Release calls
    pub release: RetryPolicy,
    /// Outer migrate attempts, each with a pre-check after the first
    pub migrate: RetryPolicy,
    /// Polls of the new interface after a migrate call succeeds
    pub migrate_post_check: RetryPolicy,
    /// Discovery of the address bound by an assign
    pub detect: DetectPolicy,
}
