//! Bounded retry with exponential backoff for collaborator calls.
//!
//! Only [`GateError::Transient`] faults are retried. When the budget runs
//! out the last fault is surfaced as [`GateError::TransientInfra`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{GateError, GateResult};

/// Retry budget and backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// No retries; every transient fault surfaces immediately.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry `n` (1-based): `min(base * 2^(n-1), cap)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(32);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// The whole backoff schedule, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_retries).map(|n| self.delay_for(n)).collect()
    }
}

/// Run `op` until it succeeds, fails non-transiently, or the budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> GateResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GateResult<T>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                if retry >= policy.max_retries {
                    return Err(GateError::TransientInfra {
                        operation: operation.to_string(),
                        attempts: retry + 1,
                        detail: err.to_string(),
                    });
                }
                retry += 1;
                let delay = policy.delay_for(retry);
                warn!(
                    event = "retry.scheduled",
                    operation = %operation,
                    retry = retry,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
