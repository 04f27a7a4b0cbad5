//! # Retry Mechanism
//!
//! Bounded retries with linear backoff and jitter. Only transient errors are
//! retried; everything else fails on the first attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::trace;

use crate::types::Error;

/// A trait for errors that can be retried
pub trait RetryableError {
    /// Returns true if the error is transient and the operation might succeed on retry
    fn is_transient(&self) -> bool;
}

impl RetryableError for Error {
    fn is_transient(&self) -> bool {
        self.transient
    }
}

/// How many times an operation is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than one.
    pub max_attempts: u32,
    /// Base delay, multiplied by the attempt number
    pub backoff: Duration,
    /// Jitter factor (0.0 - 1.0) applied to each delay
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_attempt()
    }
}

impl RetryPolicy {
    /// One best-effort attempt, no retries
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(100),
            jitter_factor: 0.0,
        }
    }

    /// A policy with a fixed number of attempts
    pub fn attempts(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            jitter_factor: 0.1,
        }
    }

    /// Delay before the given retry (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff.as_millis() as f64 * attempt as f64;
        let jitter_range = base * self.jitter_factor.clamp(0.0, 1.0);
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };
        Duration::from_millis((base + jitter).max(0.0) as u64)
    }

    /// Runs `op` until it succeeds, fails permanently or attempts run out
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: RetryableError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    trace!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after transient failure");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
