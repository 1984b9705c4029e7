// src/fetch/retry.rs

use anyhow::Result;
use std::{fmt, future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{error, warn};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
}

/// The last error seen once every attempt has failed.
#[derive(Debug)]
pub struct RetryError {
    pub attempts: u32,
    pub last: anyhow::Error,
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gave up after {} attempt(s): {:#}", self.attempts, self.last)
    }
}

impl std::error::Error for RetryError {}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempts run out. `op` gets the
    /// 1-based attempt number. On success returns the value and the number of
    /// attempts it took.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<(T, u32), RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(e) if attempt < max => {
                    warn!(
                        %label,
                        attempt,
                        max_attempts = max,
                        delay = ?self.delay,
                        error = %format!("{:#}", e),
                        "Retrying"
                    );
                    sleep(self.delay).await;
                }
                Err(e) => {
                    error!(%label, attempts = attempt, error = %format!("{:#}", e), "Exhausted retries");
                    return Err(RetryError {
                        attempts: attempt,
                        last: e,
                    });
                }
            }
        }
    }
}
