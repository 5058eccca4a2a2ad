//! Bounded retry with exponential backoff.
//!
//! One policy object is shared by all three external call sites (PMC fetch,
//! model call, embedding call) instead of per-site ad-hoc loops.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub floor: Duration,
    /// Upper bound on any single delay.
    pub ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // 3 attempts, 4s..10s backoff: NCBI and Groq both tolerate this.
        Self {
            max_attempts: 3,
            floor: Duration::from_secs(4),
            ceiling: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after the given 1-based failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.floor.saturating_mul(2u32.saturating_pow(exp));
        delay.min(self.ceiling)
    }

    /// Run `op` until it succeeds or `max_attempts` is exhausted.
    /// The final error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
