//! Exponential backoff used when constructing queue handles.

use std::future::Future;
use std::time::Duration;

use log::warn;

/// Retry policy: a fixed number of attempts with exponentially growing delays between them.
#[derive(Clone, Debug, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub starting_delay: Duration,

    /// Upper bound for any single delay. Unbounded if `None`.
    pub max_delay: Option<Duration>,

    /// Factor each delay is multiplied by for the following retry.
    pub time_multiple: u32,

    /// Total number of attempts, including the first one.
    pub attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            starting_delay: Duration::from_millis(500),
            max_delay: None,
            time_multiple: 2,
            attempts: 10,
        }
    }
}

impl Backoff {
    /// Delay to wait after the given (1-based) failed attempt, before trying again.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.time_multiple.max(1).saturating_pow(attempt.saturating_sub(1));
        let delay = self
            .starting_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max) if delay > max => max,
            _ => delay,
        }
    }

    /// Runs `op` until it succeeds or all attempts are used up, sleeping between attempts.
    ///
    /// `what` is used only for logging. Returns the error from the final attempt on failure.
    pub async fn retry<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= attempts => return Err(err),
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {}: {}",
                        what,
                        attempt,
                        attempts,
                        humantime::format_duration(delay),
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
