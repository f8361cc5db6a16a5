use std::future::Future;
use std::time::Duration;

/// Bounded retry with exponential backoff.
///
/// One policy value covers every retried operation in the crate (chain
/// reads before signing, relay submission from the client) instead of each
/// call site growing its own loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// A policy making at most `max_attempts` attempts, sleeping
    /// `base_delay` after the first failure and doubling after each
    /// subsequent one.
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            base_delay,
        }
    }

    /// The sleep inserted after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 1).min(31))
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted,
    /// returning the last error in that case.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(op, |_| true).await
    }

    /// Like [`run`](Self::run), but gives up immediately on errors the
    /// predicate declines to retry. A structurally rejected request fails
    /// identically on resubmission; sleeping on it only burns time.
    pub async fn run_if<T, E, F, Fut, P>(&self, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(val) => return Ok(val),
                Err(err) if attempt < self.max_attempts && retryable(&err) => {
                    let delay = self.delay_after(attempt);
                    tracing::debug!(attempt, ?delay, "attempt failed, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
