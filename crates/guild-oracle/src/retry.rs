//! Deadline-bounded retry for scoring calls.
//!
//! A failed call is retried only when [`OracleError::is_transient`] holds,
//! and a backoff that would end past the deadline is not taken: the last
//! error is returned instead, so [`crate::ResilientOracle`] falls back to the
//! heuristic within its own timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::OracleError;

/// Backoff schedule: `base_delay`, doubled after each retry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Backoff {
    /// Schedule for LLM calls: two retries, 250ms then 500ms.
    pub(crate) const LLM: Backoff = Backoff {
        max_retries: 2,
        base_delay: Duration::from_millis(250),
    };

    fn delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Run `call` until it succeeds, fails permanently, runs out of retries, or
/// the `budget` is spent.
///
/// `call` receives the time left before the deadline, to use as its own
/// request timeout.
pub(crate) async fn retry_within<T, F, Fut>(
    budget: Duration,
    backoff: Backoff,
    mut call: F,
) -> Result<T, OracleError>
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let deadline = Instant::now() + budget;
    let mut retry = 0;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(OracleError::Timeout(budget));
        }

        let err = match call(remaining).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !err.is_transient() || retry >= backoff.max_retries {
            return Err(err);
        }

        let delay = backoff.delay(retry);
        if Instant::now() + delay >= deadline {
            tracing::debug!(error = %err, "no budget left to retry oracle call");
            return Err(err);
        }
        tracing::warn!(
            retry = retry + 1,
            max_retries = backoff.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient oracle failure, retrying"
        );
        tokio::time::sleep(delay).await;
        retry += 1;
    }
}
