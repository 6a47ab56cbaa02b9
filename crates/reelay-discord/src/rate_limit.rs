//! Rate-limit aware retry for destination API calls.
//!
//! Only failures where the request provably was not applied are retried: a 429
//! (the API rejected it) or a connection that was never established. A timeout
//! after the body was sent may already have produced a message, so it is not
//! retried.

use std::future::Future;
use std::time::Duration;

use crate::error::DestinationError;

fn is_retriable(err: &DestinationError) -> bool {
    match err {
        DestinationError::RateLimited { .. } => true,
        DestinationError::Http(e) => e.is_connect(),
        DestinationError::Api { .. }
        | DestinationError::Deserialize { .. }
        | DestinationError::InvalidBaseUrl { .. } => false,
    }
}

/// Executes `operation`, retrying up to `max_retries` more times on retriable errors.
///
/// The wait before retry `n` is the larger of the server-supplied
/// `retry_after` and `backoff_base_ms * 2^(n-1)`.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, DestinationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DestinationError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let backoff_ms = backoff_base_ms.saturating_mul(1u64 << attempt.min(20));
        let delay_ms = match &err {
            DestinationError::RateLimited { retry_after_ms, .. } => backoff_ms.max(*retry_after_ms),
            _ => backoff_ms,
        };
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms,
            error = %err,
            "destination: retrying after backoff"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;
    }
}
