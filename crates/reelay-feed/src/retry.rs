//! Retry with exponential back-off and jitter for feed requests and asset
//! downloads.
//!
//! Transient failures (network errors, 429, 5xx) are retried. Anything else is
//! returned on the first occurrence: a 404 or a malformed body will not change
//! on the next attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::FeedError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
pub(crate) fn is_retriable(err: &FeedError) -> bool {
    match err {
        FeedError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_body()
                || e.status().is_some_and(|s| s.is_server_error())
        }
        FeedError::RateLimited { .. } => true,
        FeedError::UnexpectedStatus { status, .. } => *status >= 500,
        FeedError::NotFound { .. }
        | FeedError::Deserialize { .. }
        | FeedError::Io { .. }
        | FeedError::NoAssets { .. }
        | FeedError::PaginationLimit { .. }
        | FeedError::InvalidBaseUrl { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// The delay before retry `n` is `backoff_base_ms × 2^(n-1)` ± 25 % jitter,
/// capped at 60 s.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FeedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "feed: transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
