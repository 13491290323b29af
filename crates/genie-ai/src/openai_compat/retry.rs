use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::AiError;

/// Run `op` and retry up to `max_retries` more times while `should_retry`
/// accepts the error. Attempt `n` (from 1) waits `n * backoff` first.
pub(crate) async fn with_retries<T, F, Fut>(
    max_retries: u32,
    backoff: Duration,
    should_retry: impl Fn(&AiError) -> bool,
    mut op: F,
) -> Result<T, AiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && should_retry(&e) => {
                attempt += 1;
                warn!(attempt, max_retries, "transient backend error, retrying: {e}");
                tokio::time::sleep(backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries(2, Duration::from_millis(1), AiError::is_transient, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AiError::RateLimited)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            with_retries(1, Duration::from_millis(1), AiError::is_transient, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AiError::NetworkError("reset".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            with_retries(5, Duration::from_millis(1), AiError::is_transient, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AiError::ApiError("HTTP 401".into())) }
            })
            .await;
        assert_eq!(result, Err(AiError::ApiError("HTTP 401".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
