//! Exponential backoff for completion requests.

use crate::error::{CoachError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_DELAY: Duration = Duration::from_secs(30);

const PERMANENT_MARKERS: &[&str] = &["400", "401", "403", "404", "invalid", "unauthorized"];

const TRANSIENT_MARKERS: &[&str] = &[
    "429",
    "500",
    "502",
    "503",
    "504",
    "timeout",
    "connection refused",
    "connection reset",
];

/// Rate limits, server errors, timeouts and dropped connections are transient.
/// Anything unrecognised is not retried.
pub fn is_transient(err: &CoachError) -> bool {
    match err {
        CoachError::Authentication(_) | CoachError::Configuration(_) => false,
        CoachError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status()
                    .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
        }
        CoachError::ApiRequest(msg) => {
            let msg = msg.to_lowercase();
            !PERMANENT_MARKERS.iter().any(|m| msg.contains(m))
                && TRANSIENT_MARKERS.iter().any(|m| msg.contains(m))
        }
        _ => false,
    }
}

/// Run `f` up to `max_retries + 1` times, doubling the delay between
/// attempts up to 30 seconds. Permanent errors return immediately.
pub async fn retry_with_backoff<F, Fut, T>(max_retries: u32, initial_delay: Duration, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = initial_delay;
    let mut attempt = 0;
    loop {
        let err = match f().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= max_retries || !is_transient(&err) {
            return Err(err);
        }
        attempt += 1;
        warn!(
            attempt,
            max_retries,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            "Completion request failed, retrying"
        );
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_recovers_after_transient_errors() {
        let counter = AtomicU32::new(0);

        let result = retry_with_backoff(3, Duration::from_millis(1), || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(CoachError::ApiRequest("OpenRouter API error 503: overloaded".into()))
                } else {
                    Ok("reply")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "reply");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_authentication_is_not_retried() {
        let counter = AtomicU32::new(0);

        let result = retry_with_backoff(3, Duration::from_millis(1), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(CoachError::Authentication("no key".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);

        let result = retry_with_backoff(2, Duration::from_millis(1), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(CoachError::ApiRequest("timeout: deadline elapsed".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_classification() {
        assert!(is_transient(&CoachError::ApiRequest("OpenRouter API error 429: slow down".into())));
        assert!(is_transient(&CoachError::ApiRequest("connection reset by peer".into())));
        assert!(!is_transient(&CoachError::ApiRequest("OpenRouter API error 401: bad key".into())));
        assert!(!is_transient(&CoachError::ApiRequest("invalid model".into())));
        assert!(!is_transient(&CoachError::ApiRequest("something odd".into())));
        assert!(!is_transient(&CoachError::FoodNotFound("x".into())));
    }
}
