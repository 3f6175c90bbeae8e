//! Retry and idle-timeout policy for LLM calls.
//!
//! Transient failures (connection, timeout, rate limit) are retried
//! with capped exponential backoff. Streams get an idle guard: no
//! delta for the configured window aborts the stream with a timeout,
//! which the caller treats as retryable.

use std::time::Duration;

use al_domain::error::{Error, Result};
use al_domain::stream::{BoxStream, StreamEvent};
use futures_util::StreamExt;

const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_CAP_MS: u64 = 30_000;

/// Delay before retry number `attempt` (0-based): 1s, 2s, 4s, … capped
/// at 30s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(10));
    Duration::from_millis(ms.min(BACKOFF_CAP_MS))
}

/// Run `op` up to `max_retries + 1` times, backing off between
/// retryable failures. Non-retryable errors return immediately; when
/// attempts run out the last error is wrapped as `LlmExhausted`.
pub async fn with_retries<T, F, Fut>(max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retryable LLM failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) if e.is_retryable() => {
                return Err(Error::LlmExhausted(e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Wrap an LLM stream so that a gap longer than `idle_timeout` between
/// events aborts it with a retryable timeout error.
pub fn idle_guard(
    mut stream: BoxStream<'static, Result<StreamEvent>>,
    idle_timeout: Duration,
) -> BoxStream<'static, Result<StreamEvent>> {
    let guarded = async_stream::stream! {
        loop {
            match tokio::time::timeout(idle_timeout, stream.next()).await {
                Ok(Some(event)) => yield event,
                Ok(None) => break,
                Err(_) => {
                    yield Err(Error::Timeout(format!(
                        "no stream event for {}s",
                        idle_timeout.as_secs()
                    )));
                    break;
                }
            }
        }
    };
    Box::pin(guarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(8), Duration::from_secs(30));
        assert_eq!(backoff_delay(30), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_ref = calls.clone();
        let result = with_retries(3, move || {
            let calls = calls_ref.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::RateLimited("busy".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_maps_to_llm_exhausted() {
        let result: Result<()> =
            with_retries(2, || async { Err(Error::Timeout("idle".into())) }).await;
        assert!(matches!(result, Err(Error::LlmExhausted(_))));
    }

    #[tokio::test]
    async fn semantic_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_ref = calls.clone();
        let result: Result<()> = with_retries(5, move || {
            let calls = calls_ref.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::ContextWindow("too long".into()))
            }
        })
        .await;
        assert!(matches!(result, Err(Error::ContextWindow(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_guard_aborts_silent_stream() {
        let silent: BoxStream<'static, Result<StreamEvent>> =
            Box::pin(futures_util::stream::pending());
        let mut guarded = idle_guard(silent, Duration::from_secs(60));
        let item = guarded.next().await.unwrap();
        assert!(matches!(item, Err(Error::Timeout(_))));
        assert!(guarded.next().await.is_none());
    }

    #[tokio::test]
    async fn idle_guard_passes_events_through() {
        let events: BoxStream<'static, Result<StreamEvent>> =
            Box::pin(futures_util::stream::iter(vec![
                Ok(StreamEvent::Token { text: "a".into() }),
                Ok(StreamEvent::Done { usage: None, finish_reason: None }),
            ]));
        let guarded = idle_guard(events, Duration::from_secs(60));
        let collected: Vec<_> = guarded.collect().await;
        assert_eq!(collected.len(), 2);
        assert!(collected.iter().all(|e| e.is_ok()));
    }
}
