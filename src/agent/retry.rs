//! Bounded retry with capped exponential backoff.
//!
//! Wraps a single-attempt response closure and normalizes every failure
//! mode into one of the fixed user-facing apology strings once attempts
//! are exhausted. Raw error text never crosses this boundary.

use crate::llm::LlmError;
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{info, warn};

/// Default number of retries after the initial attempt.
pub const MAX_RETRIES: usize = 3;

/// Reply after every attempt came back empty or failed.
pub const EXHAUSTED_REPLY: &str =
    "I apologize, but I'm having difficulty generating a response right now. Please try again.";

/// Reply when the orchestrator itself errored on the final attempt.
pub const TECHNICAL_DIFFICULTY_REPLY: &str =
    "I apologize, but I'm experiencing technical difficulties. Please try again later.";

/// Outcome of one orchestrated response attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseAttempt {
    /// Shield-approved, non-empty reply. Final.
    Reply(String),
    /// A shield refused; the refusal is the reply. Final, never retried.
    Refused(String),
    /// Empty or transient failure, worth retrying. Carries an optional
    /// reason remembered for the exhaustion log.
    Transient(Option<String>),
    /// Unexpected permanent-looking failure. Still retried, but remembered;
    /// the reason stays internal.
    Failed(String),
}

/// Drive `attempt_fn` until it produces a final reply or `max_retries`
/// retries are exhausted. Backoff between attempts is exponential with an
/// 8 second ceiling: 1s, 2s, 4s, 8s.
pub(crate) async fn run_with_retry<F, Fut>(mut attempt_fn: F, max_retries: usize) -> String
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ResponseAttempt, LlmError>>,
{
    // from_millis(2) doubles the exponent each step; factor(500) scales the
    // sequence to 1s, 2s, 4s, 8s before the cap holds it at 8s.
    let mut delays = ExponentialBackoff::from_millis(2)
        .factor(500)
        .max_delay(Duration::from_secs(8));
    let mut last_error: Option<String> = None;

    for attempt in 0..=max_retries {
        match attempt_fn().await {
            Ok(ResponseAttempt::Reply(text) | ResponseAttempt::Refused(text)) => return text,
            Ok(ResponseAttempt::Transient(reason)) => {
                if let Some(reason) = reason {
                    last_error = Some(reason);
                }
            }
            Ok(ResponseAttempt::Failed(reason)) => {
                warn!(attempt = attempt + 1, reason = %reason, "Response attempt failed");
                last_error = Some(reason);
            }
            Err(err) => {
                warn!(attempt = attempt + 1, error = %err, "Exception during response attempt");
                last_error = Some(err.to_string());
                if attempt >= max_retries {
                    return TECHNICAL_DIFFICULTY_REPLY.to_string();
                }
                // No backoff on this path; retry immediately.
                continue;
            }
        }

        if attempt < max_retries {
            if let Some(delay) = delays.next() {
                info!(
                    attempt = attempt + 1,
                    total = max_retries + 1,
                    delay_secs = delay.as_secs(),
                    "Empty or failed response, backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
        } else {
            warn!(
                attempts = max_retries + 1,
                last_error = last_error.as_deref().unwrap_or("Empty response"),
                "All response attempts exhausted"
            );
        }
    }

    EXHAUSTED_REPLY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    async fn run_script(
        script: Vec<Result<ResponseAttempt, LlmError>>,
        max_retries: usize,
    ) -> (String, usize) {
        let calls = AtomicUsize::new(0);
        let script = Mutex::new(VecDeque::from(script));
        let result = run_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                let next = script.lock().expect("script lock").pop_front();
                async move { next.unwrap_or(Ok(ResponseAttempt::Transient(None))) }
            },
            max_retries,
        )
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_returns_without_sleeping() {
        let start = Instant::now();
        let (result, calls) =
            run_script(vec![Ok(ResponseAttempt::Reply("answer".to_string()))], MAX_RETRIES).await;
        assert_eq!(result, "answer");
        assert_eq!(calls, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn refusals_are_final() {
        let (result, calls) =
            run_script(vec![Ok(ResponseAttempt::Refused("no can do".to_string()))], MAX_RETRIES)
                .await;
        assert_eq!(result, "no can do");
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_backs_off_one_two_four_eight() {
        let start = Instant::now();
        let (result, calls) = run_script(Vec::new(), MAX_RETRIES).await;
        assert_eq!(result, EXHAUSTED_REPLY);
        assert_eq!(calls, MAX_RETRIES + 1);
        // Three sleeps between four attempts: 1s + 2s + 4s.
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_caps_at_eight_seconds() {
        let start = Instant::now();
        let (result, calls) = run_script(Vec::new(), 5).await;
        assert_eq!(result, EXHAUSTED_REPLY);
        assert_eq!(calls, 6);
        // 1 + 2 + 4 + 8 + 8: the ceiling holds after the fourth delay.
        assert_eq!(start.elapsed(), Duration::from_secs(23));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_then_success_returns_the_success() {
        let (result, calls) = run_script(
            vec![
                Ok(ResponseAttempt::Failed("upstream broke".to_string())),
                Ok(ResponseAttempt::Reply("recovered".to_string())),
            ],
            MAX_RETRIES,
        )
        .await;
        assert_eq!(result, "recovered");
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn error_on_final_attempt_yields_technical_difficulties() {
        let script = vec![
            Ok(ResponseAttempt::Transient(None)),
            Ok(ResponseAttempt::Transient(None)),
            Ok(ResponseAttempt::Transient(None)),
            Err(LlmError::Unknown("boom".to_string())),
        ];
        let (result, calls) = run_script(script, MAX_RETRIES).await;
        assert_eq!(result, TECHNICAL_DIFFICULTY_REPLY);
        assert_eq!(calls, MAX_RETRIES + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn error_before_final_attempt_keeps_retrying() {
        let script = vec![
            Err(LlmError::NetworkError("connection reset".to_string())),
            Ok(ResponseAttempt::Reply("after error".to_string())),
        ];
        let start = Instant::now();
        let (result, calls) = run_script(script, MAX_RETRIES).await;
        assert_eq!(result, "after error");
        assert_eq!(calls, 2);
        // The exception path retries immediately, without backoff.
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
