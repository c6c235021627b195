//! Retry policy shared by the stage actors.

use derive_getters::Getters;
use dramaturg_error::{AttemptError, RetryableError, StageError, StageErrorKind};
use std::future::Future;
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Context handed to each attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number
    pub number: usize,
    /// Why the previous attempt was rejected, if any
    pub previous_error: Option<String>,
}

/// A successful result and the attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    /// Value from the successful attempt
    pub value: T,
    /// Attempts made, including the successful one
    pub attempts: usize,
}

/// How many times to attempt a stage and how long to wait in between.
///
/// # Examples
///
/// ```
/// use dramaturg_pipeline::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::with_schedule(3, vec![Duration::from_secs(2), Duration::from_secs(4)]);
/// assert_eq!(*policy.max_attempts(), 3);
/// assert_eq!(policy.delay_before(2), Duration::from_secs(2));
/// assert_eq!(policy.delay_before(3), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, 2000, 8000, false)
    }
}

impl RetryPolicy {
    /// Doubling backoff starting at `initial_backoff_ms`, capped at `max_backoff_ms`.
    pub fn exponential(
        max_attempts: usize,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
        use_jitter: bool,
    ) -> Self {
        let max_attempts = max_attempts.max(1);
        // Yields base^n * factor, so base 2 with factor initial/2 doubles from initial.
        let strategy = ExponentialBackoff::from_millis(2)
            .factor((initial_backoff_ms / 2).max(1))
            .max_delay(Duration::from_millis(max_backoff_ms))
            .take(max_attempts - 1);
        let backoff = if use_jitter {
            strategy.map(jitter).collect()
        } else {
            strategy.collect()
        };
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Explicit delays; the last one repeats if the schedule is short.
    pub fn with_schedule(max_attempts: usize, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: usize) -> Self {
        Self::with_schedule(max_attempts, Vec::new())
    }

    /// Wait before the given attempt (attempt 1 never waits).
    pub fn delay_before(&self, attempt: usize) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        self.backoff
            .get(attempt - 2)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails permanently or the budget runs out.
    ///
    /// Attempts are strictly sequential. Each attempt after the first sees
    /// why the previous one was rejected. Cancellation interrupts both the
    /// in-flight attempt and the backoff sleep.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] labelled with `stage` carrying the attempt
    /// count and either the last error, the permanent error, or cancellation.
    pub async fn run<T, F, Fut>(
        &self,
        stage: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<RetryOutcome<T>, StageError>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut previous_error: Option<String> = None;
        let mut made = 0;

        for number in 1..=self.max_attempts {
            let delay = self.delay_before(number);
            if !delay.is_zero() {
                debug!(stage, attempt = number, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(StageError::new(stage, made, StageErrorKind::Cancelled));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return Err(StageError::new(stage, made, StageErrorKind::Cancelled));
            }

            made = number;
            let attempt = Attempt {
                number,
                previous_error: previous_error.take(),
            };
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(StageError::new(stage, made, StageErrorKind::Cancelled));
                }
                result = op(attempt) => result,
            };

            match result {
                Ok(value) => {
                    return Ok(RetryOutcome {
                        value,
                        attempts: number,
                    });
                }
                Err(e) if !e.is_retryable() => {
                    return Err(StageError::new(
                        stage,
                        number,
                        StageErrorKind::Permanent(e.kind),
                    ));
                }
                Err(e) if number == self.max_attempts => {
                    return Err(StageError::new(
                        stage,
                        number,
                        StageErrorKind::Exhausted(e.kind),
                    ));
                }
                Err(e) => {
                    warn!(
                        stage,
                        attempt = number,
                        max_attempts = self.max_attempts,
                        delay_ms = self.delay_before(number + 1).as_millis() as u64,
                        error = %e.kind,
                        "Attempt failed, retrying"
                    );
                    previous_error = Some(e.kind.to_string());
                }
            }
        }

        // max_attempts is at least 1, so the loop always returns.
        Err(StageError::new(stage, made, StageErrorKind::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dramaturg_error::{AttemptErrorKind, ProviderErrorKind};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn exponential_schedule_is_bounded() {
        let policy = RetryPolicy::exponential(4, 2000, 8000, false);
        assert_eq!(policy.backoff().len(), 3);
        assert!(policy.backoff().iter().all(|d| *d <= Duration::from_millis(8000)));
        assert_eq!(policy.delay_before(1), Duration::ZERO);
    }

    #[test]
    fn short_schedule_repeats_last_delay() {
        let policy = RetryPolicy::with_schedule(5, vec![Duration::from_millis(10)]);
        assert_eq!(policy.delay_before(4), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn succeeds_after_failures_and_passes_feedback() {
        let policy = RetryPolicy::immediate(3);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        let outcome = policy
            .run("discoverer", &CancellationToken::new(), |attempt| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(attempt.previous_error.clone());
                    if attempt.number < 3 {
                        Err(AttemptError::new(AttemptErrorKind::Parse("bad".into())))
                    } else {
                        Ok(attempt.number)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome.value, 3);
        assert_eq!(outcome.attempts, 3);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], None);
        assert!(seen[1].as_deref().unwrap().contains("bad"));
    }

    #[tokio::test]
    async fn permanent_error_stops_immediately() {
        let calls = AtomicUsize::new(0);
        let err = RetryPolicy::immediate(3)
            .run("auditor", &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(AttemptError::new(AttemptErrorKind::Provider(
                        ProviderErrorKind::HttpStatus {
                            status_code: 401,
                            message: "unauthorized".into(),
                        },
                    )))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts, 1);
        assert!(matches!(err.kind, StageErrorKind::Permanent(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_follow_the_schedule() {
        let policy = RetryPolicy::with_schedule(
            3,
            vec![Duration::from_millis(100), Duration::from_millis(200)],
        );
        let start = tokio::time::Instant::now();

        let err = policy
            .run("discoverer", &CancellationToken::new(), |_| async {
                Err::<(), _>(AttemptError::new(AttemptErrorKind::Provider(
                    ProviderErrorKind::HttpStatus {
                        status_code: 429,
                        message: "slow down".into(),
                    },
                )))
            })
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert!(matches!(err.kind, StageErrorKind::Exhausted(_)));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(300) && waited < Duration::from_millis(310));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let policy = RetryPolicy::with_schedule(3, vec![Duration::from_secs(3600)]);

        let err = policy
            .run("modifier", &cancel, |_| {
                trigger.cancel();
                async { Err::<(), _>(AttemptError::new(AttemptErrorKind::Timeout(1))) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(err.kind, StageErrorKind::Cancelled);
    }
}
