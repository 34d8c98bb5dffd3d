use std::{future::Future, time::Duration};

use tokio::time::sleep;

use super::ClassifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(2_000),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor)
            }
        }
    }

    /// Runs `op` until it succeeds, fails terminally, or the attempt budget is
    /// spent. Only [`ClassifyError::Transport`] is retried; exhausting the
    /// budget yields [`ClassifyError::Unavailable`].
    pub async fn run<T, F, Fut>(&self, backend: &str, mut op: F) -> Result<T, ClassifyError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ClassifyError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(target: "classifier", backend, attempt, "classifier recovered after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if let ClassifyError::Transport { status, message } = &err {
                tracing::warn!(
                    target: "classifier",
                    backend,
                    attempt,
                    max_attempts,
                    status = ?status,
                    error = %message,
                    "classifier attempt failed"
                );
            }

            if attempt >= max_attempts {
                return Err(ClassifyError::Unavailable {
                    attempts: attempt,
                    reason: err.to_string(),
                });
            }

            sleep(self.delay_after(attempt)).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;

    fn policy(backoff: Backoff) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(2_000),
            backoff,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_stub_is_attempted_exactly_max_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = policy(Backoff::Fixed)
            .run("stub", |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ClassifyError::Transport {
                        status: Some(503),
                        message: "model loading".into(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ClassifyError::Unavailable { attempts: 3, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = policy(Backoff::Fixed)
            .run("stub", |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ClassifyError::MalformedResponse("no labels".into()))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ClassifyError::MalformedResponse(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failure() {
        let started = tokio::time::Instant::now();
        let result = policy(Backoff::Fixed)
            .run("stub", |attempt| async move {
                if attempt == 1 {
                    Err(ClassifyError::Transport {
                        status: None,
                        message: "connection reset".into(),
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 2);
        assert!(started.elapsed() >= Duration::from_millis(2_000));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let policy = policy(Backoff::Exponential);
        assert_eq!(policy.delay_after(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(4_000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(8_000));
    }
}
