//! Retry policy shared by the event consumer and the digest scheduler.
//!
//! Attempt `i` (1-based) that fails with a retriable error is followed by a
//! wait of `base × 2^(i-1)`, so with the default `base = 100ms`:
//!
//! ```text
//! attempt 1 ─ 100ms ─ attempt 2 ─ 200ms ─ attempt 3 ─ 400ms ─ ...
//! ```
//!
//! At most `max_trials` attempts are made; the last error is returned.
//! Shutdown and deadline errors are never retried, and every wait returns
//! early when the cancellation token fires.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cancel;
use crate::error::{NaraslaError, Result};

/// Outcome of classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Give up and surface the error.
    Stop,
    /// Back off and try again.
    Retry,
}

/// Default classifier: domain conditions where another attempt cannot
/// change the outcome stop immediately; everything else is retried.
pub fn classify(err: &NaraslaError) -> Verdict {
    match err {
        NaraslaError::NoSavedPages
        | NaraslaError::PageNotFound
        | NaraslaError::UserNotFound
        | NaraslaError::UnknownEventKind
        | NaraslaError::UnknownMeta
        | NaraslaError::InvalidTimezone(_)
        | NaraslaError::Config(_)
        | NaraslaError::Cancelled
        | NaraslaError::DeadlineExceeded => Verdict::Stop,
        NaraslaError::Channel(_) | NaraslaError::Storage(_) | NaraslaError::Io(_) => Verdict::Retry,
    }
}

/// Exponential backoff with a trial cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after the first failed attempt; doubles after each further one.
    pub base: Duration,
    /// Total attempts, including the first (values below 1 act as 1).
    pub max_trials: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max_trials: 8,
        }
    }
}

impl RetryPolicy {
    pub fn new(base: Duration, max_trials: u32) -> Self {
        Self { base, max_trials }
    }

    /// Wait that follows failed attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(exp).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, `classify` says stop, the trials run out,
    /// or `cancel` fires.
    pub async fn run<T, F, Fut, C>(&self, cancel: &CancellationToken, mut op: F, classify: C) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&NaraslaError) -> Verdict,
    {
        let trials = self.max_trials.max(1);
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(NaraslaError::Cancelled);
            }

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if err.is_cancellation() || classify(&err) == Verdict::Stop || attempt >= trials {
                return Err(err);
            }

            let delay = self.delay(attempt);
            tracing::debug!("retry {}/{} in {:?}: {}", attempt, trials, delay, err);
            cancel::sleep(cancel, delay).await?;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
        // Saturates instead of overflowing
        assert!(policy.delay(200) >= policy.delay(31));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&NaraslaError::NoSavedPages), Verdict::Stop);
        assert_eq!(classify(&NaraslaError::UnknownEventKind), Verdict::Stop);
        assert_eq!(classify(&NaraslaError::Channel("timeout".into())), Verdict::Retry);
        assert_eq!(classify(&NaraslaError::Storage("locked".into())), Verdict::Retry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_trials_with_exponential_waits() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 5);
        let token = CancellationToken::new();
        let calls = Mutex::new(Vec::new());

        let res: Result<()> = policy
            .run(
                &token,
                || {
                    let n = {
                        let mut c = calls.lock().unwrap();
                        c.push(Instant::now());
                        c.len()
                    };
                    async move { Err(NaraslaError::Channel(format!("fail #{n}"))) }
                },
                classify,
            )
            .await;

        match res {
            Err(NaraslaError::Channel(msg)) => assert_eq!(msg, "fail #5"),
            other => panic!("unexpected result: {other:?}"),
        }

        let calls = calls.into_inner().unwrap();
        assert_eq!(calls.len(), 5);
        for i in 1..calls.len() {
            let gap = calls[i] - calls[i - 1];
            assert_eq!(gap, policy.delay(i as u32));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retriable_runs_once() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 10);
        let token = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let res: Result<()> = policy
            .run(
                &token,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(NaraslaError::UnknownEventKind) }
                },
                classify,
            )
            .await;

        assert!(matches!(res, Err(NaraslaError::UnknownEventKind)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::default();
        let token = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let value = policy
            .run(
                &token,
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if n < 3 {
                            Err(NaraslaError::Storage("busy".into()))
                        } else {
                            Ok(n)
                        }
                    }
                },
                classify,
            )
            .await
            .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_preempts_backoff_wait() {
        let policy = RetryPolicy::new(Duration::from_secs(3600), 3);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let res: Result<()> = policy
            .run(
                &token,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(NaraslaError::Channel("down".into())) }
                },
                classify,
            )
            .await;

        assert!(matches!(res, Err(NaraslaError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_cancellation_error_is_not_retried() {
        let policy = RetryPolicy::new(Duration::from_millis(1), 10);
        let token = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let res: Result<()> = policy
            .run(
                &token,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(NaraslaError::DeadlineExceeded) }
                },
                |_| Verdict::Retry,
            )
            .await;

        assert!(matches!(res, Err(NaraslaError::DeadlineExceeded)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
