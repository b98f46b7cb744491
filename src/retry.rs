//! Retry with exponential backoff.
//!
//! Every failed attempt but the last is followed by a pause. The first pause
//! lasts `initial_backoff` and each following one is twice the previous.
//! With the defaults (5 attempts, 10s) a request that never succeeds waits
//! 10 + 20 + 40 + 80 = 150 seconds in total before being given up.
//!
//! Failures are not classified: any error is considered transient.
use std::future::Future;
use std::time::Duration;

use log::{error, info, warn};

use crate::error::Error;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, first one included. Never 0.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Result<Self, Error> {
        if max_attempts == 0 {
            return Err(Error::InvalidInput(
                "max attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            initial_backoff,
        })
    }

    /// Pauses taken between attempts, in order.
    /// Yields `max_attempts - 1` durations.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        std::iter::successors(Some(self.initial_backoff), |d| Some(d.saturating_mul(2)))
            .take(self.max_attempts.saturating_sub(1) as usize)
    }

    /// Sum of [RetryPolicy::delays], ie. the time spent sleeping
    /// by a request that fails on every attempt.
    pub fn total_wait(&self) -> Duration {
        self.delays()
            .fold(Duration::ZERO, |acc, d| acc.saturating_add(d))
    }
}

/// Last error of an operation that failed on every attempt.
#[derive(Debug)]
pub struct Exhausted {
    pub attempts: u32,
    pub last_error: Error,
}

/// Run `op` until it succeeds or `policy.max_attempts` is reached.
///
/// `op` receives the 1-based attempt number. `target` only appears in logs.
/// On success the number of attempts that were needed is returned along the value.
pub async fn with_retries<F, Fut, T>(
    policy: &RetryPolicy,
    target: &str,
    mut op: F,
) -> Result<(T, u32), Exhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut delays = policy.delays();
    let mut attempt = 1;

    loop {
        info!("attempting to download {} ({}/{})", target, attempt, policy.max_attempts);
        match op(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) => match delays.next() {
                Some(wait) => {
                    warn!(
                        "error downloading {} (attempt {}/{}): {}. retrying in {:?}",
                        target, attempt, policy.max_attempts, e, wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                None => {
                    error!(
                        "failed to download {} after {} attempts: {}",
                        target, attempt, e
                    );
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    fn policy(attempts: u32, ms: u64) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(ms)).unwrap()
    }

    #[test]
    fn default_schedule() {
        let delays: Vec<_> = RetryPolicy::default().delays().collect();
        let secs: Vec<_> = delays.iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![10, 20, 40, 80]);
        assert_eq!(RetryPolicy::default().total_wait(), Duration::from_secs(150));
    }

    #[test]
    fn delays_strictly_double() {
        let delays: Vec<_> = policy(8, 3).delays().collect();
        assert_eq!(delays.len(), 7);
        for pair in delays.windows(2) {
            assert_eq!(pair[1], pair[0] * 2);
        }
    }

    #[test]
    fn single_attempt_never_waits() {
        assert_eq!(policy(1, 1000).delays().count(), 0);
        assert_eq!(policy(1, 1000).total_wait(), Duration::ZERO);
    }

    #[test]
    fn zero_attempts_rejected() {
        assert!(RetryPolicy::new(0, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let p = policy(4, 5);

        let start = std::time::Instant::now();
        let res: Result<((), u32), Exhausted> = with_retries(&p, "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::InvalidInput("nope".to_string())) }
        })
        .await;

        let err = res.unwrap_err();
        assert_eq!(err.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(start.elapsed() >= p.total_wait());
    }

    #[tokio::test]
    async fn succeeds_after_failures() {
        let p = policy(5, 1);
        let res = with_retries(&p, "test", |attempt| async move {
            if attempt < 3 {
                Err(Error::InvalidInput("not yet".to_string()))
            } else {
                Ok(attempt * 10)
            }
        })
        .await
        .unwrap();

        assert_eq!(res, (30, 3));
    }
}
