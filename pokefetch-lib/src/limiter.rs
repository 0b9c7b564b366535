//! Bounded fan-out of fetches.
//!
//! A [`ConcurrencyLimiter`] owns an admission-counting [`Semaphore`]. Targets
//! are pulled from an ordered stream and each one has to acquire a permit
//! before its fetch starts. Tokio's semaphore hands out permits in the order
//! they were requested, so the first queued target is always the first one
//! admitted when capacity frees up.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tokio::sync::Semaphore;

use crate::{ErrorKind, FetchOutcome, FetchTarget, Result};

/// Bounds the number of fetches executing at the same time.
///
/// Cloning is cheap and clones share the same permits, so several batches
/// run through clones of one limiter are bounded together.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `max_concurrent` fetches at once
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConcurrency`] if `max_concurrent` is zero.
    pub fn new(max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(ErrorKind::InvalidConcurrency);
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        })
    }

    /// The configured ceiling
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of fetches currently admitted
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    /// Run `fetch_fn` for every target, never exceeding the ceiling.
    ///
    /// Every target yields exactly one outcome, whatever happens to the
    /// others. Outcomes are returned in completion order, which is generally
    /// not the order of `targets`.
    ///
    /// Besides the target and result lists, at most `max_concurrent` pending
    /// futures are alive at any time.
    pub async fn run_batch<F, Fut>(&self, targets: Vec<FetchTarget>, fetch_fn: F) -> Vec<FetchOutcome>
    where
        F: Fn(FetchTarget) -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        let total = targets.len();
        let fetch_fn = &fetch_fn;
        let semaphore = &self.semaphore;

        let mut outcomes = Vec::with_capacity(total);
        let mut results = stream::iter(targets)
            .map(|target| async move {
                // SAFETY: this should not panic as we never close the semaphore
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("Semaphore was closed unexpectedly");
                fetch_fn(target).await
            })
            .buffer_unordered(self.max_concurrent);

        while let Some(outcome) = results.next().await {
            outcomes.push(outcome);
        }

        log::debug!(
            "Batch of {total} target(s) finished with a ceiling of {}",
            self.max_concurrent
        );
        outcomes
    }
}

/// Convenience wrapper to run a single batch with a fresh limiter.
///
/// # Errors
///
/// Returns [`ErrorKind::InvalidConcurrency`] if `max_concurrent` is zero.
pub async fn run_batch<F, Fut>(
    targets: Vec<FetchTarget>,
    max_concurrent: usize,
    fetch_fn: F,
) -> Result<Vec<FetchOutcome>>
where
    F: Fn(FetchTarget) -> Fut,
    Fut: Future<Output = FetchOutcome>,
{
    let limiter = ConcurrencyLimiter::new(max_concurrent)?;
    Ok(limiter.run_batch(targets, fetch_fn).await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use http::StatusCode;
    use rstest::rstest;
    use serde_json::json;

    use super::{ConcurrencyLimiter, run_batch};
    use crate::{ErrorKind, FetchOutcome, FetchTarget};

    fn targets(n: usize) -> Vec<FetchTarget> {
        (0..n).map(|i| FetchTarget::new(format!("t{i}"))).collect()
    }

    /// Counts concurrently running fetches and remembers the peak
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(matches!(
            ConcurrencyLimiter::new(0),
            Err(ErrorKind::InvalidConcurrency)
        ));
    }

    #[rstest]
    #[case(1, 10)]
    #[case(3, 25)]
    #[case(10, 5)]
    #[case(100, 1000)]
    #[tokio::test]
    async fn test_ceiling_is_never_exceeded(#[case] ceiling: usize, #[case] count: usize) {
        let gauge = Arc::new(Gauge::default());
        let limiter = ConcurrencyLimiter::new(ceiling).unwrap();

        let outcomes = limiter
            .run_batch(targets(count), |_| {
                let gauge = gauge.clone();
                async move {
                    gauge.enter();
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    gauge.exit();
                    FetchOutcome::Success(json!(null))
                }
            })
            .await;

        assert_eq!(outcomes.len(), count);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= ceiling, "peak {peak} exceeded ceiling {ceiling}");
        assert!(peak >= 1);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_the_batch() {
        let outcomes = run_batch(targets(30), 4, |target| async move {
            let n: usize = target.as_str()[1..].parse().unwrap();
            match n % 3 {
                0 => FetchOutcome::Success(json!(n)),
                1 => FetchOutcome::HardFailure(StatusCode::NOT_FOUND),
                _ => FetchOutcome::SoftFailure {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    retry_after: None,
                },
            }
        })
        .await
        .unwrap();

        assert_eq!(outcomes.len(), 30);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 10);
    }

    #[tokio::test]
    async fn test_admission_is_fifo() {
        // With a ceiling of one, admission order equals execution order
        let order = Arc::new(Mutex::new(Vec::new()));
        let limiter = ConcurrencyLimiter::new(1).unwrap();

        limiter
            .run_batch(targets(8), |target| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(target);
                    tokio::task::yield_now().await;
                    FetchOutcome::Success(json!(null))
                }
            })
            .await;

        assert_eq!(*order.lock().unwrap(), targets(8));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let outcomes = run_batch(Vec::new(), 5, |_| async {
            FetchOutcome::Success(json!(null))
        })
        .await
        .unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_permits() {
        let limiter = ConcurrencyLimiter::new(2).unwrap();
        let other = limiter.clone();
        let gauge = Arc::new(Gauge::default());

        let run = |limiter: ConcurrencyLimiter| {
            let gauge = gauge.clone();
            async move {
                limiter
                    .run_batch(targets(10), |_| {
                        let gauge = gauge.clone();
                        async move {
                            gauge.enter();
                            tokio::time::sleep(Duration::from_millis(2)).await;
                            gauge.exit();
                            FetchOutcome::Success(json!(null))
                        }
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(run(limiter), run(other));
        assert_eq!(a.len() + b.len(), 20);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }
}
