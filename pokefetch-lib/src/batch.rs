//! Load generation against a list of endpoints.
//!
//! A workload is the URL list repeated as many whole times as fit into the
//! requested total. It is then fanned out through a [`ConcurrencyLimiter`],
//! optionally through a [`ResultCache`], or fetched strictly one at a time as
//! a baseline.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::{
    CacheStats, ConcurrencyLimiter, ErrorKind, Fetch, FetchOutcome, FetchTarget, ResultCache,
    Result,
};

/// Build a workload of `urls` repeated `total_requests / urls.len()` times.
///
/// The remainder of the division is dropped, so the workload can be shorter
/// than `total_requests`. For example, 3 URLs and 1000 requests give 999
/// targets. Fewer requests than URLs, or no URLs at all, give an empty
/// workload.
#[must_use]
pub fn expand_targets(urls: &[FetchTarget], total_requests: usize) -> Vec<FetchTarget> {
    let Some(repetitions) = total_requests.checked_div(urls.len()) else {
        return Vec::new();
    };
    let mut targets = Vec::with_capacity(repetitions * urls.len());
    for _ in 0..repetitions {
        targets.extend_from_slice(urls);
    }
    targets
}

/// Aggregate counts over the outcomes of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Number of outcomes
    pub total: usize,
    /// `200 OK` with a JSON payload
    pub successful: usize,
    /// Retryable status codes
    pub soft_failures: usize,
    /// Non-retryable status codes
    pub hard_failures: usize,
    /// No status code at all
    pub transport_errors: usize,
}

impl BatchStats {
    /// Count a single outcome
    pub fn add(&mut self, outcome: &FetchOutcome) {
        self.total += 1;
        match outcome {
            FetchOutcome::Success(_) => self.successful += 1,
            FetchOutcome::SoftFailure { .. } => self.soft_failures += 1,
            FetchOutcome::HardFailure(_) => self.hard_failures += 1,
            FetchOutcome::TransportError(_) => self.transport_errors += 1,
        }
    }

    /// Number of outcomes which are not successes
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.total - self.successful
    }

    /// Returns `true` if every outcome was a success
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.total == self.successful
    }
}

impl<'a> FromIterator<&'a FetchOutcome> for BatchStats {
    fn from_iter<I: IntoIterator<Item = &'a FetchOutcome>>(iter: I) -> Self {
        let mut stats = Self::default();
        for outcome in iter {
            stats.add(outcome);
        }
        stats
    }
}

/// Result of running one batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One outcome per target, in completion order
    pub outcomes: Vec<FetchOutcome>,
    /// Wall-clock time from the first admission to the last completion
    pub elapsed: Duration,
    /// Counts over `outcomes`
    pub stats: BatchStats,
    /// Cache counters after the batch, if the batch went through the cache
    pub cache: Option<CacheStats>,
}

impl BatchReport {
    fn new(outcomes: Vec<FetchOutcome>, elapsed: Duration, cache: Option<CacheStats>) -> Self {
        let stats = outcomes.iter().collect();
        Self {
            outcomes,
            elapsed,
            stats,
            cache,
        }
    }

    /// Completed requests per second, `0.0` for an instant batch
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.total as f64 / secs
        } else {
            0.0
        }
    }
}

/// Runs workloads through a [`Fetch`] implementation
#[derive(Debug)]
pub struct BatchFetcher<F> {
    fetcher: F,
    cache: Option<Arc<ResultCache>>,
}

impl<F: Fetch> BatchFetcher<F> {
    /// Create a batch fetcher without a cache
    pub const fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cache: None,
        }
    }

    /// Attach a cache. It is shared across every batch run by this fetcher.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The attached cache, if any
    #[must_use]
    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_deref()
    }

    /// Run the expanded workload with at most `max_concurrent` fetches in flight.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidConcurrency`] if `max_concurrent` is zero
    /// - [`ErrorKind::CacheNotConfigured`] if `use_cache` is set, but no cache
    ///   was attached
    ///
    /// Failed fetches are not errors; they show up in the report.
    pub async fn run(
        &self,
        urls: &[FetchTarget],
        total_requests: usize,
        max_concurrent: usize,
        use_cache: bool,
    ) -> Result<BatchReport> {
        let cache = if use_cache {
            Some(self.cache().ok_or(ErrorKind::CacheNotConfigured)?)
        } else {
            None
        };
        let limiter = ConcurrencyLimiter::new(max_concurrent)?;
        let targets = expand_targets(urls, total_requests);
        log::info!(
            "Fetching {} target(s), {max_concurrent} at a time{}",
            targets.len(),
            if cache.is_some() { ", cached" } else { "" }
        );

        let fetcher = &self.fetcher;
        let start = Instant::now();
        let outcomes = limiter
            .run_batch(targets, |target| async move {
                match cache {
                    Some(cache) => {
                        cache
                            .get_or_fetch(&target, || fetcher.fetch(&target))
                            .await
                    }
                    None => fetcher.fetch(&target).await,
                }
            })
            .await;
        let elapsed = start.elapsed();

        Ok(BatchReport::new(
            outcomes,
            elapsed,
            cache.map(ResultCache::stats),
        ))
    }

    /// Run the expanded workload strictly one fetch at a time, without cache.
    pub async fn run_sequential(&self, urls: &[FetchTarget], total_requests: usize) -> BatchReport {
        let targets = expand_targets(urls, total_requests);
        log::info!("Fetching {} target(s) sequentially", targets.len());

        let start = Instant::now();
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in &targets {
            outcomes.push(self.fetcher.fetch(target).await);
        }
        BatchReport::new(outcomes, start.elapsed(), None)
    }
}
