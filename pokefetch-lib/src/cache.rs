//! Memoization of successful fetches.
//!
//! [`ResultCache`] keeps at most [`CacheConfig::max_entries`] payloads, each
//! valid for [`CacheConfig::ttl`] after it was stored. When full, the entry
//! that was accessed least recently makes room. Only successful outcomes are
//! ever stored.
//!
//! Concurrent lookups of the same key are coalesced: the first caller fetches
//! while later callers wait for it and then read its result from the cache.
//! If the first caller's fetch fails, the next waiter fetches again.

use std::fmt::Debug;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ErrorKind, FetchOutcome, FetchTarget, Result};

/// Default lifetime of a cache entry, one hour
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default number of cache entries
const DEFAULT_MAX_ENTRIES: usize = 100;

/// Source of the current time for expiry decisions
pub trait Clock: Send + Sync + Debug {
    /// The current instant
    fn now(&self) -> Instant;
}

/// Wall clock, backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock which only moves when told to.
///
/// Useful to test expiry without waiting for it.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sizing and lifetime of a [`ResultCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a stored payload stays valid
    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub ttl: Duration,

    /// Maximum number of stored payloads
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

const fn default_ttl() -> Duration {
    DEFAULT_TTL
}

const fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl CacheConfig {
    /// Create a `CacheConfig` from CLI options, using defaults for missing values
    #[must_use]
    pub fn from_options(ttl: Option<Duration>, max_entries: Option<usize>) -> Self {
        Self {
            ttl: ttl.unwrap_or(DEFAULT_TTL),
            max_entries: max_entries.unwrap_or(DEFAULT_MAX_ENTRIES),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Counters describing how well the cache performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups which had to fetch
    pub misses: u64,
    /// Entries currently stored, expired ones included until they are looked up
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache, `0.0` without lookups
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL and LRU bounded store of successful payloads, keyed by target
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    entries: Mutex<LruCache<FetchTarget, CacheEntry>>,
    /// One lock per key with a fetch in progress
    inflight: DashMap<FetchTarget, Arc<tokio::sync::Mutex<()>>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Create a cache using the system clock
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidCacheSize`] if `max_entries` is zero.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache which reads the time from `clock`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidCacheSize`] if `max_entries` is zero.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.max_entries).ok_or(ErrorKind::InvalidCacheSize)?;
        Ok(Self {
            ttl: config.ttl,
            entries: Mutex::new(LruCache::new(capacity)),
            inflight: DashMap::new(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Return the cached payload for `target`, or run `fetch_fn` and store
    /// its payload if it succeeds.
    ///
    /// A hit is returned as [`FetchOutcome::Success`]. A miss returns
    /// whatever `fetch_fn` produced, failures included.
    pub async fn get_or_fetch<F, Fut>(&self, target: &FetchTarget, fetch_fn: F) -> FetchOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        if let Some(value) = self.lookup(target) {
            self.record_hit(target);
            return FetchOutcome::Success(value);
        }

        let key_lock = self.inflight.entry(target.clone()).or_default().clone();
        let outcome = {
            let _guard = key_lock.lock().await;
            // Somebody else might have stored it while we were waiting
            if let Some(value) = self.lookup(target) {
                self.record_hit(target);
                FetchOutcome::Success(value)
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                log::debug!("[CACHE MISS] {target}");
                let outcome = fetch_fn().await;
                if let FetchOutcome::Success(value) = &outcome {
                    self.insert(target.clone(), value.clone());
                }
                outcome
            }
        };

        drop(key_lock);
        self.inflight
            .remove_if(target, |_, lock| Arc::strong_count(lock) == 1);
        outcome
    }

    /// Look up a payload without fetching.
    ///
    /// Refreshes the entry's recency. Expired entries are removed.
    pub fn get(&self, target: &FetchTarget) -> Option<Value> {
        self.lookup(target)
    }

    /// Store a payload, evicting the least recently used entry if full.
    ///
    /// Returns the evicted key. Replacing the payload of a stored key
    /// evicts nothing.
    pub fn insert(&self, target: FetchTarget, value: Value) -> Option<FetchTarget> {
        let expires_at = self.clock.now() + self.ttl;
        let (evicted, _) = self
            .entries()
            .push(target.clone(), CacheEntry { value, expires_at })?;
        if evicted == target {
            return None;
        }
        log::trace!("Evicted {evicted} from cache");
        Some(evicted)
    }

    /// Number of stored entries, expired ones included until they are looked up
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries().cap().get()
    }

    /// Lifetime of new entries
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop all entries. Counters are kept.
    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<FetchTarget, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, target: &FetchTarget) -> Option<Value> {
        let now = self.clock.now();
        let mut entries = self.entries();
        let expired = match entries.get(target) {
            Some(entry) if now <= entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(target);
            log::trace!("Cache entry for {target} expired");
        }
        None
    }

    fn record_hit(&self, target: &FetchTarget) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        log::debug!("[CACHE HIT] {target}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{CacheConfig, CacheStats, ManualClock, ResultCache};
    use crate::{ErrorKind, FetchOutcome, FetchTarget};

    fn cache(ttl: u64, max_entries: usize) -> (ResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig {
            ttl: Duration::from_secs(ttl),
            max_entries,
        };
        (ResultCache::with_clock(config, clock.clone()).unwrap(), clock)
    }

    fn success(n: usize) -> FetchOutcome {
        FetchOutcome::Success(json!({ "n": n }))
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.max_entries, 100);
    }

    #[test]
    fn test_config_from_toml() {
        let config: CacheConfig = toml::from_str("ttl = \"10m\"").unwrap();
        assert_eq!(config.ttl, Duration::from_secs(600));
        assert_eq!(config.max_entries, 100);

        let config: CacheConfig = toml::from_str("max_entries = 3").unwrap();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.max_entries, 3);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let config = CacheConfig {
            ttl: Duration::from_secs(1),
            max_entries: 0,
        };
        assert!(matches!(
            ResultCache::new(config),
            Err(ErrorKind::InvalidCacheSize)
        ));
    }

    #[tokio::test]
    async fn test_second_lookup_is_a_hit() {
        let (cache, _) = cache(60, 10);
        let target = FetchTarget::from("a");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let outcome = cache
                .get_or_fetch(&target, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    success(1)
                })
                .await;
            assert_eq!(outcome, success(1));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 2,
                misses: 1,
                entries: 1
            }
        );
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (cache, _) = cache(60, 10);
        let target = FetchTarget::from("a");
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let outcome = cache
                .get_or_fetch(&target, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    FetchOutcome::HardFailure(StatusCode::NOT_FOUND)
                })
                .await;
            assert_eq!(outcome, FetchOutcome::HardFailure(StatusCode::NOT_FOUND));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let (cache, clock) = cache(10, 10);
        let target = FetchTarget::from("a");
        cache.insert(target.clone(), json!(1));

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get(&target), Some(json!(1)));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get(&target), None);
        assert!(cache.is_empty());

        let outcome = cache.get_or_fetch(&target, || async { success(2) }).await;
        assert_eq!(outcome, success(2));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let (cache, _) = cache(60, 2);
        let (a, b, c) = (
            FetchTarget::from("a"),
            FetchTarget::from("b"),
            FetchTarget::from("c"),
        );

        assert_eq!(cache.insert(a.clone(), json!("a")), None);
        assert_eq!(cache.insert(b.clone(), json!("b")), None);
        // Touch `a` so that `b` becomes the oldest
        assert!(cache.get(&a).is_some());
        assert_eq!(cache.insert(c.clone(), json!("c")), Some(b.clone()));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&b), None);
        assert_eq!(cache.get(&a), Some(json!("a")));
        assert_eq!(cache.get(&c), Some(json!("c")));
    }

    #[test]
    fn test_replacing_a_full_cache_entry_evicts_nothing() {
        let (cache, _) = cache(60, 2);
        let (a, b) = (FetchTarget::from("a"), FetchTarget::from("b"));

        cache.insert(a.clone(), json!(1));
        cache.insert(b.clone(), json!(2));
        assert_eq!(cache.insert(a.clone(), json!(3)), None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&a), Some(json!(3)));
        assert_eq!(cache.get(&b), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_concurrent_lookups_fetch_once() {
        let (cache, _) = cache(60, 10);
        let target = FetchTarget::from("a");
        let calls = AtomicUsize::new(0);

        let lookups = (0..20).map(|_| {
            cache.get_or_fetch(&target, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                success(1)
            })
        });
        let outcomes = futures::future::join_all(lookups).await;

        assert!(outcomes.iter().all(|o| *o == success(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 19);
        assert!(cache.inflight.is_empty());
    }

    #[tokio::test]
    async fn test_failed_leader_lets_waiter_fetch() {
        let (cache, _) = cache(60, 10);
        let target = FetchTarget::from("a");
        let calls = AtomicUsize::new(0);

        let lookups = (0..2).map(|_| {
            cache.get_or_fetch(&target, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                if n == 0 {
                    FetchOutcome::SoftFailure {
                        status: StatusCode::SERVICE_UNAVAILABLE,
                        retry_after: None,
                    }
                } else {
                    success(n)
                }
            })
        });
        let outcomes = futures::future::join_all(lookups).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);
        assert_eq!(cache.get(&target), Some(json!({ "n": 1 })));
    }

    #[test]
    fn test_hit_rate() {
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < f64::EPSILON);
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            entries: 1,
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
