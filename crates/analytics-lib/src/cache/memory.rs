//! In-process sample cache with per-entry expiry

use super::{CacheError, SampleCache};
use crate::models::Sample;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default bound on live entries
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Minimum spacing between full expiry sweeps
const PURGE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct CachedEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// Sample cache backed by a concurrent map
///
/// Values are stored JSON-encoded. Expired entries are never returned by
/// `get`; writes sweep them out at most once per purge interval, so a
/// write does not scan the whole map.
#[derive(Debug)]
pub struct MemoryCache {
    entries: DashMap<String, CachedEntry>,
    max_entries: Option<usize>,
    purge_interval: Duration,
    last_purge: Mutex<Instant>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Unbounded cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: None,
            purge_interval: PURGE_INTERVAL,
            last_purge: Mutex::new(Instant::now()),
        }
    }

    /// Refuse writes once `max_entries` live entries are held
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Change how often writes sweep expired entries
    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = interval;
        self
    }

    /// Read back a cached sample if present and not expired
    pub fn get(&self, key: &str) -> Option<Sample> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        serde_json::from_slice(&entry.payload).ok()
    }

    /// Number of entries held, including not-yet-purged expired ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        purged
    }

    /// Sweep expired entries if the purge interval has elapsed
    fn purge_if_due(&self) {
        let now = Instant::now();
        {
            let mut last_purge = self.last_purge.lock().unwrap_or_else(|e| e.into_inner());
            if now.saturating_duration_since(*last_purge) < self.purge_interval {
                return;
            }
            *last_purge = now;
        }
        self.purge_expired();
    }
}

#[async_trait]
impl SampleCache for MemoryCache {
    async fn set(&self, key: &str, sample: &Sample, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_vec(sample)?;

        self.purge_if_due();

        if let Some(max) = self.max_entries {
            if self.entries.len() >= max && !self.entries.contains_key(key) {
                return Err(CacheError::Unavailable(format!(
                    "capacity of {} entries reached",
                    max
                )));
            }
        }

        self.entries.insert(
            key.to_string(),
            CachedEntry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        let sample = Sample::new(100, 20.0, 150.0);

        cache
            .set(&sample.cache_key(), &sample, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("metric:100"), Some(sample));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_same_timestamp_overwrites() {
        let cache = MemoryCache::new();
        let first = Sample::new(7, 20.0, 150.0);
        let second = Sample::new(7, 30.0, 250.0);

        cache.set("metric:7", &first, Duration::from_secs(60)).await.unwrap();
        cache.set("metric:7", &second, Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("metric:7"), Some(second));
    }

    #[tokio::test]
    async fn test_expired_entries_are_hidden_and_purged() {
        let cache = MemoryCache::new();
        let sample = Sample::new(1, 20.0, 150.0);

        cache.set("metric:1", &sample, Duration::ZERO).await.unwrap();
        assert!(cache.get("metric:1").is_none());

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_writes_do_not_sweep_between_purge_intervals() {
        let cache = MemoryCache::new().with_purge_interval(Duration::from_secs(3600));
        let sample = Sample::new(1, 20.0, 150.0);

        for ts in 0..1_000 {
            cache
                .set(&format!("metric:{}", ts), &sample, Duration::ZERO)
                .await
                .unwrap();
        }

        // All expired, none swept yet
        assert_eq!(cache.len(), 1_000);
        assert!(cache.get("metric:0").is_none());

        assert_eq!(cache.purge_expired(), 1_000);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_writes_sweep_once_interval_elapsed() {
        let cache = MemoryCache::new().with_purge_interval(Duration::ZERO);
        let sample = Sample::new(1, 20.0, 150.0);

        cache.set("metric:1", &sample, Duration::ZERO).await.unwrap();
        cache.set("metric:2", &sample, Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("metric:2"), Some(sample));
    }

    #[test]
    fn test_capacity_limit_rejects_new_keys() {
        let cache = MemoryCache::new().with_max_entries(1);
        let sample = Sample::new(1, 20.0, 150.0);
        let ttl = Duration::from_secs(60);

        tokio_test::block_on(cache.set("metric:1", &sample, ttl)).unwrap();
        let err = tokio_test::block_on(cache.set("metric:2", &sample, ttl)).unwrap_err();
        assert!(matches!(err, CacheError::Unavailable(_)));

        // Rewriting an existing key is still allowed
        assert!(tokio_test::block_on(cache.set("metric:1", &sample, ttl)).is_ok());
    }

    #[tokio::test]
    async fn test_noop_cache_accepts_writes() {
        let cache = super::super::NoopCache;
        let sample = Sample::new(1, 1.0, 1.0);
        assert!(cache.set("metric:1", &sample, Duration::from_secs(1)).await.is_ok());
    }
}
