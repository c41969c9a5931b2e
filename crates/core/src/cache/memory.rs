//! In-process tier.
//!
//! Unbounded map from key to (content, inserted_at). Only time-based expiry
//! removes entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;

use super::hash::CacheKey;

/// A cached body held in memory.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub content: String,
    pub inserted_at: SystemTime,
}

impl MemoryEntry {
    pub fn is_expired(&self, now: SystemTime, max_age: Duration) -> bool {
        is_stale(self.inserted_at, now, max_age)
    }
}

/// Whether something stamped at `then` is older than `max_age` at `now`.
///
/// A timestamp in the future (clock stepped backwards) counts as age zero.
pub(crate) fn is_stale(then: SystemTime, now: SystemTime, max_age: Duration) -> bool {
    now.duration_since(then).unwrap_or_default() > max_age
}

/// Concurrent map of memory entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryTier {
    entries: Arc<RwLock<HashMap<CacheKey, MemoryEntry>>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lookup(&self, key: &CacheKey) -> Option<MemoryEntry> {
        self.entries.read().await.get(key).cloned()
    }

    /// Insert or overwrite the entry for `key`.
    pub async fn insert(&self, key: CacheKey, content: String, now: SystemTime) {
        self.entries
            .write()
            .await
            .insert(key, MemoryEntry { content, inserted_at: now });
    }

    /// Remove the entry for `key`. Returns whether one was present.
    pub async fn evict(&self, key: &CacheKey) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Remove the entry for `key` only if it is still expired, so a fresh
    /// insert that raced in after the caller's lookup survives.
    pub async fn evict_stale(&self, key: &CacheKey, now: SystemTime, max_age: Duration) -> bool {
        let mut entries = self.entries.write().await;
        let expired = entries.get(key).is_some_and(|entry| entry.is_expired(now, max_age));
        if expired {
            entries.remove(key);
        }
        expired
    }

    /// Drop every entry older than `max_age` at `now`.
    pub async fn sweep_expired(&self, now: SystemTime, max_age: Duration) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, max_age));
        before - entries.len()
    }

    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::compute_cache_key;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let tier = MemoryTier::new();
        let key = compute_cache_key("https://example.com/");
        let now = SystemTime::now();

        tier.insert(key, "<p>hi</p>".into(), now).await;

        let entry = tier.lookup(&key).await.unwrap();
        assert_eq!(entry.content, "<p>hi</p>");
        assert_eq!(entry.inserted_at, now);
    }

    #[tokio::test]
    async fn test_insert_overwrites() {
        let tier = MemoryTier::new();
        let key = compute_cache_key("https://example.com/");
        let t0 = SystemTime::now() - HOUR;
        let t1 = SystemTime::now();

        tier.insert(key, "old".into(), t0).await;
        tier.insert(key, "new".into(), t1).await;

        assert_eq!(tier.len().await, 1);
        let entry = tier.lookup(&key).await.unwrap();
        assert_eq!(entry.content, "new");
        assert_eq!(entry.inserted_at, t1);
    }

    #[tokio::test]
    async fn test_evict_missing_is_noop() {
        let tier = MemoryTier::new();
        let key = compute_cache_key("https://example.com/");
        assert!(!tier.evict(&key).await);

        tier.insert(key, "x".into(), SystemTime::now()).await;
        assert!(tier.evict(&key).await);
        assert!(tier.is_empty().await);
    }

    #[tokio::test]
    async fn test_evict_stale_keeps_fresh_entry() {
        let tier = MemoryTier::new();
        let key = compute_cache_key("https://example.com/");
        let now = SystemTime::now();

        tier.insert(key, "fresh".into(), now).await;
        assert!(!tier.evict_stale(&key, now, HOUR).await);
        assert!(tier.lookup(&key).await.is_some());

        tier.insert(key, "stale".into(), now - 2 * HOUR).await;
        assert!(tier.evict_stale(&key, now, HOUR).await);
        assert!(tier.lookup(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let tier = MemoryTier::new();
        let now = SystemTime::now();

        tier.insert(compute_cache_key("a"), "a".into(), now - 2 * HOUR).await;
        tier.insert(compute_cache_key("b"), "b".into(), now - 2 * HOUR).await;
        tier.insert(compute_cache_key("c"), "c".into(), now).await;

        assert_eq!(tier.sweep_expired(now, HOUR).await, 2);
        assert_eq!(tier.len().await, 1);
        assert!(tier.lookup(&compute_cache_key("c")).await.is_some());
        assert_eq!(tier.sweep_expired(now, HOUR).await, 0);
    }

    #[test]
    fn test_boundary_age_is_fresh() {
        let now = SystemTime::now();
        assert!(!is_stale(now - HOUR, now, HOUR));
        assert!(is_stale(now - HOUR - Duration::from_millis(1), now, HOUR));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let now = SystemTime::now();
        assert!(!is_stale(now + HOUR, now, Duration::ZERO));
    }
}
