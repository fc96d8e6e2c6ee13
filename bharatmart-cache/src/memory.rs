//! In-process cache backed by a `DashMap` with per-entry expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;

use crate::backend::CacheBackend;
use crate::error::CacheResult;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Every this many writes, `set` sweeps out expired entries.
const PURGE_EVERY: u64 = 256;

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    writes: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Reads also skip expired entries, so this
    /// only reclaims memory. `set` calls it periodically.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        let entry = self.entries.get(key)?.clone();
        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            return None;
        }
        Some(entry)
    }
}

/// Translate a Redis-style glob into an anchored regex.
pub(crate) fn glob_to_regex(pattern: &str) -> Regex {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    // Every metacharacter except the two wildcards is escaped above.
    Regex::new(&out).unwrap_or_else(|_| Regex::new("^$").unwrap())
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.live(key).map(|e| e.value))
    }

    async fn set(&self, key: &str, value: String, ttl_secs: Option<u64>) -> CacheResult<()> {
        // A TTL past what `Instant` can represent never expires.
        let expires_at =
            ttl_secs.and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)));
        self.entries
            .insert(key.to_owned(), Entry { value, expires_at });
        if self.writes.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            let purged = self.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "expired cache entries purged");
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, e)| !e.is_expired(now)))
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.live(key).is_some())
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let re = glob_to_regex(pattern);
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|e| !e.value().is_expired(now) && re.is_match(e.key()))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|k| self.entries.remove(k))
            .filter(|(_, e)| !e.is_expired(now))
            .count();
        Ok(removed as u64)
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.clear();
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_translation() {
        let re = glob_to_regex("products:*");
        assert!(re.is_match("products:all"));
        assert!(re.is_match("products:"));
        assert!(!re.is_match("product:all"));

        let re = glob_to_regex("a?c.d");
        assert!(re.is_match("abc.d"));
        assert!(!re.is_match("abcxd"));
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), Some(0)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test]
    async fn huge_ttl_is_kept_without_expiry() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), Some(u64::MAX)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn writes_sweep_expired_entries() {
        let cache = MemoryCache::new();
        for i in 0..PURGE_EVERY + 10 {
            cache.set(&format!("stale:{i}"), "x".into(), Some(0)).await.unwrap();
        }
        cache.set("fresh", "y".into(), None).await.unwrap();
        assert!(cache.len() <= 12, "len = {}", cache.len());
        assert!(cache.exists("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn keys_and_batch_delete() {
        let cache = MemoryCache::new();
        for key in ["products:1", "products:2", "users:1"] {
            cache.set(key, "x".into(), None).await.unwrap();
        }
        let mut keys = cache.keys("products:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["products:1", "products:2"]);
        assert_eq!(cache.delete_many(&keys).await.unwrap(), 2);
        assert!(cache.exists("users:1").await.unwrap());
        assert!(!cache.delete("products:1").await.unwrap());
    }
}
