use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::backend::CacheBackend;
use crate::memory::MemoryCache;
use crate::redis_store::RedisCache;

/// How the cache is wired up at startup.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// `none`, `memory` or `redis`.
    pub kind: String,
    pub redis_url: Option<String>,
    pub default_ttl_secs: Option<u64>,
    pub op_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            kind: "none".to_owned(),
            redis_url: None,
            default_ttl_secs: None,
            op_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheHealth {
    Disabled,
    Connected,
    Unreachable,
}

impl std::fmt::Display for CacheHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disabled => "disabled",
            Self::Connected => "connected",
            Self::Unreachable => "unreachable",
        })
    }
}

/// JSON-aware cache facade. Never returns an error: an unconfigured or
/// unreachable store behaves as an always-empty cache.
#[derive(Debug, Clone, Default)]
pub struct CacheService {
    backend: Option<Arc<dyn CacheBackend>>,
    default_ttl_secs: Option<u64>,
}

impl CacheService {
    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn memory() -> Self {
        Self::with_backend(Arc::new(MemoryCache::new()))
    }

    pub fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
            default_ttl_secs: None,
        }
    }

    /// Build from settings. A bad Redis URL or unknown kind disables the
    /// cache instead of failing startup.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let backend: Option<Arc<dyn CacheBackend>> = match settings.kind.to_ascii_lowercase().as_str() {
            "" | "none" | "disabled" => None,
            "memory" => Some(Arc::new(MemoryCache::new())),
            "redis" => match settings.redis_url.as_deref() {
                Some(url) => match RedisCache::new(url, settings.op_timeout) {
                    Ok(cache) => Some(Arc::new(cache)),
                    Err(err) => {
                        warn!(error = %err, "invalid redis cache url; caching disabled");
                        None
                    }
                },
                None => {
                    warn!("redis cache selected without a url; caching disabled");
                    None
                }
            },
            other => {
                warn!(kind = other, "unknown cache type; caching disabled");
                None
            }
        };
        match &backend {
            Some(b) => info!(backend = b.name(), "cache enabled"),
            None => info!("cache disabled"),
        }
        Self {
            backend,
            default_ttl_secs: settings.default_ttl_secs,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// TTL applied by callers that do not pick their own.
    #[inline]
    pub fn default_ttl(&self) -> Option<u64> {
        self.default_ttl_secs
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map_or("none", |b| b.name())
    }

    /// Stored text that parses as JSON comes back as that JSON, anything
    /// else as a JSON string.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let backend = self.backend.as_ref()?;
        match backend.get(key).await {
            Ok(raw) => raw.map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw))),
            Err(err) => {
                warn!(key, error = %err, "cache get failed");
                None
            }
        }
    }

    /// Strings are stored as-is, other values as serialized JSON.
    pub async fn set(&self, key: &str, value: &Value, ttl_secs: Option<u64>) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        let raw = match value {
            Value::String(s) => s.clone(),
            other => match serde_json::to_string(other) {
                Ok(s) => s,
                Err(err) => {
                    warn!(key, error = %err, "cache value not serializable");
                    return false;
                }
            },
        };
        match backend.set(key, raw, ttl_secs).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key, error = %err, "cache set failed");
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        backend.delete(key).await.unwrap_or_else(|err| {
            warn!(key, error = %err, "cache delete failed");
            false
        })
    }

    pub async fn exists(&self, key: &str) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        backend.exists(key).await.unwrap_or_else(|err| {
            warn!(key, error = %err, "cache exists failed");
            false
        })
    }

    /// Delete every key matching `pattern`. Keys written between the lookup
    /// and the delete survive.
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        let Some(backend) = self.backend.as_ref() else {
            return 0;
        };
        let keys = match backend.keys(pattern).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(pattern, error = %err, "cache key scan failed");
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }
        backend.delete_many(&keys).await.unwrap_or_else(|err| {
            warn!(pattern, error = %err, "cache invalidation failed");
            0
        })
    }

    pub async fn clear(&self) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        match backend.clear().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "cache clear failed");
                false
            }
        }
    }

    pub async fn health(&self) -> CacheHealth {
        let Some(backend) = self.backend.as_ref() else {
            return CacheHealth::Disabled;
        };
        match backend.ping().await {
            Ok(()) => CacheHealth::Connected,
            Err(err) => {
                warn!(backend = backend.name(), error = %err, "cache unreachable");
                CacheHealth::Unreachable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn disabled_cache_is_a_silent_miss() {
        let cache = CacheService::disabled();
        assert!(!cache.set("k", &json!({"a": 1}), Some(60)).await);
        assert_eq!(cache.get("k").await, None);
        assert!(!cache.delete("k").await);
        assert!(!cache.exists("k").await);
        assert_eq!(cache.invalidate_pattern("*").await, 0);
        assert_eq!(cache.health().await, CacheHealth::Disabled);
    }

    #[tokio::test]
    async fn values_round_trip_as_json_or_raw_strings() {
        let cache = CacheService::memory();
        let products = json!([{"id": "p1", "price": 50.0}]);
        assert!(cache.set("products:all", &products, None).await);
        assert_eq!(cache.get("products:all").await, Some(products));

        assert!(cache.set("greeting", &json!("namaste"), None).await);
        assert_eq!(cache.get("greeting").await, Some(json!("namaste")));
        assert!(cache.exists("greeting").await);
        assert_eq!(cache.health().await, CacheHealth::Connected);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = CacheService::memory();
        assert!(cache.set("short", &json!(1), Some(1)).await);
        assert_eq!(cache.get("short").await, Some(json!(1)));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("short").await, None);
    }

    #[tokio::test]
    async fn oversized_ttl_does_not_panic() {
        let cache = CacheService::memory();
        assert!(cache.set("k", &json!(1), Some(u64::MAX)).await);
        assert_eq!(cache.get("k").await, Some(json!(1)));
    }

    #[tokio::test]
    async fn invalidate_pattern_counts_deleted_keys() {
        let cache = CacheService::memory();
        cache.set("products:a", &json!(1), None).await;
        cache.set("products:b", &json!(2), None).await;
        cache.set("orders:a", &json!(3), None).await;
        assert_eq!(cache.invalidate_pattern("products:*").await, 2);
        assert_eq!(cache.get("orders:a").await, Some(json!(3)));
        assert!(cache.clear().await);
        assert_eq!(cache.get("orders:a").await, None);
    }

    #[tokio::test]
    async fn unreachable_redis_degrades_to_no_op() {
        let cache = CacheService::from_settings(&CacheSettings {
            kind: "redis".into(),
            redis_url: Some("redis://127.0.0.1:1".into()),
            default_ttl_secs: Some(30),
            op_timeout: Duration::from_millis(200),
        });
        assert!(cache.is_enabled());
        assert!(!cache.set("k", &json!(1), None).await);
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.invalidate_pattern("*").await, 0);
        assert_eq!(cache.health().await, CacheHealth::Unreachable);
    }

    #[test]
    fn unknown_kind_disables_cache() {
        let cache = CacheService::from_settings(&CacheSettings {
            kind: "memcached".into(),
            ..Default::default()
        });
        assert!(!cache.is_enabled());
        assert_eq!(cache.backend_name(), "none");
    }
}
