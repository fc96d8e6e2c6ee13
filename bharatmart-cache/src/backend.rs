//! Storage contract shared by the Redis and in-process caches.

use async_trait::async_trait;

use crate::error::CacheResult;

/// Raw key/value store. Values are stored as text; JSON encoding is handled
/// by [`crate::CacheService`].
#[async_trait]
pub trait CacheBackend: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value`. With `ttl_secs` the entry expires after that many
    /// seconds, otherwise it lives until deleted.
    async fn set(&self, key: &str, value: String, ttl_secs: Option<u64>) -> CacheResult<()>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Keys matching a glob pattern (`*`, `?`).
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Remove many keys in one batch, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64>;

    async fn clear(&self) -> CacheResult<()>;

    async fn ping(&self) -> CacheResult<()>;
}
