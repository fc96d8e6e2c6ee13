//! Redis cache backend.
//!
//! One multiplexed connection is opened lazily and shared; it is dropped and
//! re-established after a connection-level failure so the cache recovers on
//! its own once Redis comes back.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::CacheBackend;
use crate::error::{CacheError, CacheResult};

pub const DEFAULT_KEY_PREFIX: &str = "bharatmart:cache:";

pub struct RedisCache {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    prefix: String,
    timeout: Duration,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Parse the URL without connecting.
    pub fn new(url: &str, timeout: Duration) -> CacheResult<Self> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            prefix: DEFAULT_KEY_PREFIX.to_owned(),
            timeout,
        })
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[inline]
    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    async fn connection(&self) -> CacheResult<MultiplexedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = tokio::time::timeout(self.timeout, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError::Timeout(self.timeout_ms()))??;
        debug!(prefix = %self.prefix, "redis cache connected");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        self.conn.lock().await.take();
    }

    async fn run<T, F, Fut>(&self, op: F) -> CacheResult<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection().await?;
        match tokio::time::timeout(self.timeout, op(conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                let err = CacheError::from(err);
                if matches!(err, CacheError::Connection(_)) {
                    self.reset().await;
                }
                Err(err)
            }
            Err(_) => {
                self.reset().await;
                Err(CacheError::Timeout(self.timeout_ms()))
            }
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.key(key);
        self.run(|mut conn| async move {
            let value: Option<String> = conn.get(&key).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: String, ttl_secs: Option<u64>) -> CacheResult<()> {
        let key = self.key(key);
        self.run(|mut conn| async move {
            match ttl_secs {
                // SETEX rejects a zero expiry; an already-expired entry is a delete.
                Some(0) => {
                    let _: usize = conn.del(&key).await?;
                }
                Some(secs) => {
                    let _: () = conn.set_ex(&key, value, secs).await?;
                }
                None => {
                    let _: () = conn.set(&key, value).await?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let key = self.key(key);
        self.run(|mut conn| async move {
            let removed: usize = conn.del(&key).await?;
            Ok(removed > 0)
        })
        .await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let key = self.key(key);
        self.run(|mut conn| async move {
            let found: bool = conn.exists(&key).await?;
            Ok(found)
        })
        .await
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let pattern = self.key(pattern);
        let prefix_len = self.prefix.len();
        self.run(|mut conn| async move {
            let keys: Vec<String> = conn.keys(&pattern).await?;
            Ok(keys
                .into_iter()
                .map(|k| k.get(prefix_len..).unwrap_or_default().to_owned())
                .collect())
        })
        .await
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        self.run(|mut conn| async move {
            let removed: u64 = conn.del(&keys).await?;
            Ok(removed)
        })
        .await
    }

    /// Only keys under this cache's prefix are removed; queue data sharing
    /// the same Redis database is left alone.
    async fn clear(&self) -> CacheResult<()> {
        let keys = self.keys("*").await?;
        self.delete_many(&keys).await.map(|_| ())
    }

    async fn ping(&self) -> CacheResult<()> {
        self.run(|mut conn| async move {
            let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}
