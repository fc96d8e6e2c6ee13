//! Error types for cache backends.
//!
//! These never leave the crate through [`crate::CacheService`]; the service
//! turns every failure into a miss and a warning.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store connection failed: {0}")]
    Connection(String),

    #[error("cache command failed: {0}")]
    Command(String),

    #[error("cache operation timed out after {0} ms")]
    Timeout(u64),

    #[error("failed to serialize cache value: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
