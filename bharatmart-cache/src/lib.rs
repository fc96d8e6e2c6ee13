//! Key/value cache with graceful degradation.
//!
//! [`CacheService`] fronts either Redis or an in-process map. When no store
//! is configured, or the store stops answering, every call turns into a
//! miss or a `false` and the rest of the application keeps working.

mod backend;
mod error;
mod memory;
mod redis_store;
mod service;

pub use backend::CacheBackend;
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use redis_store::{RedisCache, DEFAULT_KEY_PREFIX};
pub use service::{CacheHealth, CacheService, CacheSettings};
