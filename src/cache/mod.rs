//! Cache-aside store for recipient and template lookups.
//!
//! The cache is a best-effort accelerator: backend failures are swallowed and
//! surface as misses, never as pipeline errors. Entries are advisory — absence
//! only forces a remote fetch.
//!
//! Use `create_cache_backend()` to create the appropriate backend based on
//! configuration.

mod factory;
mod memory_backend;
mod redis_backend;

use std::time::Duration;

use async_trait::async_trait;

pub use factory::create_cache_backend;
pub use memory_backend::MemoryCacheBackend;
pub use redis_backend::RedisCacheBackend;

/// Key-value store with optional per-entry TTL.
///
/// Implementations must tolerate concurrent `get`/`set` on the same key;
/// last write wins.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up a key. Returns `None` on a miss, an expired entry, or any
    /// backend failure.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value, optionally bounded by a TTL. Backend failures are
    /// logged and dropped.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>);

    /// Backend identifier for logs and stats.
    fn backend_type(&self) -> &'static str;
}
