//! Cache backend factory

use std::sync::Arc;

use crate::config::CacheSettings;

use super::memory_backend::MemoryCacheBackend;
use super::redis_backend::RedisCacheBackend;
use super::CacheBackend;

/// Create a cache backend based on configuration.
///
/// Returns the appropriate backend implementation based on the `backend`
/// setting:
/// - `"redis"`: Returns a `RedisCacheBackend` if a URL is configured and
///   reachable
/// - `"memory"` (default): Returns a `MemoryCacheBackend`
///
/// A redis backend that cannot be created falls back to memory — the cache
/// is advisory and must never prevent startup.
pub async fn create_cache_backend(settings: &CacheSettings) -> Arc<dyn CacheBackend> {
    match settings.backend.as_str() {
        "redis" => match &settings.url {
            Some(url) => match RedisCacheBackend::connect(url).await {
                Ok(backend) => {
                    tracing::info!(backend = "redis", "Creating Redis cache backend");
                    Arc::new(backend)
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Redis cache unavailable, falling back to memory"
                    );
                    Arc::new(MemoryCacheBackend::new())
                }
            },
            None => {
                tracing::warn!("Redis backend requested but no URL provided, falling back to memory");
                Arc::new(MemoryCacheBackend::new())
            }
        },
        _ => {
            tracing::info!(backend = "memory", "Creating memory cache backend");
            Arc::new(MemoryCacheBackend::new())
        }
    }
}
