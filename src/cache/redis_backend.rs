//! Redis cache backend.
//!
//! Uses a multiplexed `ConnectionManager` that reconnects on its own. Every
//! Redis failure is logged and reported as a miss so that an unavailable
//! cache degrades to remote fetches instead of failing jobs.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

use super::CacheBackend;

/// Redis-backed cache.
pub struct RedisCacheBackend {
    connection: ConnectionManager,
}

impl RedisCacheBackend {
    /// Connect to Redis at the given URL.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let connection = client.get_connection_manager().await?;
        tracing::info!("Redis cache connection established");

        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.connection.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Redis GET failed, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let mut conn = self.connection.clone();
        let result: Result<(), RedisError> = match ttl {
            Some(ttl) => conn.set_ex(key, value, ttl.as_secs().max(1)).await,
            None => conn.set(key, value).await,
        };

        if let Err(e) = result {
            tracing::warn!(key = %key, error = %e, "Redis SET failed, entry dropped");
        }
    }

    fn backend_type(&self) -> &'static str {
        "redis"
    }
}
