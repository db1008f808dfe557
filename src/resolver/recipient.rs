//! Recipient resolution with cache-aside and breaker protection.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::cache::CacheBackend;
use crate::error::Result;
use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
use crate::upstream::{Recipient, RecipientDirectory};

use super::map_breaker_error;

const CACHE_ENTITY: &str = "recipient";

/// Resolves recipient records, caching them to bound directory traffic.
pub struct RecipientResolver {
    cache: Arc<dyn CacheBackend>,
    breaker: CircuitBreaker,
    directory: Arc<dyn RecipientDirectory>,
    ttl: Duration,
}

impl RecipientResolver {
    pub fn new(
        cache: Arc<dyn CacheBackend>,
        breaker: CircuitBreaker,
        directory: Arc<dyn RecipientDirectory>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            breaker,
            directory,
            ttl,
        }
    }

    /// Resolve a recipient by id.
    ///
    /// A failure here halts the job — a missing recipient is never silently
    /// skipped.
    pub async fn resolve(&self, recipient_id: &str) -> Result<Recipient> {
        let cache_key = format!("recipient:{}", recipient_id);

        if let Some(raw) = self.cache.get(&cache_key).await {
            match serde_json::from_str::<Recipient>(&raw) {
                Ok(recipient) => {
                    CACHE_HITS_TOTAL.with_label_values(&[CACHE_ENTITY]).inc();
                    tracing::debug!(cache_key = %cache_key, "Cache hit");
                    return Ok(recipient);
                }
                Err(e) => {
                    tracing::warn!(
                        cache_key = %cache_key,
                        error = %e,
                        "Corrupt cached recipient, refetching"
                    );
                }
            }
        }

        CACHE_MISSES_TOTAL.with_label_values(&[CACHE_ENTITY]).inc();
        tracing::debug!(cache_key = %cache_key, "Cache miss");

        let recipient = self
            .breaker
            .call(|| self.directory.fetch_recipient(recipient_id))
            .await
            .map_err(|e| map_breaker_error(&self.breaker, e))?;

        match serde_json::to_string(&recipient) {
            Ok(raw) => self.cache.set(&cache_key, &raw, Some(self.ttl)).await,
            Err(e) => tracing::warn!(error = %e, "Failed to serialize recipient for cache"),
        }

        Ok(recipient)
    }
}
