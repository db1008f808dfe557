//! Template resolution with cache-aside and breaker protection.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::cache::CacheBackend;
use crate::error::{DispatchError, Result};
use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
use crate::upstream::{Template, TemplateSource};

use super::map_breaker_error;

const CACHE_ENTITY: &str = "template";

/// Resolves template bodies, caching them to bound template-service traffic.
pub struct TemplateResolver {
    cache: Arc<dyn CacheBackend>,
    breaker: CircuitBreaker,
    source: Arc<dyn TemplateSource>,
    ttl: Duration,
}

impl TemplateResolver {
    pub fn new(
        cache: Arc<dyn CacheBackend>,
        breaker: CircuitBreaker,
        source: Arc<dyn TemplateSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            breaker,
            source,
            ttl,
        }
    }

    /// Resolve a template by id.
    ///
    /// A fetch that succeeds at the transport level but carries an empty body
    /// fails with `TemplateContentMissing` — that is an upstream
    /// data-integrity problem, not a transient condition, and the entry is
    /// never cached.
    pub async fn resolve(&self, template_id: &str) -> Result<Template> {
        let cache_key = format!("template:{}", template_id);

        if let Some(body) = self.cache.get(&cache_key).await {
            CACHE_HITS_TOTAL.with_label_values(&[CACHE_ENTITY]).inc();
            tracing::debug!(cache_key = %cache_key, "Cache hit");
            return Ok(Template {
                id: template_id.to_string(),
                body,
            });
        }

        CACHE_MISSES_TOTAL.with_label_values(&[CACHE_ENTITY]).inc();
        tracing::debug!(cache_key = %cache_key, "Cache miss");

        let template = self
            .breaker
            .call(|| self.source.fetch_template(template_id))
            .await
            .map_err(|e| map_breaker_error(&self.breaker, e))?;

        if template.body.is_empty() {
            return Err(DispatchError::TemplateContentMissing {
                template_id: template_id.to_string(),
            });
        }

        self.cache
            .set(&cache_key, &template.body, Some(self.ttl))
            .await;

        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerConfig;
    use crate::cache::MemoryCacheBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedSource {
        body: String,
        calls: AtomicU32,
    }

    impl FixedSource {
        fn new(body: &str) -> Self {
            Self {
                body: body.to_string(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TemplateSource for FixedSource {
        async fn fetch_template(&self, template_id: &str) -> Result<Template> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Template {
                id: template_id.to_string(),
                body: self.body.clone(),
            })
        }
    }

    fn resolver_with(source: Arc<FixedSource>) -> TemplateResolver {
        TemplateResolver::new(
            Arc::new(MemoryCacheBackend::new()),
            CircuitBreaker::new("template-lookup", BreakerConfig::default()),
            source,
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn test_second_resolve_is_served_from_cache() {
        let source = Arc::new(FixedSource::new("Hi {{name}}"));
        let resolver = resolver_with(source.clone());

        let first = resolver.resolve("t1").await.unwrap();
        let second = resolver.resolve("t1").await.unwrap();

        assert_eq!(first.body, "Hi {{name}}");
        assert_eq!(first.body, second.body);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_body_is_content_missing() {
        let source = Arc::new(FixedSource::new(""));
        let resolver = resolver_with(source.clone());

        let result = resolver.resolve("t1").await;
        assert!(matches!(
            result,
            Err(DispatchError::TemplateContentMissing { .. })
        ));

        // The empty body must not be cached; a later resolve retries upstream
        let _ = resolver.resolve("t1").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
