//! Caching layer for market data to reduce API calls

use cached::{Cached, TimedCache};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key for market data requests
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Ticker symbol
    pub symbol: String,
    /// API endpoint or operation type
    pub endpoint: &'static str,
    /// Request parameters that change the answer
    pub params: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(symbol: impl Into<String>, endpoint: &'static str, params: impl ToString) -> Self {
        Self {
            symbol: symbol.into(),
            endpoint,
            params: params.to_string(),
        }
    }
}

/// Thread-safe TTL cache shared between clones
pub struct MarketCache<V> {
    cache: Arc<RwLock<TimedCache<CacheKey, V>>>,
}

impl<V: Clone> MarketCache<V> {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        // TimedCache evicts expired entries on read, so reads need the write lock.
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    /// Insert a value into the cache
    pub async fn insert(&self, key: CacheKey, value: V) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Get or fetch a value using the provided fetcher function
    ///
    /// Errors from the fetcher are returned as-is and nothing is cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(symbol = %key.symbol, endpoint = key.endpoint, "cache hit");
            return Ok(value);
        }

        tracing::debug!(symbol = %key.symbol, endpoint = key.endpoint, "cache miss");

        let value = fetcher().await?;
        self.insert(key, value.clone()).await;

        Ok(value)
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V> std::fmt::Debug for MarketCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketCache").finish_non_exhaustive()
    }
}

impl<V> Clone for MarketCache<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_creation() {
        let key = CacheKey::new("AAPL", "history", 180);
        assert_eq!(key.symbol, "AAPL");
        assert_eq!(key.endpoint, "history");
        assert_eq!(key.params, "180");
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = MarketCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AAPL", "history", 30);

        cache.insert(key.clone(), vec![150.0, 151.0]).await;

        assert_eq!(cache.get(&key).await, Some(vec![150.0, 151.0]));
    }

    #[tokio::test]
    async fn test_cache_get_or_fetch() {
        let cache = MarketCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AAPL", "history", 30);

        let mut call_count = 0;
        let result = cache
            .get_or_fetch(key.clone(), || {
                call_count += 1;
                async { Ok::<_, String>(42.0) }
            })
            .await
            .unwrap();
        assert_eq!(result, 42.0);
        assert_eq!(call_count, 1);

        // Second call should use cache
        let result = cache
            .get_or_fetch(key.clone(), || {
                call_count += 1;
                async { Ok::<_, String>(0.0) }
            })
            .await
            .unwrap();
        assert_eq!(result, 42.0);
        assert_eq!(call_count, 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let cache: MarketCache<f64> = MarketCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AAPL", "history", 30);

        let result = cache
            .get_or_fetch(key.clone(), || async { Err::<f64, _>("timeout") })
            .await;
        assert_eq!(result, Err("timeout"));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_keys_differ_by_params() {
        let cache = MarketCache::new(Duration::from_secs(60));
        cache.insert(CacheKey::new("AAPL", "history", 30), 1).await;
        cache.insert(CacheKey::new("AAPL", "history", 180), 2).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get(&CacheKey::new("AAPL", "history", 180)).await, Some(2));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MarketCache::new(Duration::from_millis(10));
        let key = CacheKey::new("AAPL", "history", 30);
        cache.insert(key.clone(), 1).await;
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(cache.get(&key).await, None);
    }
}
