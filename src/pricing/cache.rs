use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::PricingPort;

/// Keyed cache with a fixed time-to-live and a capacity bound. When full,
/// expired entries are purged first, then the oldest entry is evicted.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, (V, Instant)>>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, stored_at)) if stored_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, (_, stored_at))| *stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(key, (value, Instant::now()));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Wraps a pricing port with a shared TTL cache. Only known prices are cached.
pub struct CachedPricing {
    inner: Arc<dyn PricingPort>,
    cache: TtlCache<String, BigDecimal>,
}

impl CachedPricing {
    pub fn new(inner: Arc<dyn PricingPort>, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl, capacity),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl PricingPort for CachedPricing {
    async fn usd_price(&self, symbol: &str) -> Option<BigDecimal> {
        let key = symbol.to_ascii_uppercase();
        if let Some(price) = self.cache.get(&key).await {
            return Some(price);
        }
        let price = self.inner.usd_price(&key).await?;
        self.cache.insert(key, price.clone()).await;
        Some(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingPricing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PricingPort for CountingPricing {
        async fn usd_price(&self, symbol: &str) -> Option<BigDecimal> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (symbol == "BTC").then(|| BigDecimal::from(60_000))
        }
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = TtlCache::new(Duration::from_millis(30), 10);
        cache.insert("a", 1).await;
        assert_eq!(cache.get(&"a").await, Some(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get(&"a").await, None);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a", 1).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.insert("b", 2).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.insert("c", 3).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get(&"a").await, None);
        assert_eq!(cache.get(&"c").await, Some(3));
    }

    #[tokio::test]
    async fn test_cached_pricing_hits_inner_once() {
        let inner = Arc::new(CountingPricing {
            calls: AtomicUsize::new(0),
        });
        let pricing = CachedPricing::new(inner.clone(), Duration::from_secs(60), 16);

        assert_eq!(pricing.usd_price("btc").await, Some(BigDecimal::from(60_000)));
        assert_eq!(pricing.usd_price("BTC").await, Some(BigDecimal::from(60_000)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        assert_eq!(pricing.usd_price("XYZ").await, None);
        assert_eq!(pricing.usd_price("XYZ").await, None);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }
}
