// Series caching: in-memory with stale retention, plus an optional Redis mirror
use crate::types::*;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CacheEntry {
    candles: Vec<Candle>,
    stored_at: Instant,
}

/// In-memory series cache.
///
/// Entries are deliberately kept past their TTL: an expired entry is invisible
/// to `get_fresh` but still reachable via `get_any`, which is what lets the
/// provider serve stale data when a refetch fails instead of serving nothing.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    /// Get a series if it is within the TTL
    pub async fn get_fresh(&self, key: &str, ttl: Duration) -> Option<Vec<Candle>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < ttl)
            .map(|e| e.candles.clone())
    }

    /// Get a series regardless of age, along with how old it is
    pub async fn get_any(&self, key: &str) -> Option<(Vec<Candle>, Duration)> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|e| (e.candles.clone(), e.stored_at.elapsed()))
    }

    pub async fn insert(&self, key: &str, candles: Vec<Candle>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                candles,
                stored_at: Instant::now(),
            },
        );

        // Evict oldest entries when over capacity
        while entries.len() > self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                    tracing::debug!("Series cache evicted {}", k);
                }
                None => break,
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Redis mirror for cached series. Used as a warm-start copy shared across
/// restarts, never as the load-bearing cache.
pub struct RedisCache {
    client: redis::aio::MultiplexedConnection,
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;

        Ok(Self { client: conn })
    }

    /// Get a mirrored series
    pub async fn get_series(&self, key: &str) -> anyhow::Result<Option<Vec<Candle>>> {
        let value: Option<String> = self.client.clone().get(format!("series:{}", key)).await?;

        match value {
            Some(json) => {
                let candles: Vec<Candle> = serde_json::from_str(&json)?;
                Ok(Some(candles))
            }
            None => Ok(None),
        }
    }

    /// Mirror a series with a TTL
    pub async fn set_series(
        &self,
        key: &str,
        candles: &[Candle],
        ttl_secs: u64,
    ) -> anyhow::Result<()> {
        let json = serde_json::to_string(candles)?;

        // Explicit type annotation to avoid never type fallback
        let _: () = self
            .client
            .clone()
            .set_ex(format!("series:{}", key), json, ttl_secs)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                asset: "BTC".to_string(),
                open: Decimal::from(100),
                high: Decimal::from(110),
                low: Decimal::from(90),
                close: Decimal::from(100 + i as i64),
                volume: Decimal::from(1000),
                timestamp: Utc::now(),
            })
            .collect()
    }

    #[tokio::test]
    async fn fresh_entry_visible_to_both_lookups() {
        let cache = MemoryCache::new(16);
        cache.insert("BTC:365", candles(3)).await;

        let fresh = cache.get_fresh("BTC:365", Duration::from_secs(300)).await;
        assert!(fresh.is_some());
        assert_eq!(fresh.map(|c| c.len()), Some(3));
        assert!(cache.get_any("BTC:365").await.is_some());
    }

    #[tokio::test]
    async fn expired_entry_only_visible_to_get_any() {
        let cache = MemoryCache::new(16);
        cache.insert("BTC:365", candles(3)).await;

        // A zero TTL makes every entry expired without sleeping
        assert!(cache.get_fresh("BTC:365", Duration::ZERO).await.is_none());

        let stale = cache.get_any("BTC:365").await;
        assert!(stale.is_some());
    }

    #[tokio::test]
    async fn capacity_is_bounded() {
        let cache = MemoryCache::new(2);
        cache.insert("a", candles(1)).await;
        cache.insert("b", candles(1)).await;
        cache.insert("c", candles(1)).await;

        assert_eq!(cache.len().await, 2);
    }
}
