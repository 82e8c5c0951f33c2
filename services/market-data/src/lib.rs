pub mod types;
pub mod sources {
    pub(crate) mod health;
    pub mod coingecko;
    pub mod polymarket;
}
pub mod cache;
pub mod normalizers;

pub use sources::coingecko::CoinGeckoClient;
pub use sources::polymarket::GammaClient;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Maximum number of cached series (prevent unbounded growth)
const MAX_CACHE_ENTRIES: usize = 64;
/// Series TTL in seconds (series older than this are refetched)
pub const SERIES_TTL_SECONDS: u64 = 300; // 5 minutes
/// Redis mirror TTL; long enough to warm-start a restarted service
const REDIS_MIRROR_TTL_SECONDS: u64 = 86_400;

/// Price series provider: fetch-through cache over a `SeriesSource`.
///
/// Serving order: fresh cache, then upstream, then stale cache. A failed
/// refetch never surfaces as an error while any cached copy exists; the
/// caller sees `Freshness::Stale` instead and decides how to degrade.
pub struct SeriesProvider {
    source: Arc<dyn SeriesSource>,
    cache: cache::MemoryCache,
    redis: Option<cache::RedisCache>,
    ttl: Duration,
}

impl SeriesProvider {
    pub fn new(source: Arc<dyn SeriesSource>) -> Self {
        Self {
            source,
            cache: cache::MemoryCache::new(MAX_CACHE_ENTRIES),
            redis: None,
            ttl: Duration::from_secs(SERIES_TTL_SECONDS),
        }
    }

    pub fn with_redis(mut self, redis: cache::RedisCache) -> Self {
        self.redis = Some(redis);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Get the daily series for `symbol`, up to `days` candles
    pub async fn series(&self, symbol: &str, days: u32) -> Result<SeriesFetch> {
        let key = format!("{}:{}", symbol.to_uppercase(), days);

        if let Some(candles) = self.cache.get_fresh(&key, self.ttl).await {
            return Ok(SeriesFetch {
                candles,
                freshness: Freshness::Cached,
            });
        }

        match self.source.fetch_series(symbol, days).await {
            Ok(raw) => {
                let candles = normalizers::normalize_series(raw);
                if candles.is_empty() {
                    warn!(
                        "{} returned an empty series for {}",
                        self.source.name(),
                        symbol
                    );
                    return self.stale_fallback(&key, symbol).await;
                }

                self.cache.insert(&key, candles.clone()).await;
                if let Some(ref redis) = self.redis {
                    if let Err(e) = redis
                        .set_series(&key, &candles, REDIS_MIRROR_TTL_SECONDS)
                        .await
                    {
                        warn!("Redis mirror write failed: {}", e);
                    }
                }

                Ok(SeriesFetch {
                    candles,
                    freshness: Freshness::Live,
                })
            }
            Err(e) => {
                warn!("Series fetch for {} failed: {}", symbol, e);
                self.stale_fallback(&key, symbol).await
            }
        }
    }

    /// Serve whatever cached copy exists, however old. Only when nothing is
    /// cached anywhere does the caller get `DataUnavailable`.
    async fn stale_fallback(&self, key: &str, symbol: &str) -> Result<SeriesFetch> {
        if let Some((candles, age)) = self.cache.get_any(key).await {
            warn!(
                "Serving stale series for {} ({}s past fetch)",
                symbol,
                age.as_secs()
            );
            return Ok(SeriesFetch {
                candles,
                freshness: Freshness::Stale,
            });
        }

        if let Some(ref redis) = self.redis {
            match redis.get_series(key).await {
                Ok(Some(candles)) => {
                    warn!("Serving Redis-mirrored series for {}", symbol);
                    return Ok(SeriesFetch {
                        candles,
                        freshness: Freshness::Stale,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!("Redis mirror read failed: {}", e),
            }
        }

        Err(MarketDataError::DataUnavailable(format!(
            "no series for {} and no cached copy",
            symbol
        )))
    }

    pub async fn health(&self) -> SourceHealth {
        self.source.health().await
    }
}
