use crate::types::*;
use chrono::DateTime;
use reqwest::Client;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::health::HealthTracker;

/// CoinGecko ids for the symbols the service supports
pub static COINGECKO_IDS: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "BTC" => "bitcoin",
    "ETH" => "ethereum",
    "SOL" => "solana",
    "BNB" => "binancecoin",
    "XRP" => "ripple",
    "ADA" => "cardano",
    "DOGE" => "dogecoin",
    "AVAX" => "avalanche-2",
    "DOT" => "polkadot",
    "LINK" => "chainlink",
};

/// CoinGecko API client for daily price series
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: tokio::sync::Semaphore,
    last_request: tokio::sync::Mutex<Instant>,
    /// Internal health tracking to avoid API calls in health()
    health_tracker: HealthTracker,
}

impl CoinGeckoClient {
    /// Free tier: ~10-30 calls/minute
    /// Pro tier: higher limits with API key
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        // Free tier: allow 1 concurrent request to stay under rate limit
        let permits = if api_key.is_some() { 5 } else { 1 };

        Self {
            client,
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key,
            rate_limiter: tokio::sync::Semaphore::new(permits),
            last_request: tokio::sync::Mutex::new(Instant::now() - Duration::from_secs(10)),
            health_tracker: HealthTracker::new(),
        }
    }

    /// Override the API base URL (tests point this at a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build request with optional API key
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut req = self.client.get(&url);

        if let Some(key) = &self.api_key {
            req = req.header("x-cg-pro-api-key", key);
        }

        req
    }

    /// Per-request timeout (10 seconds for individual API calls)
    const REQUEST_TIMEOUT_SECS: u64 = 10;

    /// Rate-limited request wrapper with per-request timeout and retry on 429
    async fn rate_limited_request<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T> {
        let request_start = Instant::now();

        // Try up to 2 times (initial + 1 retry on rate limit)
        for attempt in 0..2 {
            let _permit = self.rate_limiter.acquire().await.map_err(|e| {
                self.health_tracker.record_failure();
                MarketDataError::ApiError(e.to_string())
            })?;

            // Ensure minimum delay between requests (free tier friendly)
            {
                let mut last = self.last_request.lock().await;
                let elapsed = last.elapsed();
                if elapsed < Duration::from_millis(100) {
                    tokio::time::sleep(Duration::from_millis(100) - elapsed).await;
                }
                *last = Instant::now();
            }

            // Wrap request in explicit per-request timeout
            let request_future = self.build_request(endpoint).send();
            let response = match tokio::time::timeout(
                Duration::from_secs(Self::REQUEST_TIMEOUT_SECS),
                request_future,
            )
            .await
            {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) => {
                    self.health_tracker.record_failure();
                    return Err(MarketDataError::ApiError(e.to_string()));
                }
                Err(_) => {
                    self.health_tracker.record_failure();
                    return Err(MarketDataError::ApiError(format!(
                        "CoinGecko request to {} timed out after {}s",
                        endpoint,
                        Self::REQUEST_TIMEOUT_SECS
                    )));
                }
            };

            let status = response.status();

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());

                // If first attempt, wait and retry
                if attempt == 0 {
                    let wait_secs = retry_after.unwrap_or(60).min(120); // Cap at 2 minutes
                    tracing::warn!(
                        "CoinGecko rate limited, waiting {} seconds before retry",
                        wait_secs
                    );
                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    continue;
                }

                self.health_tracker.record_failure();
                return Err(MarketDataError::RateLimit {
                    source: "coingecko".to_string(),
                    retry_after,
                });
            }

            if !status.is_success() {
                self.health_tracker.record_failure();
                let text = response.text().await.unwrap_or_default();
                return Err(MarketDataError::ApiError(format!(
                    "CoinGecko API error ({}): {}",
                    status, text
                )));
            }

            // Success - record health metrics
            let latency_ms = request_start.elapsed().as_millis() as u64;
            self.health_tracker.record_success(latency_ms);

            return response.json::<T>().await.map_err(|e| {
                self.health_tracker.record_failure();
                MarketDataError::InvalidResponse(e.to_string())
            });
        }

        // Should not reach here, but fallback error
        Err(MarketDataError::ApiError(
            "Unexpected retry loop exit".to_string(),
        ))
    }

    /// Get CoinGecko ID for an asset symbol
    fn coin_id(&self, symbol: &str) -> Result<&'static str> {
        COINGECKO_IDS
            .get(symbol.to_uppercase().as_str())
            .copied()
            .ok_or_else(|| MarketDataError::AssetNotFound(symbol.to_string()))
    }

    /// Get daily candles for an asset.
    ///
    /// Uses `/coins/{id}/market_chart` with `interval=daily`, the one free
    /// endpoint that returns daily granularity together with volume, and
    /// synthesizes OHLC from consecutive daily closes (open = previous close,
    /// high/low = extremes of the pair). Returns fewer candles than requested
    /// when upstream history is short.
    pub async fn fetch_series(&self, symbol: &str, days: u32) -> Result<Vec<Candle>> {
        let coin_id = self.coin_id(symbol)?;

        let endpoint = format!(
            "/coins/{}/market_chart?vs_currency=usd&days={}&interval=daily",
            coin_id, days
        );

        let response: MarketChartResponse = self.rate_limited_request(&endpoint).await?;

        // total_volumes rows are [timestamp_ms, volume]; bucket by UTC day so
        // volume joins the price row for the same day regardless of exact ms
        let volumes: HashMap<i64, f64> = response
            .total_volumes
            .iter()
            .map(|row| (day_bucket(row[0]), row[1]))
            .collect();

        let mut candles = Vec::with_capacity(response.prices.len());
        let mut prev_close: Option<f64> = None;

        for row in &response.prices {
            let close = row[1];
            let Some(timestamp) = DateTime::from_timestamp_millis(row[0] as i64) else {
                continue;
            };

            let open = prev_close.unwrap_or(close);
            let (high, low) = (open.max(close), open.min(close));
            let volume = volumes.get(&day_bucket(row[0])).copied().unwrap_or(0.0);

            let (Ok(open), Ok(high), Ok(low), Ok(close_d), Ok(volume)) = (
                Decimal::try_from(open),
                Decimal::try_from(high),
                Decimal::try_from(low),
                Decimal::try_from(close),
                Decimal::try_from(volume),
            ) else {
                continue;
            };

            candles.push(Candle {
                asset: symbol.to_uppercase(),
                open,
                high,
                low,
                close: close_d,
                volume,
                timestamp,
            });
            prev_close = Some(close);
        }

        Ok(candles)
    }

    /// Get health status using internal metrics (no API call)
    pub async fn health(&self) -> SourceHealth {
        self.health_tracker.snapshot("coingecko")
    }

    /// Source name
    pub fn name(&self) -> &str {
        "coingecko"
    }
}

fn day_bucket(timestamp_ms: f64) -> i64 {
    (timestamp_ms as i64) / 86_400_000
}

// Response types for CoinGecko API
#[derive(Debug, serde::Deserialize)]
struct MarketChartResponse {
    prices: Vec<[f64; 2]>,
    total_volumes: Vec<[f64; 2]>,
}

#[async_trait::async_trait]
impl SeriesSource for CoinGeckoClient {
    async fn fetch_series(&self, symbol: &str, days: u32) -> Result<Vec<Candle>> {
        CoinGeckoClient::fetch_series(self, symbol, days).await
    }

    async fn health(&self) -> SourceHealth {
        CoinGeckoClient::health(self).await
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DAY_MS: u64 = 86_400_000;

    #[tokio::test]
    async fn synthesizes_daily_candles_with_volume() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "prices": [
                [DAY_MS, 100.0],
                [2 * DAY_MS, 110.0],
                [3 * DAY_MS, 105.0]
            ],
            "market_caps": [],
            "total_volumes": [
                [DAY_MS, 1000.0],
                [2 * DAY_MS, 2000.0],
                [3 * DAY_MS, 1500.0]
            ]
        });
        Mock::given(method("GET"))
            .and(path("/coins/bitcoin/market_chart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = CoinGeckoClient::new(None).with_base_url(server.uri());
        let candles = client.fetch_series("BTC", 3).await.unwrap();

        assert_eq!(candles.len(), 3);
        // First candle has no previous close; open equals close
        assert_eq!(candles[0].open, candles[0].close);
        // Second day opens at the first day's close
        assert_eq!(candles[1].open, Decimal::from(100));
        assert_eq!(candles[1].close, Decimal::from(110));
        assert_eq!(candles[1].volume, Decimal::from(2000));
        // Down day: high is the open, low is the close
        assert_eq!(candles[2].high, Decimal::from(110));
        assert_eq!(candles[2].low, Decimal::from(105));
        assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn unknown_symbol_is_rejected_without_a_request() {
        let client = CoinGeckoClient::new(None).with_base_url("http://127.0.0.1:9");
        let err = client.fetch_series("NOTACOIN", 30).await.unwrap_err();

        assert!(matches!(err, MarketDataError::AssetNotFound(_)));
    }

    #[tokio::test]
    async fn upstream_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/ethereum/market_chart"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream broke"))
            .mount(&server)
            .await;

        let client = CoinGeckoClient::new(None).with_base_url(server.uri());
        let err = client.fetch_series("ETH", 30).await.unwrap_err();

        assert!(matches!(err, MarketDataError::ApiError(_)));
        assert!(!client.health().await.is_healthy);
    }
}
