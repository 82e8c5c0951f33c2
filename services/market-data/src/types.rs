use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Daily OHLCV candle for the reference asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub asset: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Where a served series came from, relative to the cache TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Fetched from the upstream API on this request
    Live,
    /// Served from cache within the TTL
    Cached,
    /// Cache TTL expired and the refetch failed; stale data served
    Stale,
}

/// A price series plus how fresh it is
#[derive(Debug, Clone, Serialize)]
pub struct SeriesFetch {
    pub candles: Vec<Candle>,
    pub freshness: Freshness,
}

impl SeriesFetch {
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }
}

/// Prediction market parsed into a strict shape at the API boundary.
///
/// Upstream encodes `outcomes` and `outcomePrices` as JSON strings inside
/// JSON; this type only exists after that parse has succeeded, so downstream
/// consumers never see the double-encoded form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMarket {
    pub slug: String,
    pub question: String,
    /// Outcome labels, index-aligned with `prices`
    pub outcomes: Vec<String>,
    /// Outcome probabilities in [0,1], index-aligned with `outcomes`
    pub prices: Vec<f64>,
    pub fetched_at: DateTime<Utc>,
}

impl NormalizedMarket {
    /// Price for the outcome at `idx`, if both sides of the pair exist
    pub fn price_at(&self, idx: usize) -> Option<f64> {
        self.prices.get(idx).copied()
    }
}

/// Data source health/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source: String,
    pub is_healthy: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
}

/// Error types for market data retrieval
#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded for {source}")]
    RateLimit {
        source: String,
        retry_after: Option<u64>,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Malformed market payload for {slug}: {reason}")]
    MarketMalformed { slug: String, reason: String },

    #[error("No data available: {0}")]
    DataUnavailable(String),

    #[error("Cache error: {0}")]
    CacheError(String),
}

/// Result type for market data operations
pub type Result<T> = std::result::Result<T, MarketDataError>;

/// Trait for daily price series sources
#[async_trait::async_trait]
pub trait SeriesSource: Send + Sync {
    /// Fetch up to `days` daily candles, ascending by timestamp.
    /// May return fewer candles than requested if upstream history is short.
    async fn fetch_series(&self, symbol: &str, days: u32) -> Result<Vec<Candle>>;

    /// Get source health status
    async fn health(&self) -> SourceHealth;

    /// Source name
    fn name(&self) -> &str;
}

/// Trait for prediction market sources
#[async_trait::async_trait]
pub trait MarketSource: Send + Sync {
    /// Fetch a market by its slug. `Ok(None)` means the slug does not exist,
    /// which is distinct from a present-but-malformed market (an error).
    async fn fetch_market(&self, slug: &str) -> Result<Option<NormalizedMarket>>;

    /// Get source health status
    async fn health(&self) -> SourceHealth;

    /// Source name
    fn name(&self) -> &str;
}
