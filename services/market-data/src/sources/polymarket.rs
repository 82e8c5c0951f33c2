use crate::types::*;
use chrono::Utc;
use reqwest::Client;
use std::time::{Duration, Instant};

use super::health::HealthTracker;

/// Polymarket Gamma API client.
///
/// Gamma double-encodes `outcomes` and `outcomePrices` as JSON strings inside
/// the market object. This client is the single place that parse happens;
/// everything downstream consumes the strict `NormalizedMarket` shape.
pub struct GammaClient {
    client: Client,
    base_url: String,
    health_tracker: HealthTracker,
}

impl GammaClient {
    const REQUEST_TIMEOUT_SECS: u64 = 15;

    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(Self::REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: "https://gamma-api.polymarket.com".to_string(),
            health_tracker: HealthTracker::new(),
        }
    }

    /// Override the API base URL (tests point this at a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch a market by slug. `Ok(None)` means the slug does not exist.
    pub async fn fetch_market(&self, slug: &str) -> Result<Option<NormalizedMarket>> {
        let url = format!("{}/markets?slug={}", self.base_url, slug);
        let started = Instant::now();

        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.health_tracker.record_failure();
                return Err(MarketDataError::ApiError(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.health_tracker.record_failure();
            let text = response.text().await.unwrap_or_default();
            return Err(MarketDataError::ApiError(format!(
                "Gamma API error ({}): {}",
                status, text
            )));
        }

        // Gamma answers slug queries with an array; an empty array is "not found"
        let raw: Vec<GammaMarket> = match response.json().await {
            Ok(markets) => markets,
            Err(e) => {
                self.health_tracker.record_failure();
                return Err(MarketDataError::InvalidResponse(e.to_string()));
            }
        };

        self.health_tracker
            .record_success(started.elapsed().as_millis() as u64);

        let Some(market) = raw.into_iter().next() else {
            return Ok(None);
        };

        market.normalize(slug).map(Some)
    }

    /// Get health status using internal metrics (no API call)
    pub async fn health(&self) -> SourceHealth {
        self.health_tracker.snapshot("polymarket")
    }

    /// Source name
    pub fn name(&self) -> &str {
        "polymarket"
    }
}

impl Default for GammaClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw Gamma market shape. Everything is optional because upstream omits
/// fields freely; `normalize` decides what is actually required.
#[derive(Debug, serde::Deserialize)]
struct GammaMarket {
    #[serde(default)]
    question: Option<String>,
    /// JSON-encoded array of outcome labels, e.g. `"[\"Yes\", \"No\"]"`
    #[serde(default)]
    outcomes: Option<String>,
    /// JSON-encoded array of price strings, e.g. `"[\"0.62\", \"0.38\"]"`
    #[serde(default, rename = "outcomePrices")]
    outcome_prices: Option<String>,
}

impl GammaMarket {
    /// Parse the double-encoded outcome arrays into the strict shape,
    /// failing with a typed error so the caller can score the signal neutral.
    fn normalize(self, slug: &str) -> Result<NormalizedMarket> {
        let malformed = |reason: String| MarketDataError::MarketMalformed {
            slug: slug.to_string(),
            reason,
        };

        let outcomes_raw = self
            .outcomes
            .ok_or_else(|| malformed("missing outcomes field".to_string()))?;
        let prices_raw = self
            .outcome_prices
            .ok_or_else(|| malformed("missing outcomePrices field".to_string()))?;

        let outcomes: Vec<String> = serde_json::from_str(&outcomes_raw)
            .map_err(|e| malformed(format!("outcomes is not a JSON string array: {}", e)))?;
        let price_strings: Vec<String> = serde_json::from_str(&prices_raw)
            .map_err(|e| malformed(format!("outcomePrices is not a JSON string array: {}", e)))?;

        if outcomes.len() != price_strings.len() {
            return Err(malformed(format!(
                "{} outcomes but {} prices",
                outcomes.len(),
                price_strings.len()
            )));
        }

        let prices = price_strings
            .iter()
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|e| malformed(format!("unparseable outcome price: {}", e)))?;

        Ok(NormalizedMarket {
            slug: slug.to_string(),
            question: self.question.unwrap_or_default(),
            outcomes,
            prices,
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl MarketSource for GammaClient {
    async fn fetch_market(&self, slug: &str) -> Result<Option<NormalizedMarket>> {
        GammaClient::fetch_market(self, slug).await
    }

    async fn health(&self) -> SourceHealth {
        GammaClient::health(self).await
    }

    fn name(&self) -> &str {
        "polymarket"
    }
}
