use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::AppState;
use market_data::types::{Candle, Freshness, MarketDataError, NormalizedMarket, SourceHealth};

/// Query params for the series endpoint
#[derive(Debug, serde::Deserialize)]
pub struct SeriesQuery {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    365
}

/// GET /api/v1/series/{symbol} - Daily candle series for an asset
pub async fn get_series(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>, (StatusCode, String)> {
    let symbol = symbol.to_uppercase();
    info!("Fetching {} day series for {}", query.days, symbol);

    let fetch = state.provider.series(&symbol, query.days).await.map_err(|e| {
        warn!("Series error for {}: {}", symbol, e);
        match e {
            MarketDataError::AssetNotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
            MarketDataError::DataUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            _ => (StatusCode::BAD_GATEWAY, e.to_string()),
        }
    })?;

    Ok(Json(SeriesResponse {
        symbol,
        days: query.days,
        freshness: fetch.freshness,
        count: fetch.candles.len(),
        candles: fetch.candles,
    }))
}

/// GET /api/v1/markets/{slug} - Prediction market in normalized form
pub async fn get_market(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<NormalizedMarket>, (StatusCode, String)> {
    info!("Fetching market {}", slug);

    match state.markets.fetch_market(&slug).await {
        Ok(Some(market)) => Ok(Json(market)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            format!("no market with slug {}", slug),
        )),
        Err(e @ MarketDataError::MarketMalformed { .. }) => {
            warn!("Malformed market {}: {}", slug, e);
            Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(e) => {
            warn!("Market error for {}: {}", slug, e);
            Err((StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

/// GET /health - Service health check
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let series = state.provider.health().await;
    let markets = state.markets.health().await;

    let all_healthy = series.is_healthy && markets.is_healthy;

    Json(HealthResponse {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        sources: vec![series, markets],
    })
}

// Response types
#[derive(Debug, serde::Serialize)]
pub struct SeriesResponse {
    pub symbol: String,
    pub days: u32,
    pub freshness: Freshness,
    pub count: usize,
    pub candles: Vec<Candle>,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub sources: Vec<SourceHealth>,
}
