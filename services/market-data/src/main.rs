use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};

/// Application state shared across handlers
pub struct AppState {
    pub provider: market_data::SeriesProvider,
    pub markets: market_data::GammaClient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting Market Data Service...");

    // CoinGecko REST client for daily series
    let api_key = std::env::var("COINGECKO_API_KEY").ok();
    let coingecko = Arc::new(market_data::CoinGeckoClient::new(api_key));
    info!("✓ CoinGecko client initialized");

    // Optional Redis mirror - the in-memory cache carries the service alone
    let mut provider = market_data::SeriesProvider::new(coingecko);
    if let Ok(redis_url) = std::env::var("REDIS_URL") {
        match market_data::cache::RedisCache::new(&redis_url).await {
            Ok(redis) => {
                provider = provider.with_redis(redis);
                info!("✓ Redis series mirror connected");
            }
            Err(e) => {
                warn!("⚠ Redis unavailable ({}), continuing without mirror", e);
            }
        }
    }

    // Polymarket Gamma client for prediction markets
    let markets = market_data::GammaClient::new();
    info!("✓ Polymarket Gamma client initialized");

    let state = Arc::new(AppState { provider, markets });

    let app = Router::new()
        .route("/api/v1/series/{symbol}", get(handlers::get_series))
        .route("/api/v1/markets/{slug}", get(handlers::get_market))
        .route("/health", get(handlers::health_check))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8081);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🚀 Market Data Service listening on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

mod handlers;
