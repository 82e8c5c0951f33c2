pub mod alerting;
pub mod conditions;
pub mod config;
pub mod copy;
pub mod models;
pub mod handlers {
    pub mod index;
    pub mod simulate;
}
pub mod db;
pub mod engine;
pub mod health;
pub mod narrative;
pub mod observability;
pub mod scheduler;
pub mod webhook;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use market_data::types::MarketSource;
use market_data::SeriesProvider;

pub use config::AppCfg;
pub use db::{Db, SnapshotStore};
pub use engine::hub::EvaluationHub;
pub use models::*;
pub use narrative::NarrativeBriefSource;
pub use observability::MetricsCollector;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub cfg: AppCfg,
    pub hub: Arc<EvaluationHub>,
    pub briefs: Arc<dyn NarrativeBriefSource>,
    pub metrics: MetricsCollector,
    pub series: Arc<SeriesProvider>,
    pub markets: Arc<dyn MarketSource>,
}

/// Build the API router
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Index routes (public API)
    let api_routes = Router::new()
        .route("/index", get(handlers::index::get_index))
        .route("/index/refresh", post(handlers::index::refresh_index))
        .route("/index/history", get(handlers::index::get_history))
        .route("/conditions", get(handlers::index::get_conditions))
        .route("/simulate", post(handlers::simulate::simulate))
        .with_state(state.clone());

    // Operational routes (health checks, metrics)
    let ops_routes = Router::new()
        .route("/health", get(health::healthz))
        .route("/ready", get(health::readyz))
        .route("/health/detail", get(health::health_detail))
        .route("/metrics", get(health::metrics_snapshot))
        .with_state(state.clone());

    // Build combined router
    Router::new()
        .nest("/api/v1", api_routes)
        .merge(ops_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests;
