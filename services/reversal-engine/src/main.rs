use std::sync::Arc;
use tracing::{info, warn, Level};

use market_data::types::MarketSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Starting Reversal Index Engine...");

    // Load and validate config
    let cfg = reversal_engine::AppCfg::load()?;
    info!(
        "✓ Config loaded ({}, {} days of history)",
        cfg.data.symbol, cfg.data.series_days
    );

    // CoinGecko daily series behind the fetch-through cache
    let api_key = std::env::var("COINGECKO_API_KEY").ok();
    let coingecko = Arc::new(market_data::CoinGeckoClient::new(api_key));
    let series = Arc::new(market_data::SeriesProvider::new(coingecko));
    info!("✓ Series provider initialized");

    // Polymarket Gamma client for narrative signals
    let markets: Arc<dyn MarketSource> = Arc::new(market_data::GammaClient::new());
    info!("✓ Market source initialized");

    // Snapshot store: Postgres when configured, in-memory ring otherwise
    let store = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            info!("Connecting to database...");
            let db = reversal_engine::db::init_db(&database_url).await?;
            info!("✓ Database connected");

            info!("Running migrations...");
            sqlx::migrate!("./migrations").run(&db).await?;
            info!("✓ Migrations applied");

            reversal_engine::SnapshotStore::postgres(db)
        }
        Err(_) => {
            warn!("DATABASE_URL not set, snapshots held in memory only");
            reversal_engine::SnapshotStore::memory()
        }
    };

    let metrics = reversal_engine::MetricsCollector::new();
    let webhook = reversal_engine::webhook::WebhookNotifier::new(
        reversal_engine::webhook::WebhookConfig::default(),
    );

    // Narrative-AI collaborator, or headline passthrough when unset
    let briefs: Arc<dyn reversal_engine::NarrativeBriefSource> = match cfg.narrative.briefs_url.clone()
    {
        Some(url) => {
            info!("✓ Narrative brief collaborator at {}", url);
            Arc::new(reversal_engine::narrative::HttpBriefSource::new(url))
        }
        None => Arc::new(reversal_engine::narrative::StaticBriefSource),
    };

    let hub = Arc::new(reversal_engine::EvaluationHub::new(
        cfg.clone(),
        series.clone(),
        markets.clone(),
        store,
        webhook,
        metrics.clone(),
    ));

    // Evaluate up front so the API has a snapshot as soon as data allows
    if let Err(e) = hub.evaluate_once().await {
        warn!("Initial evaluation failed: {}", e);
    }

    reversal_engine::scheduler::spawn_evaluation_task(hub.clone(), cfg.scheduler.clone());

    // Create app state
    let state = Arc::new(reversal_engine::AppState {
        cfg,
        hub,
        briefs,
        metrics,
        series,
        markets,
    });

    // Build router
    let app = reversal_engine::app(state);

    // Start server
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🚀 Reversal Index Engine listening on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
