//! Integration tests for the reversal engine
//!
//! These drive whole paths: hub evaluation through the API handlers, and
//! the offline simulate flow from raw candle input to stage copy.

use crate::config::AppCfg;
use crate::copy;
use crate::db::SnapshotStore;
use crate::engine::{EngineInputs, PhaseEngine};
use crate::handlers::index::{get_history, get_index, refresh_index, HistoryQuery, IndexResponse};
use crate::handlers::simulate::{simulate, CandleInput, SimulateRequest};
use crate::models::{
    ConditionGroup, ConditionResult, ReversalState, Stage, StageReason, SubScores,
};
use crate::narrative::StaticBriefSource;
use crate::observability::MetricsCollector;
use crate::webhook::{WebhookConfig, WebhookNotifier};
use crate::{AppState, EvaluationHub};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{TimeZone, Utc};
use market_data::types::{
    Candle, MarketSource, NormalizedMarket, SeriesSource, SourceHealth,
};
use market_data::SeriesProvider;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Fixed 30-day tape: closes walk 100..106 and volume stays flat, so no
/// default-config gate can pass and the narrative carries the score
struct TapeSeries;

#[async_trait::async_trait]
impl SeriesSource for TapeSeries {
    async fn fetch_series(
        &self,
        symbol: &str,
        _days: u32,
    ) -> market_data::types::Result<Vec<Candle>> {
        Ok((0..30)
            .map(|i| Candle {
                asset: symbol.to_string(),
                open: Decimal::from(100),
                high: Decimal::from(110),
                low: Decimal::from(90),
                close: Decimal::from(100 + i % 7),
                volume: Decimal::from(1_000),
                timestamp: Utc.timestamp_opt((i + 1) * 86_400, 0).unwrap(),
            })
            .collect())
    }

    async fn health(&self) -> SourceHealth {
        SourceHealth {
            source: "tape".to_string(),
            is_healthy: true,
            last_success: None,
            last_error: None,
            success_rate: 1.0,
            avg_latency_ms: 0,
        }
    }

    fn name(&self) -> &str {
        "tape"
    }
}

/// Every catalog market resolves to the same 0.6 bullish probability
struct SteadyMarkets;

#[async_trait::async_trait]
impl MarketSource for SteadyMarkets {
    async fn fetch_market(
        &self,
        slug: &str,
    ) -> market_data::types::Result<Option<NormalizedMarket>> {
        let market = match slug {
            "fed-rate-decision-2026" => NormalizedMarket {
                slug: slug.to_string(),
                question: "Fed decision".to_string(),
                outcomes: vec!["25 bps cut".to_string(), "No change".to_string()],
                prices: vec![0.6, 0.4],
                fetched_at: Utc::now(),
            },
            "us-recession-2026" | "major-stablecoin-depeg-2026" => NormalizedMarket {
                slug: slug.to_string(),
                question: format!("Question for {}", slug),
                outcomes: vec!["Yes".to_string(), "No".to_string()],
                prices: vec![0.4, 0.6],
                fetched_at: Utc::now(),
            },
            _ => NormalizedMarket {
                slug: slug.to_string(),
                question: format!("Question for {}", slug),
                outcomes: vec!["Yes".to_string(), "No".to_string()],
                prices: vec![0.6, 0.4],
                fetched_at: Utc::now(),
            },
        };
        Ok(Some(market))
    }

    async fn health(&self) -> SourceHealth {
        SourceHealth {
            source: "steady".to_string(),
            is_healthy: true,
            last_success: None,
            last_error: None,
            success_rate: 1.0,
            avg_latency_ms: 0,
        }
    }

    fn name(&self) -> &str {
        "steady"
    }
}

fn test_state() -> Arc<AppState> {
    let cfg = AppCfg::default();
    let series = Arc::new(
        SeriesProvider::new(Arc::new(TapeSeries) as Arc<dyn SeriesSource>)
            .with_ttl(Duration::ZERO),
    );
    let markets: Arc<dyn MarketSource> = Arc::new(SteadyMarkets);
    let metrics = MetricsCollector::new();
    let webhook = WebhookNotifier::new(WebhookConfig {
        email_webhook_url: None,
        alert_email_to: "ops@example.com".to_string(),
        timeout_secs: 1,
    });
    let hub = Arc::new(EvaluationHub::new(
        cfg.clone(),
        series.clone(),
        markets.clone(),
        SnapshotStore::memory(),
        webhook,
        metrics.clone(),
    ));

    Arc::new(AppState {
        cfg,
        hub,
        briefs: Arc::new(StaticBriefSource),
        metrics,
        series,
        markets,
    })
}

fn passed(id: &str, group: ConditionGroup) -> ConditionResult {
    ConditionResult {
        id: id.to_string(),
        group,
        passed: true,
        score: 1.0,
        detail: String::new(),
        description: String::new(),
    }
}

fn full_strength_conditions() -> Vec<ConditionResult> {
    vec![
        passed("ma_reclaim", ConditionGroup::Gate),
        passed("higher_low", ConditionGroup::Gate),
        passed("volatility_floor", ConditionGroup::Gate),
        passed("volume_confirm", ConditionGroup::Gate),
        passed("momentum_divergence", ConditionGroup::Booster),
        passed("volatility_expansion", ConditionGroup::Booster),
        passed("support_proximity", ConditionGroup::Booster),
        passed("timeframe_convergence", ConditionGroup::Booster),
    ]
}

#[tokio::test]
async fn test_index_before_first_evaluation() {
    let state = test_state();

    let response = get_index(State(state)).await.unwrap();
    match response.0 {
        IndexResponse::NotYetEvaluated { message, conditions } => {
            assert!(message.contains("not been evaluated"));
            assert!(conditions.is_empty());
        }
        IndexResponse::Ready(_) => panic!("index served a snapshot before any evaluation"),
    }
}

#[tokio::test]
async fn test_refresh_then_index_snapshot() {
    let state = test_state();

    let refresh = refresh_index(State(state.clone())).await.unwrap();
    assert_eq!(refresh.0.status, "applied");
    assert_eq!(refresh.0.previous_stage, None);

    let response = get_index(State(state.clone())).await.unwrap();
    let snapshot = match response.0 {
        IndexResponse::Ready(snapshot) => snapshot,
        IndexResponse::NotYetEvaluated { .. } => panic!("no snapshot after a successful refresh"),
    };

    // 30 flat-volume candles open no default-config gate
    assert_eq!(snapshot.gates_passed, 0);
    assert_eq!(snapshot.phase_cap, 60);
    assert_eq!(snapshot.stage, Stage::Baseline);
    assert!(!snapshot.degraded);
    assert_eq!(snapshot.conditions.len(), 8);

    // All five signals normalize to 0.6 against a max of 50
    assert!((snapshot.components.narrative - 30.0).abs() < 1e-9);
    assert_eq!(snapshot.narrative.score, Some(30.0));
    assert_eq!(snapshot.narrative.readings.len(), 5);

    assert!(snapshot.score > 0.0 && snapshot.score < 60.0);
    assert_eq!(snapshot.copy.title, "No reversal signal");
    // Static brief source caps the five headlines at three
    assert_eq!(snapshot.briefs.len(), 3);

    // A second refresh records where the index was coming from
    let second = refresh_index(State(state)).await.unwrap();
    assert_eq!(second.0.status, "applied");
    assert_eq!(second.0.previous_stage, Some(Stage::Baseline));
}

#[tokio::test]
async fn test_history_pagination() {
    let state = test_state();

    refresh_index(State(state.clone())).await.unwrap();
    refresh_index(State(state.clone())).await.unwrap();

    let all = get_history(State(state.clone()), Query(HistoryQuery { limit: None }))
        .await
        .unwrap();
    assert_eq!(all.0.len(), 2);
    assert!(all.0[0].evaluated_at > all.0[1].evaluated_at);

    let capped = get_history(State(state), Query(HistoryQuery { limit: Some(1) }))
        .await
        .unwrap();
    assert_eq!(capped.0.len(), 1);
    assert_eq!(capped.0[0].evaluated_at, all.0[0].evaluated_at);
}

#[tokio::test]
async fn test_simulate_offline_scoring() {
    let state = test_state();

    // Nine distinct days fed out of order, one duplicated timestamp and one
    // non-positive close; normalization leaves eight usable candles
    let day = |i: i64| Utc.timestamp_opt(1_700_000_000 + i * 86_400, 0).unwrap();
    let candle = |i: i64, close: i64| CandleInput {
        timestamp: day(i),
        open: Decimal::from(100),
        high: Decimal::from(110),
        low: Decimal::from(90),
        close: Decimal::from(close),
        volume: Decimal::from(1_000),
    };

    let mut candles: Vec<CandleInput> = vec![
        candle(3, 103),
        candle(0, 100),
        candle(5, 105),
        candle(1, 101),
        candle(2, 0), // dropped
        candle(4, 104),
        candle(8, 108),
        candle(6, 106),
        candle(7, 107),
    ];
    candles.push(candle(4, 200)); // same day again, replaces the first read

    let request = SimulateRequest {
        candles,
        narrative_score: Some(40.0),
        cycle_user: None,
        stale: false,
    };

    let response = simulate(State(state), Json(request)).await.unwrap();
    assert_eq!(response.0.candles_analyzed, 8);

    // Eight candles starve every condition, so the narrative input is the
    // whole composite and the zero-gate cap holds it under 60
    let result = &response.0.state;
    assert_eq!(result.gates_passed, 0);
    assert_eq!(result.phase_cap, 60);
    assert_eq!(result.final_score, 40.0);
    assert_eq!(result.stage, Stage::Baseline);
    for condition in &response.0.conditions {
        assert!(condition.detail.contains("insufficient history"));
    }
}

#[tokio::test]
async fn test_simulate_rejects_empty_series() {
    let state = test_state();

    let request = SimulateRequest {
        candles: Vec::new(),
        narrative_score: None,
        cycle_user: None,
        stale: false,
    };

    let err = simulate(State(state), Json(request)).await.unwrap_err();
    assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err.1.contains("empty"));
}

#[tokio::test]
async fn test_confirmed_state_survives_persistence() {
    let cfg = AppCfg::default();
    let engine = PhaseEngine::new(cfg.scoring.clone(), cfg.stages.clone());
    let conditions = full_strength_conditions();

    let state = engine.evaluate(
        EngineInputs {
            conditions: &conditions,
            trend_raw: Some(25.0),
            cycle_base_raw: Some(15.0),
            cycle_user_raw: 10.0,
            narrative_raw: Some(50.0),
            carried_reasons: Vec::new(),
            evaluated_at: Utc.timestamp_opt(1_755_000_000, 0).unwrap(),
        },
        &SubScores::default(),
    );
    assert_eq!(state.final_score, 100.0);
    assert_eq!(state.stage, Stage::Confirmed);
    assert_eq!(state.stage_reason, StageReason::ScoreThreshold);

    let store = SnapshotStore::memory();
    store.insert(&state).await.unwrap();

    let record = store.latest().await.unwrap().unwrap();
    assert_eq!(record.stage, "confirmed");
    assert_eq!(record.final_score, 100.0);

    let restored: ReversalState = serde_json::from_value(record.state).unwrap();
    assert_eq!(restored.stage, Stage::Confirmed);
    assert_eq!(restored.gates_passed, 4);
    assert_eq!(copy::resolve(&restored).title, "Reversal confirmed");
}
