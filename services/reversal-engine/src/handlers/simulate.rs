//! Simulate endpoint - dry-run evaluation over caller-supplied candles

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::conditions::ConditionEvaluator;
use crate::copy;
use crate::engine::{EngineInputs, PhaseEngine};
use crate::models::{Candle, ConditionResult, ReversalState, StageCopy, SubScores};
use crate::AppState;
use market_data::normalizers;

/// Request to evaluate the index against a hypothetical series.
/// Nothing here touches the hub, the cache, or persistence.
#[derive(Debug, serde::Deserialize)]
pub struct SimulateRequest {
    pub candles: Vec<CandleInput>,
    /// Narrative sub-score to assume, on the configured scale; 0 when absent
    pub narrative_score: Option<f64>,
    /// Overrides the configured operator cycle adjustment
    pub cycle_user: Option<f64>,
    /// Evaluate as if the series came from a stale cache
    #[serde(default)]
    pub stale: bool,
}

#[derive(Debug, serde::Deserialize)]
pub struct CandleInput {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Response with the dry-run snapshot
#[derive(Debug, serde::Serialize)]
pub struct SimulateResponse {
    pub state: ReversalState,
    pub conditions: Vec<ConditionResult>,
    pub copy: StageCopy,
    pub candles_analyzed: usize,
}

/// POST /api/v1/simulate - dry-run evaluation
pub async fn simulate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<SimulateResponse>, (StatusCode, String)> {
    if req.candles.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "candles must not be empty".to_string(),
        ));
    }

    let raw: Vec<Candle> = req
        .candles
        .into_iter()
        .map(|c| Candle {
            asset: "SIM".to_string(),
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
            timestamp: c.timestamp,
        })
        .collect();

    // Same ordering and dedup rules as the live series path
    let candles = normalizers::normalize_series(raw);

    let evaluator = ConditionEvaluator::from_config(&state.cfg.conditions);
    let conditions = evaluator.evaluate(&candles, req.stale);

    let scoring = &state.cfg.scoring;
    let trend_raw = crate::conditions::group_score(&conditions, crate::models::ConditionGroup::Gate)
        .map(|s| s * scoring.trend_max);
    let cycle_base_raw =
        crate::conditions::group_score(&conditions, crate::models::ConditionGroup::Booster)
            .map(|s| s * scoring.cycle_base_max);

    let engine = PhaseEngine::new(scoring.clone(), state.cfg.stages.clone());
    let inputs = EngineInputs {
        conditions: &conditions,
        trend_raw,
        cycle_base_raw,
        cycle_user_raw: req.cycle_user.unwrap_or(scoring.cycle_user),
        narrative_raw: Some(req.narrative_score.unwrap_or(0.0)),
        carried_reasons: if req.stale {
            vec!["series data is stale".to_string()]
        } else {
            Vec::new()
        },
        evaluated_at: chrono::Utc::now(),
    };
    let snapshot = engine.evaluate(inputs, &SubScores::default());
    let resolved = copy::resolve(&snapshot);

    let candles_analyzed = candles.len();
    Ok(Json(SimulateResponse {
        state: snapshot,
        conditions,
        copy: resolved,
        candles_analyzed,
    }))
}
