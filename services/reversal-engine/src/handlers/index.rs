//! Reversal index endpoints: current snapshot, refresh, history, conditions

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::warn;

use crate::conditions::ConditionInfo;
use crate::copy;
use crate::engine::hub::EvaluateOutcome;
use crate::models::{
    ConditionResult, CycleZone, NarrativeBrief, SignalReading, Stage, StageCopy, StageReason,
};
use crate::AppState;

/// Current index snapshot with everything the display layer shows
#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexResponse {
    Ready(Box<IndexSnapshot>),
    /// No evaluation has completed yet; distinct from "all conditions failed"
    NotYetEvaluated {
        message: String,
        conditions: Vec<ConditionResult>,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct IndexSnapshot {
    pub score: f64,
    pub phase_cap: u32,
    pub stage: Stage,
    pub stage_reason: StageReason,
    pub cycle_zone: CycleZone,
    pub gates_passed: u32,
    pub degraded: bool,
    pub degraded_reasons: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
    pub components: ComponentBreakdown,
    pub copy: StageCopy,
    pub conditions: Vec<ConditionResult>,
    pub narrative: NarrativeView,
    pub briefs: Vec<NarrativeBrief>,
}

#[derive(Debug, serde::Serialize)]
pub struct ComponentBreakdown {
    pub trend: f64,
    pub cycle: f64,
    pub cycle_base: f64,
    pub cycle_user: f64,
    pub narrative: f64,
}

#[derive(Debug, serde::Serialize)]
pub struct NarrativeView {
    pub score: Option<f64>,
    pub readings: Vec<SignalReading>,
}

/// GET /api/v1/index - current reversal index snapshot
pub async fn get_index(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IndexResponse>, (StatusCode, String)> {
    let Some(evaluation) = state.hub.latest().await else {
        return Ok(Json(IndexResponse::NotYetEvaluated {
            message: "The index has not been evaluated yet".to_string(),
            conditions: Vec::new(),
        }));
    };

    let snapshot = &evaluation.state;
    let resolved = copy::resolve(snapshot);

    // Briefs are display garnish; a collaborator outage never blocks the index
    let headlines: Vec<String> = evaluation
        .narrative
        .readings
        .iter()
        .map(|r| r.title.clone())
        .collect();
    let briefs = match state
        .briefs
        .briefs(&state.cfg.narrative.briefs_category, &headlines)
        .await
    {
        Ok(briefs) => briefs,
        Err(e) => {
            warn!("Brief source failed: {}", e);
            Vec::new()
        }
    };

    Ok(Json(IndexResponse::Ready(Box::new(IndexSnapshot {
        score: snapshot.final_score,
        phase_cap: snapshot.phase_cap,
        stage: snapshot.stage,
        stage_reason: snapshot.stage_reason,
        cycle_zone: snapshot.cycle_zone,
        gates_passed: snapshot.gates_passed,
        degraded: snapshot.degraded,
        degraded_reasons: snapshot.degraded_reasons.clone(),
        evaluated_at: snapshot.evaluated_at,
        components: ComponentBreakdown {
            trend: snapshot.trend_component,
            cycle: snapshot.cycle_component,
            cycle_base: snapshot.cycle_base,
            cycle_user: snapshot.cycle_user,
            narrative: snapshot.narrative_component,
        },
        copy: resolved,
        conditions: evaluation.conditions.clone(),
        narrative: NarrativeView {
            score: evaluation.narrative.score,
            readings: evaluation.narrative.readings.clone(),
        },
        briefs,
    }))))
}

#[derive(Debug, serde::Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    pub stage: Option<Stage>,
    pub score: Option<f64>,
    pub previous_stage: Option<Stage>,
}

/// POST /api/v1/index/refresh - run an evaluation now
pub async fn refresh_index(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshResponse>, (StatusCode, String)> {
    let outcome = state
        .hub
        .evaluate_once()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let response = match outcome {
        EvaluateOutcome::Applied { previous_stage } => {
            let latest = state.hub.latest().await;
            RefreshResponse {
                status: "applied",
                stage: latest.as_ref().map(|e| e.state.stage),
                score: latest.as_ref().map(|e| e.state.final_score),
                previous_stage,
            }
        }
        EvaluateOutcome::Superseded => RefreshResponse {
            status: "superseded",
            stage: None,
            score: None,
            previous_stage: None,
        },
        EvaluateOutcome::NoData => RefreshResponse {
            status: "no_data",
            stage: None,
            score: None,
            previous_stage: None,
        },
    };

    Ok(Json(response))
}

#[derive(Debug, serde::Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, serde::Serialize)]
pub struct HistoryEntry {
    pub evaluated_at: DateTime<Utc>,
    pub stage: String,
    pub final_score: f64,
}

/// GET /api/v1/index/history?limit=N - recent snapshots, newest first
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let records = state
        .hub
        .snapshot_store()
        .history(limit)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let entries = records
        .into_iter()
        .map(|r| HistoryEntry {
            evaluated_at: r.evaluated_at,
            stage: r.stage,
            final_score: r.final_score,
        })
        .collect();

    Ok(Json(entries))
}

#[derive(Debug, serde::Serialize)]
pub struct ConditionsResponse {
    pub catalog: Vec<ConditionInfo>,
    /// Results from the latest evaluation, empty before the first one
    pub latest: Vec<ConditionResult>,
}

/// GET /api/v1/conditions - configured conditions and their latest results
pub async fn get_conditions(
    State(state): State<Arc<AppState>>,
) -> Json<ConditionsResponse> {
    let latest = state
        .hub
        .latest()
        .await
        .map(|e| e.conditions)
        .unwrap_or_default();

    Json(ConditionsResponse {
        catalog: state.hub.condition_catalog(),
        latest,
    })
}
