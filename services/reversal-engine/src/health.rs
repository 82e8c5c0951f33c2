//! Health check endpoints for load balancers and monitoring

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::observability::MetricsSnapshot;
use crate::AppState;

/// Basic health check - fast, no external dependencies
/// Use for load balancer health checks
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness check - verifies the snapshot store is reachable
pub async fn readyz(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    match state.hub.snapshot_store().ping().await {
        Ok(_) => Ok(Json(ReadinessResponse {
            status: "ready".to_string(),
            checks: vec![HealthCheck {
                name: format!("store:{}", state.hub.snapshot_store().backend()),
                status: "ok".to_string(),
            }],
        })),
        Err(e) => {
            tracing::error!("Readiness check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Detailed health check with all components
/// Use for debugging and monitoring dashboards
pub async fn health_detail(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DetailedHealthResponse>, StatusCode> {
    let mut checks = vec![];
    let mut all_ok = true;

    let store_status = match state.hub.snapshot_store().ping().await {
        Ok(_) => "ok",
        Err(_) => {
            all_ok = false;
            "error"
        }
    };
    checks.push(HealthCheck {
        name: format!("store:{}", state.hub.snapshot_store().backend()),
        status: store_status.to_string(),
    });

    let series_health = state.series.health().await;
    if !series_health.is_healthy {
        all_ok = false;
    }
    checks.push(HealthCheck {
        name: format!("series:{}", series_health.source),
        status: if series_health.is_healthy {
            "ok".to_string()
        } else {
            series_health
                .last_error
                .unwrap_or_else(|| "error".to_string())
        },
    });

    let market_health = state.markets.health().await;
    if !market_health.is_healthy {
        all_ok = false;
    }
    checks.push(HealthCheck {
        name: format!("markets:{}", market_health.source),
        status: if market_health.is_healthy {
            "ok".to_string()
        } else {
            market_health
                .last_error
                .unwrap_or_else(|| "error".to_string())
        },
    });

    let has_evaluation = state.hub.latest().await.is_some();
    checks.push(HealthCheck {
        name: "evaluation".to_string(),
        status: if has_evaluation {
            "published".to_string()
        } else {
            "pending".to_string()
        },
    });

    let metrics = state.metrics.snapshot().await;

    let response = DetailedHealthResponse {
        status: if all_ok { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
        uptime_secs: metrics.uptime_secs,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// GET /metrics - full metrics snapshot
pub async fn metrics_snapshot(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot().await)
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: Vec<HealthCheck>,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub version: String,
    pub checks: Vec<HealthCheck>,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
}
