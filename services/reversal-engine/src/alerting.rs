//! Alerting for stage transitions and evaluation health

use crate::config::AlertsCfg;
use crate::models::{CycleZone, ReversalState, Stage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// Alert type categories
#[derive(Debug, Clone)]
pub enum AlertType {
    /// The stage changed between two consecutive evaluations
    StageTransition {
        from: Stage,
        to: Stage,
        score: f64,
        gates_passed: u32,
        cycle_zone: CycleZone,
    },
    /// An evaluation completed on substituted or stale inputs
    SourceDegraded { reasons: Vec<String> },
    /// A snapshot could not be written to the store
    SnapshotPersistFailure { error: String },
}

impl AlertType {
    /// Default severity for each category
    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertType::StageTransition { to, .. } => match to {
                Stage::Confirmed | Stage::Overheated => AlertSeverity::Warning,
                _ => AlertSeverity::Info,
            },
            AlertType::SourceDegraded { .. } => AlertSeverity::Warning,
            AlertType::SnapshotPersistFailure { .. } => AlertSeverity::Critical,
        }
    }
}

/// Alert manager for transition detection and notification rate limiting
#[derive(Clone)]
pub struct AlertManager {
    config: AlertsCfg,
    /// Track alert state to prevent spam
    alert_state: Arc<RwLock<HashMap<String, AlertState>>>,
}

#[derive(Debug, Clone)]
struct AlertState {
    last_fired: chrono::DateTime<chrono::Utc>,
    count: u32,
    acknowledged: bool,
}

impl AlertManager {
    pub fn new(config: AlertsCfg) -> Self {
        Self {
            config,
            alert_state: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check if an alert should fire (rate limiting)
    async fn should_fire(&self, alert_key: &str, cooldown_secs: i64) -> bool {
        let state = self.alert_state.read().await;

        if let Some(last) = state.get(alert_key) {
            let elapsed = chrono::Utc::now().signed_duration_since(last.last_fired);
            if elapsed.num_seconds() < cooldown_secs {
                return false; // Still in cooldown
            }
            if last.acknowledged {
                return false; // User acknowledged
            }
        }

        true
    }

    /// Record that an alert fired
    async fn record_fired(&self, alert_key: String) {
        let mut state = self.alert_state.write().await;
        let entry = state.entry(alert_key).or_insert(AlertState {
            last_fired: chrono::Utc::now(),
            count: 0,
            acknowledged: false,
        });
        entry.last_fired = chrono::Utc::now();
        entry.count += 1;
    }

    /// Compare the previous stage against a fresh snapshot.
    /// The first evaluation after startup has nothing to compare and never
    /// fires; the per-target-stage key keeps a jump to a new stage alertable
    /// even while an earlier transition is still cooling down.
    pub async fn check_stage_transition(
        &self,
        previous: Option<Stage>,
        state: &ReversalState,
    ) -> Option<AlertType> {
        if !self.config.enabled {
            return None;
        }
        let from = previous?;
        if from == state.stage {
            return None;
        }

        let key = format!("stage:{}", state.stage);
        if self.should_fire(&key, self.config.stage_cooldown_secs).await {
            self.record_fired(key).await;
            return Some(AlertType::StageTransition {
                from,
                to: state.stage,
                score: state.final_score,
                gates_passed: state.gates_passed,
                cycle_zone: state.cycle_zone,
            });
        }
        None
    }

    /// Check whether a degraded evaluation warrants a notification
    pub async fn check_degraded(&self, state: &ReversalState) -> Option<AlertType> {
        if !self.config.enabled || !state.degraded {
            return None;
        }

        let key = "source_degraded".to_string();
        if self.should_fire(&key, self.config.degraded_cooldown_secs).await {
            self.record_fired(key).await;
            return Some(AlertType::SourceDegraded {
                reasons: state.degraded_reasons.clone(),
            });
        }
        None
    }

    /// Report a snapshot persistence failure
    pub async fn check_persist_failure(&self, error: &str) -> Option<AlertType> {
        if !self.config.enabled {
            return None;
        }

        let key = "persist_failure".to_string();
        if self.should_fire(&key, 600).await {
            // 10 min cooldown
            self.record_fired(key).await;
            return Some(AlertType::SnapshotPersistFailure {
                error: error.to_string(),
            });
        }
        None
    }

    /// Fire an alert (logs; webhook delivery lives in webhook.rs)
    pub async fn fire_alert(&self, alert: &AlertType, severity: AlertSeverity) {
        let (title, message) = format_alert(alert);

        match severity {
            AlertSeverity::Info => {
                info!(alert_type = ?alert, title = %title, message = %message, "ALERT");
            }
            AlertSeverity::Warning => {
                warn!(alert_type = ?alert, title = %title, message = %message, "ALERT");
            }
            AlertSeverity::Critical => {
                error!(alert_type = ?alert, title = %title, message = %message, "ALERT");
            }
        }
    }

    /// Acknowledge an alert (prevents refiring)
    pub async fn acknowledge(&self, alert_key: &str) {
        let mut state = self.alert_state.write().await;
        if let Some(entry) = state.get_mut(alert_key) {
            entry.acknowledged = true;
        }
    }
}

/// Human-readable title and message for an alert
pub fn format_alert(alert: &AlertType) -> (String, String) {
    match alert {
        AlertType::StageTransition {
            from,
            to,
            score,
            gates_passed,
            cycle_zone,
        } => (
            format!(
                "Reversal stage {} -> {}",
                from.display_name(),
                to.display_name()
            ),
            format!(
                "Score: {:.1}, Gates passed: {}, Cycle zone: {}",
                score, gates_passed, cycle_zone
            ),
        ),
        AlertType::SourceDegraded { reasons } => (
            "Evaluation running degraded".to_string(),
            reasons.join("; "),
        ),
        AlertType::SnapshotPersistFailure { error } => (
            "Snapshot persistence failed".to_string(),
            error.clone(),
        ),
    }
}
