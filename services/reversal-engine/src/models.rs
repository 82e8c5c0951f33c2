use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// Re-export the candle type from the shared market-data package
pub use market_data::types::Candle;

/// Discrete stage derived from the composite score and gate count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No reversal structure worth acting on
    Baseline,
    /// Early interest, partial structure
    Watch,
    /// Structure mostly in place, positioning window
    Prepare,
    /// All gates open with a strong composite
    Confirmed,
    /// Composite pinned to the cap while structure lags
    Overheated,
}

impl Stage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Baseline => "Baseline",
            Stage::Watch => "Watch",
            Stage::Prepare => "Prepare",
            Stage::Confirmed => "Confirmed",
            Stage::Overheated => "Overheated",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Baseline => "baseline",
            Stage::Watch => "watch",
            Stage::Prepare => "prepare",
            Stage::Confirmed => "confirmed",
            Stage::Overheated => "overheated",
        };
        write!(f, "{}", s)
    }
}

/// Coarse cycle position label derived from the cycle sub-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleZone {
    Capitulation,
    Accumulation,
    Recovery,
    Expansion,
}

impl CycleZone {
    pub fn description(&self) -> &'static str {
        match self {
            CycleZone::Capitulation => "Deeply depressed cycle signals",
            CycleZone::Accumulation => "Cycle signals basing",
            CycleZone::Recovery => "Cycle signals turning up",
            CycleZone::Expansion => "Cycle signals fully risk-on",
        }
    }
}

impl std::fmt::Display for CycleZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CycleZone::Capitulation => "capitulation",
            CycleZone::Accumulation => "accumulation",
            CycleZone::Recovery => "recovery",
            CycleZone::Expansion => "expansion",
        };
        write!(f, "{}", s)
    }
}

/// Which predicate path admitted the stage when both could apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageReason {
    ZoneGuarantee,
    ScoreThreshold,
}

/// Condition grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionGroup {
    Gate,
    Booster,
}

/// Outcome of a single technical condition. A fresh list is produced on
/// every evaluation run; results are never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionResult {
    pub id: String,
    pub group: ConditionGroup,
    pub passed: bool,
    /// Closeness-to-threshold in [0,1], used for weighting
    pub score: f64,
    pub detail: String,
    pub description: String,
}

/// Raw sub-score inputs for one engine pass, before per-component clamping
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub trend: f64,
    pub cycle_base: f64,
    pub cycle_user: f64,
    pub narrative: f64,
}

impl SubScores {
    pub fn cycle(&self) -> f64 {
        self.cycle_base + self.cycle_user
    }
}

/// Authoritative snapshot of one evaluation. Built fresh each cycle so the
/// stage can never disagree with the sub-scores it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalState {
    pub final_score: f64,
    pub phase_cap: u32,
    pub trend_score_raw: f64,
    pub cycle_score_raw: f64,
    pub cycle_base: f64,
    pub cycle_user: f64,
    pub narrative_score_raw: f64,
    /// Clamped contributions actually summed into the composite
    pub trend_component: f64,
    pub cycle_component: f64,
    pub narrative_component: f64,
    pub gates_passed: u32,
    pub stage: Stage,
    pub stage_reason: StageReason,
    pub cycle_zone: CycleZone,
    pub degraded: bool,
    pub degraded_reasons: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

/// How a prediction market's outcome prices map to a bullish probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// P(Yes) is directly good for the reversal narrative
    BinaryGood,
    /// P(Yes) is a risk event; invert so positive always means bullish
    BinaryBad,
    /// Multi-outcome rate market; sum the cut/decrease/lower buckets
    FedCut,
}

/// Static catalog entry for a prediction-market narrative signal
#[derive(Debug, Clone, Copy)]
pub struct NarrativeSignal {
    pub id: &'static str,
    pub title: &'static str,
    pub slug: &'static str,
    pub scoring_mode: ScoringMode,
    pub category: &'static str,
    pub weight: f64,
}

/// Live reading for one catalog signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalReading {
    pub id: String,
    pub title: String,
    pub category: String,
    /// None when the market could not be fetched at all
    pub probability: Option<f64>,
    pub detail: String,
}

/// Aggregated narrative output for one evaluation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeAggregate {
    /// Narrative sub-score on the configured scale; None when no signal resolved
    pub score: Option<f64>,
    pub readings: Vec<SignalReading>,
    pub reasons: Vec<String>,
}

/// One ranked brief from the narrative collaborator, consumed as opaque display text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeBrief {
    pub headline: String,
    pub url: String,
    pub analysis: String,
    pub importance: u32,
}

/// Resolved user-facing copy for a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StageCopy {
    pub title: &'static str,
    pub display_stage: &'static str,
    pub tags: Vec<&'static str>,
    pub one_liner: String,
    pub next: Vec<&'static str>,
}

/// Persisted snapshot row
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SnapshotRecord {
    pub id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub stage: String,
    pub final_score: f64,
    pub state: serde_json::Value,
}
