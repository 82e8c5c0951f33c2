//! Engine configuration
//!
//! Layered load: config/default.toml, then config/local.toml if present,
//! then environment variables with `__` separators (SCORING__TREND_MAX=30).
//! The numeric policy constants here encode product decisions; they are
//! loaded, validated, and passed through, never re-derived.

use anyhow::{Context, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppCfg {
    pub data: DataCfg,
    pub scoring: ScoringCfg,
    pub stages: StageCfg,
    pub conditions: ConditionsCfg,
    pub narrative: NarrativeCfg,
    pub scheduler: SchedulerCfg,
    pub alerts: AlertsCfg,
}

/// Which asset the index evaluates and how much history to pull
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataCfg {
    pub symbol: String,
    pub series_days: u32,
}

impl Default for DataCfg {
    fn default() -> Self {
        Self {
            symbol: "BTC".to_string(),
            series_days: 365,
        }
    }
}

/// Sub-score maxima and the gate-count cap bands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringCfg {
    pub trend_max: f64,
    pub cycle_max: f64,
    pub cycle_base_max: f64,
    pub cycle_user_max: f64,
    pub narrative_max: f64,
    /// Operator-supplied cycle adjustment fed into every evaluation
    pub cycle_user: f64,
    /// Ascending bands: gate counts up to `max_gates` map to `cap`
    pub cap_bands: Vec<CapBand>,
}

impl Default for ScoringCfg {
    fn default() -> Self {
        Self {
            trend_max: 25.0,
            cycle_max: 25.0,
            cycle_base_max: 15.0,
            cycle_user_max: 10.0,
            narrative_max: 50.0,
            cycle_user: 0.0,
            cap_bands: vec![
                CapBand { max_gates: 1, cap: 60 },
                CapBand { max_gates: 3, cap: 75 },
                CapBand { max_gates: 4, cap: 100 },
            ],
        }
    }
}

/// One phase-cap band
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapBand {
    pub max_gates: u32,
    pub cap: u32,
}

/// Stage classification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageCfg {
    pub confirmed_min_score: f64,
    pub prepare_guarantee_gates: u32,
    pub prepare_guarantee_score: f64,
    pub prepare_min_score: f64,
    pub watch_guarantee_gates: u32,
    pub watch_guarantee_score: f64,
    pub watch_min_score: f64,
}

impl Default for StageCfg {
    fn default() -> Self {
        Self {
            confirmed_min_score: 75.0,
            prepare_guarantee_gates: 3,
            prepare_guarantee_score: 55.0,
            prepare_min_score: 65.0,
            watch_guarantee_gates: 2,
            watch_guarantee_score: 40.0,
            watch_min_score: 45.0,
        }
    }
}

/// Per-condition parameters, all lookbacks in daily candles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionsCfg {
    pub ma_reclaim: MaReclaimParams,
    pub higher_low: HigherLowParams,
    pub volatility_floor: VolatilityFloorParams,
    pub volume_confirm: VolumeConfirmParams,
    pub momentum_divergence: MomentumDivergenceParams,
    pub volatility_expansion: VolatilityExpansionParams,
    pub support_proximity: SupportProximityParams,
    pub timeframe_convergence: TimeframeConvergenceParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaReclaimParams {
    pub period: usize,
}

impl Default for MaReclaimParams {
    fn default() -> Self {
        Self { period: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HigherLowParams {
    pub lookback: usize,
    pub pivot_window: usize,
}

impl Default for HigherLowParams {
    fn default() -> Self {
        Self {
            lookback: 90,
            pivot_window: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityFloorParams {
    /// Window for each realized-volatility sample
    pub vol_window: usize,
    /// Trailing window the current sample is ranked against
    pub rank_window: usize,
    /// Pass when the percentile rank is at or below this
    pub max_percentile: f64,
}

impl Default for VolatilityFloorParams {
    fn default() -> Self {
        Self {
            vol_window: 30,
            rank_window: 180,
            max_percentile: 0.40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfirmParams {
    pub ma_period: usize,
    pub multiplier: f64,
}

impl Default for VolumeConfirmParams {
    fn default() -> Self {
        Self {
            ma_period: 20,
            multiplier: 1.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumDivergenceParams {
    pub rsi_period: usize,
    pub lookback: usize,
}

impl Default for MomentumDivergenceParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            lookback: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityExpansionParams {
    pub short_window: usize,
    pub long_window: usize,
    pub min_ratio: f64,
}

impl Default for VolatilityExpansionParams {
    fn default() -> Self {
        Self {
            short_window: 10,
            long_window: 60,
            min_ratio: 1.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportProximityParams {
    pub lookback: usize,
    /// Pass when price is within this fraction of the lookback low
    pub max_distance: f64,
}

impl Default for SupportProximityParams {
    fn default() -> Self {
        Self {
            lookback: 180,
            max_distance: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeConvergenceParams {
    pub fast_period: usize,
    pub mid_period: usize,
    pub slow_period: usize,
}

impl Default for TimeframeConvergenceParams {
    fn default() -> Self {
        Self {
            fast_period: 20,
            mid_period: 50,
            slow_period: 100,
        }
    }
}

/// Narrative signal weighting and the briefs collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeCfg {
    /// Per-signal weight overrides, keyed by catalog id
    pub weights: HashMap<String, f64>,
    /// Narrative-AI collaborator endpoint; unset means static briefs only
    pub briefs_url: Option<String>,
    pub briefs_category: String,
}

impl Default for NarrativeCfg {
    fn default() -> Self {
        Self {
            weights: HashMap::new(),
            briefs_url: None,
            briefs_category: "macro-reversal".to_string(),
        }
    }
}

/// Periodic evaluation loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerCfg {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Random start delay so replicas do not fetch in lockstep
    pub jitter_secs: u64,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            jitter_secs: 30,
        }
    }
}

/// Alert cooldowns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsCfg {
    pub enabled: bool,
    pub stage_cooldown_secs: i64,
    pub degraded_cooldown_secs: i64,
}

impl Default for AlertsCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            stage_cooldown_secs: 3600,
            degraded_cooldown_secs: 21600,
        }
    }
}

impl AppCfg {
    pub fn load() -> Result<Self> {
        let cfg = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name("config/local").required(false))
            .add_source(config::Environment::default().separator("__"))
            .build()
            .context("building config")?;

        let app: AppCfg = cfg.try_deserialize().context("deserializing config")?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.data.symbol.is_empty(), "data.symbol missing");
        anyhow::ensure!(self.data.series_days > 0, "data.series_days must be > 0");
        anyhow::ensure!(self.scoring.trend_max > 0.0, "scoring.trend_max must be > 0");
        anyhow::ensure!(self.scoring.cycle_max > 0.0, "scoring.cycle_max must be > 0");
        anyhow::ensure!(
            self.scoring.narrative_max > 0.0,
            "scoring.narrative_max must be > 0"
        );
        anyhow::ensure!(
            (self.scoring.cycle_base_max + self.scoring.cycle_user_max - self.scoring.cycle_max)
                .abs()
                < f64::EPSILON,
            "scoring.cycle_base_max + scoring.cycle_user_max must equal scoring.cycle_max"
        );
        anyhow::ensure!(!self.scoring.cap_bands.is_empty(), "scoring.cap_bands missing");
        let bands = &self.scoring.cap_bands;
        for pair in bands.windows(2) {
            anyhow::ensure!(
                pair[0].max_gates < pair[1].max_gates && pair[0].cap <= pair[1].cap,
                "scoring.cap_bands must be ascending in max_gates and cap"
            );
        }
        anyhow::ensure!(
            self.stages.watch_min_score < self.stages.prepare_min_score,
            "stages.watch_min_score must be below stages.prepare_min_score"
        );
        anyhow::ensure!(
            self.scheduler.interval_secs > 0,
            "scheduler.interval_secs must be > 0"
        );
        Ok(())
    }

    /// Effective weight for a catalog signal, honoring overrides
    pub fn signal_weight(&self, id: &str, default_weight: f64) -> f64 {
        self.narrative
            .weights
            .get(id)
            .copied()
            .unwrap_or(default_weight)
    }
}
