//! Technical condition evaluation
//!
//! Eight configured conditions run against the daily series on every pass.
//! Gates are the structural checks whose pass count feeds the phase cap;
//! boosters are softer confirmations feeding the cycle sub-score. Each run
//! produces one fresh result per condition.

use crate::config::ConditionsCfg;
use crate::models::{Candle, ConditionGroup, ConditionResult};
use rust_decimal::prelude::ToPrimitive;

pub mod boosters;
pub mod gates;
pub mod math;

pub use boosters::{
    MomentumDivergence, SupportProximity, TimeframeConvergence, VolatilityExpansion,
};
pub use gates::{HigherLow, MaReclaim, VolatilityFloor, VolumeConfirm};

/// Price series unpacked to f64 once so indicator math never touches Decimal
#[derive(Debug, Clone, Default)]
pub struct SeriesView {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl SeriesView {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut view = SeriesView {
            closes: Vec::with_capacity(candles.len()),
            highs: Vec::with_capacity(candles.len()),
            lows: Vec::with_capacity(candles.len()),
            volumes: Vec::with_capacity(candles.len()),
        };
        for candle in candles {
            view.closes.push(candle.close.to_f64().unwrap_or(0.0));
            view.highs.push(candle.high.to_f64().unwrap_or(0.0));
            view.lows.push(candle.low.to_f64().unwrap_or(0.0));
            view.volumes.push(candle.volume.to_f64().unwrap_or(0.0));
        }
        view
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

/// What a condition found, before the evaluator wraps it with identity
#[derive(Debug, Clone)]
pub struct Outcome {
    pub passed: bool,
    /// Closeness-to-threshold in [0,1]
    pub score: f64,
    pub detail: String,
}

impl Outcome {
    pub fn new(passed: bool, score: f64, detail: String) -> Self {
        Self {
            passed,
            score,
            detail,
        }
    }
}

/// Core condition trait - every technical check implements this
pub trait Condition: Send + Sync {
    /// Stable identifier
    fn id(&self) -> &'static str;

    /// Gate or booster
    fn group(&self) -> ConditionGroup;

    /// What the condition checks, for display
    fn description(&self) -> &'static str;

    /// Minimum candles the check needs
    fn required_history(&self) -> usize;

    /// Evaluate against the series. Only called once `required_history` holds.
    fn evaluate(&self, series: &SeriesView) -> Outcome;
}

/// Evaluates the configured condition set against a price series
pub struct ConditionEvaluator {
    conditions: Vec<Box<dyn Condition>>,
}

impl ConditionEvaluator {
    pub fn from_config(cfg: &ConditionsCfg) -> Self {
        let conditions: Vec<Box<dyn Condition>> = vec![
            Box::new(MaReclaim::new(cfg.ma_reclaim.clone())),
            Box::new(HigherLow::new(cfg.higher_low.clone())),
            Box::new(VolatilityFloor::new(cfg.volatility_floor.clone())),
            Box::new(VolumeConfirm::new(cfg.volume_confirm.clone())),
            Box::new(MomentumDivergence::new(cfg.momentum_divergence.clone())),
            Box::new(VolatilityExpansion::new(cfg.volatility_expansion.clone())),
            Box::new(SupportProximity::new(cfg.support_proximity.clone())),
            Box::new(TimeframeConvergence::new(cfg.timeframe_convergence.clone())),
        ];
        Self { conditions }
    }

    /// One result per configured condition. A series shorter than a
    /// condition's lookback fails that condition alone with an explicit
    /// detail; the rest still evaluate in the same call.
    pub fn evaluate(&self, candles: &[Candle], stale: bool) -> Vec<ConditionResult> {
        let series = SeriesView::from_candles(candles);

        self.conditions
            .iter()
            .map(|condition| {
                let needed = condition.required_history();
                let outcome = if series.len() < needed {
                    Outcome::new(
                        false,
                        0.0,
                        format!(
                            "insufficient history: need {} candles, have {}",
                            needed,
                            series.len()
                        ),
                    )
                } else {
                    condition.evaluate(&series)
                };

                let mut detail = outcome.detail;
                if stale {
                    detail.push_str(" [stale data]");
                }

                ConditionResult {
                    id: condition.id().to_string(),
                    group: condition.group(),
                    passed: outcome.passed,
                    score: outcome.score.clamp(0.0, 1.0),
                    detail,
                    description: condition.description().to_string(),
                }
            })
            .collect()
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// Static description of every configured condition, for display
    /// without requiring a completed evaluation
    pub fn catalog(&self) -> Vec<ConditionInfo> {
        self.conditions
            .iter()
            .map(|condition| ConditionInfo {
                id: condition.id(),
                group: condition.group(),
                description: condition.description(),
                required_history: condition.required_history(),
            })
            .collect()
    }
}

/// Identity and requirements of one configured condition
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConditionInfo {
    pub id: &'static str,
    pub group: ConditionGroup,
    pub description: &'static str,
    pub required_history: usize,
}

/// Count of Gate-group results with passed=true
pub fn gate_count(results: &[ConditionResult]) -> u32 {
    results
        .iter()
        .filter(|r| r.group == ConditionGroup::Gate && r.passed)
        .count() as u32
}

/// Mean score of one group's results, None when the group is absent
pub fn group_score(results: &[ConditionResult], group: ConditionGroup) -> Option<f64> {
    let scores: Vec<f64> = results
        .iter()
        .filter(|r| r.group == group)
        .map(|r| r.score)
        .collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    /// Build daily candles from (close, volume) pairs, one per day ascending
    pub fn candles(points: &[(f64, f64)]) -> Vec<Candle> {
        points
            .iter()
            .enumerate()
            .map(|(i, (close, volume))| {
                let close_dec = Decimal::try_from(*close).unwrap();
                Candle {
                    asset: "BTC".to_string(),
                    open: close_dec,
                    high: close_dec,
                    low: close_dec,
                    close: close_dec,
                    volume: Decimal::try_from(*volume).unwrap(),
                    timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000 + i as i64 * 86_400, 0)
                        .unwrap(),
                }
            })
            .collect()
    }

    /// Flat series at 100.0 with volume 1000.0
    pub fn flat_series(len: usize) -> Vec<Candle> {
        candles(&vec![(100.0, 1000.0); len])
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::flat_series;
    use super::*;
    use crate::config::ConditionsCfg;

    #[test]
    fn every_configured_condition_reports_once() {
        let evaluator = ConditionEvaluator::from_config(&ConditionsCfg::default());
        let results = evaluator.evaluate(&flat_series(250), false);
        assert_eq!(results.len(), evaluator.condition_count());

        let gates = results
            .iter()
            .filter(|r| r.group == ConditionGroup::Gate)
            .count();
        let boosters = results
            .iter()
            .filter(|r| r.group == ConditionGroup::Booster)
            .count();
        assert_eq!(gates, 4);
        assert_eq!(boosters, 4);
    }

    #[test]
    fn short_series_fails_only_the_starved_conditions() {
        let evaluator = ConditionEvaluator::from_config(&ConditionsCfg::default());
        // 40 candles: enough for volume_confirm (21) but not ma_reclaim (200)
        let results = evaluator.evaluate(&flat_series(40), false);

        let ma = results.iter().find(|r| r.id == "ma_reclaim").unwrap();
        assert!(!ma.passed);
        assert!(ma.detail.contains("insufficient history"));
        assert!(ma.detail.contains("need 200 candles, have 40"));

        let volume = results.iter().find(|r| r.id == "volume_confirm").unwrap();
        assert!(!volume.detail.contains("insufficient history"));
    }

    #[test]
    fn empty_series_fails_everything_with_explicit_reasons() {
        let evaluator = ConditionEvaluator::from_config(&ConditionsCfg::default());
        let results = evaluator.evaluate(&[], false);
        assert!(!results.is_empty());
        for result in &results {
            assert!(!result.passed);
            assert_eq!(result.score, 0.0);
            assert!(result.detail.contains("insufficient history"));
        }
    }

    #[test]
    fn stale_flag_is_appended_to_every_detail() {
        let evaluator = ConditionEvaluator::from_config(&ConditionsCfg::default());
        let results = evaluator.evaluate(&flat_series(250), true);
        for result in &results {
            assert!(result.detail.ends_with("[stale data]"), "{}", result.detail);
        }
    }

    #[test]
    fn gate_count_ignores_boosters() {
        let results = vec![
            ConditionResult {
                id: "a".into(),
                group: ConditionGroup::Gate,
                passed: true,
                score: 1.0,
                detail: String::new(),
                description: String::new(),
            },
            ConditionResult {
                id: "b".into(),
                group: ConditionGroup::Booster,
                passed: true,
                score: 1.0,
                detail: String::new(),
                description: String::new(),
            },
            ConditionResult {
                id: "c".into(),
                group: ConditionGroup::Gate,
                passed: false,
                score: 0.4,
                detail: String::new(),
                description: String::new(),
            },
        ];
        assert_eq!(gate_count(&results), 1);
        assert_eq!(group_score(&results, ConditionGroup::Gate), Some(0.7));
        assert_eq!(group_score(&[], ConditionGroup::Gate), None);
    }
}
