//! Gate conditions - structural checks whose pass count drives the phase cap

use super::math::{inverse_ratio_score, min_index, percentile_rank, ratio_score, realized_vol_at, sma, sma_at};
use super::{Condition, Outcome, SeriesView};
use crate::config::{
    HigherLowParams, MaReclaimParams, VolatilityFloorParams, VolumeConfirmParams,
};
use crate::models::ConditionGroup;

/// Close back above the long-term moving average
pub struct MaReclaim {
    params: MaReclaimParams,
}

impl MaReclaim {
    pub fn new(params: MaReclaimParams) -> Self {
        Self { params }
    }
}

impl Condition for MaReclaim {
    fn id(&self) -> &'static str {
        "ma_reclaim"
    }

    fn group(&self) -> ConditionGroup {
        ConditionGroup::Gate
    }

    fn description(&self) -> &'static str {
        "Price trading back above its long-term moving average"
    }

    fn required_history(&self) -> usize {
        self.params.period
    }

    fn evaluate(&self, series: &SeriesView) -> Outcome {
        let Some(ma) = sma(&series.closes, self.params.period) else {
            return Outcome::new(false, 0.0, "moving average unavailable".to_string());
        };
        let Some(close) = series.last_close() else {
            return Outcome::new(false, 0.0, "no closing price".to_string());
        };
        if ma <= 0.0 {
            return Outcome::new(false, 0.0, "moving average not positive".to_string());
        }

        let passed = close > ma;
        let score = ratio_score(close, ma);
        Outcome::new(
            passed,
            score,
            format!(
                "close {:.2} vs {}d MA {:.2}",
                close, self.params.period, ma
            ),
        )
    }
}

/// Higher-low structure across the lookback window
pub struct HigherLow {
    params: HigherLowParams,
}

impl HigherLow {
    pub fn new(params: HigherLowParams) -> Self {
        Self { params }
    }
}

impl Condition for HigherLow {
    fn id(&self) -> &'static str {
        "higher_low"
    }

    fn group(&self) -> ConditionGroup {
        ConditionGroup::Gate
    }

    fn description(&self) -> &'static str {
        "A confirmed higher low against the prior trough"
    }

    fn required_history(&self) -> usize {
        self.params.lookback
    }

    fn evaluate(&self, series: &SeriesView) -> Outcome {
        let len = series.len();
        let lookback = self.params.lookback;
        let split = len - lookback / 2;

        let Some(prior_idx) = min_index(&series.lows, len - lookback, split) else {
            return Outcome::new(false, 0.0, "no prior trough".to_string());
        };
        let Some(recent_idx) = min_index(&series.lows, split, len) else {
            return Outcome::new(false, 0.0, "no recent trough".to_string());
        };

        let prior_low = series.lows[prior_idx];
        let recent_low = series.lows[recent_idx];
        if prior_low <= 0.0 {
            return Outcome::new(false, 0.0, "prior trough not positive".to_string());
        }

        // A trough at the very edge has no candles after it to confirm it held
        let confirmed = len - recent_idx > self.params.pivot_window;
        let higher = recent_low > prior_low;
        let score = ratio_score(recent_low, prior_low);

        let detail = if !confirmed {
            format!(
                "latest trough {:.2} unconfirmed ({} candles old)",
                recent_low,
                len - recent_idx - 1
            )
        } else {
            format!("recent low {:.2} vs prior low {:.2}", recent_low, prior_low)
        };

        Outcome::new(higher && confirmed, score, detail)
    }
}

/// Realized volatility ranked low against its trailing window
pub struct VolatilityFloor {
    params: VolatilityFloorParams,
}

impl VolatilityFloor {
    pub fn new(params: VolatilityFloorParams) -> Self {
        Self { params }
    }
}

impl Condition for VolatilityFloor {
    fn id(&self) -> &'static str {
        "volatility_floor"
    }

    fn group(&self) -> ConditionGroup {
        ConditionGroup::Gate
    }

    fn description(&self) -> &'static str {
        "Realized volatility compressed into the low end of its trailing range"
    }

    fn required_history(&self) -> usize {
        self.params.vol_window + self.params.rank_window
    }

    fn evaluate(&self, series: &SeriesView) -> Outcome {
        let len = series.len();
        let Some(current) = realized_vol_at(&series.closes, self.params.vol_window, len) else {
            return Outcome::new(false, 0.0, "volatility unavailable".to_string());
        };

        let mut samples = Vec::with_capacity(self.params.rank_window);
        for end in (len - self.params.rank_window + 1)..=len {
            if let Some(sample) = realized_vol_at(&series.closes, self.params.vol_window, end) {
                samples.push(sample);
            }
        }

        let Some(percentile) = percentile_rank(&samples, current) else {
            return Outcome::new(false, 0.0, "volatility history unavailable".to_string());
        };

        let passed = percentile <= self.params.max_percentile;
        let score = inverse_ratio_score(percentile, self.params.max_percentile);
        Outcome::new(
            passed,
            score,
            format!(
                "{}d vol at {:.0}th percentile of trailing {}d (threshold {:.0}th)",
                self.params.vol_window,
                percentile * 100.0,
                self.params.rank_window,
                self.params.max_percentile * 100.0
            ),
        )
    }
}

/// Latest volume above its moving average by the configured multiplier
pub struct VolumeConfirm {
    params: VolumeConfirmParams,
}

impl VolumeConfirm {
    pub fn new(params: VolumeConfirmParams) -> Self {
        Self { params }
    }
}

impl Condition for VolumeConfirm {
    fn id(&self) -> &'static str {
        "volume_confirm"
    }

    fn group(&self) -> ConditionGroup {
        ConditionGroup::Gate
    }

    fn description(&self) -> &'static str {
        "Volume running above its average by the confirmation multiplier"
    }

    fn required_history(&self) -> usize {
        self.params.ma_period + 1
    }

    fn evaluate(&self, series: &SeriesView) -> Outcome {
        let len = series.len();
        // Average excludes the current candle so it cannot confirm itself
        let Some(avg) = sma_at(&series.volumes, self.params.ma_period, len - 1) else {
            return Outcome::new(false, 0.0, "volume average unavailable".to_string());
        };
        let Some(current) = series.volumes.last().copied() else {
            return Outcome::new(false, 0.0, "no volume data".to_string());
        };
        if avg <= 0.0 {
            return Outcome::new(false, 0.0, "no traded volume in window".to_string());
        }

        let threshold = avg * self.params.multiplier;
        let passed = current >= threshold;
        let score = ratio_score(current, threshold);
        Outcome::new(
            passed,
            score,
            format!(
                "volume {:.0} vs {}d avg {:.0} x {:.2}",
                current, self.params.ma_period, avg, self.params.multiplier
            ),
        )
    }
}
