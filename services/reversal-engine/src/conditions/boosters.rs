//! Booster conditions - confirmatory signals feeding the cycle sub-score
//! without gating the phase cap

use super::math::{inverse_ratio_score, min_index, ratio_score, realized_vol_at, rsi_at, sma, sma_slope};
use super::{Condition, Outcome, SeriesView};
use crate::config::{
    MomentumDivergenceParams, SupportProximityParams, TimeframeConvergenceParams,
    VolatilityExpansionParams,
};
use crate::models::ConditionGroup;

/// Steps over which the mid moving average slope is measured
const SLOPE_SPAN: usize = 10;

/// Bullish divergence: price prints a lower low while RSI holds higher
pub struct MomentumDivergence {
    params: MomentumDivergenceParams,
}

impl MomentumDivergence {
    pub fn new(params: MomentumDivergenceParams) -> Self {
        Self { params }
    }
}

impl Condition for MomentumDivergence {
    fn id(&self) -> &'static str {
        "momentum_divergence"
    }

    fn group(&self) -> ConditionGroup {
        ConditionGroup::Booster
    }

    fn description(&self) -> &'static str {
        "Momentum holding up while price prints a lower low"
    }

    fn required_history(&self) -> usize {
        self.params.lookback + self.params.rsi_period + 1
    }

    fn evaluate(&self, series: &SeriesView) -> Outcome {
        let len = series.len();
        let lookback = self.params.lookback;
        let split = len - lookback / 2;

        let Some(prior_idx) = min_index(&series.closes, len - lookback, split) else {
            return Outcome::new(false, 0.0, "no prior trough".to_string());
        };
        let Some(recent_idx) = min_index(&series.closes, split, len) else {
            return Outcome::new(false, 0.0, "no recent trough".to_string());
        };

        let prior_low = series.closes[prior_idx];
        let recent_low = series.closes[recent_idx];
        if recent_low >= prior_low {
            return Outcome::new(
                false,
                0.0,
                format!(
                    "no lower low in the recent window ({:.2} vs {:.2})",
                    recent_low, prior_low
                ),
            );
        }

        let prior_rsi = rsi_at(&series.closes, self.params.rsi_period, prior_idx + 1);
        let recent_rsi = rsi_at(&series.closes, self.params.rsi_period, recent_idx + 1);
        let (Some(prior_rsi), Some(recent_rsi)) = (prior_rsi, recent_rsi) else {
            return Outcome::new(false, 0.0, "rsi unavailable at trough".to_string());
        };

        let passed = recent_rsi > prior_rsi;
        let score = ratio_score(recent_rsi, prior_rsi.max(1.0));
        Outcome::new(
            passed,
            score,
            format!(
                "price low {:.2} under prior {:.2}, RSI {:.1} vs {:.1}",
                recent_low, prior_low, recent_rsi, prior_rsi
            ),
        )
    }
}

/// Short-window realized volatility waking up against the long window
pub struct VolatilityExpansion {
    params: VolatilityExpansionParams,
}

impl VolatilityExpansion {
    pub fn new(params: VolatilityExpansionParams) -> Self {
        Self { params }
    }
}

impl Condition for VolatilityExpansion {
    fn id(&self) -> &'static str {
        "volatility_expansion"
    }

    fn group(&self) -> ConditionGroup {
        ConditionGroup::Booster
    }

    fn description(&self) -> &'static str {
        "Near-term volatility expanding off a quiet base"
    }

    fn required_history(&self) -> usize {
        self.params.long_window + 1
    }

    fn evaluate(&self, series: &SeriesView) -> Outcome {
        let len = series.len();
        let short = realized_vol_at(&series.closes, self.params.short_window, len);
        let long = realized_vol_at(&series.closes, self.params.long_window, len);
        let (Some(short), Some(long)) = (short, long) else {
            return Outcome::new(false, 0.0, "volatility unavailable".to_string());
        };
        if long <= 0.0 {
            return Outcome::new(false, 0.0, "volatility dormant across the window".to_string());
        }

        let ratio = short / long;
        let passed = ratio >= self.params.min_ratio;
        let score = ratio_score(ratio, self.params.min_ratio);
        Outcome::new(
            passed,
            score,
            format!(
                "{}d vol {:.2} vs {}d {:.2} (ratio {:.2})",
                self.params.short_window, short, self.params.long_window, long, ratio
            ),
        )
    }
}

/// Price sitting close to the long-lookback support shelf
pub struct SupportProximity {
    params: SupportProximityParams,
}

impl SupportProximity {
    pub fn new(params: SupportProximityParams) -> Self {
        Self { params }
    }
}

impl Condition for SupportProximity {
    fn id(&self) -> &'static str {
        "support_proximity"
    }

    fn group(&self) -> ConditionGroup {
        ConditionGroup::Booster
    }

    fn description(&self) -> &'static str {
        "Price holding near long-term support"
    }

    fn required_history(&self) -> usize {
        self.params.lookback
    }

    fn evaluate(&self, series: &SeriesView) -> Outcome {
        let len = series.len();
        let Some(low_idx) = min_index(&series.lows, len - self.params.lookback, len) else {
            return Outcome::new(false, 0.0, "no support level".to_string());
        };
        let support = series.lows[low_idx];
        let Some(close) = series.last_close() else {
            return Outcome::new(false, 0.0, "no closing price".to_string());
        };
        if support <= 0.0 {
            return Outcome::new(false, 0.0, "support level not positive".to_string());
        }

        let distance = (close - support) / support;
        let passed = distance <= self.params.max_distance;
        let score = inverse_ratio_score(distance, self.params.max_distance);
        Outcome::new(
            passed,
            score,
            format!(
                "close {:.1}% above {}d support (threshold {:.0}%)",
                distance * 100.0,
                self.params.lookback,
                self.params.max_distance * 100.0
            ),
        )
    }
}

/// Moving averages across timeframes turning up together
pub struct TimeframeConvergence {
    params: TimeframeConvergenceParams,
}

impl TimeframeConvergence {
    pub fn new(params: TimeframeConvergenceParams) -> Self {
        Self { params }
    }
}

impl Condition for TimeframeConvergence {
    fn id(&self) -> &'static str {
        "timeframe_convergence"
    }

    fn group(&self) -> ConditionGroup {
        ConditionGroup::Booster
    }

    fn description(&self) -> &'static str {
        "Fast, mid, and slow moving averages aligning upward"
    }

    fn required_history(&self) -> usize {
        self.params
            .slow_period
            .max(self.params.mid_period + SLOPE_SPAN)
    }

    fn evaluate(&self, series: &SeriesView) -> Outcome {
        let fast = sma(&series.closes, self.params.fast_period);
        let mid = sma(&series.closes, self.params.mid_period);
        let slow = sma(&series.closes, self.params.slow_period);
        let slope = sma_slope(&series.closes, self.params.mid_period, SLOPE_SPAN);
        let (Some(fast), Some(mid), Some(slow), Some(slope)) = (fast, mid, slow, slope) else {
            return Outcome::new(false, 0.0, "moving averages unavailable".to_string());
        };
        if mid <= 0.0 || slow <= 0.0 {
            return Outcome::new(false, 0.0, "moving averages not positive".to_string());
        }

        let mid_rising = slope > 0.0;
        let passed = fast > mid && mid_rising;
        let score = 0.5 * ratio_score(fast, mid)
            + 0.25 * ratio_score(mid, slow)
            + 0.25 * if mid_rising { 1.0 } else { 0.0 };
        Outcome::new(
            passed,
            score,
            format!(
                "{}d MA {:.2} vs {}d {:.2}, {}d slope {:+.2}%",
                self.params.fast_period,
                fast,
                self.params.mid_period,
                mid,
                self.params.mid_period,
                slope * 100.0
            ),
        )
    }
}
