//! Indicator math shared by the condition set
//!
//! All helpers are pure and return None when the input is shorter than the
//! requested window, so callers can surface insufficient history instead of
//! fabricating values.

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    sma_at(values, period, values.len())
}

/// Simple moving average of the `period` values ending at index `end` (exclusive)
pub fn sma_at(values: &[f64], period: usize, end: usize) -> Option<f64> {
    if period == 0 || end > values.len() || end < period {
        return None;
    }
    let window = &values[end - period..end];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Fractional change of a moving average over the last `span` steps
pub fn sma_slope(values: &[f64], period: usize, span: usize) -> Option<f64> {
    if span == 0 {
        return None;
    }
    let now = sma_at(values, period, values.len())?;
    let then = sma_at(values, period, values.len().checked_sub(span)?)?;
    if then <= 0.0 {
        return None;
    }
    Some((now - then) / then)
}

/// Wilder-style RSI over the last `period` changes
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    rsi_at(values, period, values.len())
}

/// RSI of the `period` changes ending at index `end` (exclusive)
pub fn rsi_at(values: &[f64], period: usize, end: usize) -> Option<f64> {
    if period == 0 || end > values.len() || end < period + 1 {
        return None;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in (end - period)..end {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }

    if losses == 0.0 {
        return Some(100.0);
    }

    let rs = gains / losses;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// Population standard deviation
pub fn stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Annualized realized volatility from the last `window` daily log returns
pub fn realized_vol(closes: &[f64], window: usize) -> Option<f64> {
    realized_vol_at(closes, window, closes.len())
}

/// Annualized realized volatility of the `window` returns ending at `end` (exclusive)
pub fn realized_vol_at(closes: &[f64], window: usize, end: usize) -> Option<f64> {
    if window < 2 || end > closes.len() || end < window + 1 {
        return None;
    }

    let mut returns = Vec::with_capacity(window);
    for i in (end - window)..end {
        if closes[i - 1] <= 0.0 || closes[i] <= 0.0 {
            return None;
        }
        returns.push((closes[i] / closes[i - 1]).ln());
    }

    stddev(&returns).map(|sd| sd * (365.0_f64).sqrt())
}

/// Fraction of samples at or below `value`
pub fn percentile_rank(samples: &[f64], value: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let below = samples.iter().filter(|s| **s <= value).count();
    Some(below as f64 / samples.len() as f64)
}

/// Closeness score for "value should reach threshold": 1.0 at or above, tapering below
pub fn ratio_score(value: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 0.0;
    }
    (value / threshold).clamp(0.0, 1.0)
}

/// Closeness score for "value should stay under threshold": 1.0 at or below, tapering above
pub fn inverse_ratio_score(value: f64, threshold: f64) -> f64 {
    if value <= 0.0 {
        return 1.0;
    }
    (threshold / value).clamp(0.0, 1.0)
}

/// Index of the minimum value in `values[start..end)`
pub fn min_index(values: &[f64], start: usize, end: usize) -> Option<usize> {
    if start >= end || end > values.len() {
        return None;
    }
    let mut best = start;
    for i in start..end {
        if values[i] < values[best] {
            best = i;
        }
    }
    Some(best)
}
