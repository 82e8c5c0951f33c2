// Normalization logic for raw candle series before they are cached or served
use crate::types::*;
use rust_decimal::Decimal;

/// Normalize a raw series into the shape downstream consumers rely on:
/// ascending by timestamp, one candle per timestamp (last write wins),
/// no non-positive closes.
pub fn normalize_series(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.retain(|c| c.close > Decimal::ZERO);
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by(|b, a| {
        if a.timestamp == b.timestamp {
            // Keep the later-arriving candle for the duplicate timestamp
            *a = b.clone();
            true
        } else {
            false
        }
    });
    candles
}

/// Validate that a candle is internally consistent
pub fn validate_candle(candle: &Candle) -> Result<()> {
    if candle.close <= Decimal::ZERO {
        return Err(MarketDataError::InvalidResponse(
            "Candle close must be positive".to_string(),
        ));
    }

    if candle.high < candle.low {
        return Err(MarketDataError::InvalidResponse(format!(
            "Candle high {} below low {}",
            candle.high, candle.low
        )));
    }

    if candle.volume < Decimal::ZERO {
        return Err(MarketDataError::InvalidResponse(
            "Candle volume must be non-negative".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn candle(day: i64, close: i64) -> Candle {
        Candle {
            asset: "BTC".to_string(),
            open: Decimal::from(close),
            high: Decimal::from(close + 1),
            low: Decimal::from(close - 1),
            close: Decimal::from(close),
            volume: Decimal::from(1000),
            timestamp: Utc.timestamp_opt(day * 86_400, 0).unwrap(),
        }
    }

    #[test]
    fn sorts_ascending_and_dedups() {
        let raw = vec![candle(3, 30), candle(1, 10), candle(2, 20), candle(1, 11)];
        let normalized = normalize_series(raw);

        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0].close, Decimal::from(11));
        assert!(normalized.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn drops_non_positive_closes() {
        let mut bad = candle(2, 20);
        bad.close = Decimal::ZERO;
        let normalized = normalize_series(vec![candle(1, 10), bad]);

        assert_eq!(normalized.len(), 1);
    }

    #[test]
    fn rejects_inverted_high_low() {
        let mut c = candle(1, 10);
        c.high = Decimal::from(5);
        c.low = Decimal::from(9);

        assert!(validate_candle(&c).is_err());
    }
}
