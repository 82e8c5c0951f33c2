//! Probability normalization for prediction-market signals
//!
//! `normalize` is a pure total function: whatever shape the market arrives
//! in, it returns a probability in [0,1] and never errors across this
//! boundary. Anomalies are logged and mapped to the neutral probability.

use crate::models::ScoringMode;
use market_data::types::NormalizedMarket;

/// Returned whenever a market cannot be scored sensibly
pub const NEUTRAL_PROBABILITY: f64 = 0.5;

/// Outcome labels counting toward the easing bucket in rate markets
const CUT_KEYWORDS: [&str; 3] = ["cut", "decrease", "lower"];

/// Map a market's outcome prices to a bullish probability under `mode`
pub fn normalize(mode: ScoringMode, market: &NormalizedMarket) -> f64 {
    if market.outcomes.is_empty() || market.outcomes.len() != market.prices.len() {
        tracing::warn!(
            slug = %market.slug,
            outcomes = market.outcomes.len(),
            prices = market.prices.len(),
            "Malformed market shape, applying neutral probability"
        );
        return NEUTRAL_PROBABILITY;
    }

    let probability = match mode {
        ScoringMode::BinaryGood => yes_probability(market),
        ScoringMode::BinaryBad => 1.0 - yes_probability(market),
        ScoringMode::FedCut => cut_probability(market),
    };

    // Upstream prices can sum slightly past 1 when the book is inefficient;
    // the clamp keeps the contract without rejecting the market
    clamp01(probability)
}

/// P(Yes) located by case-insensitive label match. Markets without an
/// explicit Yes outcome fall back to index 0; upstream ordering is assumed
/// stable there, which is logged as an assumption every time it is used.
fn yes_probability(market: &NormalizedMarket) -> f64 {
    let yes_idx = market
        .outcomes
        .iter()
        .position(|label| label.eq_ignore_ascii_case("yes"));

    let idx = match yes_idx {
        Some(idx) => idx,
        None => {
            tracing::warn!(
                slug = %market.slug,
                first_outcome = %market.outcomes[0],
                "No explicit Yes outcome, assuming index 0 is the positive side"
            );
            0
        }
    };

    match market.price_at(idx) {
        Some(price) if price.is_finite() => price,
        _ => {
            tracing::warn!(slug = %market.slug, idx, "Unusable price, applying neutral probability");
            NEUTRAL_PROBABILITY
        }
    }
}

/// Sum of probabilities across outcomes labeled as easing, however many
/// rate buckets the market defines
fn cut_probability(market: &NormalizedMarket) -> f64 {
    market
        .outcomes
        .iter()
        .zip(market.prices.iter())
        .filter(|(label, price)| is_cut_label(label) && price.is_finite())
        .map(|(_, price)| price)
        .sum()
}

fn is_cut_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    CUT_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

pub fn clamp01(value: f64) -> f64 {
    if !value.is_finite() {
        return NEUTRAL_PROBABILITY;
    }
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn market(outcomes: &[&str], prices: &[f64]) -> NormalizedMarket {
        NormalizedMarket {
            slug: "test-market".to_string(),
            question: "Test?".to_string(),
            outcomes: outcomes.iter().map(|s| s.to_string()).collect(),
            prices: prices.to_vec(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn binary_good_reads_the_yes_outcome_case_insensitively() {
        let m = market(&["No", "YES"], &[0.35, 0.65]);
        assert_eq!(normalize(ScoringMode::BinaryGood, &m), 0.65);
    }

    #[test]
    fn binary_bad_is_the_complement_of_binary_good() {
        let m = market(&["Yes", "No"], &[0.3, 0.7]);
        let good = normalize(ScoringMode::BinaryGood, &m);
        let bad = normalize(ScoringMode::BinaryBad, &m);
        assert!((good + bad - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_yes_label_falls_back_to_index_zero() {
        let m = market(&["Up", "Down"], &[0.58, 0.42]);
        assert_eq!(normalize(ScoringMode::BinaryGood, &m), 0.58);
    }

    #[test]
    fn fed_cut_sums_every_easing_bucket() {
        let m = market(
            &["50+ bps cut", "25 bps decrease", "No change", "25 bps hike"],
            &[0.15, 0.45, 0.30, 0.10],
        );
        assert_eq!(normalize(ScoringMode::FedCut, &m), 0.6);
    }

    #[test]
    fn fed_cut_is_invariant_under_outcome_reordering() {
        let a = market(
            &["25 bps cut", "No change", "Lower by 50"],
            &[0.2, 0.5, 0.3],
        );
        let b = market(
            &["Lower by 50", "25 bps cut", "No change"],
            &[0.3, 0.2, 0.5],
        );
        assert_eq!(
            normalize(ScoringMode::FedCut, &a),
            normalize(ScoringMode::FedCut, &b)
        );
    }

    #[test]
    fn normalize_is_pure() {
        let m = market(&["Yes", "No"], &[0.42, 0.58]);
        let first = normalize(ScoringMode::BinaryGood, &m);
        let second = normalize(ScoringMode::BinaryGood, &m);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_outcomes_map_to_neutral() {
        let m = market(&[], &[]);
        assert_eq!(normalize(ScoringMode::BinaryGood, &m), NEUTRAL_PROBABILITY);
        assert_eq!(normalize(ScoringMode::FedCut, &m), NEUTRAL_PROBABILITY);
    }

    #[test]
    fn mismatched_lengths_map_to_neutral() {
        let m = market(&["Yes", "No"], &[0.6]);
        assert_eq!(normalize(ScoringMode::BinaryGood, &m), NEUTRAL_PROBABILITY);
    }

    #[test]
    fn inefficient_books_are_clamped_not_rejected() {
        let m = market(&["cut deep", "cut shallow"], &[0.7, 0.4]);
        assert_eq!(normalize(ScoringMode::FedCut, &m), 1.0);
    }

    #[test]
    fn non_finite_prices_map_to_neutral() {
        let m = market(&["Yes", "No"], &[f64::NAN, 0.4]);
        assert_eq!(normalize(ScoringMode::BinaryGood, &m), NEUTRAL_PROBABILITY);
    }
}
