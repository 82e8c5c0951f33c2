//! Static catalog of prediction-market narrative signals
//!
//! Weights are defaults; operators can override per id under
//! `[narrative.weights]` in config.

use crate::models::{NarrativeSignal, ScoringMode};

pub const SIGNAL_CATALOG: [NarrativeSignal; 5] = [
    NarrativeSignal {
        id: "fed_cut",
        title: "Fed cuts rates this year",
        slug: "fed-rate-decision-2026",
        scoring_mode: ScoringMode::FedCut,
        category: "macro",
        weight: 1.5,
    },
    NarrativeSignal {
        id: "btc_new_high",
        title: "Bitcoin prints a new all-time high this year",
        slug: "bitcoin-all-time-high-2026",
        scoring_mode: ScoringMode::BinaryGood,
        category: "market",
        weight: 1.25,
    },
    NarrativeSignal {
        id: "etf_inflows",
        title: "Spot ETF net inflows continue this quarter",
        slug: "btc-etf-net-inflows-q3-2026",
        scoring_mode: ScoringMode::BinaryGood,
        category: "flows",
        weight: 1.0,
    },
    NarrativeSignal {
        id: "us_recession",
        title: "US recession declared this year",
        slug: "us-recession-2026",
        scoring_mode: ScoringMode::BinaryBad,
        category: "macro",
        weight: 1.0,
    },
    NarrativeSignal {
        id: "stablecoin_depeg",
        title: "A top-five stablecoin depegs this year",
        slug: "major-stablecoin-depeg-2026",
        scoring_mode: ScoringMode::BinaryBad,
        category: "risk",
        weight: 0.75,
    },
];

/// Look up a catalog entry by id
pub fn find_signal(id: &str) -> Option<&'static NarrativeSignal> {
    SIGNAL_CATALOG.iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_and_slugs_are_unique() {
        for (i, a) in SIGNAL_CATALOG.iter().enumerate() {
            for b in SIGNAL_CATALOG.iter().skip(i + 1) {
                assert_ne!(a.id, b.id);
                assert_ne!(a.slug, b.slug);
            }
        }
    }

    #[test]
    fn find_signal_resolves_known_ids() {
        let fed = find_signal("fed_cut").unwrap();
        assert_eq!(fed.scoring_mode, ScoringMode::FedCut);
        assert!(find_signal("unknown").is_none());
    }

    #[test]
    fn catalog_weights_are_positive() {
        for signal in SIGNAL_CATALOG.iter() {
            assert!(signal.weight > 0.0, "{} has non-positive weight", signal.id);
        }
    }
}
