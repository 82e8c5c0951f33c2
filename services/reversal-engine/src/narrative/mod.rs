//! Narrative sub-score from prediction markets
//!
//! Each catalog signal maps one external market to a bullish probability.
//! The weighted mean of the resolved probabilities, scaled to the configured
//! maximum, becomes the narrative sub-score.

pub mod briefs;
pub mod catalog;
pub mod normalize;

pub use briefs::{HttpBriefSource, NarrativeBriefSource, StaticBriefSource, MAX_BRIEFS};
pub use catalog::{find_signal, SIGNAL_CATALOG};
pub use normalize::{normalize, NEUTRAL_PROBABILITY};

use crate::config::AppCfg;
use crate::models::{NarrativeAggregate, NarrativeSignal, SignalReading};
use futures::future::join_all;
use market_data::types::{MarketDataError, MarketSource, NormalizedMarket};
use tracing::warn;

/// Fetch every catalog market concurrently and fold the normalized
/// probabilities into one weighted aggregate.
///
/// A market that is missing or unreachable drops out of the mean and leaves
/// a reason behind; a malformed one stays in at the neutral probability.
pub async fn collect(markets: &dyn MarketSource, cfg: &AppCfg) -> NarrativeAggregate {
    let fetches = join_all(
        SIGNAL_CATALOG
            .iter()
            .map(|signal| markets.fetch_market(signal.slug)),
    )
    .await;

    let mut readings = Vec::with_capacity(SIGNAL_CATALOG.len());
    let mut reasons = Vec::new();
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;

    for (signal, fetched) in SIGNAL_CATALOG.iter().zip(fetches) {
        let weight = cfg.signal_weight(signal.id, signal.weight);

        match fetched {
            Ok(Some(market)) => {
                let probability = normalize(signal.scoring_mode, &market);
                weighted_sum += probability * weight;
                weight_sum += weight;
                readings.push(reading(signal, Some(probability), resolved_detail(&market, probability)));
            }
            Ok(None) => {
                warn!(slug = signal.slug, "Narrative market not found");
                reasons.push(format!("market {} not found", signal.slug));
                readings.push(reading(signal, None, "market not found".to_string()));
            }
            Err(MarketDataError::MarketMalformed { slug, reason }) => {
                warn!(slug = %slug, reason = %reason, "Malformed narrative market, scoring neutral");
                weighted_sum += NEUTRAL_PROBABILITY * weight;
                weight_sum += weight;
                readings.push(reading(
                    signal,
                    Some(NEUTRAL_PROBABILITY),
                    format!("malformed market data ({}), scored neutral", reason),
                ));
            }
            Err(err) => {
                warn!(slug = signal.slug, error = %err, "Narrative market fetch failed");
                reasons.push(format!("{} fetch failed: {}", signal.id, err));
                readings.push(reading(signal, None, format!("fetch failed: {}", err)));
            }
        }
    }

    let score = if weight_sum > 0.0 {
        Some((weighted_sum / weight_sum) * cfg.scoring.narrative_max)
    } else {
        None
    };

    NarrativeAggregate {
        score,
        readings,
        reasons,
    }
}

fn reading(signal: &NarrativeSignal, probability: Option<f64>, detail: String) -> SignalReading {
    SignalReading {
        id: signal.id.to_string(),
        title: signal.title.to_string(),
        category: signal.category.to_string(),
        probability,
        detail,
    }
}

fn resolved_detail(market: &NormalizedMarket, probability: f64) -> String {
    format!("{:.0}% bullish from \"{}\"", probability * 100.0, market.question)
}
