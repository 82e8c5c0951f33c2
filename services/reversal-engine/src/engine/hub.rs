//! Evaluation hub
//!
//! Owns the shared evaluation state: the latest published snapshot, the
//! last known good sub-scores, and the monotonic ticket that keeps
//! overlapping evaluations from publishing out of order. Everything the
//! API serves comes from here; everything the scheduler triggers lands
//! here.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, warn};

use market_data::types::{Freshness, MarketSource};
use market_data::SeriesProvider;

use crate::alerting::AlertManager;
use crate::conditions::{self, ConditionEvaluator};
use crate::config::AppCfg;
use crate::db::SnapshotStore;
use crate::engine::{EngineInputs, PhaseEngine};
use crate::models::{
    ConditionGroup, ConditionResult, NarrativeAggregate, ReversalState, Stage, SubScores,
};
use crate::narrative;
use crate::observability::{metrics, MetricsCollector};
use crate::webhook::{fire_alert_with_webhook, WebhookNotifier};

/// Outcome of one evaluation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluateOutcome {
    /// The snapshot was published as the latest
    Applied { previous_stage: Option<Stage> },
    /// A newer evaluation started while this one was in flight
    Superseded,
    /// No series data and no cached copy; the previous snapshot stands
    NoData,
}

/// Everything the display layer needs about the latest evaluation
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub state: ReversalState,
    pub conditions: Vec<ConditionResult>,
    pub narrative: NarrativeAggregate,
}

struct HubInner {
    latest: Option<Evaluation>,
    last_good: SubScores,
}

pub struct EvaluationHub {
    cfg: AppCfg,
    engine: PhaseEngine,
    evaluator: ConditionEvaluator,
    series: Arc<SeriesProvider>,
    markets: Arc<dyn MarketSource>,
    store: SnapshotStore,
    alerts: AlertManager,
    webhook: WebhookNotifier,
    metrics: MetricsCollector,
    ticket: AtomicU64,
    inner: RwLock<HubInner>,
}

impl EvaluationHub {
    pub fn new(
        cfg: AppCfg,
        series: Arc<SeriesProvider>,
        markets: Arc<dyn MarketSource>,
        store: SnapshotStore,
        webhook: WebhookNotifier,
        metrics: MetricsCollector,
    ) -> Self {
        let engine = PhaseEngine::new(cfg.scoring.clone(), cfg.stages.clone());
        let evaluator = ConditionEvaluator::from_config(&cfg.conditions);
        let alerts = AlertManager::new(cfg.alerts.clone());

        Self {
            cfg,
            engine,
            evaluator,
            series,
            markets,
            store,
            alerts,
            webhook,
            metrics,
            ticket: AtomicU64::new(0),
            inner: RwLock::new(HubInner {
                latest: None,
                last_good: SubScores::default(),
            }),
        }
    }

    /// Claim a ticket for a new evaluation. Tickets are strictly increasing;
    /// only the holder of the newest ticket may publish.
    fn begin(&self) -> u64 {
        self.ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, token: u64) -> bool {
        token == self.ticket.load(Ordering::SeqCst)
    }

    /// Latest published evaluation, if any has completed yet
    pub async fn latest(&self) -> Option<Evaluation> {
        self.inner.read().await.latest.clone()
    }

    pub fn condition_count(&self) -> usize {
        self.evaluator.condition_count()
    }

    pub fn condition_catalog(&self) -> Vec<conditions::ConditionInfo> {
        self.evaluator.catalog()
    }

    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run one full evaluation: fetch, score, classify, publish, persist.
    ///
    /// Safe to call concurrently; when runs overlap, the one holding the
    /// newest ticket wins and the rest discard their work.
    pub async fn evaluate_once(&self) -> anyhow::Result<EvaluateOutcome> {
        let token = self.begin();
        let started = Instant::now();
        let evaluated_at = Utc::now();

        let fetch = match self
            .series
            .series(&self.cfg.data.symbol, self.cfg.data.series_days)
            .await
        {
            Ok(fetch) => fetch,
            Err(e) => {
                warn!("Evaluation has no series data: {}", e);
                self.metrics.increment(metrics::SERIES_FETCH_ERRORS, 1).await;
                return Ok(EvaluateOutcome::NoData);
            }
        };

        let stale = fetch.freshness == Freshness::Stale;
        let conditions = self.evaluator.evaluate(&fetch.candles, stale);

        let trend_raw = conditions::group_score(&conditions, ConditionGroup::Gate)
            .map(|s| s * self.cfg.scoring.trend_max);
        let cycle_base_raw = conditions::group_score(&conditions, ConditionGroup::Booster)
            .map(|s| s * self.cfg.scoring.cycle_base_max);

        let aggregate = narrative::collect(self.markets.as_ref(), &self.cfg).await;
        if !aggregate.reasons.is_empty() {
            self.metrics
                .increment(metrics::NARRATIVE_SIGNALS_MISSING, aggregate.reasons.len() as u64)
                .await;
        }

        let mut carried_reasons = Vec::new();
        if stale {
            carried_reasons.push("series data is stale".to_string());
        }
        carried_reasons.extend(aggregate.reasons.iter().cloned());

        let last_good = self.inner.read().await.last_good;
        let inputs = EngineInputs {
            conditions: &conditions,
            trend_raw,
            cycle_base_raw,
            cycle_user_raw: self.cfg.scoring.cycle_user,
            narrative_raw: aggregate.score,
            carried_reasons,
            evaluated_at,
        };
        let state = self.engine.evaluate(inputs, &last_good);

        let outcome = self
            .publish(token, state.clone(), conditions, aggregate, trend_raw, cycle_base_raw)
            .await;

        match &outcome {
            EvaluateOutcome::Applied { previous_stage } => {
                let elapsed_ms = started.elapsed().as_millis() as f64;
                self.metrics.increment(metrics::EVALUATIONS, 1).await;
                self.metrics
                    .histogram(metrics::EVALUATION_DURATION_MS, elapsed_ms)
                    .await;
                self.metrics.gauge(metrics::FINAL_SCORE, state.final_score).await;
                self.metrics
                    .gauge(metrics::GATES_PASSED, state.gates_passed as f64)
                    .await;
                if state.degraded {
                    self.metrics.increment(metrics::EVALUATIONS_DEGRADED, 1).await;
                }

                info!(
                    stage = %state.stage,
                    score = state.final_score,
                    gates = state.gates_passed,
                    zone = %state.cycle_zone,
                    degraded = state.degraded,
                    elapsed_ms,
                    "Evaluation published"
                );

                self.persist(&state).await;
                self.notify(*previous_stage, &state).await;
            }
            EvaluateOutcome::Superseded => {
                self.metrics.increment(metrics::EVALUATIONS_SUPERSEDED, 1).await;
                info!("Evaluation superseded by a newer run, discarding result");
            }
            EvaluateOutcome::NoData => {}
        }

        Ok(outcome)
    }

    /// Swap in the new evaluation unless a newer ticket exists. The last
    /// known good values update only from components that were computed
    /// fresh this cycle, never from substituted ones.
    async fn publish(
        &self,
        token: u64,
        state: ReversalState,
        conditions: Vec<ConditionResult>,
        narrative: NarrativeAggregate,
        trend_raw: Option<f64>,
        cycle_base_raw: Option<f64>,
    ) -> EvaluateOutcome {
        let mut inner = self.inner.write().await;
        if !self.is_current(token) {
            return EvaluateOutcome::Superseded;
        }

        if let Some(value) = trend_raw.filter(|v| v.is_finite()) {
            inner.last_good.trend = value;
        }
        if let Some(value) = cycle_base_raw.filter(|v| v.is_finite()) {
            inner.last_good.cycle_base = value;
        }
        if self.cfg.scoring.cycle_user.is_finite() {
            inner.last_good.cycle_user = self.cfg.scoring.cycle_user;
        }
        if let Some(value) = narrative.score.filter(|v| v.is_finite()) {
            inner.last_good.narrative = value;
        }

        let previous_stage = inner.latest.as_ref().map(|e| e.state.stage);
        inner.latest = Some(Evaluation {
            state,
            conditions,
            narrative,
        });

        EvaluateOutcome::Applied { previous_stage }
    }

    async fn persist(&self, state: &ReversalState) {
        match self.store.insert(state).await {
            Ok(_) => {
                self.metrics.increment(metrics::SNAPSHOTS_PERSISTED, 1).await;
            }
            Err(e) => {
                warn!("Failed to persist snapshot: {}", e);
                self.metrics
                    .increment(metrics::SNAPSHOT_PERSIST_ERRORS, 1)
                    .await;
                if let Some(alert) = self.alerts.check_persist_failure(&e.to_string()).await {
                    fire_alert_with_webhook(&self.alerts, &self.webhook, &alert, alert.severity())
                        .await;
                }
            }
        }
    }

    async fn notify(&self, previous_stage: Option<Stage>, state: &ReversalState) {
        if let Some(alert) = self.alerts.check_stage_transition(previous_stage, state).await {
            self.metrics.increment(metrics::STAGE_TRANSITIONS, 1).await;
            self.metrics.increment(metrics::ALERTS_SENT, 1).await;
            fire_alert_with_webhook(&self.alerts, &self.webhook, &alert, alert.severity()).await;
        }

        if let Some(alert) = self.alerts.check_degraded(state).await {
            self.metrics.increment(metrics::ALERTS_SENT, 1).await;
            fire_alert_with_webhook(&self.alerts, &self.webhook, &alert, alert.severity()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::WebhookConfig;
    use chrono::{TimeZone, Utc};
    use market_data::types::{Candle, MarketDataError, NormalizedMarket, SeriesSource, SourceHealth};
    use rust_decimal::Decimal;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    struct StubSeries {
        fail: AtomicBool,
        days: u32,
    }

    #[async_trait::async_trait]
    impl SeriesSource for StubSeries {
        async fn fetch_series(
            &self,
            symbol: &str,
            days: u32,
        ) -> market_data::types::Result<Vec<Candle>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MarketDataError::ApiError("source down".to_string()));
            }
            let count = days.min(self.days) as i64;
            Ok((0..count)
                .map(|i| Candle {
                    asset: symbol.to_string(),
                    open: Decimal::from(100),
                    high: Decimal::from(110),
                    low: Decimal::from(90),
                    close: Decimal::from(100 + i % 7),
                    volume: Decimal::from(1_000),
                    timestamp: Utc.timestamp_opt((i + 1) * 86_400, 0).unwrap(),
                })
                .collect())
        }

        async fn health(&self) -> SourceHealth {
            SourceHealth {
                source: "stub-series".to_string(),
                is_healthy: true,
                last_success: None,
                last_error: None,
                success_rate: 1.0,
                avg_latency_ms: 0,
            }
        }

        fn name(&self) -> &str {
            "stub-series"
        }
    }

    struct StubMarkets {
        fail: AtomicBool,
        probability: f64,
    }

    #[async_trait::async_trait]
    impl MarketSource for StubMarkets {
        async fn fetch_market(
            &self,
            slug: &str,
        ) -> market_data::types::Result<Option<NormalizedMarket>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MarketDataError::DataUnavailable("markets down".to_string()));
            }
            // Yes-probability that normalizes to `probability` for good
            // signals and to the complement-adjusted same value for bad ones
            let yes = match slug {
                "us-recession-2026" | "major-stablecoin-depeg-2026" => 1.0 - self.probability,
                "fed-rate-decision-2026" => {
                    return Ok(Some(NormalizedMarket {
                        slug: slug.to_string(),
                        question: "Fed decision".to_string(),
                        outcomes: vec!["25 bps cut".to_string(), "No change".to_string()],
                        prices: vec![self.probability, 1.0 - self.probability],
                        fetched_at: Utc::now(),
                    }));
                }
                _ => self.probability,
            };
            Ok(Some(NormalizedMarket {
                slug: slug.to_string(),
                question: format!("Question for {}", slug),
                outcomes: vec!["Yes".to_string(), "No".to_string()],
                prices: vec![yes, 1.0 - yes],
                fetched_at: Utc::now(),
            }))
        }

        async fn health(&self) -> SourceHealth {
            SourceHealth {
                source: "stub-markets".to_string(),
                is_healthy: true,
                last_success: None,
                last_error: None,
                success_rate: 1.0,
                avg_latency_ms: 0,
            }
        }

        fn name(&self) -> &str {
            "stub-markets"
        }
    }

    fn hub_with(
        series_fail: bool,
        series_days: u32,
        market_probability: f64,
    ) -> (Arc<EvaluationHub>, Arc<StubSeries>, Arc<StubMarkets>) {
        let series_source = Arc::new(StubSeries {
            fail: AtomicBool::new(series_fail),
            days: series_days,
        });
        let markets = Arc::new(StubMarkets {
            fail: AtomicBool::new(false),
            probability: market_probability,
        });
        let provider = Arc::new(
            SeriesProvider::new(series_source.clone() as Arc<dyn SeriesSource>)
                .with_ttl(Duration::ZERO),
        );
        let webhook = WebhookNotifier::new(WebhookConfig {
            email_webhook_url: None,
            alert_email_to: "test@example.com".to_string(),
            timeout_secs: 1,
        });
        let hub = EvaluationHub::new(
            AppCfg::default(),
            provider,
            markets.clone() as Arc<dyn MarketSource>,
            SnapshotStore::memory(),
            webhook,
            MetricsCollector::new(),
        );
        (Arc::new(hub), series_source, markets)
    }

    #[tokio::test]
    async fn evaluation_publishes_and_persists_a_snapshot() {
        let (hub, _, _) = hub_with(false, 30, 0.6);

        let outcome = hub.evaluate_once().await.unwrap();
        assert_eq!(outcome, EvaluateOutcome::Applied { previous_stage: None });

        let latest = hub.latest().await.unwrap();
        assert_eq!(latest.conditions.len(), hub.condition_count());
        assert!(!latest.state.degraded);

        let history = hub.snapshot_store().history(5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].final_score, latest.state.final_score);

        assert_eq!(hub.metrics.get_counter(metrics::EVALUATIONS).await, 1);
        assert_eq!(hub.metrics.get_counter(metrics::SNAPSHOTS_PERSISTED).await, 1);
    }

    #[tokio::test]
    async fn second_evaluation_carries_the_previous_stage() {
        let (hub, _, _) = hub_with(false, 30, 0.6);

        hub.evaluate_once().await.unwrap();
        let first_stage = hub.latest().await.unwrap().state.stage;

        let outcome = hub.evaluate_once().await.unwrap();
        assert_eq!(
            outcome,
            EvaluateOutcome::Applied {
                previous_stage: Some(first_stage)
            }
        );
    }

    #[tokio::test]
    async fn no_series_and_no_cache_leaves_latest_untouched() {
        let (hub, _, _) = hub_with(true, 30, 0.6);

        let outcome = hub.evaluate_once().await.unwrap();
        assert_eq!(outcome, EvaluateOutcome::NoData);
        assert!(hub.latest().await.is_none());
        assert_eq!(hub.metrics.get_counter(metrics::SERIES_FETCH_ERRORS).await, 1);
    }

    #[tokio::test]
    async fn stale_series_degrades_but_still_publishes() {
        let (hub, series_source, _) = hub_with(false, 30, 0.6);

        hub.evaluate_once().await.unwrap();
        series_source.fail.store(true, Ordering::SeqCst);
        hub.evaluate_once().await.unwrap();

        let latest = hub.latest().await.unwrap();
        assert!(latest.state.degraded);
        assert!(latest
            .state
            .degraded_reasons
            .iter()
            .any(|r| r.contains("stale")));
        assert!(latest.conditions[0].detail.contains("[stale data]"));
    }

    #[tokio::test]
    async fn narrative_outage_substitutes_the_last_good_score() {
        let (hub, _, markets) = hub_with(false, 30, 0.6);

        hub.evaluate_once().await.unwrap();
        let first = hub.latest().await.unwrap();
        // All five signals normalize to 0.6 against a max of 50
        assert!((first.state.narrative_component - 30.0).abs() < 1e-9);

        markets.fail.store(true, Ordering::SeqCst);
        hub.evaluate_once().await.unwrap();

        let second = hub.latest().await.unwrap();
        assert!(second.state.degraded);
        assert!((second.state.narrative_component - 30.0).abs() < 1e-9);
        assert!(second.narrative.score.is_none());
        assert!(second
            .state
            .degraded_reasons
            .iter()
            .any(|r| r.contains("narrative")));
    }

    #[tokio::test]
    async fn stale_ticket_cannot_publish() {
        let (hub, _, _) = hub_with(false, 30, 0.6);

        hub.evaluate_once().await.unwrap();
        let published = hub.latest().await.unwrap();

        let old_token = hub.begin();
        let _newer_token = hub.begin();

        let state = published.state.clone();
        let outcome = hub
            .publish(old_token, state, Vec::new(), NarrativeAggregate {
                score: None,
                readings: Vec::new(),
                reasons: Vec::new(),
            }, None, None)
            .await;

        assert_eq!(outcome, EvaluateOutcome::Superseded);
        // The published evaluation is unchanged
        let latest = hub.latest().await.unwrap();
        assert_eq!(latest.conditions.len(), hub.condition_count());
    }
}
