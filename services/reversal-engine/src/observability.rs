//! Observability: metrics collection for the evaluation loop

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Metrics collector for tracking evaluation health
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<RwLock<MetricsInner>>,
}

struct MetricsInner {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    histograms: HashMap<String, Vec<f64>>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsInner {
                counters: HashMap::new(),
                gauges: HashMap::new(),
                histograms: HashMap::new(),
                start_time: Instant::now(),
            })),
        }
    }

    /// Increment a counter
    pub async fn increment(&self, name: &str, value: u64) {
        let mut inner = self.inner.write().await;
        let counter = inner.counters.entry(name.to_string()).or_insert(0);
        *counter += value;
    }

    /// Set a gauge value
    pub async fn gauge(&self, name: &str, value: f64) {
        let mut inner = self.inner.write().await;
        inner.gauges.insert(name.to_string(), value);
    }

    /// Record a histogram observation
    pub async fn histogram(&self, name: &str, value: f64) {
        let mut inner = self.inner.write().await;
        inner
            .histograms
            .entry(name.to_string())
            .or_insert_with(Vec::new)
            .push(value);
    }

    /// Get all metrics as a JSON-serializable snapshot
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read().await;
        let histograms = inner
            .histograms
            .iter()
            .map(|(name, values)| (name.clone(), HistogramSummary::from_values(values)))
            .collect();
        MetricsSnapshot {
            counters: inner.counters.clone(),
            gauges: inner.gauges.clone(),
            histograms,
            uptime_secs: inner.start_time.elapsed().as_secs(),
        }
    }

    /// Get specific counter
    pub async fn get_counter(&self, name: &str) -> u64 {
        let inner = self.inner.read().await;
        inner.counters.get(name).copied().unwrap_or(0)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, f64>,
    pub histograms: HashMap<String, HistogramSummary>,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HistogramSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl HistogramSummary {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                mean: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let sum: f64 = values.iter().sum();
        Self {
            count: values.len(),
            mean: sum / values.len() as f64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Predefined metric names
pub mod metrics {
    // Evaluation lifecycle
    pub const EVALUATIONS: &str = "evaluations_total";
    pub const EVALUATIONS_DEGRADED: &str = "evaluations_degraded_total";
    pub const EVALUATIONS_SUPERSEDED: &str = "evaluations_superseded_total";
    pub const EVALUATION_DURATION_MS: &str = "evaluation_duration_ms";

    // Data sources
    pub const SERIES_FETCH_ERRORS: &str = "series_fetch_errors_total";
    pub const NARRATIVE_SIGNALS_MISSING: &str = "narrative_signals_missing_total";

    // Stage lifecycle
    pub const STAGE_TRANSITIONS: &str = "stage_transitions_total";
    pub const ALERTS_SENT: &str = "alerts_sent_total";

    // Persistence
    pub const SNAPSHOTS_PERSISTED: &str = "snapshots_persisted_total";
    pub const SNAPSHOT_PERSIST_ERRORS: &str = "snapshot_persist_errors_total";

    // Live gauges
    pub const FINAL_SCORE: &str = "reversal_final_score";
    pub const GATES_PASSED: &str = "reversal_gates_passed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_accumulate_and_missing_reads_zero() {
        let collector = MetricsCollector::new();
        collector.increment(metrics::EVALUATIONS, 1).await;
        collector.increment(metrics::EVALUATIONS, 2).await;

        assert_eq!(collector.get_counter(metrics::EVALUATIONS).await, 3);
        assert_eq!(collector.get_counter(metrics::STAGE_TRANSITIONS).await, 0);
    }

    #[tokio::test]
    async fn snapshot_summarizes_histograms() {
        let collector = MetricsCollector::new();
        collector.histogram(metrics::EVALUATION_DURATION_MS, 10.0).await;
        collector.histogram(metrics::EVALUATION_DURATION_MS, 30.0).await;
        collector.gauge(metrics::FINAL_SCORE, 62.5).await;

        let snapshot = collector.snapshot().await;
        let durations = &snapshot.histograms[metrics::EVALUATION_DURATION_MS];
        assert_eq!(durations.count, 2);
        assert_eq!(durations.mean, 20.0);
        assert_eq!(durations.min, 10.0);
        assert_eq!(durations.max, 30.0);
        assert_eq!(snapshot.gauges[metrics::FINAL_SCORE], 62.5);
    }
}
