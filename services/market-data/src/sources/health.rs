use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::SourceHealth;

/// Internal health tracking shared by the upstream clients.
///
/// Health is derived from the requests the service already makes, so health
/// checks never spend API quota.
pub(crate) struct HealthTracker {
    /// Timestamp of last successful request (millis since epoch)
    last_success_ms: AtomicU64,
    /// Timestamp of last failed request (millis since epoch)
    last_failure_ms: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    /// Last known latency in ms
    last_latency_ms: AtomicU64,
}

impl HealthTracker {
    pub(crate) fn new() -> Self {
        Self {
            last_success_ms: AtomicU64::new(0),
            last_failure_ms: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            last_latency_ms: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_success(&self, latency_ms: u64) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_success_ms.store(now_ms, Ordering::Relaxed);
        self.last_latency_ms.store(latency_ms, Ordering::Relaxed);
        self.success_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_failure_ms.store(now_ms, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    fn is_healthy(&self) -> bool {
        let last_success = self.last_success_ms.load(Ordering::Relaxed);
        let last_failure = self.last_failure_ms.load(Ordering::Relaxed);

        // Healthy if: had at least one success AND (no failures OR last success > last failure)
        last_success > 0 && (last_failure == 0 || last_success > last_failure)
    }

    fn success_rate(&self) -> f64 {
        let successes = self.success_count.load(Ordering::Relaxed);
        let failures = self.failure_count.load(Ordering::Relaxed);
        let total = successes + failures;
        if total == 0 {
            return 1.0; // No requests yet, assume healthy
        }
        successes as f64 / total as f64
    }

    pub(crate) fn snapshot(&self, source: &str) -> SourceHealth {
        let last_success_ms = self.last_success_ms.load(Ordering::Relaxed);
        let last_success = if last_success_ms > 0 {
            DateTime::from_timestamp_millis(last_success_ms as i64)
        } else {
            None
        };

        let is_healthy = self.is_healthy();

        SourceHealth {
            source: source.to_string(),
            is_healthy,
            last_success,
            last_error: if is_healthy {
                None
            } else {
                Some("Recent failures detected".to_string())
            },
            success_rate: self.success_rate(),
            avg_latency_ms: self.last_latency_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_after_success() {
        let tracker = HealthTracker::new();
        tracker.record_success(42);

        let health = tracker.snapshot("test");
        assert!(health.is_healthy);
        assert_eq!(health.avg_latency_ms, 42);
        assert!(health.last_success.is_some());
    }

    #[test]
    fn unhealthy_after_trailing_failure() {
        let tracker = HealthTracker::new();
        tracker.record_success(10);
        std::thread::sleep(std::time::Duration::from_millis(5));
        tracker.record_failure();

        let health = tracker.snapshot("test");
        assert!(!health.is_healthy);
        assert!(health.last_error.is_some());
        assert!((health.success_rate - 0.5).abs() < f64::EPSILON);
    }
}
