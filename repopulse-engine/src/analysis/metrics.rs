//! Analysis counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Process-wide analysis counters
#[derive(Debug, Default)]
pub struct AnalysisMetrics {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    degraded: AtomicU64,
    total_duration_ms: AtomicU64,
    max_duration_ms: AtomicU64,
}

/// Point-in-time copy of [`AnalysisMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalysisMetricsSnapshot {
    pub analyses_started: u64,
    pub analyses_completed: u64,
    pub analyses_failed: u64,
    /// Completed analyses with at least one degraded section
    pub analyses_degraded: u64,
    pub average_duration_ms: u64,
    pub max_duration_ms: u64,
}

impl AnalysisMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, duration: Duration, degraded: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.degraded.fetch_add(1, Ordering::Relaxed);
        }
        self.record_duration(duration);
    }

    pub fn record_failed(&self, duration: Duration) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.record_duration(duration);
    }

    fn record_duration(&self, duration: Duration) {
        let duration_ms = duration.as_millis() as u64;
        self.total_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
        self.max_duration_ms.fetch_max(duration_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AnalysisMetricsSnapshot {
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let finished = completed + failed;
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);

        AnalysisMetricsSnapshot {
            analyses_started: self.started.load(Ordering::Relaxed),
            analyses_completed: completed,
            analyses_failed: failed,
            analyses_degraded: self.degraded.load(Ordering::Relaxed),
            average_duration_ms: if finished == 0 {
                0
            } else {
                total_duration_ms / finished
            },
            max_duration_ms: self.max_duration_ms.load(Ordering::Relaxed),
        }
    }
}
