use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Process-wide pipeline counters, summed across every session
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub transitions: AtomicU64,
    pub divergences: AtomicU64,
    pub invalid_transitions: AtomicU64,
    pub precondition_failures: AtomicU64,
    pub retries: AtomicU64,
    pub resets: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_divergence(&self) {
        self.divergences.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_transition(&self) {
        self.invalid_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_precondition_failure(&self) {
        self.precondition_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            transitions: self.transitions.load(Ordering::Relaxed),
            divergences: self.divergences.load(Ordering::Relaxed),
            invalid_transitions: self.invalid_transitions.load(Ordering::Relaxed),
            precondition_failures: self.precondition_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            transitions = stats.transitions,
            divergences = stats.divergences,
            invalid_transitions = stats.invalid_transitions,
            precondition_failures = stats.precondition_failures,
            retries = stats.retries,
            resets = stats.resets,
            "Pipeline metrics"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PipelineStats {
    pub transitions: u64,
    pub divergences: u64,
    pub invalid_transitions: u64,
    pub precondition_failures: u64,
    pub retries: u64,
    pub resets: u64,
}

/// Global metrics instance
static PIPELINE_METRICS: std::sync::LazyLock<PipelineMetrics> =
    std::sync::LazyLock::new(PipelineMetrics::new);

pub fn pipeline_metrics() -> &'static PipelineMetrics {
    &PIPELINE_METRICS
}
