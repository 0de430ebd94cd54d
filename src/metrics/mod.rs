//! Metrics collection for observability

use prometheus::{
    CounterVec, HistogramVec, Opts, Registry,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static RAG_METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Provider metrics
    pub chat_requests: CounterVec,
    pub chat_duration: HistogramVec,
    pub embedding_requests: CounterVec,

    // Pipeline metrics
    pub retrieval_outcomes: CounterVec,
    pub repair_stages: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let chat_requests = register_counter_vec_with_registry!(
            Opts::new("rag_chat_requests_total", "Total chat completion requests"),
            &["provider", "status"],
            registry
        )?;

        let chat_duration = register_histogram_vec_with_registry!(
            "rag_chat_duration_seconds",
            "Chat completion duration in seconds",
            &["provider"],
            registry
        )?;

        let embedding_requests = register_counter_vec_with_registry!(
            Opts::new("rag_embedding_requests_total", "Total embedding requests"),
            &["backend", "status"],
            registry
        )?;

        let retrieval_outcomes = register_counter_vec_with_registry!(
            Opts::new("rag_retrieval_total", "Retrieval attempts by outcome"),
            &["outcome"],
            registry
        )?;

        let repair_stages = register_counter_vec_with_registry!(
            Opts::new(
                "rag_repair_stage_total",
                "Completion parses by the cascade stage that succeeded"
            ),
            &["stage"],
            registry
        )?;

        Ok(Self {
            registry,
            chat_requests,
            chat_duration,
            embedding_requests,
            retrieval_outcomes,
            repair_stages,
        })
    }

    /// Record a finished chat completion
    pub fn record_chat(&self, provider: &str, success: bool, seconds: f64) {
        let status = if success { "success" } else { "error" };
        self.chat_requests.with_label_values(&[provider, status]).inc();
        self.chat_duration.with_label_values(&[provider]).observe(seconds);
    }

    /// Record an embedding request
    pub fn record_embedding(&self, backend: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.embedding_requests.with_label_values(&[backend, status]).inc();
    }

    /// Record how a retrieval attempt ended (`hits`, `empty`, `skipped`, or a failure reason)
    pub fn record_retrieval(&self, outcome: &str) {
        self.retrieval_outcomes.with_label_values(&[outcome]).inc();
    }

    /// Record which repair stage produced the final result
    pub fn record_repair_stage(&self, stage: &str) {
        self.repair_stages.with_label_values(&[stage]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn gather_text(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_export_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_chat("ollama", true, 0.25);
        metrics.record_embedding("local", false);
        metrics.record_retrieval("search_failed");
        metrics.record_repair_stage("fallback");

        let text = metrics.gather_text();
        assert!(text.contains("rag_chat_requests_total"));
        assert!(text.contains("provider=\"ollama\""));
        assert!(text.contains("outcome=\"search_failed\""));
        assert!(text.contains("stage=\"fallback\""));
    }
}
