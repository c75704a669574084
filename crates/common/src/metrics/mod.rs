//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ClassForge metrics
pub const METRICS_PREFIX: &str = "classforge";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for AI provider latency (typically slower)
pub const PROVIDER_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Content lifecycle metrics
    describe_counter!(
        format!("{}_contents_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total contents created"
    );

    describe_counter!(
        format!("{}_audits_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Total contents submitted for audit"
    );

    describe_counter!(
        format!("{}_audits_resolved_total", METRICS_PREFIX),
        Unit::Count,
        "Total audit records resolved, labeled by decision"
    );

    // AI tool metrics
    describe_counter!(
        format!("{}_ai_generations_total", METRICS_PREFIX),
        Unit::Count,
        "Total AI generation attempts, labeled by outcome"
    );

    describe_histogram!(
        format!("{}_ai_provider_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "AI provider call latency in seconds"
    );

    describe_counter!(
        format!("{}_quota_rejections_total", METRICS_PREFIX),
        Unit::Count,
        "Total generation attempts rejected by quota, labeled by window"
    );

    tracing::info!("Metrics registered");
}

/// Record a created content
pub fn record_content_created(source: &str) {
    counter!(
        format!("{}_contents_created_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record a submission for audit
pub fn record_audit_submitted() {
    counter!(format!("{}_audits_submitted_total", METRICS_PREFIX)).increment(1);
}

/// Record an audit resolution
pub fn record_audit_resolved(decision: &str) {
    counter!(
        format!("{}_audits_resolved_total", METRICS_PREFIX),
        "decision" => decision.to_string()
    )
    .increment(1);
}

/// Record a generation attempt outcome
pub fn record_generation(outcome: &str) {
    counter!(
        format!("{}_ai_generations_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a quota rejection
pub fn record_quota_rejection(window: &str) {
    counter!(
        format!("{}_quota_rejections_total", METRICS_PREFIX),
        "window" => window.to_string()
    )
    .increment(1);
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Time an AI provider call
pub fn record_provider_duration(provider: &str, duration_secs: f64) {
    histogram!(
        format!("{}_ai_provider_duration_seconds", METRICS_PREFIX),
        "provider" => provider.to_string()
    )
    .record(duration_secs);
}
