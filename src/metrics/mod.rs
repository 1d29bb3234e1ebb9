// Pipeline Prometheus metrics
//
// Counters and histograms for the transformation pipeline, registered once
// in the default prometheus registry and exported by the /metrics endpoint.

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Global metrics for request resolution
pub struct PipelineMetrics {
    /// Requests by final outcome (hit_cloud, hit_local, miss, not_found, ...)
    pub requests: IntCounterVec,

    /// Cache lookups by tier (cloud, local) and result (hit, miss, error)
    pub cache_lookups: IntCounterVec,

    /// Transformation duration by media kind (image, video)
    pub transform_duration: HistogramVec,

    /// Cloud uploads that failed and left the derivative in the local tier
    pub cloud_upload_failures: IntCounter,

    /// Scratch files that could not be removed
    pub scratch_cleanup_failures: IntCounter,
}

/// Global singleton instance of metrics
static METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

impl PipelineMetrics {
    /// Initialize and return the global metrics instance
    pub fn global() -> &'static Self {
        METRICS.get_or_init(|| {
            let requests = register_int_counter_vec!(
                "kagami_requests_total",
                "Total number of transformation requests by outcome",
                &["outcome"]
            )
            .expect("Failed to register requests_total metric");

            let cache_lookups = register_int_counter_vec!(
                "kagami_cache_lookups_total",
                "Total number of cache lookups by tier and result",
                &["tier", "result"]
            )
            .expect("Failed to register cache_lookups_total metric");

            let transform_duration = register_histogram_vec!(
                "kagami_transform_duration_seconds",
                "Duration of media transformations in seconds",
                &["kind"],
                vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 60.0, 300.0]
            )
            .expect("Failed to register transform_duration_seconds metric");

            let cloud_upload_failures = register_int_counter!(
                "kagami_cloud_upload_failures_total",
                "Total number of failed derivative uploads to cloud storage"
            )
            .expect("Failed to register cloud_upload_failures_total metric");

            let scratch_cleanup_failures = register_int_counter!(
                "kagami_scratch_cleanup_failures_total",
                "Total number of scratch files that could not be removed"
            )
            .expect("Failed to register scratch_cleanup_failures_total metric");

            PipelineMetrics {
                requests,
                cache_lookups,
                transform_duration,
                cloud_upload_failures,
                scratch_cleanup_failures,
            }
        })
    }

    pub fn record_request(&self, outcome: &str) {
        self.requests.with_label_values(&[outcome]).inc();
    }

    pub fn record_lookup(&self, tier: &str, result: &str) {
        self.cache_lookups.with_label_values(&[tier, result]).inc();
    }

    pub fn observe_transform(&self, kind: &str, seconds: f64) {
        self.transform_duration
            .with_label_values(&[kind])
            .observe(seconds);
    }
}

/// Render every registered metric in the Prometheus text format
pub fn export_prometheus() -> String {
    // make sure our families exist even before the first request
    let _ = PipelineMetrics::global();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
