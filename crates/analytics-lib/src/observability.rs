//! Observability infrastructure for the analytics service
//!
//! Provides:
//! - Prometheus metrics (HTTP traffic, ingestion/anomaly rates, rolling average, CPU)
//! - Structured JSON logging with tracing

use prometheus::{
    register_counter, register_gauge, register_histogram_vec, register_int_counter,
    register_int_counter_vec, Counter, Gauge, HistogramVec, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ServiceMetricsInner {
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    rps_rate: Gauge,
    anomalies_detected: Counter,
    anomaly_rate_per_minute: Gauge,
    rolling_average_value: Gauge,
    cpu_usage_percent: Gauge,
    cache_errors: IntCounter,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            http_requests_total: register_int_counter_vec!(
                "http_requests_total",
                "Total number of HTTP requests",
                &["method", "endpoint", "status"]
            )
            .expect("Failed to register http_requests_total"),

            http_request_duration_seconds: register_histogram_vec!(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "endpoint"],
                prometheus::DEFAULT_BUCKETS.to_vec()
            )
            .expect("Failed to register http_request_duration_seconds"),

            rps_rate: register_gauge!("rps_rate", "Current requests per second rate")
                .expect("Failed to register rps_rate"),

            anomalies_detected: register_counter!(
                "anomalies_detected_total",
                "Total number of anomalies detected"
            )
            .expect("Failed to register anomalies_detected_total"),

            anomaly_rate_per_minute: register_gauge!(
                "anomaly_rate_per_minute",
                "Current anomaly rate per minute"
            )
            .expect("Failed to register anomaly_rate_per_minute"),

            rolling_average_value: register_gauge!(
                "rolling_average_value",
                "Current rolling average value"
            )
            .expect("Failed to register rolling_average_value"),

            cpu_usage_percent: register_gauge!("cpu_usage_percent", "CPU usage percentage")
                .expect("Failed to register cpu_usage_percent"),

            cache_errors: register_int_counter!(
                "cache_errors_total",
                "Total number of failed sample cache writes"
            )
            .expect("Failed to register cache_errors_total"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    /// Count a handled HTTP request and record its latency
    pub fn observe_request(&self, method: &str, endpoint: &str, status: u16, duration_secs: f64) {
        let status = status.to_string();
        self.inner()
            .http_requests_total
            .with_label_values(&[method, endpoint, &status])
            .inc();
        self.inner()
            .http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration_secs);
    }

    pub fn set_rps_rate(&self, rate: f64) {
        self.inner().rps_rate.set(rate);
    }

    pub fn inc_anomalies_detected(&self) {
        self.inner().anomalies_detected.inc();
    }

    pub fn set_anomaly_rate(&self, per_minute: f64) {
        self.inner().anomaly_rate_per_minute.set(per_minute);
    }

    pub fn set_rolling_average(&self, value: f64) {
        self.inner().rolling_average_value.set(value);
    }

    pub fn set_cpu_usage(&self, percent: f64) {
        self.inner().cpu_usage_percent.set(percent);
    }

    pub fn inc_cache_errors(&self) {
        self.inner().cache_errors.inc();
    }

    /// Total anomalies counted so far in this process
    pub fn anomalies_detected(&self) -> f64 {
        self.inner().anomalies_detected.get()
    }

    /// Last published ingestion rate, samples per second
    pub fn rps_rate(&self) -> f64 {
        self.inner().rps_rate.get()
    }

    /// Last published anomaly rate, anomalies per minute
    pub fn anomaly_rate(&self) -> f64 {
        self.inner().anomaly_rate_per_minute.get()
    }

    pub fn cache_errors(&self) -> u64 {
        self.inner().cache_errors.get()
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log an anomalous sample
    pub fn log_anomaly(&self, timestamp: i64, rps: f64, z_score: f64, threshold: f64) {
        warn!(
            event = "anomaly_detected",
            instance = %self.instance,
            timestamp = timestamp,
            rps = rps,
            z_score = z_score,
            threshold = threshold,
            "Anomaly detected"
        );
    }

    /// Log a failed cache write; ingestion carries on regardless
    pub fn log_cache_failure(&self, key: &str, error: &dyn std::fmt::Display) {
        warn!(
            event = "cache_write_failed",
            instance = %self.instance,
            key = %key,
            error = %error,
            "Failed to cache sample"
        );
    }

    /// Log a rate published to the metrics sink
    pub fn log_rate_published(&self, aggregator: &str, rate: f64) {
        debug!(
            event = "rate_published",
            instance = %self.instance,
            aggregator = %aggregator,
            rate = rate,
            "Published rate"
        );
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, window_size: usize, threshold: f64) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            window_size = window_size,
            threshold = threshold,
            "Analytics service started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Analytics service shutting down"
        );
    }
}
