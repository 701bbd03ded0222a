//! Ingestion pipeline
//!
//! Sequences a decoded sample through the cache, the rolling average and
//! the anomaly detector, then publishes the derived gauges. The two
//! analytics components are independent; no ordering between them is
//! guaranteed to other callers.

use crate::analytics::{AnomalyDetector, RateAggregator, RollingAverage};
use crate::analytics::{DEFAULT_THRESHOLD, DEFAULT_WINDOW_SIZE};
use crate::cache::{SampleCache, DEFAULT_SAMPLE_TTL};
use crate::health::{components, HealthRegistry};
use crate::models::{AnalyzeResponse, AnomalyStatsReport, IngestResponse, Sample};
use crate::observability::{ServiceMetrics, StructuredLogger};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Consecutive failed cache writes before the cache is reported unhealthy
pub const CACHE_UNHEALTHY_AFTER: u32 = 5;

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of the rolling-average window
    pub window_size: usize,
    /// Capacity of the anomaly-detector window
    pub detector_window_size: usize,
    /// Z-score threshold for the anomaly detector
    pub threshold: f64,
    /// TTL applied to cached samples
    pub cache_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            detector_window_size: DEFAULT_WINDOW_SIZE,
            threshold: DEFAULT_THRESHOLD,
            cache_ttl: DEFAULT_SAMPLE_TTL,
        }
    }
}

/// Ingestion and reporting over the analytics components
pub struct IngestPipeline {
    rolling_average: Arc<RollingAverage>,
    detector: Arc<AnomalyDetector>,
    ingest_rate: RateAggregator,
    anomaly_rate: RateAggregator,
    cache: Arc<dyn SampleCache>,
    cache_ttl: Duration,
    cache_failures: AtomicU32,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
}

impl IngestPipeline {
    pub fn new(
        config: PipelineConfig,
        cache: Arc<dyn SampleCache>,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
        health: HealthRegistry,
    ) -> Self {
        Self {
            rolling_average: Arc::new(RollingAverage::new(config.window_size)),
            detector: Arc::new(AnomalyDetector::new(
                config.detector_window_size,
                config.threshold,
            )),
            ingest_rate: RateAggregator::per_second("ingest_rate"),
            anomaly_rate: RateAggregator::per_minute("anomaly_rate"),
            cache,
            cache_ttl: config.cache_ttl,
            cache_failures: AtomicU32::new(0),
            metrics,
            logger,
            health,
        }
    }

    /// Replace the rate aggregators (used to inject a clock)
    pub fn with_rate_aggregators(mut self, ingest: RateAggregator, anomaly: RateAggregator) -> Self {
        self.ingest_rate = ingest;
        self.anomaly_rate = anomaly;
        self
    }

    pub fn rolling_average(&self) -> &Arc<RollingAverage> {
        &self.rolling_average
    }

    pub fn detector(&self) -> &Arc<AnomalyDetector> {
        &self.detector
    }

    /// Ingest one sample and report the rolling average and anomaly flag
    pub async fn ingest(&self, sample: Sample) -> IngestResponse {
        let sample = sample.stamped();

        self.cache_sample(&sample).await;

        self.rolling_average.push(sample.rps);
        let rolling_average = self.rolling_average.mean();
        self.metrics.set_rolling_average(rolling_average);
        self.metrics.set_cpu_usage(sample.cpu);

        let decision = self.detector.observe(sample.rps);
        if decision.is_anomaly {
            self.metrics.inc_anomalies_detected();
            self.anomaly_rate.tick();
            self.logger.log_anomaly(
                sample.timestamp,
                sample.rps,
                decision.z_score,
                self.detector.threshold(),
            );
        }

        self.publish_rates();

        IngestResponse {
            status: "ok".to_string(),
            rolling_average,
            is_anomaly: decision.is_anomaly,
        }
    }

    /// Current rolling average and detector statistics
    pub fn analyze(&self) -> AnalyzeResponse {
        let stats = self.detector.stats();

        AnalyzeResponse {
            rolling_average: self.rolling_average.mean(),
            anomaly_stats: AnomalyStatsReport {
                mean: stats.mean,
                std_dev: stats.std_dev,
                threshold: self.detector.threshold(),
                window_size: stats.count,
            },
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    async fn cache_sample(&self, sample: &Sample) {
        let key = sample.cache_key();
        match self.cache.set(&key, sample, self.cache_ttl).await {
            Ok(()) => {
                self.cache_failures.store(0, Ordering::Relaxed);
                self.health.set_healthy(components::CACHE).await;
            }
            Err(e) => {
                self.logger.log_cache_failure(&key, &e);
                self.metrics.inc_cache_errors();

                let failures = self.cache_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= CACHE_UNHEALTHY_AFTER {
                    self.health
                        .set_unhealthy(
                            components::CACHE,
                            format!("{} consecutive write failures: {}", failures, e),
                        )
                        .await;
                } else {
                    self.health
                        .set_degraded(components::CACHE, e.to_string())
                        .await;
                }
            }
        }
    }

    fn publish_rates(&self) {
        if let Some(rate) = self.ingest_rate.tick_and_poll() {
            self.metrics.set_rps_rate(rate);
            self.logger.log_rate_published(self.ingest_rate.name(), rate);
        }

        if let Some(rate) = self.anomaly_rate.poll() {
            self.metrics.set_anomaly_rate(rate);
            self.logger.log_rate_published(self.anomaly_rate.name(), rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{ManualClock, RateUnit};
    use crate::cache::{CacheError, MemoryCache};
    use crate::health::ComponentStatus;
    use async_trait::async_trait;

    struct FailingCache;

    #[async_trait]
    impl SampleCache for FailingCache {
        async fn set(&self, _key: &str, _sample: &Sample, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    fn pipeline_with(cache: Arc<dyn SampleCache>, health: HealthRegistry) -> IngestPipeline {
        IngestPipeline::new(
            PipelineConfig::default(),
            cache,
            ServiceMetrics::new(),
            StructuredLogger::new("test"),
            health,
        )
    }

    #[tokio::test]
    async fn test_ingest_reports_average_and_spike() {
        let cache = Arc::new(MemoryCache::new());
        let pipeline = pipeline_with(cache.clone(), HealthRegistry::new());
        let anomalies_before = ServiceMetrics::new().anomalies_detected();

        for ts in 1..=50 {
            let response = pipeline.ingest(Sample::new(ts, 20.0, 100.0)).await;
            assert_eq!(response.status, "ok");
            assert!(!response.is_anomaly);
            assert_eq!(response.rolling_average, 100.0);
        }

        let response = pipeline.ingest(Sample::new(999, 95.0, 2000.0)).await;
        assert!(response.is_anomaly);
        assert!((response.rolling_average - 138.0).abs() < 1e-9);
        assert!(ServiceMetrics::new().anomalies_detected() > anomalies_before);

        assert_eq!(cache.get("metric:999"), Some(Sample::new(999, 95.0, 2000.0)));

        let report = pipeline.analyze();
        assert_eq!(report.anomaly_stats.window_size, 50);
        assert_eq!(report.anomaly_stats.threshold, 2.0);
        assert!(report.anomaly_stats.mean > 100.0 && report.anomaly_stats.mean < 2000.0);
        assert!(report.timestamp > 0);
    }

    #[tokio::test]
    async fn test_cache_failure_does_not_fail_ingest() {
        let health = HealthRegistry::new();
        health.register(components::CACHE).await;
        let pipeline = pipeline_with(Arc::new(FailingCache), health.clone());
        let errors_before = ServiceMetrics::new().cache_errors();

        let response = pipeline.ingest(Sample::new(1, 10.0, 150.0)).await;

        assert_eq!(response.rolling_average, 150.0);
        assert_eq!(
            health.health().await.components[components::CACHE].status,
            ComponentStatus::Degraded
        );
        assert!(ServiceMetrics::new().cache_errors() > errors_before);
    }

    #[tokio::test]
    async fn test_missing_timestamp_is_stamped_before_caching() {
        let cache = Arc::new(MemoryCache::new());
        let pipeline = pipeline_with(cache.clone(), HealthRegistry::new());

        pipeline.ingest(Sample::new(0, 10.0, 150.0)).await;

        assert!(cache.get("metric:0").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_independent_window_sizes() {
        let pipeline = IngestPipeline::new(
            PipelineConfig {
                window_size: 2,
                detector_window_size: 10,
                ..Default::default()
            },
            Arc::new(MemoryCache::new()),
            ServiceMetrics::new(),
            StructuredLogger::new("test"),
            HealthRegistry::new(),
        );

        for ts in 1..=5 {
            pipeline.ingest(Sample::new(ts, 0.0, ts as f64)).await;
        }

        assert_eq!(pipeline.rolling_average().count(), 2);
        assert_eq!(pipeline.rolling_average().mean(), 4.5);
        assert_eq!(pipeline.detector().stats().count, 5);
    }

    #[tokio::test]
    async fn test_repeated_cache_failures_mark_cache_unhealthy() {
        let health = HealthRegistry::new();
        health.register(components::CACHE).await;
        let pipeline = pipeline_with(Arc::new(FailingCache), health.clone());

        for ts in 1..CACHE_UNHEALTHY_AFTER as i64 {
            pipeline.ingest(Sample::new(ts, 10.0, 150.0)).await;
        }
        assert_eq!(health.health().await.status, ComponentStatus::Degraded);

        pipeline.ingest(Sample::new(99, 10.0, 150.0)).await;
        let report = health.health().await;
        assert_eq!(report.status, ComponentStatus::Unhealthy);
        assert!(report.components[components::CACHE]
            .message
            .as_deref()
            .unwrap_or_default()
            .contains("consecutive"));
    }

    #[tokio::test]
    async fn test_cache_recovery_resets_failure_count() {
        let health = HealthRegistry::new();
        health.register(components::CACHE).await;
        let pipeline = pipeline_with(Arc::new(FailingCache), health.clone());

        for ts in 1..=CACHE_UNHEALTHY_AFTER as i64 {
            pipeline.ingest(Sample::new(ts, 10.0, 150.0)).await;
        }
        assert_eq!(health.health().await.status, ComponentStatus::Unhealthy);

        // Same pipeline state, now with a working cache
        let pipeline = IngestPipeline {
            cache: Arc::new(MemoryCache::new()),
            ..pipeline
        };
        pipeline.ingest(Sample::new(100, 10.0, 150.0)).await;

        assert_eq!(health.health().await.status, ComponentStatus::Healthy);
        assert_eq!(pipeline.cache_failures.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_ingest_rate_published_to_gauge() {
        let clock = Arc::new(ManualClock::new());
        let ingest = RateAggregator::with_clock(
            "ingest_rate",
            Duration::from_secs(1),
            RateUnit::PerSecond,
            clock.clone(),
        );
        let anomaly = RateAggregator::with_clock(
            "anomaly_rate",
            Duration::from_secs(60),
            RateUnit::PerMinute,
            clock.clone(),
        );
        let pipeline = pipeline_with(Arc::new(MemoryCache::new()), HealthRegistry::new())
            .with_rate_aggregators(ingest, anomaly);

        for ts in 1..=3 {
            pipeline.ingest(Sample::new(ts, 0.0, 100.0)).await;
        }
        assert_eq!(pipeline.ingest_rate.pending(), 3);

        clock.advance(Duration::from_secs(1));
        pipeline.ingest(Sample::new(4, 0.0, 100.0)).await;

        // Four samples over exactly one second
        assert_eq!(pipeline.ingest_rate.pending(), 0);
        assert_eq!(ServiceMetrics::new().rps_rate(), 4.0);
    }

    #[tokio::test]
    async fn test_anomaly_rate_published_to_gauge() {
        let clock = Arc::new(ManualClock::new());
        // Long ingest interval keeps this test off the rps gauge
        let ingest = RateAggregator::with_clock(
            "ingest_rate",
            Duration::from_secs(3600),
            RateUnit::PerSecond,
            clock.clone(),
        );
        let anomaly = RateAggregator::with_clock(
            "anomaly_rate",
            Duration::from_secs(60),
            RateUnit::PerMinute,
            clock.clone(),
        );
        let pipeline = pipeline_with(Arc::new(MemoryCache::new()), HealthRegistry::new())
            .with_rate_aggregators(ingest, anomaly);

        for ts in 1..=50 {
            pipeline.ingest(Sample::new(ts, 20.0, 100.0)).await;
        }
        let response = pipeline.ingest(Sample::new(51, 95.0, 2000.0)).await;
        assert!(response.is_anomaly);
        assert_eq!(pipeline.anomaly_rate.pending(), 1);

        clock.advance(Duration::from_secs(60));
        let response = pipeline.ingest(Sample::new(52, 20.0, 100.0)).await;
        assert!(!response.is_anomaly);

        // One anomaly over exactly one minute
        assert_eq!(pipeline.anomaly_rate.pending(), 0);
        assert_eq!(ServiceMetrics::new().anomaly_rate(), 1.0);
    }
}
