//! Loadwatch - streaming load analytics service
//!
//! Accepts system-load samples over HTTP, keeps a rolling average of the
//! request rate, flags anomalous samples and exports Prometheus metrics.

use analytics_lib::{
    cache::{MemoryCache, NoopCache, RedisCache, SampleCache},
    health::{components, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    IngestPipeline,
};
use anyhow::{Context, Result};
use loadwatch_service::{
    api,
    config::{CacheBackend, ServiceConfig},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting loadwatch");

    let config = ServiceConfig::load().context("Failed to load configuration")?;
    info!(
        instance = %config.instance_name,
        port = config.port,
        window_size = config.window_size,
        threshold = config.anomaly_threshold,
        cache_enabled = config.cache_enabled,
        cache_backend = ?config.cache_backend,
        "Service configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ANALYTICS).await;
    health_registry.register(components::CACHE).await;

    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);

    let cache: Arc<dyn SampleCache> = match (config.cache_enabled, config.cache_backend) {
        (false, _) => Arc::new(NoopCache),
        (true, CacheBackend::Memory) => {
            Arc::new(MemoryCache::new().with_max_entries(config.cache_max_entries))
        }
        (true, CacheBackend::Redis) => Arc::new(
            RedisCache::connect(&config.redis_settings())
                .await
                .with_context(|| format!("Failed to connect to Redis at {}", config.redis_addr))?,
        ),
    };

    let pipeline = IngestPipeline::new(
        config.pipeline_config(),
        cache,
        metrics.clone(),
        logger.clone(),
        health_registry.clone(),
    );

    let app_state = Arc::new(api::AppState::new(
        pipeline,
        health_registry.clone(),
        metrics,
    ));

    logger.log_startup(SERVICE_VERSION, config.window_size, config.anomaly_threshold);
    health_registry.set_ready(true).await;

    let shutdown_logger = logger.clone();
    api::serve(config.port, app_state, async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown_logger.log_shutdown("SIGINT received"),
            Err(e) => shutdown_logger.log_shutdown(&format!("signal handler failed: {}", e)),
        }
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
