//! Analytics library for the load-sample service
//!
//! This crate provides:
//! - Rolling average and z-score anomaly detection over request rates
//! - Coarse ingestion/anomaly rate aggregation
//! - Best-effort caching of raw samples
//! - The ingestion pipeline that sequences all of the above
//! - Health checks and observability

pub mod analytics;
pub mod cache;
pub mod health;
pub mod ingest;
pub mod models;
pub mod observability;

pub use analytics::{AnomalyDetector, Decision, DetectorStats, RateAggregator, RollingAverage};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use ingest::{IngestPipeline, PipelineConfig};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
