//! Best-effort storage of raw samples
//!
//! The ingestion path writes every decoded sample here with a TTL.
//! Nothing reads it back on the hot path, and a failed write never
//! fails the ingestion.

mod memory;
mod redis;

pub use self::redis::{RedisCache, RedisSettings};
pub use memory::{MemoryCache, DEFAULT_MAX_ENTRIES};

use crate::models::Sample;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Default time-to-live for cached samples
pub const DEFAULT_SAMPLE_TTL: Duration = Duration::from_secs(5 * 60);

/// Errors raised by cache backends
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to serialize sample: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Write-only sample cache
#[async_trait]
pub trait SampleCache: Send + Sync {
    /// Store a sample under `key`, expiring after `ttl`
    async fn set(&self, key: &str, sample: &Sample, ttl: Duration) -> Result<(), CacheError>;
}

/// Cache that discards every write
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl SampleCache for NoopCache {
    async fn set(&self, _key: &str, _sample: &Sample, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}
