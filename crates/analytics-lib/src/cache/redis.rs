//! Redis-backed sample cache

use super::{CacheError, SampleCache};
use crate::models::Sample;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::IntoConnectionInfo;
use std::time::Duration;
use tracing::info;

const DEFAULT_REDIS_PORT: u16 = 6379;

/// Connection settings for [`RedisCache`]
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// `host:port`, port defaults to 6379 when omitted
    pub addr: String,
    pub password: Option<String>,
    pub db: i64,
}

/// Sample cache stored in Redis as JSON strings with `SET ... EX`
///
/// The connection manager reconnects on its own after a dropped
/// connection; writes made while Redis is away fail and are reported to
/// the caller.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect and verify the server answers `PING`
    pub async fn connect(settings: &RedisSettings) -> Result<Self, CacheError> {
        let (host, port) = split_addr(&settings.addr)?;

        let mut connection_info = (host.as_str(), port).into_connection_info()?;
        connection_info.redis.db = settings.db;
        connection_info.redis.password = settings.password.clone().filter(|p| !p.is_empty());

        let client = redis::Client::open(connection_info)?;

        // Single attempt first; the connection manager retries with backoff
        let mut probe = client.get_multiplexed_tokio_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut probe).await?;

        let connection = ConnectionManager::new(client).await?;
        info!(addr = %settings.addr, db = settings.db, "Connected to Redis");

        Ok(Self { connection })
    }
}

#[async_trait]
impl SampleCache for RedisCache {
    async fn set(&self, key: &str, sample: &Sample, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(sample)?;
        let mut connection = self.connection.clone();

        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .query_async(&mut connection)
            .await?;

        Ok(())
    }
}

/// Redis rejects `EX 0`, so sub-second TTLs round up to one second
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn split_addr(addr: &str) -> Result<(String, u16), CacheError> {
    let addr = addr.trim();
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port
                .parse::<u16>()
                .map_err(|_| CacheError::Unavailable(format!("invalid Redis port in {:?}", addr)))?;
            Ok((host.to_string(), port))
        }
        Some(_) => Err(CacheError::Unavailable(format!("invalid Redis address {:?}", addr))),
        None if !addr.is_empty() => Ok((addr.to_string(), DEFAULT_REDIS_PORT)),
        None => Err(CacheError::Unavailable("empty Redis address".to_string())),
    }
}
