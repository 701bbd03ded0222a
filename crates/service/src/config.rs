//! Service configuration

use analytics_lib::analytics::{DEFAULT_THRESHOLD, DEFAULT_WINDOW_SIZE};
use analytics_lib::cache::{RedisSettings, DEFAULT_MAX_ENTRIES};
use analytics_lib::PipelineConfig;
use anyhow::Result;
use config::{Config, ConfigError, Environment};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Prefix for environment variables, e.g. `LOADWATCH_WINDOW_SIZE`
const ENV_PREFIX: &str = "LOADWATCH";

/// Unprefixed variable names also accepted; the prefixed form wins when both are set
const UNPREFIXED_ALIASES: &[&str] = &[
    "PORT",
    "WINDOW_SIZE",
    "ANOMALY_THRESHOLD",
    "REDIS_ADDR",
    "REDIS_PASSWORD",
    "REDIS_DB",
];

/// Where raw samples are cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

/// Service configuration, read once at startup
///
/// Each setting falls back to its default on its own; one bad value
/// never discards the others.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Name reported in structured logs
    pub instance_name: String,

    /// HTTP listen port
    pub port: u16,

    /// Window size for the rolling average and the anomaly detector
    pub window_size: usize,

    /// Z-score threshold for anomaly detection
    pub anomaly_threshold: f64,

    /// Whether raw samples are cached
    pub cache_enabled: bool,

    /// Cache backend used when caching is enabled
    pub cache_backend: CacheBackend,

    /// TTL for cached samples in seconds
    pub cache_ttl_secs: u64,

    /// Live entry bound for the in-memory backend
    pub cache_max_entries: usize,

    /// Redis `host:port`
    pub redis_addr: String,

    pub redis_password: Option<String>,

    pub redis_db: i64,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            port: 8080,
            window_size: DEFAULT_WINDOW_SIZE,
            anomaly_threshold: DEFAULT_THRESHOLD,
            cache_enabled: true,
            cache_backend: CacheBackend::Redis,
            cache_ttl_secs: 300,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            redis_addr: "redis:6379".to_string(),
            redis_password: None,
            redis_db: 0,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let aliases: HashMap<String, String> = vars
            .iter()
            .filter(|(key, _)| UNPREFIXED_ALIASES.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let config = Config::builder()
            .add_source(Environment::default().source(Some(aliases)).try_parsing(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .source(Some(vars))
                    .try_parsing(true),
            )
            .build()?;

        Ok(Self::from_config(&config).normalized())
    }

    fn from_config(config: &Config) -> Self {
        let defaults = Self::default();

        Self {
            instance_name: setting(config, "instance_name", defaults.instance_name),
            port: setting(config, "port", defaults.port),
            window_size: setting(config, "window_size", defaults.window_size),
            anomaly_threshold: setting(config, "anomaly_threshold", defaults.anomaly_threshold),
            cache_enabled: setting(config, "cache_enabled", defaults.cache_enabled),
            cache_backend: setting(config, "cache_backend", defaults.cache_backend),
            cache_ttl_secs: setting(config, "cache_ttl_secs", defaults.cache_ttl_secs),
            cache_max_entries: setting(config, "cache_max_entries", defaults.cache_max_entries),
            redis_addr: setting(config, "redis_addr", defaults.redis_addr),
            redis_password: Some(setting(config, "redis_password", String::new()))
                .filter(|password| !password.is_empty())
                .or(defaults.redis_password),
            redis_db: setting(config, "redis_db", defaults.redis_db),
        }
    }

    /// Replace out-of-range analytics settings with their defaults
    pub fn normalized(mut self) -> Self {
        if self.window_size < 1 {
            warn!(window_size = self.window_size, "Window size must be positive, using default");
            self.window_size = DEFAULT_WINDOW_SIZE;
        }
        if !(self.anomaly_threshold > 0.0 && self.anomaly_threshold.is_finite()) {
            warn!(
                threshold = self.anomaly_threshold,
                "Anomaly threshold must be positive, using default"
            );
            self.anomaly_threshold = DEFAULT_THRESHOLD;
        }
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn redis_settings(&self) -> RedisSettings {
        RedisSettings {
            addr: self.redis_addr.clone(),
            password: self.redis_password.clone(),
            db: self.redis_db,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            window_size: self.window_size,
            detector_window_size: self.window_size,
            threshold: self.anomaly_threshold,
            cache_ttl: self.cache_ttl(),
        }
    }
}

/// Read one setting, keeping `default` when it is absent or invalid
fn setting<T: DeserializeOwned>(config: &Config, key: &str, default: T) -> T {
    match config.get::<T>(key) {
        Ok(value) => value,
        Err(ConfigError::NotFound(_)) => default,
        Err(e) => {
            warn!(key = %key, error = %e, "Invalid configuration value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_vars(HashMap::new()).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.window_size, 50);
        assert_eq!(config.anomaly_threshold, 2.0);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_backend, CacheBackend::Redis);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache_max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.redis_addr, "redis:6379");
        assert_eq!(config.redis_password, None);
        assert_eq!(config.redis_db, 0);
    }

    #[test]
    fn test_reads_prefixed_variables() {
        let config = ServiceConfig::from_vars(vars(&[
            ("LOADWATCH_PORT", "9090"),
            ("LOADWATCH_WINDOW_SIZE", "20"),
            ("LOADWATCH_ANOMALY_THRESHOLD", "3.5"),
            ("LOADWATCH_CACHE_ENABLED", "false"),
            ("LOADWATCH_CACHE_TTL_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.window_size, 20);
        assert_eq!(config.anomaly_threshold, 3.5);
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_ttl_secs, 60);
    }

    #[test]
    fn test_invalid_analytics_settings_are_normalized() {
        let config = ServiceConfig::from_vars(vars(&[
            ("LOADWATCH_WINDOW_SIZE", "0"),
            ("LOADWATCH_ANOMALY_THRESHOLD", "-1"),
        ]))
        .unwrap();

        assert_eq!(config.window_size, 50);
        assert_eq!(config.anomaly_threshold, 2.0);
    }

    #[test]
    fn test_unparseable_value_falls_back_to_default() {
        let config =
            ServiceConfig::from_vars(vars(&[("LOADWATCH_PORT", "not-a-port")])).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_one_invalid_value_keeps_the_others() {
        let config = ServiceConfig::from_vars(vars(&[
            ("LOADWATCH_WINDOW_SIZE", "20"),
            ("LOADWATCH_ANOMALY_THRESHOLD", "3.5"),
            ("LOADWATCH_PORT", "99999"),
            ("LOADWATCH_CACHE_TTL_SECS", "-5"),
        ]))
        .unwrap();

        assert_eq!(config.window_size, 20);
        assert_eq!(config.anomaly_threshold, 3.5);
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_ttl_secs, 300);
    }

    #[test]
    fn test_unprefixed_names_are_accepted() {
        let config = ServiceConfig::from_vars(vars(&[
            ("PORT", "9000"),
            ("WINDOW_SIZE", "30"),
            ("ANOMALY_THRESHOLD", "2.5"),
            ("REDIS_ADDR", "cache.internal:6380"),
            ("REDIS_PASSWORD", "secret"),
            ("REDIS_DB", "2"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.window_size, 30);
        assert_eq!(config.anomaly_threshold, 2.5);

        let redis = config.redis_settings();
        assert_eq!(redis.addr, "cache.internal:6380");
        assert_eq!(redis.password.as_deref(), Some("secret"));
        assert_eq!(redis.db, 2);
    }

    #[test]
    fn test_prefixed_name_wins_over_unprefixed() {
        let config = ServiceConfig::from_vars(vars(&[
            ("WINDOW_SIZE", "30"),
            ("LOADWATCH_WINDOW_SIZE", "40"),
        ]))
        .unwrap();

        assert_eq!(config.window_size, 40);
    }

    #[test]
    fn test_unrelated_unprefixed_variables_are_ignored() {
        let config = ServiceConfig::from_vars(vars(&[
            ("CACHE_ENABLED", "false"),
            ("INSTANCE_NAME", "ignored"),
        ]))
        .unwrap();

        assert!(config.cache_enabled);
        assert_ne!(config.instance_name, "ignored");
    }

    #[test]
    fn test_cache_settings() {
        let config = ServiceConfig::from_vars(vars(&[
            ("LOADWATCH_CACHE_BACKEND", "memory"),
            ("LOADWATCH_CACHE_MAX_ENTRIES", "500"),
            ("LOADWATCH_REDIS_PASSWORD", ""),
        ]))
        .unwrap();

        assert_eq!(config.cache_backend, CacheBackend::Memory);
        assert_eq!(config.cache_max_entries, 500);
        assert_eq!(config.redis_password, None);
    }

    #[test]
    fn test_unknown_cache_backend_falls_back_to_redis() {
        let config =
            ServiceConfig::from_vars(vars(&[("LOADWATCH_CACHE_BACKEND", "memcached")])).unwrap();
        assert_eq!(config.cache_backend, CacheBackend::Redis);
    }

    #[test]
    fn test_pipeline_config_uses_window_for_both_components() {
        let config = ServiceConfig {
            window_size: 12,
            anomaly_threshold: 2.5,
            ..Default::default()
        };
        let pipeline = config.pipeline_config();

        assert_eq!(pipeline.window_size, 12);
        assert_eq!(pipeline.detector_window_size, 12);
        assert_eq!(pipeline.threshold, 2.5);
    }
}
