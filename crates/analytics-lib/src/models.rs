//! Wire models shared by the service and its clients

use serde::{Deserialize, Serialize};

/// A single system-load sample as posted by producers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix seconds; `0` means "stamp on arrival"
    #[serde(default)]
    pub timestamp: i64,
    /// CPU utilization percent
    #[serde(default)]
    pub cpu: f64,
    /// Requests per second
    #[serde(default)]
    pub rps: f64,
}

impl Sample {
    pub fn new(timestamp: i64, cpu: f64, rps: f64) -> Self {
        Self {
            timestamp,
            cpu,
            rps,
        }
    }

    /// Replace a missing timestamp with the current time
    pub fn stamped(mut self) -> Self {
        if self.timestamp == 0 {
            self.timestamp = chrono::Utc::now().timestamp();
        }
        self
    }

    /// Key used when caching the raw sample
    pub fn cache_key(&self) -> String {
        format!("metric:{}", self.timestamp)
    }
}

/// Response to an ingested sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub rolling_average: f64,
    pub is_anomaly: bool,
}

/// Anomaly detector section of the analysis report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyStatsReport {
    pub mean: f64,
    pub std_dev: f64,
    pub threshold: f64,
    /// Values currently held in the detector window
    pub window_size: usize,
}

/// On-demand analysis report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub rolling_average: f64,
    pub anomaly_stats: AnomalyStatsReport,
    pub timestamp: i64,
}
