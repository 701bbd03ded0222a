//! Streaming analytics over request-rate samples
//!
//! This module provides:
//! - A bounded FIFO sample window
//! - A rolling average over that window
//! - An online z-score anomaly detector
//! - A coarse counter-to-rate aggregator for exported gauges

mod anomaly_detector;
mod rate;
mod rolling_average;
mod window;

pub use anomaly_detector::{AnomalyDetector, Decision, DetectorStats};
pub use rate::{Clock, MonotonicClock, RateAggregator, RateUnit};
pub use rolling_average::RollingAverage;
pub use window::SampleWindow;

#[cfg(test)]
pub(crate) use rate::tests::ManualClock;

/// Default window size for both the rolling average and the detector
pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// Default z-score threshold
pub const DEFAULT_THRESHOLD: f64 = 2.0;
