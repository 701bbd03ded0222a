//! Online z-score anomaly detection
//!
//! Each new value is folded into a trailing window first, then judged
//! against the mean and population standard deviation of that window.
//! The decision for the latest value is cached alongside the window so
//! readers never see one without the other.

use super::window::SampleWindow;
use super::{DEFAULT_THRESHOLD, DEFAULT_WINDOW_SIZE};
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Minimum values already in the window before a push can be judged
const MIN_HISTORY_FOR_DETECTION: usize = 2;

/// Outcome of evaluating a single pushed value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Signed z-score of the value, `0.0` when it could not be computed
    pub z_score: f64,
    /// Whether `|z_score|` exceeded the threshold
    pub is_anomaly: bool,
}

impl Decision {
    fn normal() -> Self {
        Self::default()
    }
}

/// Window statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorStats {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

#[derive(Debug)]
struct DetectorState {
    window: SampleWindow,
    last_decision: Decision,
}

/// Z-score anomaly detector over a trailing window of values
#[derive(Debug)]
pub struct AnomalyDetector {
    threshold: f64,
    window_size: usize,
    state: RwLock<DetectorState>,
}

impl AnomalyDetector {
    /// Create a detector
    ///
    /// A window size below 1 becomes 50 and a non-positive (or non-finite)
    /// threshold becomes 2.0. Bad configuration is normalized, not rejected.
    pub fn new(window_size: usize, threshold: f64) -> Self {
        let window_size = if window_size < 1 {
            DEFAULT_WINDOW_SIZE
        } else {
            window_size
        };
        let threshold = if threshold > 0.0 && threshold.is_finite() {
            threshold
        } else {
            DEFAULT_THRESHOLD
        };

        Self {
            threshold,
            window_size,
            state: RwLock::new(DetectorState {
                window: SampleWindow::new(window_size),
                last_decision: Decision::normal(),
            }),
        }
    }

    /// Push a value and report whether it is anomalous
    pub fn push(&self, value: f64) -> bool {
        self.observe(value).is_anomaly
    }

    /// Push a value and return the full decision made for it
    ///
    /// The window update and the cached decision are written under the
    /// same lock acquisition.
    pub fn observe(&self, value: f64) -> Decision {
        let mut state = self.write();

        let prior_len = state.window.len();
        state.window.push(value);

        let decision = if prior_len < MIN_HISTORY_FOR_DETECTION {
            Decision::normal()
        } else {
            self.evaluate(&state.window, value)
        };

        state.last_decision = decision;
        decision
    }

    fn evaluate(&self, window: &SampleWindow, value: f64) -> Decision {
        let (mean, std_dev) = window.mean_and_std_dev();

        // All values identical; rounding in the mean can leave a tiny
        // non-zero deviation, so compare the values themselves too.
        if std_dev == 0.0 || window.iter().all(|v| v == value) {
            return Decision::normal();
        }

        let z_score = (value - mean) / std_dev;
        if !z_score.is_finite() {
            return Decision::normal();
        }

        Decision {
            z_score,
            is_anomaly: z_score.abs() > self.threshold,
        }
    }

    /// Population mean, standard deviation and length of the current window
    pub fn stats(&self) -> DetectorStats {
        let state = self.read();
        let (mean, std_dev) = state.window.mean_and_std_dev();
        DetectorStats {
            mean,
            std_dev,
            count: state.window.len(),
        }
    }

    /// Decision made by the most recent push (`z = 0`, normal if none yet)
    pub fn last_decision(&self) -> Decision {
        self.read().last_decision
    }

    /// Clear the window
    ///
    /// The cached decision is left in place and is only replaced by the
    /// next push.
    pub fn reset(&self) {
        self.write().window.clear();
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    fn read(&self) -> RwLockReadGuard<'_, DetectorState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DetectorState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_THRESHOLD)
    }
}
