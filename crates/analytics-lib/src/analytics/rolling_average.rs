//! Windowed mean estimator
//!
//! Keeps the last N request-rate values and reports their arithmetic mean.

use super::window::SampleWindow;
use super::DEFAULT_WINDOW_SIZE;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Rolling average over a fixed-size trailing window
///
/// Safe to share between request handlers behind an `Arc`: `push` and
/// `reset` take the write lock, readers share the read lock.
#[derive(Debug)]
pub struct RollingAverage {
    window: RwLock<SampleWindow>,
}

impl RollingAverage {
    /// Create an estimator; a capacity of 0 falls back to the default of 50
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity < 1 {
            DEFAULT_WINDOW_SIZE
        } else {
            capacity
        };

        Self {
            window: RwLock::new(SampleWindow::new(capacity)),
        }
    }

    /// Add a value, evicting the oldest one if the window is full
    ///
    /// No validation is performed; NaN and negative values pass through.
    pub fn push(&self, value: f64) {
        self.write().push(value);
    }

    /// Mean of the window, `0.0` meaning "no data yet"
    pub fn mean(&self) -> f64 {
        self.read().mean()
    }

    /// Number of values currently in the window
    pub fn count(&self) -> usize {
        self.read().len()
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity()
    }

    /// Drop every value in the window
    pub fn reset(&self) {
        self.write().clear();
    }

    // A panic while holding the lock cannot leave the window half-updated,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, SampleWindow> {
        self.window.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SampleWindow> {
        self.window.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RollingAverage {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
