//! Bounded FIFO window of recent samples
//!
//! Both the rolling average and the anomaly detector keep their own
//! instance of this window. It is not synchronized; owners wrap it in
//! a lock.

use std::collections::VecDeque;

/// Fixed-capacity window of real-valued samples, oldest first
#[derive(Debug, Clone)]
pub struct SampleWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    /// Create an empty window holding at most `capacity` values (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
        }
    }

    /// Append a value, evicting the oldest one when the window is full
    pub fn push(&mut self, value: f64) {
        while self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Arithmetic mean of the current contents, `0.0` when empty
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.values.iter().sum();
        sum / self.values.len() as f64
    }

    /// Mean and population standard deviation (divisor n), `(0.0, 0.0)` when empty
    ///
    /// Two passes: mean first, then the squared deviations from it.
    pub fn mean_and_std_dev(&self) -> (f64, f64) {
        if self.values.is_empty() {
            return (0.0, 0.0);
        }

        let n = self.values.len() as f64;
        let mean = self.mean();
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / n;

        (mean, variance.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window() {
        let window = SampleWindow::new(3);
        assert!(window.is_empty());
        assert_eq!(window.mean(), 0.0);
        assert_eq!(window.mean_and_std_dev(), (0.0, 0.0));
    }

    #[test]
    fn test_fifo_eviction() {
        let mut window = SampleWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            window.push(v);
        }

        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_population_std_dev() {
        let mut window = SampleWindow::new(8);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            window.push(v);
        }

        // Classic example: population std dev is exactly 2
        let (mean, std_dev) = window.mean_and_std_dev();
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std_dev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_clear() {
        let mut window = SampleWindow::new(2);
        window.push(1.0);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 2);
    }
}
