//! Coarse counter-to-rate conversion
//!
//! Counts events and, once a fixed wall-clock interval has elapsed,
//! converts the count into a rate using the actual elapsed time. The
//! counter is then zeroed. This is lossy and is not a sliding window.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Source of monotonic time for rate computation
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Clock backed by `Instant::now`
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Unit the published rate is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    PerSecond,
    PerMinute,
}

impl RateUnit {
    fn scale(&self, elapsed: Duration) -> f64 {
        match self {
            RateUnit::PerSecond => elapsed.as_secs_f64(),
            RateUnit::PerMinute => elapsed.as_secs_f64() / 60.0,
        }
    }
}

#[derive(Debug)]
struct Counter {
    count: u64,
    last_reset: Instant,
}

/// Windowed event counter that periodically yields a rate
pub struct RateAggregator {
    name: &'static str,
    interval: Duration,
    unit: RateUnit,
    clock: Arc<dyn Clock>,
    counter: Mutex<Counter>,
}

impl fmt::Debug for RateAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateAggregator")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("unit", &self.unit)
            .finish()
    }
}

impl RateAggregator {
    /// Create an aggregator publishing every `interval`
    pub fn new(name: &'static str, interval: Duration, unit: RateUnit) -> Self {
        Self::with_clock(name, interval, unit, Arc::new(MonotonicClock))
    }

    /// Create an aggregator driven by a custom clock
    pub fn with_clock(
        name: &'static str,
        interval: Duration,
        unit: RateUnit,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let last_reset = clock.now();
        Self {
            name,
            interval,
            unit,
            clock,
            counter: Mutex::new(Counter {
                count: 0,
                last_reset,
            }),
        }
    }

    /// Ingestion rate in samples per second, published every second
    pub fn per_second(name: &'static str) -> Self {
        Self::new(name, Duration::from_secs(1), RateUnit::PerSecond)
    }

    /// Event rate per minute, published every 60 seconds
    pub fn per_minute(name: &'static str) -> Self {
        Self::new(name, Duration::from_secs(60), RateUnit::PerMinute)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Count one event
    pub fn tick(&self) {
        self.lock().count += 1;
    }

    /// Events counted since the last reset
    pub fn pending(&self) -> u64 {
        self.lock().count
    }

    /// Publish a rate if the interval has elapsed
    ///
    /// Returns `Some(rate)` and resets the counter when at least one
    /// interval has passed since the last reset, `None` otherwise.
    pub fn poll(&self) -> Option<f64> {
        let now = self.clock.now();
        let mut counter = self.lock();

        let elapsed = now.saturating_duration_since(counter.last_reset);
        if elapsed < self.interval {
            return None;
        }

        let rate = counter.count as f64 / self.unit.scale(elapsed);
        counter.count = 0;
        counter.last_reset = now;

        Some(rate)
    }

    /// Count one event, then poll
    pub fn tick_and_poll(&self) -> Option<f64> {
        self.tick();
        self.poll()
    }

    fn lock(&self) -> MutexGuard<'_, Counter> {
        self.counter.lock().unwrap_or_else(|e| e.into_inner())
    }
}
