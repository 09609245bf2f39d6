//! Capture cadence accounting.

use std::time::Duration;

/// Accumulates elapsed time and fires at most once per interval.
///
/// When more than one interval has elapsed between two calls (a stall
/// or scheduler jitter) a single capture fires and the excess is
/// discarded, so missed ticks never turn into a burst of captures.
#[derive(Debug, Clone)]
pub struct TickAccumulator {
    interval: Duration,
    accumulated: Duration,
}

impl TickAccumulator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            accumulated: Duration::ZERO,
        }
    }

    /// Interval for a target rate in frames per second.
    pub fn from_fps(fps: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / fps.max(1) as f64))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Add `elapsed` and return `true` if a capture is due.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        self.accumulated += elapsed;
        if self.accumulated >= self.interval {
            self.accumulated = Duration::ZERO;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
    }
}
