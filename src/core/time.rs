//! Simulation clock

use std::time::Duration;

/// Fixed-step simulation clock.
///
/// Every controller reads the same delta during a tick, so a run with the
/// same timestep and seed replays identically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Time {
    /// Duration of the current tick
    delta: Duration,
    /// Total simulated time
    elapsed: Duration,
    /// Number of ticks advanced so far
    frame: u64,
}

impl Time {
    /// Create a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame: 0,
        }
    }

    /// Advance the clock by one tick of `delta`.
    pub fn advance(&mut self, delta: Duration) {
        self.delta = delta;
        self.elapsed += delta;
        self.frame += 1;
    }

    /// Advance the clock by one tick of `seconds`.
    pub fn advance_secs(&mut self, seconds: f32) {
        self.advance(Duration::from_secs_f32(seconds.max(0.0)));
    }

    /// Duration of the current tick.
    #[must_use]
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Duration of the current tick in seconds.
    #[must_use]
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Total simulated time.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Total simulated time in seconds.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// Number of ticks advanced so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}
