//! Tick-polled timers
//!
//! Two shapes of timed behaviour show up in enemy logic:
//!
//! - [`Timer`]: a countdown decremented every tick and checked by the owner
//!   (strafe re-decision, destination recalculation).
//! - [`Cooldown`]: a deferred readiness flag. Starting it closes the gate;
//!   the gate reopens once the delay has been polled away. A pending delay can
//!   be cancelled, after which it never fires.

/// A countdown timer polled once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    /// Length of one period in seconds
    duration: f32,
    /// Seconds left in the current period
    remaining: f32,
}

impl Timer {
    /// Create a timer that finishes after `duration` seconds.
    #[must_use]
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            remaining: duration,
        }
    }

    /// Create a timer that is already finished, so the first check fires.
    #[must_use]
    pub fn finished(duration: f32) -> Self {
        Self {
            duration,
            remaining: 0.0,
        }
    }

    /// Count down by `dt` seconds. Returns true once the timer has run out.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.is_finished()
    }

    /// Whether the countdown has run out.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Start a new period of the same length.
    pub fn reset(&mut self) {
        self.remaining = self.duration;
    }

    /// Start a new period with a different length.
    pub fn restart(&mut self, duration: f32) {
        self.duration = duration;
        self.remaining = duration;
    }

    /// Expire the timer immediately.
    pub fn finish(&mut self) {
        self.remaining = 0.0;
    }

    /// Seconds left in the current period (never negative).
    #[must_use]
    pub fn remaining(&self) -> f32 {
        self.remaining.max(0.0)
    }

    /// Length of one period in seconds.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.duration
    }
}

/// A readiness gate that reopens after a scheduled delay.
///
/// The delay is only advanced by [`Cooldown::poll`], so it cannot fire
/// between ticks or after its owner stopped polling it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cooldown {
    /// Seconds until the gate reopens, if a delay is scheduled
    pending: Option<f32>,
}

impl Cooldown {
    /// Create an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Close the gate for `delay` seconds. Restarting replaces any pending delay.
    pub fn start(&mut self, delay: f32) {
        self.pending = Some(delay.max(0.0));
    }

    /// Advance a pending delay by `dt`. Returns true on the tick the gate reopens.
    pub fn poll(&mut self, dt: f32) -> bool {
        let Some(remaining) = self.pending.as_mut() else {
            return false;
        };

        *remaining -= dt;
        if *remaining <= 0.0 {
            self.pending = None;
            return true;
        }
        false
    }

    /// Drop the pending delay without letting it fire. The gate is left open.
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            log::trace!("cooldown cancelled before it elapsed");
        }
    }

    /// Whether the gate is open.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.pending.is_none()
    }

    /// Seconds until the gate reopens (zero when open).
    #[must_use]
    pub fn remaining(&self) -> f32 {
        self.pending.unwrap_or(0.0).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_counts_down() {
        let mut timer = Timer::new(1.0);

        assert!(!timer.tick(0.4));
        assert!(!timer.tick(0.4));
        assert!(timer.tick(0.4));
        assert_eq!(timer.remaining(), 0.0);
    }

    #[test]
    fn test_timer_finished_fires_first_check() {
        let mut timer = Timer::finished(1.0);
        assert!(timer.is_finished());

        timer.reset();
        assert!(!timer.is_finished());
        assert!((timer.remaining() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_timer_restart_changes_duration() {
        let mut timer = Timer::new(1.0);
        timer.restart(2.5);

        assert!((timer.duration() - 2.5).abs() < f32::EPSILON);
        assert!(!timer.tick(2.0));
        assert!(timer.tick(0.5));
    }

    #[test]
    fn test_cooldown_reopens_after_delay() {
        let mut cooldown = Cooldown::new();
        assert!(cooldown.is_ready());

        cooldown.start(1.0);
        assert!(!cooldown.is_ready());

        assert!(!cooldown.poll(0.6));
        assert!(cooldown.poll(0.6));
        assert!(cooldown.is_ready());

        // Nothing pending, nothing fires
        assert!(!cooldown.poll(1.0));
    }

    #[test]
    fn test_cooldown_cancel_never_fires() {
        let mut cooldown = Cooldown::new();
        cooldown.start(1.0);
        cooldown.poll(0.5);

        cooldown.cancel();

        assert!(cooldown.is_ready());
        assert!(!cooldown.poll(10.0));
    }

    #[test]
    fn test_cooldown_restart_replaces_pending() {
        let mut cooldown = Cooldown::new();
        cooldown.start(0.2);
        cooldown.start(1.0);

        assert!(!cooldown.poll(0.5));
        assert!((cooldown.remaining() - 0.5).abs() < 1e-6);
    }
}
