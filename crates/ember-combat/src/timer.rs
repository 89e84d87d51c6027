//! Cooldown and countdown primitives.
//!
//! Every time-gated behavior in the core is expressed with one of two types:
//! - [`Cooldown`]: compares the simulation clock against the time of last use
//! - [`Countdown`]: a duration that is drained by `dt` each tick

use serde::{Deserialize, Serialize};

/// Sentinel for "never used", far enough in the past that any cooldown is ready.
pub const NEVER_USED: f64 = -999.0;

/// Tolerance absorbing clock accumulation error at the cooldown boundary.
const CLOCK_EPSILON: f64 = 1e-9;

/// Tolerance absorbing `f32` drift when a countdown is drained in many small steps.
const COUNTDOWN_EPSILON: f32 = 1e-4;

/// Cooldown gate keyed on absolute simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cooldown {
    /// Cooldown length in seconds
    pub duration: f64,
    /// Simulation time of last successful trigger
    pub last_used: f64,
}

impl Cooldown {
    /// Creates a ready cooldown.
    #[must_use]
    pub fn new(duration: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            last_used: NEVER_USED,
        }
    }

    /// True iff at least `duration` seconds have elapsed since last use.
    #[must_use]
    pub fn can_use(&self, now: f64) -> bool {
        now - self.last_used + CLOCK_EPSILON >= self.duration
    }

    /// Records a use at `now`.
    pub fn trigger(&mut self, now: f64) {
        self.last_used = now;
    }

    /// Triggers the cooldown if ready. Returns whether it was ready.
    pub fn try_trigger(&mut self, now: f64) -> bool {
        if self.can_use(now) {
            self.trigger(now);
            true
        } else {
            false
        }
    }

    /// Seconds until ready (0 when ready).
    #[must_use]
    pub fn remaining(&self, now: f64) -> f64 {
        (self.duration - (now - self.last_used)).max(0.0)
    }

    /// Holds the cooldown in place for `dt` seconds of clock time.
    pub fn pause(&mut self, dt: f64) {
        if self.last_used > NEVER_USED {
            self.last_used += dt;
        }
    }

    /// Makes the cooldown ready again.
    pub fn reset(&mut self) {
        self.last_used = NEVER_USED;
    }
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// A countdown drained by the per-tick delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Countdown {
    remaining: f32,
}

impl Countdown {
    /// Creates an idle countdown.
    #[must_use]
    pub const fn idle() -> Self {
        Self { remaining: 0.0 }
    }

    /// Creates a countdown already running for `duration` seconds.
    #[must_use]
    pub fn running(duration: f32) -> Self {
        Self {
            remaining: duration.max(0.0),
        }
    }

    /// (Re)starts the countdown.
    pub fn start(&mut self, duration: f32) {
        self.remaining = duration.max(0.0);
    }

    /// Extends the countdown to at least `duration` seconds; never shortens it.
    pub fn extend_to(&mut self, duration: f32) {
        self.remaining = self.remaining.max(duration);
    }

    /// Advances time. Returns true exactly on the tick the countdown reaches zero.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.remaining <= 0.0 {
            return false;
        }
        self.remaining -= dt;
        if self.remaining <= COUNTDOWN_EPSILON {
            self.remaining = 0.0;
            true
        } else {
            false
        }
    }

    /// Whether time is left on the countdown.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.remaining > 0.0
    }

    /// Seconds left.
    #[must_use]
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// Stops the countdown without firing.
    pub fn cancel(&mut self) {
        self.remaining = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cooldown_ready_at_start() {
        let cd = Cooldown::new(1.0);
        assert!(cd.can_use(0.0));
    }

    #[test]
    fn test_cooldown_sequence() {
        let mut cd = Cooldown::new(1.0);
        assert!(cd.try_trigger(0.0));
        assert!(!cd.try_trigger(0.5));
        assert!(cd.try_trigger(1.0));
    }

    #[test]
    fn test_cooldown_remaining() {
        let mut cd = Cooldown::new(2.0);
        cd.trigger(1.0);
        assert!((cd.remaining(1.5) - 1.5).abs() < 0.001);
        assert!(cd.remaining(5.0).abs() < 0.001);
        cd.reset();
        assert!(cd.can_use(1.5));
    }

    #[test]
    fn test_cooldown_pause_holds_progress() {
        let mut cooldown = Cooldown::new(1.0);
        cooldown.trigger(0.0);
        for step in 1..=10 {
            cooldown.pause(0.1);
            assert!(!cooldown.can_use(f64::from(step) * 0.1));
        }
        assert!((cooldown.remaining(1.0) - 1.0).abs() < 0.001);
        assert!(cooldown.can_use(2.0));

        let mut fresh = Cooldown::new(1.0);
        fresh.pause(5.0);
        assert!(fresh.can_use(0.0));
    }

    #[test]
    fn test_countdown_fires_once() {
        let mut timer = Countdown::running(0.25);
        assert!(!timer.tick(0.1));
        assert!(!timer.tick(0.1));
        assert!(timer.tick(0.1));
        assert!(!timer.tick(0.1));
        assert!(!timer.is_running());
    }

    #[test]
    fn test_countdown_many_small_steps() {
        let mut timer = Countdown::running(1.0);
        let mut fired_at = None;
        for step in 1..=120 {
            if timer.tick(0.01) {
                fired_at = Some(step);
                break;
            }
        }
        assert_eq!(fired_at, Some(100));
    }

    #[test]
    fn test_countdown_extend_never_shortens() {
        let mut timer = Countdown::running(5.0);
        timer.extend_to(2.5);
        assert!((timer.remaining() - 5.0).abs() < 0.001);
        timer.extend_to(6.0);
        assert!((timer.remaining() - 6.0).abs() < 0.001);
    }

    #[test]
    fn test_countdown_cancel() {
        let mut timer = Countdown::running(1.0);
        timer.cancel();
        assert!(!timer.is_running());
        assert!(!timer.tick(1.0));
    }

    proptest! {
        #[test]
        fn prop_cooldown_blocks_inside_window(
            duration in 0.01f64..10.0,
            t1 in 0.0f64..100.0,
            frac in 0.0f64..0.999,
        ) {
            let mut cd = Cooldown::new(duration);
            prop_assert!(cd.try_trigger(t1));
            let inside = t1 + duration * frac;
            if inside > t1 {
                prop_assert!(!cd.can_use(inside));
            }
            prop_assert!(cd.can_use(t1 + duration));
        }
    }
}
