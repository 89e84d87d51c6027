//! Timed status effects carried by actors.

use serde::{Deserialize, Serialize};

use crate::timer::Countdown;

/// A movement slow.
///
/// `factor` is the speed multiplier while the slow lasts (0.5 = half speed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slow {
    /// Speed multiplier in `[0, 1]`
    pub factor: f32,
    /// Remaining duration
    pub remaining: Countdown,
}

impl Slow {
    /// Creates a slow from a percentage reduction (50 = half speed).
    #[must_use]
    pub fn from_percent(percent: f32, duration: f32) -> Self {
        Self::new(1.0 - percent.clamp(0.0, 100.0) / 100.0, duration)
    }

    /// Creates a slow from a speed multiplier.
    #[must_use]
    pub fn new(factor: f32, duration: f32) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
            remaining: Countdown::running(duration),
        }
    }
}

/// Payload a projectile or aura applies to the target it reaches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StatusPayload {
    /// Percentage slow for a duration in seconds.
    Slow {
        /// Speed reduction percentage
        percent: f32,
        /// Duration in seconds
        duration: f32,
    },
}

impl StatusPayload {
    /// Converts the payload into the effect it applies.
    #[must_use]
    pub fn to_slow(self) -> Slow {
        match self {
            Self::Slow { percent, duration } => Slow::from_percent(percent, duration),
        }
    }
}

/// Active status effects on one actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEffects {
    slow: Option<Slow>,
}

impl StatusEffects {
    /// Creates an empty status set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a slow. The strongest factor wins; an equal factor keeps the
    /// longer remaining duration.
    ///
    /// Returns true if the active slow changed.
    pub fn apply_slow(&mut self, slow: Slow) -> bool {
        match &mut self.slow {
            Some(current) if current.remaining.is_running() => {
                if slow.factor < current.factor {
                    *current = slow;
                    true
                } else if (slow.factor - current.factor).abs() < f32::EPSILON
                    && slow.remaining.remaining() > current.remaining.remaining()
                {
                    current.remaining.extend_to(slow.remaining.remaining());
                    true
                } else {
                    false
                }
            },
            _ => {
                self.slow = Some(slow);
                true
            },
        }
    }

    /// Advances effect timers and drops expired effects.
    pub fn tick(&mut self, dt: f32) {
        if let Some(slow) = &mut self.slow {
            if slow.remaining.tick(dt) || !slow.remaining.is_running() {
                self.slow = None;
            }
        }
    }

    /// Current movement speed multiplier.
    #[must_use]
    pub fn speed_multiplier(&self) -> f32 {
        self.slow.map_or(1.0, |s| s.factor)
    }

    /// Active slow, if any.
    #[must_use]
    pub fn slow(&self) -> Option<Slow> {
        self.slow
    }

    /// Removes every effect.
    pub fn clear(&mut self) {
        self.slow = None;
    }
}
