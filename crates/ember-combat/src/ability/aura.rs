//! Continuous auras around the owner.

use ember_common::Rect;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::status::Slow;

/// Slow aura refreshed every tick a target stays inside the radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuraAbility {
    /// Radius measured from the owner's center to the target's center
    pub radius: f32,
    /// Speed reduction percentage
    pub slow_percent: f32,
    /// Duration of each refresh
    pub refresh: f32,
    enabled: bool,
}

impl AuraAbility {
    /// Default refresh window per tick.
    pub const DEFAULT_REFRESH: f32 = 0.1;

    /// Creates an enabled aura.
    #[must_use]
    pub fn new(radius: f32, slow_percent: f32) -> Self {
        Self {
            radius: radius.max(0.0),
            slow_percent: slow_percent.clamp(0.0, 100.0),
            refresh: Self::DEFAULT_REFRESH,
            enabled: true,
        }
    }

    /// Whether the aura is on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turns the aura on.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Turns the aura off.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Whether a target hitbox is inside the aura.
    #[must_use]
    pub fn reaches(&self, center: Vec2, target: &Rect) -> bool {
        self.enabled && center.distance(target.center()) <= self.radius
    }

    /// Slow to apply to a target inside the aura this tick.
    #[must_use]
    pub fn pulse(&self, center: Vec2, target: &Rect) -> Option<Slow> {
        self.reaches(center, target)
            .then(|| Slow::from_percent(self.slow_percent, self.refresh))
    }
}
