//! Abstract player intent consumed by the simulation.
//!
//! The input collaborator polls devices and hands the core an [`Intent`] per
//! tick: a movement axis, an optional aim vector, a jump flag and ability
//! trigger edges. [`TriggerTracker`] turns raw held flags into those edges for
//! drivers that only know whether a button is down.

use ahash::AHashMap;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Edge of an ability trigger this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// Went down this tick
    Pressed,
    /// Still down
    Held,
    /// Went up this tick
    Released,
}

/// Player intent for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intent {
    /// Horizontal movement in `[-1, 1]`
    pub move_x: f32,
    /// Aim direction for projectile abilities
    pub aim: Option<Vec2>,
    /// Jump requested
    pub jump: bool,
    /// Ability trigger edges by ability id
    pub triggers: AHashMap<String, Trigger>,
}

impl Intent {
    /// Intent with no input.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// Sets the movement axis.
    #[must_use]
    pub fn with_move(mut self, move_x: f32) -> Self {
        self.move_x = move_x;
        self
    }

    /// Requests a jump.
    #[must_use]
    pub fn with_jump(mut self) -> Self {
        self.jump = true;
        self
    }

    /// Sets the aim direction.
    #[must_use]
    pub fn with_aim(mut self, aim: Vec2) -> Self {
        self.aim = Some(aim);
        self
    }

    /// Adds a trigger edge for an ability.
    #[must_use]
    pub fn with_trigger(mut self, ability: impl Into<String>, trigger: Trigger) -> Self {
        self.triggers.insert(ability.into(), trigger);
        self
    }

    /// Shorthand for a `Pressed` edge.
    #[must_use]
    pub fn press(self, ability: impl Into<String>) -> Self {
        self.with_trigger(ability, Trigger::Pressed)
    }

    /// Shorthand for a `Released` edge.
    #[must_use]
    pub fn release(self, ability: impl Into<String>) -> Self {
        self.with_trigger(ability, Trigger::Released)
    }

    /// Movement axis clamped to `[-1, 1]`; NaN reads as no movement.
    #[must_use]
    pub fn move_axis(&self) -> f32 {
        if self.move_x.is_nan() {
            0.0
        } else {
            self.move_x.clamp(-1.0, 1.0)
        }
    }

    /// Trigger edge for an ability, if any.
    #[must_use]
    pub fn trigger(&self, ability: &str) -> Option<Trigger> {
        self.triggers.get(ability).copied()
    }
}

/// Converts per-tick held flags into trigger edges.
#[derive(Debug, Clone, Default)]
pub struct TriggerTracker {
    held: AHashMap<String, bool>,
}

impl TriggerTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records whether a button is down this tick and returns its edge.
    pub fn update(&mut self, ability: &str, down: bool) -> Option<Trigger> {
        let was_down = self.held.get(ability).copied().unwrap_or(false);
        self.held.insert(ability.to_string(), down);
        match (was_down, down) {
            (false, true) => Some(Trigger::Pressed),
            (true, true) => Some(Trigger::Held),
            (true, false) => Some(Trigger::Released),
            (false, false) => None,
        }
    }

    /// Writes the edges for every button into an intent.
    pub fn apply<'a>(&mut self, intent: &mut Intent, buttons: impl IntoIterator<Item = (&'a str, bool)>) {
        for (ability, down) in buttons {
            if let Some(edge) = self.update(ability, down) {
                intent.triggers.insert(ability.to_string(), edge);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_axis_clamped() {
        assert!((Intent::idle().with_move(3.0).move_axis() - 1.0).abs() < 0.001);
        assert!((Intent::idle().with_move(f32::NAN).move_axis()).abs() < 0.001);
    }

    #[test]
    fn test_tracker_edges() {
        let mut tracker = TriggerTracker::new();
        assert_eq!(tracker.update("charge", false), None);
        assert_eq!(tracker.update("charge", true), Some(Trigger::Pressed));
        assert_eq!(tracker.update("charge", true), Some(Trigger::Held));
        assert_eq!(tracker.update("charge", false), Some(Trigger::Released));
        assert_eq!(tracker.update("charge", false), None);
    }

    #[test]
    fn test_tracker_fills_intent() {
        let mut tracker = TriggerTracker::new();
        let mut intent = Intent::idle();
        tracker.apply(&mut intent, [("blast", true), ("dash", false)]);
        assert_eq!(intent.trigger("blast"), Some(Trigger::Pressed));
        assert_eq!(intent.trigger("dash"), None);
    }
}
