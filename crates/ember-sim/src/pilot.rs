//! Scripted stand-in for a human player.
//!
//! The pilot walks towards the nearest living enemy, keeps a comfortable
//! distance, taps `blast` on a fixed cadence and periodically holds `charge`
//! to release a charged shot.

use ember_combat::{Entity, Intent, TriggerTracker, World};
use glam::Vec2;

/// Distance the pilot tries to keep from its target.
const ENGAGE_RANGE: f32 = 500.0;
/// Distance under which the pilot backs off.
const RETREAT_RANGE: f32 = 150.0;

/// Ability tapped on every shot.
const SHOT: &str = "blast";
/// Ability held and released.
const CHARGED_SHOT: &str = "charge";

/// Timings of the scripted pilot.
#[derive(Debug, Clone, Copy)]
pub struct PilotTimings {
    /// Seconds between blast taps
    pub shot_interval: f32,
    /// Seconds between charge holds
    pub charge_interval: f32,
    /// Seconds a charge is held
    pub charge_hold: f32,
}

impl Default for PilotTimings {
    fn default() -> Self {
        Self {
            shot_interval: 0.35,
            charge_interval: 3.0,
            charge_hold: 0.6,
        }
    }
}

/// Turns world state into player intent.
#[derive(Debug, Clone)]
pub struct Pilot {
    timings: PilotTimings,
    tracker: TriggerTracker,
    since_shot: f32,
    since_charge: f32,
}

impl Pilot {
    /// Creates a pilot.
    #[must_use]
    pub fn new(timings: PilotTimings) -> Self {
        Self {
            timings,
            tracker: TriggerTracker::new(),
            // First shot goes out immediately.
            since_shot: timings.shot_interval,
            since_charge: 0.0,
        }
    }

    /// Builds the intent for the next tick.
    pub fn intent(&mut self, world: &World, dt: f32) -> Intent {
        self.since_shot += dt;
        self.since_charge += dt;

        let player = world.player();
        let mut intent = Intent::idle();
        let Some(target) = nearest_enemy(world.enemies(), player) else {
            // Let go of anything still held.
            self.tracker.apply(&mut intent, [(SHOT, false), (CHARGED_SHOT, false)]);
            return intent;
        };

        let offset = target.core().center() - player.core().center();
        let distance = offset.x.abs();
        if distance > ENGAGE_RANGE {
            intent = intent.with_move(offset.x.signum());
        } else if distance < RETREAT_RANGE {
            intent = intent.with_move(-offset.x.signum());
        }
        intent = intent.with_aim(aim_towards(offset));

        let shoot = self.since_shot >= self.timings.shot_interval;
        if shoot {
            self.since_shot = 0.0;
        }
        if self.since_charge >= self.timings.charge_interval + self.timings.charge_hold {
            self.since_charge = 0.0;
        }
        let charging = self.since_charge >= self.timings.charge_interval;

        self.tracker.apply(&mut intent, [(SHOT, shoot), (CHARGED_SHOT, charging)]);
        intent
    }
}

fn nearest_enemy<'a>(enemies: &'a [Entity], player: &Entity) -> Option<&'a Entity> {
    let origin = player.core().center();
    enemies
        .iter()
        .filter(|enemy| !enemy.is_terminal())
        .min_by(|a, b| {
            let da = a.core().center().distance_squared(origin);
            let db = b.core().center().distance_squared(origin);
            da.total_cmp(&db)
        })
}

fn aim_towards(offset: Vec2) -> Vec2 {
    let aim = offset.normalize_or_zero();
    if aim == Vec2::ZERO {
        Vec2::X
    } else {
        aim
    }
}
