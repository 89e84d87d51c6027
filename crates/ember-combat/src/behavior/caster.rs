//! Ranged kiter.
//!
//! Keeps the player between its minimum and preferred distance, retreating or
//! advancing without leaving its patrol bounds, and channels a cast before
//! firing its projectile ability.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::damage::Hit;
use crate::entity::EntityCore;
use crate::state::EntityState;
use crate::timer::Countdown;

use super::{activate, direction_to, Activation, BehaviorKind, BehaviorPolicy, PatrolRoute, TargetView, TickContext};

/// Tuning of the caster archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasterTuning {
    /// Half-width of the patrol route around the spawn x
    pub patrol_range: f32,
    /// Horizontal detection range
    pub detection_range: f32,
    /// Distance the caster tries to keep
    pub preferred_distance: f32,
    /// Closer than this the caster retreats
    pub min_distance: f32,
    /// Farthest distance a cast starts at
    pub max_cast_range: f32,
    /// Seconds between casts
    pub cast_cooldown: f32,
    /// Channel time before the projectile leaves
    pub cast_duration: f32,
    /// Retreat speed in px/s
    pub retreat_speed: f32,
    /// Ability fired at the end of a cast
    pub ability: String,
}

impl Default for CasterTuning {
    fn default() -> Self {
        Self {
            patrol_range: 150.0,
            detection_range: 900.0,
            preferred_distance: 500.0,
            min_distance: 200.0,
            max_cast_range: 800.0,
            cast_cooldown: 2.5,
            cast_duration: 1.2,
            retreat_speed: 80.0,
            ability: "blast".to_string(),
        }
    }
}

/// Ranged kiter policy.
#[derive(Debug, Clone)]
pub struct CasterPolicy {
    tuning: CasterTuning,
    route: PatrolRoute,
    cast_timer: f32,
    channel: Countdown,
}

impl CasterPolicy {
    /// Creates a policy patrolling around `spawn_x`.
    #[must_use]
    pub fn new(tuning: CasterTuning, spawn_x: f32) -> Self {
        Self {
            route: PatrolRoute::around(spawn_x, tuning.patrol_range),
            tuning,
            cast_timer: 0.0,
            channel: Countdown::idle(),
        }
    }

    /// Whether a cast is being channeled.
    #[must_use]
    pub fn is_casting(&self) -> bool {
        self.channel.is_running()
    }

    fn fire(&mut self, core: &mut EntityCore, target: TargetView, ctx: &mut TickContext<'_>) {
        let dx = target.offset_from(&core.body).x;
        core.body.face_towards(dx);
        let ability = self.tuning.ability.as_str();
        if core.has_ability(ability) {
            if !activate(core, ability, Activation::Use, None, ctx) {
                debug!("{} cast fizzled: '{ability}' not ready", core.id);
            }
        } else if dx.abs() <= self.tuning.max_cast_range {
            ctx.outbox.hit(Hit::new(core.stats.damage).with_source(core.id));
        }
    }
}

impl BehaviorPolicy for CasterPolicy {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Caster
    }

    fn decide(&mut self, core: &mut EntityCore, ctx: &mut TickContext<'_>) {
        let dt = ctx.dt;
        let speed = core.move_speed();
        core.body.velocity.x = 0.0;
        self.cast_timer = (self.cast_timer - dt).max(0.0);

        let detection = self.tuning.detection_range;
        let Some(target) = ctx.target.filter(|t| t.detected_by(&core.body, detection)) else {
            core.set_state(EntityState::Walk);
            self.route.patrol(&mut core.body, speed, dt, ctx.solids);
            return;
        };

        let dx = target.offset_from(&core.body).x;
        let distance = dx.abs();
        let toward = direction_to(dx);

        if self.channel.is_running() {
            core.set_state(EntityState::Cast);
            if self.channel.tick(dt) {
                self.fire(core, target, ctx);
                self.cast_timer = self.tuning.cast_cooldown;
            }
        } else if distance < self.tuning.min_distance {
            core.set_state(EntityState::Walk);
            let step = self.tuning.retreat_speed * -toward * dt;
            self.route.step_within(&mut core.body, step, ctx.solids);
        } else if distance <= self.tuning.max_cast_range && self.cast_timer <= 0.0 {
            debug!("{} starts casting at {distance:.0}px", core.id);
            self.channel.start(self.tuning.cast_duration);
            core.set_state(EntityState::Cast);
            core.body.face_towards(dx);
        } else if distance > self.tuning.preferred_distance {
            core.set_state(EntityState::Walk);
            self.route.step_within(&mut core.body, speed * toward * dt, ctx.solids);
        } else {
            core.set_state(EntityState::Idle);
            core.body.face_towards(dx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::config::{build_abilities, AbilityEntry};
    use crate::behavior::tests::{core_at, Harness};
    use crate::events::CombatEvent;

    fn caster(x: f32, with_blast: bool) -> (EntityCore, CasterPolicy) {
        let mut core = core_at(BehaviorKind::Caster, x);
        if with_blast {
            core.abilities = build_abilities("caster", &[AbilityEntry::Named("blast".to_string())]);
        }
        (core, CasterPolicy::new(CasterTuning::default(), x))
    }

    fn decide(core: &mut EntityCore, policy: &mut CasterPolicy, harness: &mut Harness, ticks: usize, dt: f32) {
        for _ in 0..ticks {
            let mut ctx = harness.ctx(dt);
            policy.decide(core, &mut ctx);
            harness.now += f64::from(dt);
        }
    }

    #[test]
    fn test_retreats_from_close_player() {
        let mut harness = Harness::new();
        harness.player_at(100.0);
        let (mut core, mut policy) = caster(0.0, true);
        decide(&mut core, &mut policy, &mut harness, 1, 0.5);
        assert!((core.center().x + 40.0).abs() < 0.001);
        assert_eq!(core.state(), EntityState::Walk);
    }

    #[test]
    fn test_retreat_stops_at_patrol_bound() {
        let mut harness = Harness::new();
        harness.player_at(100.0);
        let (mut core, mut policy) = caster(0.0, true);
        decide(&mut core, &mut policy, &mut harness, 10, 0.5);
        assert!(core.center().x >= -150.0);
        assert!(core.center().x < -100.0);
    }

    #[test]
    fn test_channel_then_fire_projectile() {
        let mut harness = Harness::new();
        harness.player_at(400.0);
        let (mut core, mut policy) = caster(0.0, true);

        decide(&mut core, &mut policy, &mut harness, 1, 0.1);
        assert!(policy.is_casting());
        assert_eq!(core.state(), EntityState::Cast);
        assert!(core.body.facing_right);

        decide(&mut core, &mut policy, &mut harness, 11, 0.1);
        assert_eq!(core.projectile_count("blast"), 0);
        decide(&mut core, &mut policy, &mut harness, 1, 0.1);
        assert!(!policy.is_casting());
        assert_eq!(core.projectile_count("blast"), 1);
        assert!(harness
            .outbox
            .events
            .iter()
            .any(|e| matches!(e, CombatEvent::ProjectileSpawned { .. })));
    }

    #[test]
    fn test_cooldown_between_casts() {
        let mut harness = Harness::new();
        harness.player_at(400.0);
        let (mut core, mut policy) = caster(0.0, true);
        decide(&mut core, &mut policy, &mut harness, 13, 0.1);
        assert!(!policy.is_casting());
        decide(&mut core, &mut policy, &mut harness, 5, 0.1);
        assert!(!policy.is_casting());
        assert_eq!(core.state(), EntityState::Idle);
    }

    #[test]
    fn test_direct_damage_without_blast() {
        let mut harness = Harness::new();
        harness.player_at(400.0);
        let (mut core, mut policy) = caster(0.0, false);
        decide(&mut core, &mut policy, &mut harness, 13, 0.1);
        assert_eq!(harness.outbox.hits.len(), 1);
        assert!((harness.outbox.hits[0].amount - core.stats.damage).abs() < 0.001);
    }

    #[test]
    fn test_advances_towards_distant_player() {
        let mut harness = Harness::new();
        harness.player_at(850.0);
        let (mut core, mut policy) = caster(0.0, true);
        decide(&mut core, &mut policy, &mut harness, 1, 0.1);
        assert!(core.center().x > 0.0);
        assert!(!policy.is_casting());
    }
}
