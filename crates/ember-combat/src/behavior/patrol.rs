//! Patrol-and-melee archetype.
//!
//! Walks between two x-bounds around its spawn point. Once the player is
//! inside the detection box it chases; within attack range it swings, landing
//! at most one hit per swing inside the middle third of the attack clip.

use serde::{Deserialize, Serialize};

use crate::audio::SoundCue;
use crate::damage::Hit;
use crate::entity::EntityCore;
use crate::events::CombatEvent;
use crate::state::EntityState;

use super::{direction_to, BehaviorKind, BehaviorPolicy, PatrolRoute, TickContext};

/// Tuning of the patrol archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatrolTuning {
    /// Half-width of the patrol route around the spawn x
    pub patrol_range: f32,
    /// Horizontal detection range
    pub detection_range: f32,
    /// Horizontal distance at which the swing starts
    pub attack_range: f32,
    /// Seconds between two landed swings
    pub attack_cooldown: f32,
}

impl Default for PatrolTuning {
    fn default() -> Self {
        Self {
            patrol_range: 200.0,
            detection_range: 400.0,
            attack_range: 120.0,
            attack_cooldown: 1.5,
        }
    }
}

/// Melee swing bookkeeping: one hit per swing, gated by a cooldown.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MeleeSwing {
    cooldown: f32,
    timer: f32,
    landed: bool,
}

impl MeleeSwing {
    pub(crate) fn new(cooldown: f32) -> Self {
        Self {
            cooldown: cooldown.max(0.0),
            timer: 0.0,
            landed: false,
        }
    }

    /// Keeps the core attacking and lands the hit inside the clip's middle third.
    pub(crate) fn swing(&mut self, core: &mut EntityCore, ctx: &mut TickContext<'_>) {
        if core.state() != EntityState::Attack {
            core.set_state(EntityState::Attack);
            self.landed = false;
            ctx.outbox.event(CombatEvent::AttackStarted { entity_id: core.id });
        }

        let frame = core.machine.frame();
        if frame <= 1 {
            self.landed = false;
        }

        let frames = core.animations.clip(EntityState::Attack).frames;
        let window = frames / 3..=frames * 2 / 3;
        if window.contains(&frame) && !self.landed && self.timer <= 0.0 {
            ctx.outbox.hit(Hit::new(core.stats.damage).with_source(core.id));
            ctx.outbox.cue(SoundCue::EnemyAttack);
            self.landed = true;
            self.timer = self.cooldown;
        }

        if self.timer > 0.0 {
            self.timer -= ctx.dt;
        }
    }
}

/// Patrol-and-melee policy.
#[derive(Debug, Clone)]
pub struct PatrolPolicy {
    tuning: PatrolTuning,
    route: PatrolRoute,
    swing: MeleeSwing,
}

impl PatrolPolicy {
    /// Creates a policy patrolling around `spawn_x`.
    #[must_use]
    pub fn new(tuning: PatrolTuning, spawn_x: f32) -> Self {
        Self {
            route: PatrolRoute::around(spawn_x, tuning.patrol_range),
            swing: MeleeSwing::new(tuning.attack_cooldown),
            tuning,
        }
    }

    /// Patrol bounds.
    #[must_use]
    pub fn route(&self) -> &PatrolRoute {
        &self.route
    }
}

impl BehaviorPolicy for PatrolPolicy {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Patrol
    }

    fn decide(&mut self, core: &mut EntityCore, ctx: &mut TickContext<'_>) {
        let speed = core.move_speed();
        core.body.velocity.x = 0.0;

        let detection = self.tuning.detection_range;
        let Some(target) = ctx.target.filter(|t| t.detected_by(&core.body, detection)) else {
            core.set_state(EntityState::Walk);
            self.route.patrol(&mut core.body, speed, ctx.dt, ctx.solids);
            return;
        };

        let dx = target.offset_from(&core.body).x;
        core.body.face_towards(dx);
        if dx.abs() <= self.tuning.attack_range {
            self.swing.swing(core, ctx);
        } else {
            core.set_state(EntityState::Walk);
            let direction = direction_to(dx);
            self.route.direction = direction;
            core.body.move_horizontal(speed * direction * ctx.dt, ctx.solids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::tests::{core_at, Harness};
    use crate::entity::Entity;

    fn patroller(x: f32) -> Entity {
        Entity::new(
            core_at(BehaviorKind::Patrol, x),
            Box::new(PatrolPolicy::new(PatrolTuning::default(), x)),
        )
    }

    fn run(entity: &mut Entity, harness: &mut Harness, ticks: usize, dt: f32) {
        for _ in 0..ticks {
            let mut ctx = harness.ctx(dt);
            entity.update(&mut ctx);
            harness.now += f64::from(dt);
        }
    }

    #[test]
    fn test_patrols_without_target() {
        let mut harness = Harness::new();
        let mut entity = patroller(0.0);
        run(&mut entity, &mut harness, 10, 0.1);
        assert!(entity.core().center().x < 0.0);
        assert_eq!(entity.state(), EntityState::Walk);
        assert!(!entity.core().body.facing_right);
    }

    #[test]
    fn test_chases_detected_player() {
        let mut harness = Harness::new();
        harness.player_at(300.0);
        let mut entity = patroller(0.0);
        run(&mut entity, &mut harness, 1, 0.1);
        assert!((entity.core().center().x - 8.0).abs() < 0.001);
        assert!(entity.core().body.facing_right);
        assert!(harness.outbox.hits.is_empty());
    }

    #[test]
    fn test_ignores_player_on_other_level() {
        let mut harness = Harness::new();
        harness.player_at(100.0);
        if let Some(target) = harness.target.as_mut() {
            target.rect = target.rect.translated(glam::Vec2::new(0.0, -300.0));
        }
        let mut entity = patroller(0.0);
        run(&mut entity, &mut harness, 1, 0.1);
        assert!(entity.core().center().x < 0.0);
    }

    #[test]
    fn test_one_hit_per_swing_window() {
        let mut harness = Harness::new();
        harness.player_at(60.0);
        let mut entity = patroller(0.0);
        run(&mut entity, &mut harness, 20, 0.05);
        assert_eq!(entity.state(), EntityState::Attack);
        assert_eq!(harness.outbox.hits.len(), 1);
        assert!((harness.outbox.hits[0].amount - 10.0).abs() < 0.001);
        assert_eq!(harness.outbox.hits[0].source, Some(entity.id()));
        assert!(harness.outbox.cues.contains(&SoundCue::EnemyAttack));
    }

    #[test]
    fn test_cooldown_spaces_hits() {
        let mut harness = Harness::new();
        harness.player_at(60.0);
        let mut entity = patroller(0.0);
        run(&mut entity, &mut harness, 60, 0.05);
        assert_eq!(harness.outbox.hits.len(), 2);
    }
}
