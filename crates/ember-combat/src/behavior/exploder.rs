//! Self-destructing tank.
//!
//! Fights like a patroller while alive. The killing blow starts a fuse; when
//! it burns out the exploder detonates once around its center and only then
//! becomes `Dead`.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audio::SoundCue;
use crate::damage::DamageOutcome;
use crate::entity::EntityCore;
use crate::events::CombatEvent;
use crate::state::DyingMode;
use crate::timer::Countdown;

use super::{AreaBlast, BehaviorKind, BehaviorPolicy, PatrolPolicy, PatrolTuning, TickContext};

/// Tuning of the exploder archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExploderTuning {
    /// Movement and melee while alive
    pub patrol: PatrolTuning,
    /// Seconds between the killing blow and the detonation
    pub explosion_delay: f32,
    /// Blast radius
    pub explosion_radius: f32,
    /// Damage at the blast center
    pub explosion_damage: f32,
    /// Damage multiplier at the edge of the blast
    pub min_falloff: f32,
    /// Knockback: x away from the blast, y vertical
    pub knockback: Vec2,
}

impl Default for ExploderTuning {
    fn default() -> Self {
        Self {
            patrol: PatrolTuning::default(),
            explosion_delay: 1.0,
            explosion_radius: 250.0,
            explosion_damage: 20.0,
            min_falloff: 0.3,
            knockback: Vec2::new(3000.0, -1440.0),
        }
    }
}

/// Self-destructing tank policy.
#[derive(Debug, Clone)]
pub struct ExploderPolicy {
    tuning: ExploderTuning,
    melee: PatrolPolicy,
    fuse: Countdown,
    armed: bool,
    exploded: bool,
}

impl ExploderPolicy {
    /// Creates a policy patrolling around `spawn_x`.
    #[must_use]
    pub fn new(tuning: ExploderTuning, spawn_x: f32) -> Self {
        Self {
            melee: PatrolPolicy::new(tuning.patrol.clone(), spawn_x),
            tuning,
            fuse: Countdown::idle(),
            armed: false,
            exploded: false,
        }
    }

    /// Whether the fuse is burning.
    #[must_use]
    pub fn is_exploding(&self) -> bool {
        self.armed && !self.exploded
    }

    /// Whether the detonation already happened.
    #[must_use]
    pub fn has_exploded(&self) -> bool {
        self.exploded
    }

    fn detonate(&mut self, core: &mut EntityCore, ctx: &mut TickContext<'_>) {
        let center = core.center();
        info!("{} exploded at ({:.0}, {:.0})", core.id, center.x, center.y);
        ctx.outbox.blast(AreaBlast {
            source: core.id,
            center,
            radius: self.tuning.explosion_radius,
            damage: self.tuning.explosion_damage,
            min_falloff: self.tuning.min_falloff,
            knockback: Some(self.tuning.knockback),
        });
        ctx.outbox.event(CombatEvent::Exploded {
            entity_id: core.id,
            center,
            radius: self.tuning.explosion_radius,
        });
        ctx.outbox.cue(SoundCue::Explosion);
        self.exploded = true;
        core.machine.finish_dying();
    }
}

impl BehaviorPolicy for ExploderPolicy {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Exploder
    }

    fn attach(&mut self, core: &mut EntityCore) {
        core.machine.set_dying_mode(DyingMode::Held);
    }

    fn decide(&mut self, core: &mut EntityCore, ctx: &mut TickContext<'_>) {
        self.melee.decide(core, ctx);
    }

    fn dying(&mut self, core: &mut EntityCore, ctx: &mut TickContext<'_>) {
        core.body.velocity.x = 0.0;
        if !self.armed {
            // Killed without passing through `on_damaged`.
            self.armed = true;
            self.fuse.start(self.tuning.explosion_delay);
        }
        if self.exploded {
            return;
        }
        if self.fuse.tick(ctx.dt) || !self.fuse.is_running() {
            self.detonate(core, ctx);
        }
    }

    fn on_damaged(&mut self, _core: &mut EntityCore, outcome: DamageOutcome) {
        if outcome.killed() && !self.armed {
            self.armed = true;
            self.fuse.start(self.tuning.explosion_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::tests::{core_at, Harness};
    use crate::damage::{Hit, HitTarget};
    use crate::entity::Entity;
    use crate::state::EntityState;

    fn exploder(x: f32) -> Entity {
        Entity::new(
            core_at(BehaviorKind::Exploder, x),
            Box::new(ExploderPolicy::new(ExploderTuning::default(), x)),
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
    fn test_detonates_once_after_delay() {
        let mut harness = Harness::new();
        harness.player_at(100.0);
        let mut entity = exploder(0.0);
        assert!(entity.receive_hit(&Hit::new(1000.0)).killed());
        assert_eq!(entity.state(), EntityState::Dying);

        run(&mut entity, &mut harness, 99, 0.01);
        assert_eq!(entity.state(), EntityState::Dying);
        assert!(harness.outbox.blasts.is_empty());

        run(&mut entity, &mut harness, 1, 0.01);
        assert!(entity.is_dead());
        assert_eq!(harness.outbox.blasts.len(), 1);
        let blast = harness.outbox.blasts[0];
        assert!((blast.radius - 250.0).abs() < 0.001);
        assert!((blast.damage - 20.0).abs() < 0.001);
        assert!(harness.outbox.cues.contains(&SoundCue::Explosion));

        run(&mut entity, &mut harness, 50, 0.01);
        assert_eq!(harness.outbox.blasts.len(), 1);
    }

    #[test]
    fn test_damage_during_fuse_is_ignored() {
        let mut harness = Harness::new();
        let mut entity = exploder(0.0);
        entity.receive_hit(&Hit::new(1000.0));
        run(&mut entity, &mut harness, 50, 0.01);
        assert!(matches!(entity.receive_hit(&Hit::new(10.0)), DamageOutcome::Rejected(_)));
        run(&mut entity, &mut harness, 50, 0.01);
        assert!(entity.is_dead());
        assert_eq!(harness.outbox.blasts.len(), 1);
    }

    #[test]
    fn test_fights_like_a_patroller_while_alive() {
        let mut harness = Harness::new();
        harness.player_at(60.0);
        let mut entity = exploder(0.0);
        run(&mut entity, &mut harness, 20, 0.05);
        assert_eq!(entity.state(), EntityState::Attack);
        assert_eq!(harness.outbox.hits.len(), 1);
    }

    #[test]
    fn test_zero_delay_detonates_next_tick() {
        let mut harness = Harness::new();
        let tuning = ExploderTuning {
            explosion_delay: 0.0,
            ..ExploderTuning::default()
        };
        let mut entity = Entity::new(core_at(BehaviorKind::Exploder, 0.0), Box::new(ExploderPolicy::new(tuning, 0.0)));
        entity.receive_hit(&Hit::new(1000.0));
        run(&mut entity, &mut harness, 1, 0.01);
        assert!(entity.is_dead());
        assert_eq!(harness.outbox.blasts.len(), 1);
    }
}
