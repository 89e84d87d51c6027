//! Multi-phase boss.
//!
//! Chases the player and swings at close range. Below half health it enters
//! rage once: faster, harder hitting, briefly invincible and able to ground
//! slam. When the player stays far away for too long the boss teleports next
//! to them.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::SoundCue;
use crate::damage::{DamageOutcome, Hit};
use crate::entity::EntityCore;
use crate::events::CombatEvent;
use crate::state::{EntityState, StateTick};

use super::{direction_to, BehaviorKind, BehaviorPolicy, TargetView, TickContext};

/// Tuning of the boss archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossTuning {
    /// Base speed multiplier that rage speed builds on
    pub speed_multiplier: f32,
    /// Health fraction at or below which rage starts
    pub rage_threshold: f32,
    /// Rage speed multiplier over the base speed
    pub rage_speed_multiplier: f32,
    /// Rage damage multiplier
    pub rage_damage_multiplier: f32,
    /// Invincibility granted on entering rage
    pub rage_invincibility: f32,
    /// Chase speed multiplier while raging
    pub rage_chase_multiplier: f32,
    /// Random invincibility duration
    pub invincibility_duration: f32,
    /// Seconds between two random invincibility windows
    pub invincibility_cooldown: f32,
    /// Health fraction below which random invincibility may trigger
    pub invincibility_health: f32,
    /// Chance per tick of random invincibility
    pub invincibility_chance: f32,
    /// Ground slam cooldown
    pub slam_cooldown: f32,
    /// Ground slam radius
    pub slam_radius: f32,
    /// Ground slam damage
    pub slam_damage: f32,
    /// Ground slam damage multiplier while raging
    pub slam_rage_multiplier: f32,
    /// Distance at which the boss swings
    pub attack_range: f32,
    /// Seconds before a new swing may start
    pub attack_cooldown: f32,
    /// Distance beyond which the boss wants to teleport
    pub teleport_distance: f32,
    /// Seconds the player must stay beyond `teleport_distance`
    pub teleport_patience: f32,
    /// Seconds between teleports
    pub teleport_cooldown: f32,
    /// Horizontal gap left between boss and player after a teleport
    pub teleport_offset: f32,
}

impl Default for BossTuning {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.1,
            rage_threshold: 0.5,
            rage_speed_multiplier: 1.2,
            rage_damage_multiplier: 1.2,
            rage_invincibility: 5.0,
            rage_chase_multiplier: 1.5,
            invincibility_duration: 2.5,
            invincibility_cooldown: 15.0,
            invincibility_health: 0.7,
            invincibility_chance: 0.001,
            slam_cooldown: 8.0,
            slam_radius: 200.0,
            slam_damage: 30.0,
            slam_rage_multiplier: 1.5,
            attack_range: 150.0,
            attack_cooldown: 1.5,
            teleport_distance: 3000.0,
            teleport_patience: 2.0,
            teleport_cooldown: 5.0,
            teleport_offset: 150.0,
        }
    }
}

/// Multi-phase boss policy.
#[derive(Debug, Clone)]
pub struct BossPolicy {
    tuning: BossTuning,
    raging: bool,
    attack_timer: f32,
    slam_timer: f32,
    teleport_timer: f32,
    invincibility_timer: f32,
    far_time: f32,
    swing_landed: bool,
}

impl BossPolicy {
    /// Creates a boss policy.
    #[must_use]
    pub fn new(tuning: BossTuning) -> Self {
        Self {
            tuning,
            raging: false,
            attack_timer: 0.0,
            slam_timer: 0.0,
            teleport_timer: 0.0,
            invincibility_timer: 0.0,
            far_time: 0.0,
            swing_landed: false,
        }
    }

    /// Current chase speed.
    #[must_use]
    pub fn chase_speed(&self, core: &EntityCore) -> f32 {
        let base = core.move_speed();
        if self.raging {
            base * self.tuning.speed_multiplier * self.tuning.rage_speed_multiplier * self.tuning.rage_chase_multiplier
        } else {
            base
        }
    }

    /// Current swing damage.
    #[must_use]
    pub fn swing_damage(&self, core: &EntityCore) -> f32 {
        if self.raging {
            (core.stats.damage * self.tuning.rage_damage_multiplier).floor()
        } else {
            core.stats.damage
        }
    }

    fn teleport_next_to(&mut self, core: &mut EntityCore, target: &TargetView, ctx: &mut TickContext<'_>) {
        let from = core.center();
        let player = target.center();
        let side = direction_to(player.x - from.x);
        let to = Vec2::new(player.x - side * self.tuning.teleport_offset, player.y);
        core.body.rect.set_center(to);
        core.body.velocity = Vec2::ZERO;
        core.set_state(EntityState::Attack);
        core.machine.restart();
        self.teleport_timer = self.tuning.teleport_cooldown;
        self.far_time = 0.0;
        // Arrives ready to swing: the attack cooldown is skipped once. Pending design review.
        self.attack_timer = 0.0;
        self.swing_landed = false;
        info!("Boss {} teleported next to the player at ({:.0}, {:.0})", core.id, to.x, to.y);
        ctx.outbox.event(CombatEvent::Teleported {
            entity_id: core.id,
            from,
            to,
        });
    }

    fn ground_slam(&mut self, core: &EntityCore, ctx: &mut TickContext<'_>) {
        let damage = (self.tuning.slam_damage * self.tuning.slam_rage_multiplier).floor();
        info!("Boss {} ground slam for {damage}", core.id);
        ctx.outbox.hit(Hit::new(damage).with_source(core.id));
        ctx.outbox.event(CombatEvent::AbilityUsed {
            entity_id: core.id,
            ability: "ground_slam".to_string(),
        });
        ctx.outbox.event(CombatEvent::Exploded {
            entity_id: core.id,
            center: core.center(),
            radius: self.tuning.slam_radius,
        });
        ctx.outbox.cue(SoundCue::Explosion);
        self.slam_timer = self.tuning.slam_cooldown;
    }

    fn grant_invincibility(&mut self, core: &mut EntityCore) -> bool {
        if self.invincibility_timer > 0.0 {
            debug!("Boss {} invincibility still cooling down", core.id);
            return false;
        }
        core.invincibility.start(self.tuning.invincibility_duration);
        self.invincibility_timer = self.tuning.invincibility_cooldown;
        info!("Boss {} became invincible", core.id);
        true
    }
}

impl BehaviorPolicy for BossPolicy {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Boss
    }

    fn decide(&mut self, core: &mut EntityCore, ctx: &mut TickContext<'_>) {
        let dt = ctx.dt;
        self.attack_timer = (self.attack_timer - dt).max(0.0);
        self.slam_timer = (self.slam_timer - dt).max(0.0);
        self.teleport_timer = (self.teleport_timer - dt).max(0.0);
        self.invincibility_timer = (self.invincibility_timer - dt).max(0.0);

        let Some(target) = ctx.target else {
            core.set_state(EntityState::Idle);
            core.body.velocity.x = 0.0;
            return;
        };

        let offset = target.offset_from(&core.body);
        let distance = offset.length();
        if distance > self.tuning.teleport_distance {
            self.far_time += dt;
        } else {
            self.far_time = 0.0;
        }
        core.body.face_towards(offset.x);

        if distance > self.tuning.teleport_distance
            && self.far_time > self.tuning.teleport_patience
            && self.teleport_timer <= 0.0
        {
            self.teleport_next_to(core, &target, ctx);
        } else if distance <= self.tuning.attack_range {
            core.body.velocity.x = 0.0;
            if self.attack_timer <= 0.0 && core.state() != EntityState::Attack {
                core.set_state(EntityState::Attack);
                self.attack_timer = self.tuning.attack_cooldown;
                self.swing_landed = false;
                ctx.outbox.event(CombatEvent::AttackStarted { entity_id: core.id });
            } else if core.state() != EntityState::Attack {
                core.set_state(EntityState::Idle);
                self.swing_landed = false;
            }
        } else {
            let state = if self.raging { EntityState::Run } else { EntityState::Walk };
            core.set_state(state);
            core.body.velocity.x = direction_to(offset.x) * self.chase_speed(core);
        }

        if self.raging && self.slam_timer <= 0.0 && distance <= self.tuning.slam_radius {
            self.ground_slam(core, ctx);
        }

        if core.health.fraction() < self.tuning.invincibility_health
            && !core.invincibility.is_running()
            && ctx.rng.chance(self.tuning.invincibility_chance)
        {
            self.grant_invincibility(core);
        }
    }

    fn on_animation(&mut self, core: &mut EntityCore, tick: StateTick, ctx: &mut TickContext<'_>) {
        if core.state() != EntityState::Attack {
            return;
        }
        if tick.looped {
            self.swing_landed = false;
        }
        let Some(target) = ctx.target else {
            return;
        };
        let frames = core.animations.clip(EntityState::Attack).frames;
        let in_reach = target.offset_from(&core.body).length() <= self.tuning.attack_range;
        if !self.swing_landed && core.machine.frame() == frames / 2 && in_reach {
            let damage = self.swing_damage(core);
            ctx.outbox.hit(Hit::new(damage).with_source(core.id));
            ctx.outbox.cue(SoundCue::EnemyAttack);
            self.swing_landed = true;
        }
    }

    fn on_damaged(&mut self, core: &mut EntityCore, outcome: DamageOutcome) {
        if self.raging || !outcome.landed() || outcome.killed() {
            return;
        }
        if core.health.fraction() <= self.tuning.rage_threshold {
            self.raging = true;
            core.invincibility.start(self.tuning.rage_invincibility);
            info!("Boss {} entered rage at {:.0} hp", core.id, core.health.current());
            core.notices.push(CombatEvent::RageActivated { entity_id: core.id });
        }
    }

    fn is_raging(&self) -> bool {
        self.raging
    }
}
