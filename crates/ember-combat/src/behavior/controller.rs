//! Crowd controller.
//!
//! Radiates a slowing aura, charges a slowing shot from mid range and
//! teleports away when the player closes in.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ability::AuraAbility;
use crate::damage::Hit;
use crate::entity::EntityCore;
use crate::events::CombatEvent;
use crate::state::EntityState;
use crate::status::Slow;
use crate::timer::Countdown;

use super::{activate, direction_to, Activation, BehaviorKind, BehaviorPolicy, PatrolRoute, TargetView, TickContext};

/// Tuning of the controller archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerTuning {
    /// Half-width of the patrol route around the spawn x
    pub patrol_range: f32,
    /// Horizontal detection range
    pub detection_range: f32,
    /// Farthest distance a charge starts at
    pub max_ability_range: f32,
    /// Seconds a charge is held before release
    pub charge_time: f32,
    /// Seconds between two charges
    pub ability_cooldown: f32,
    /// Beyond this distance the controller walks closer
    pub advance_distance: f32,
    /// Within this distance the controller backs off
    pub retreat_distance: f32,
    /// Intrinsic aura radius, used when no aura ability is attached
    pub aura_radius: f32,
    /// Intrinsic aura speed multiplier
    pub aura_slow: f32,
    /// Player closer than this triggers a teleport
    pub teleport_trigger: f32,
    /// Seconds between teleports
    pub teleport_cooldown: f32,
    /// Distance put between player and controller by a teleport
    pub teleport_distance: f32,
    /// Charged abilities tried in order
    pub abilities: Vec<String>,
    /// Fallback damage multiplier when no charged ability is attached
    pub fallback_multiplier: f32,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            patrol_range: 180.0,
            detection_range: 1000.0,
            max_ability_range: 800.0,
            charge_time: 2.0,
            ability_cooldown: 4.0,
            advance_distance: 200.0,
            retreat_distance: 120.0,
            aura_radius: 180.0,
            aura_slow: 0.5,
            teleport_trigger: 80.0,
            teleport_cooldown: 8.0,
            teleport_distance: 150.0,
            abilities: vec!["slow".to_string(), "charge".to_string()],
            fallback_multiplier: 1.5,
        }
    }
}

/// Crowd controller policy.
#[derive(Debug, Clone)]
pub struct ControllerPolicy {
    tuning: ControllerTuning,
    route: PatrolRoute,
    ability_timer: f32,
    teleport_timer: f32,
    charge: Countdown,
    charging_with: Option<String>,
}

impl ControllerPolicy {
    /// Creates a policy patrolling around `spawn_x`.
    #[must_use]
    pub fn new(tuning: ControllerTuning, spawn_x: f32) -> Self {
        Self {
            route: PatrolRoute::around(spawn_x, tuning.patrol_range),
            tuning,
            ability_timer: 0.0,
            teleport_timer: 0.0,
            charge: Countdown::idle(),
            charging_with: None,
        }
    }

    /// Whether a charge is being held.
    #[must_use]
    pub fn is_charging(&self) -> bool {
        self.charge.is_running()
    }

    /// Slows the player while it stands inside an aura.
    fn pulse_auras(&self, core: &EntityCore, target: &TargetView, ctx: &mut TickContext<'_>) {
        let center = core.center();
        let auras = core.auras();
        let slow = if auras.is_empty() {
            let dx = (target.center().x - center.x).abs();
            (dx <= self.tuning.aura_radius)
                .then(|| Slow::new(self.tuning.aura_slow, AuraAbility::DEFAULT_REFRESH))
        } else {
            auras.iter().find_map(|aura| aura.pulse(center, &target.rect))
        };
        if let Some(slow) = slow {
            ctx.outbox.hit(Hit::slow_only(slow).with_source(core.id));
        }
    }

    fn begin_charge(&mut self, core: &mut EntityCore, dx: f32, ctx: &mut TickContext<'_>) {
        core.body.face_towards(dx);
        core.set_state(EntityState::Cast);
        self.charge.start(self.tuning.charge_time);
        self.charging_with = self
            .tuning
            .abilities
            .iter()
            .find(|ability| activate(core, ability, Activation::Begin, None, ctx))
            .cloned();
        debug!("{} charging {:?}", core.id, self.charging_with);
    }

    fn release(&mut self, core: &mut EntityCore, target: &TargetView, ctx: &mut TickContext<'_>) {
        let dx = target.offset_from(&core.body).x;
        core.body.face_towards(dx);
        let held = self.tuning.charge_time;
        match self.charging_with.take() {
            Some(ability) => {
                activate(core, &ability, Activation::Release(held), None, ctx);
            },
            None if dx.abs() <= self.tuning.max_ability_range => {
                let damage = (core.stats.damage * self.tuning.fallback_multiplier).floor();
                ctx.outbox.hit(Hit::new(damage).with_source(core.id));
            },
            None => {},
        }
    }

    fn teleport_away(&mut self, core: &mut EntityCore, target: &TargetView, ctx: &mut TickContext<'_>) {
        let from = core.center();
        let player_x = target.center().x;
        let x = if player_x > from.x {
            (player_x - self.tuning.teleport_distance).max(self.route.min_x)
        } else {
            (player_x + self.tuning.teleport_distance).min(self.route.max_x)
        };
        let to = Vec2::new(x, from.y);
        core.body.rect.set_center(to);
        core.set_state(EntityState::Cast);
        core.machine.restart();
        info!("{} teleported from {:.0} to {:.0}", core.id, from.x, to.x);
        ctx.outbox.event(CombatEvent::Teleported {
            entity_id: core.id,
            from,
            to,
        });
    }
}

impl BehaviorPolicy for ControllerPolicy {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Controller
    }

    fn decide(&mut self, core: &mut EntityCore, ctx: &mut TickContext<'_>) {
        let dt = ctx.dt;
        let speed = core.move_speed();
        core.body.velocity.x = 0.0;
        self.ability_timer = (self.ability_timer - dt).max(0.0);
        self.teleport_timer = (self.teleport_timer - dt).max(0.0);

        if let Some(target) = ctx.target {
            self.pulse_auras(core, &target, ctx);
        }

        let detection = self.tuning.detection_range;
        let Some(target) = ctx.target.filter(|t| t.detected_by(&core.body, detection)) else {
            core.set_state(EntityState::Walk);
            self.route.patrol(&mut core.body, speed, dt, ctx.solids);
            return;
        };

        let dx = target.offset_from(&core.body).x;
        let distance = dx.abs();
        let toward = direction_to(dx);

        if self.charge.is_running() {
            core.set_state(EntityState::Cast);
            if self.charge.tick(dt) {
                self.release(core, &target, ctx);
                self.ability_timer = self.tuning.ability_cooldown;
            }
        } else if distance < self.tuning.teleport_trigger && self.teleport_timer <= 0.0 {
            self.teleport_away(core, &target, ctx);
            self.teleport_timer = self.tuning.teleport_cooldown;
        } else if self.ability_timer <= 0.0 {
            if distance <= self.tuning.max_ability_range {
                self.begin_charge(core, dx, ctx);
            } else {
                core.set_state(EntityState::Walk);
                self.route.step_within(&mut core.body, speed * toward * dt, ctx.solids);
            }
        } else if distance > self.tuning.advance_distance {
            core.set_state(EntityState::Walk);
            core.body.face_towards(dx);
            self.route.step_within(&mut core.body, speed * toward * dt, ctx.solids);
        } else if distance < self.tuning.retreat_distance {
            core.set_state(EntityState::Walk);
            self.route.step_within(&mut core.body, -speed * toward * dt, ctx.solids);
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

    fn controller(x: f32, abilities: &[&str]) -> (EntityCore, ControllerPolicy) {
        let mut core = core_at(BehaviorKind::Controller, x);
        let entries: Vec<AbilityEntry> = abilities.iter().map(|id| AbilityEntry::Named((*id).to_string())).collect();
        core.abilities = build_abilities("controller", &entries);
        core.stats.damage = 5.0;
        (core, ControllerPolicy::new(ControllerTuning::default(), x))
    }

    fn decide(core: &mut EntityCore, policy: &mut ControllerPolicy, harness: &mut Harness, ticks: usize, dt: f32) {
        for _ in 0..ticks {
            let mut ctx = harness.ctx(dt);
            policy.decide(core, &mut ctx);
            harness.now += f64::from(dt);
        }
    }

    #[test]
    fn test_intrinsic_aura_slows_player() {
        let mut harness = Harness::new();
        harness.player_at(150.0);
        let (mut core, mut policy) = controller(0.0, &[]);
        decide(&mut core, &mut policy, &mut harness, 1, 0.1);
        let slow = harness.outbox.hits.iter().find_map(|h| h.slow);
        assert!(slow.is_some_and(|s| (s.factor - 0.5).abs() < 0.001));
    }

    #[test]
    fn test_aura_ability_replaces_intrinsic_radius() {
        let raised_player = |harness: &mut Harness| {
            harness.player_at(170.0);
            if let Some(target) = harness.target.as_mut() {
                target.rect = target.rect.translated(Vec2::new(0.0, -100.0));
            }
        };

        let mut harness = Harness::new();
        raised_player(&mut harness);
        let (mut core, mut policy) = controller(0.0, &[]);
        decide(&mut core, &mut policy, &mut harness, 1, 0.1);
        assert!(harness.outbox.hits.iter().any(|h| h.slow.is_some()));

        let mut harness = Harness::new();
        raised_player(&mut harness);
        let (mut core, mut policy) = controller(0.0, &["slow_aura"]);
        decide(&mut core, &mut policy, &mut harness, 1, 0.1);
        assert!(harness.outbox.hits.iter().all(|h| h.slow.is_none()));
    }

    #[test]
    fn test_charge_releases_slowing_shot() {
        let mut harness = Harness::new();
        harness.player_at(300.0);
        let (mut core, mut policy) = controller(0.0, &["slow"]);

        decide(&mut core, &mut policy, &mut harness, 1, 0.1);
        assert!(policy.is_charging());
        assert!(core.charge_start("slow").is_some());
        assert_eq!(core.state(), EntityState::Cast);

        decide(&mut core, &mut policy, &mut harness, 20, 0.1);
        assert!(!policy.is_charging());
        assert!(core.charge_start("slow").is_none());
        assert_eq!(core.projectile_count("slow"), 1);
    }

    #[test]
    fn test_fallback_damage_without_abilities() {
        let mut harness = Harness::new();
        harness.player_at(300.0);
        let (mut core, mut policy) = controller(0.0, &[]);
        decide(&mut core, &mut policy, &mut harness, 21, 0.1);
        let damage: Vec<f32> = harness.outbox.hits.iter().map(|h| h.amount).filter(|a| *a > 0.0).collect();
        assert_eq!(damage.len(), 1);
        assert!((damage[0] - 7.0).abs() < 0.001);
    }

    #[test]
    fn test_teleports_away_from_close_player() {
        let mut harness = Harness::new();
        harness.player_at(50.0);
        let (mut core, mut policy) = controller(0.0, &[]);
        decide(&mut core, &mut policy, &mut harness, 1, 0.1);
        assert!((core.center().x + 100.0).abs() < 0.001);
        assert!(harness
            .outbox
            .events
            .iter()
            .any(|e| matches!(e, CombatEvent::Teleported { .. })));

        decide(&mut core, &mut policy, &mut harness, 1, 0.1);
        assert!(harness
            .outbox
            .events
            .iter()
            .filter(|e| matches!(e, CombatEvent::Teleported { .. }))
            .count()
            == 1);
    }
}
