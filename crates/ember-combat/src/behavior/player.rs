//! Input-driven player.

use serde::{Deserialize, Serialize};

use crate::entity::EntityCore;
use crate::input::Trigger;
use crate::state::EntityState;

use super::{activate, Activation, BehaviorKind, BehaviorPolicy, TickContext};

/// Tuning of the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Vertical velocity of a jump in px/s (negative is up)
    pub jump_velocity: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self { jump_velocity: -8400.0 }
    }
}

/// Policy turning an [`Intent`](crate::input::Intent) into movement and abilities.
#[derive(Debug, Clone, Default)]
pub struct PlayerPolicy {
    tuning: PlayerTuning,
}

impl PlayerPolicy {
    /// Creates a player policy.
    #[must_use]
    pub fn new(tuning: PlayerTuning) -> Self {
        Self { tuning }
    }

    fn trigger_abilities(core: &mut EntityCore, ctx: &mut TickContext<'_>) {
        let aim = ctx.intent.aim;
        let mut triggers: Vec<(String, Trigger)> = ctx
            .intent
            .triggers
            .iter()
            .map(|(id, trigger)| (id.clone(), *trigger))
            .collect();
        triggers.sort_by(|a, b| a.0.cmp(&b.0));

        for (ability, trigger) in triggers {
            match trigger {
                Trigger::Pressed if core.is_charged(&ability) => {
                    activate(core, &ability, Activation::Begin, aim, ctx);
                },
                Trigger::Pressed => {
                    activate(core, &ability, Activation::Use, aim, ctx);
                },
                Trigger::Released => {
                    if let Some(start) = core.charge_start(&ability) {
                        let held = (ctx.now - start).max(0.0) as f32;
                        activate(core, &ability, Activation::Release(held), aim, ctx);
                    }
                },
                Trigger::Held => {},
            }
        }
    }
}

impl BehaviorPolicy for PlayerPolicy {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Player
    }

    fn decide(&mut self, core: &mut EntityCore, ctx: &mut TickContext<'_>) {
        let axis = ctx.intent.move_axis();
        let moving = axis != 0.0;

        if !core.overrides_movement() {
            core.body.velocity.x = axis * core.move_speed();
            core.body.face_towards(axis);
        }

        if ctx.intent.jump && core.body.on_ground && !core.pins_owner() {
            core.body.velocity.y = self.tuning.jump_velocity;
            core.body.on_ground = false;
        }

        Self::trigger_abilities(core, ctx);

        if core.machine.is_stunned() {
            return;
        }
        let state = if core.is_dashing() {
            EntityState::Dash
        } else if !core.body.on_ground && !core.pins_owner() {
            EntityState::Jump
        } else if moving {
            EntityState::Walk
        } else {
            EntityState::Idle
        };
        core.set_state(state);
    }

    fn obeys_stun(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::config::{build_abilities, AbilityEntry};
    use crate::behavior::tests::{core_at, Harness};
    use crate::damage::{Hit, HitTarget};
    use crate::entity::{Entity, Stats};
    use crate::input::Intent;
    use crate::mana::Mana;

    fn player(abilities: &[&str]) -> Entity {
        let mut core = core_at(BehaviorKind::Player, 0.0);
        core.stats = Stats {
            move_speed: 3600.0,
            damage: 0.0,
            hurt_stun: 0.25,
        };
        let entries: Vec<AbilityEntry> = abilities.iter().map(|id| AbilityEntry::Named((*id).to_string())).collect();
        core.abilities = build_abilities("player", &entries);
        let core = core.with_mana(Mana::new(100.0, 12.0));
        Entity::new(core, Box::new(PlayerPolicy::default()))
    }

    fn tick(entity: &mut Entity, harness: &mut Harness, intent: Intent, dt: f32) {
        harness.intent = intent;
        let mut ctx = harness.ctx(dt);
        entity.update(&mut ctx);
        harness.now += f64::from(dt);
    }

    #[test]
    fn test_walks_with_intent() {
        let mut harness = Harness::new();
        let mut entity = player(&[]);
        tick(&mut entity, &mut harness, Intent::idle().with_move(-1.0), 0.01);
        assert!((entity.core().center().x + 36.0).abs() < 0.001);
        assert!(!entity.core().body.facing_right);
        assert_eq!(entity.state(), EntityState::Walk);

        tick(&mut entity, &mut harness, Intent::idle(), 0.01);
        assert_eq!(entity.state(), EntityState::Idle);
    }

    #[test]
    fn test_jump_only_from_ground() {
        let mut harness = Harness::new();
        let mut entity = player(&[]);
        tick(&mut entity, &mut harness, Intent::idle().with_jump(), 0.01);
        assert!(!entity.core().body.on_ground);
        assert_eq!(entity.state(), EntityState::Jump);
        let vy = entity.core().body.velocity.y;

        tick(&mut entity, &mut harness, Intent::idle().with_jump(), 0.01);
        assert!(entity.core().body.velocity.y > vy);
    }

    #[test]
    fn test_keeps_control_while_hurt() {
        let mut harness = Harness::new();
        let mut entity = player(&[]);
        entity.receive_hit(&Hit::new(10.0));
        tick(&mut entity, &mut harness, Intent::idle().with_move(1.0), 0.01);
        assert!(entity.core().center().x > 0.0);
        assert_eq!(entity.state(), EntityState::Hurt);
    }

    #[test]
    fn test_press_fires_projectile_and_spends_mana() {
        let mut harness = Harness::new();
        let mut entity = player(&["blast"]);
        tick(&mut entity, &mut harness, Intent::idle().press("blast"), 0.01);
        assert_eq!(entity.core().projectile_count("blast"), 1);
        let mana = entity.core().mana.as_ref().map_or(0.0, |m| m.current);
        assert!(mana < 100.0);
    }

    #[test]
    fn test_charge_press_then_release() {
        let mut harness = Harness::new();
        let mut entity = player(&["charge"]);
        tick(&mut entity, &mut harness, Intent::idle().press("charge"), 0.01);
        assert!(entity.core().charge_start("charge").is_some());
        assert_eq!(entity.core().projectile_count("charge"), 0);

        for _ in 0..50 {
            tick(&mut entity, &mut harness, Intent::idle().with_trigger("charge", Trigger::Held), 0.01);
        }
        tick(&mut entity, &mut harness, Intent::idle().release("charge"), 0.01);
        assert!(entity.core().charge_start("charge").is_none());
        assert_eq!(entity.core().projectile_count("charge"), 1);
    }

    #[test]
    fn test_dash_state_while_running() {
        let mut harness = Harness::new();
        let mut entity = player(&["dash"]);
        tick(&mut entity, &mut harness, Intent::idle().with_move(1.0).press("dash"), 0.01);
        assert_eq!(entity.state(), EntityState::Dash);
    }
}
