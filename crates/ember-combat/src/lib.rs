//! # Ember Combat
//!
//! Combat and enemy AI core for Project Ember.
//!
//! This crate provides a tick-based, single-threaded simulation:
//! - Entity state machine with hurt stun and a two-step death path
//! - Abilities (instant, charged, area effect, aura) with cooldowns and mana
//! - Projectiles with piercing hit-sets
//! - Archetype policies (patrol, caster, controller, exploder, boss, player)
//! - Damage and health resolution
//! - Archetype registry, arena encounter and the world driver
//! - Event bus, sound cues and render views for the presentation layer

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ability;
pub mod arena;
pub mod audio;
pub mod behavior;
pub mod config;
pub mod damage;
pub mod entity;
pub mod events;
pub mod input;
pub mod mana;
pub mod physics;
pub mod projectile;
pub mod registry;
pub mod rng;
pub mod state;
pub mod status;
pub mod timer;
pub mod view;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ability::area::{detonate_at, falloff_damage};
    pub use crate::ability::config::{build_abilities, AbilityEntry, AbilityParams};
    pub use crate::ability::{
        Ability, AbilityConfig, AbilityError, AbilityKind, AbilityOwner, AbilityResult, AbilityVisual,
        AreaAbility, AuraAbility, ChargeScaling, ChargedAbility, DashEffect, HoverEffect, InstantEffect,
        ProjectileLauncher, VisualPhase,
    };
    pub use crate::arena::*;
    pub use crate::audio::*;
    pub use crate::behavior::{
        AreaBlast, BehaviorKind, BehaviorPolicy, BehaviorTuning, BossPolicy, BossTuning, CasterPolicy,
        CasterTuning, ControllerPolicy, ControllerTuning, ExploderPolicy, ExploderTuning, Outbox,
        PatrolPolicy, PatrolRoute, PatrolTuning, PlayerPolicy, PlayerTuning, TargetView, TickContext,
        VERTICAL_GATE,
    };
    pub use crate::config::*;
    pub use crate::damage::*;
    pub use crate::entity::*;
    pub use crate::events::*;
    pub use crate::input::*;
    pub use crate::mana::*;
    pub use crate::physics::*;
    pub use crate::projectile::*;
    pub use crate::registry::*;
    pub use crate::rng::*;
    pub use crate::state::*;
    pub use crate::status::*;
    pub use crate::timer::*;
    pub use crate::view::*;
    pub use crate::world::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_reference_abilities_through_prelude() {
        let entries: Vec<AbilityEntry> = ["blast", "charge", "slow_aura"]
            .into_iter()
            .map(|id| AbilityEntry::Named(id.to_string()))
            .collect();
        let abilities = build_abilities("probe", &entries);
        assert_eq!(abilities.len(), 3);
        assert!(abilities.get("charge").is_some_and(Ability::is_charged));
        assert!((falloff_damage(80.0, 0.0, 200.0, 0.3) - 80.0).abs() < 0.001);
    }

    #[test]
    fn test_world_through_prelude() {
        let mut world = World::new(
            SimConfig::default(),
            ArchetypeRegistry::with_defaults(),
            SolidGeometry::from_rects([ember_common::Rect::new(-2000.0, 0.0, 4000.0, 100.0)]),
            AudioDispatcher::silent(),
        );
        world.spawn("Golem_02", Vec2::new(500.0, 0.0));
        let report = world.tick(1.0 / 120.0, &Intent::idle());
        assert_eq!(report.active_enemies, 1);
        assert_eq!(world.views().len(), 2);
    }
}
