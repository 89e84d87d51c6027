//! Actors: the shared entity core and the entity wrapper that drives it.
//!
//! An [`Entity`] owns an [`EntityCore`] (body, health, state machine,
//! abilities, status) and a boxed [`BehaviorPolicy`]. Each tick the entity
//! runs the policy, advances abilities and physics, then the animation clock.

use ahash::AHashMap;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ember_common::{EntityId, Rect};

use crate::ability::{Ability, AbilityKind, AbilityOwner, AuraAbility, InstantEffect};
use crate::behavior::{BehaviorKind, BehaviorPolicy, TickContext};
use crate::damage::{apply_hit, DamageOutcome, Damageable, Health, Hit, HitTarget};
use crate::events::CombatEvent;
use crate::mana::Mana;
use crate::physics::{Body, PhysicsConfig};
use crate::state::{AnimationSet, EntityState, Recovery, StateMachine};
use crate::status::StatusEffects;
use crate::timer::Countdown;
use crate::view::EntityView;

/// Base combat stats of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    /// Walking speed in px/s
    pub move_speed: f32,
    /// Melee or fallback damage
    pub damage: f32,
    /// Stun applied by a survivable hit, in seconds
    pub hurt_stun: f32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            move_speed: 80.0,
            damage: 10.0,
            hurt_stun: 0.25,
        }
    }
}

/// Everything about an actor except its decision policy.
#[derive(Debug)]
pub struct EntityCore {
    /// Stable identifier
    pub id: EntityId,
    /// Archetype id the entity was spawned from
    pub archetype: String,
    /// Kinematics and hitbox
    pub body: Body,
    /// Health pool
    pub health: Health,
    /// Behavioral state and animation clock
    pub machine: StateMachine,
    /// Clip data for the animation clock
    pub animations: AnimationSet,
    /// Attached abilities by id
    pub abilities: AHashMap<String, Ability>,
    /// Slows and other timed effects
    pub status: StatusEffects,
    /// Remaining invincibility
    pub invincibility: Countdown,
    /// Base stats
    pub stats: Stats,
    /// Mana pool; absent for actors that cast for free
    pub mana: Option<Mana>,
    /// Physics override; world defaults when absent
    pub physics: Option<PhysicsConfig>,
    /// Whether the entity renders without visual data
    pub placeholder: bool,
    /// Events raised outside a tick (damage), drained by the world
    pub notices: Vec<CombatEvent>,
}

impl EntityCore {
    /// Creates a core whose hitbox has its bottom-center at `foot`.
    #[must_use]
    pub fn new(
        archetype: impl Into<String>,
        foot: Vec2,
        size: Vec2,
        max_health: f32,
        stats: Stats,
        machine: StateMachine,
        animations: AnimationSet,
    ) -> Self {
        let placeholder = animations.frame_counts.is_empty();
        Self {
            id: EntityId::new(),
            archetype: archetype.into(),
            body: Body::new(Vec2::new(foot.x - size.x * 0.5, foot.y - size.y), size.x, size.y),
            health: Health::new(max_health),
            machine,
            animations,
            abilities: AHashMap::new(),
            status: StatusEffects::new(),
            invincibility: Countdown::idle(),
            stats,
            mana: None,
            physics: None,
            placeholder,
            notices: Vec::new(),
        }
    }

    /// Attaches abilities.
    #[must_use]
    pub fn with_abilities(mut self, abilities: AHashMap<String, Ability>) -> Self {
        self.abilities = abilities;
        self
    }

    /// Gives the core a mana pool.
    #[must_use]
    pub fn with_mana(mut self, mana: Mana) -> Self {
        self.mana = Some(mana);
        self
    }

    /// Overrides the world physics for this core.
    #[must_use]
    pub fn with_physics(mut self, physics: PhysicsConfig) -> Self {
        self.physics = Some(physics);
        self
    }

    /// Center of the hitbox.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        self.body.center()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EntityState {
        self.machine.state()
    }

    /// Requests a state change.
    pub fn set_state(&mut self, state: EntityState) -> EntityState {
        self.machine.transition(state)
    }

    /// Effective walking speed after slows.
    #[must_use]
    pub fn move_speed(&self) -> f32 {
        self.stats.move_speed * self.status.speed_multiplier()
    }

    /// Whether an ability with this id is attached.
    #[must_use]
    pub fn has_ability(&self, ability: &str) -> bool {
        self.abilities.contains_key(ability)
    }

    /// Whether the ability is a charged one.
    #[must_use]
    pub fn is_charged(&self, ability: &str) -> bool {
        self.abilities.get(ability).is_some_and(Ability::is_charged)
    }

    /// Live projectiles of an ability.
    #[must_use]
    pub fn projectile_count(&self, ability: &str) -> usize {
        self.abilities
            .get(ability)
            .and_then(Ability::projectiles)
            .map_or(0, |pool| pool.len())
    }

    /// Uses an instant, area or aura ability.
    pub fn use_ability(&mut self, ability: &str, now: f64, aim: Option<Vec2>) -> bool {
        self.with_ability(ability, aim, |ability, owner| ability.try_use(now, owner))
            .unwrap_or(false)
    }

    /// Starts charging a charged ability.
    pub fn begin_ability(&mut self, ability: &str, now: f64, aim: Option<Vec2>) -> bool {
        self.with_ability(ability, aim, |ability, owner| ability.begin(now, owner))
            .unwrap_or(false)
    }

    /// Releases a charged ability held for `held` seconds.
    pub fn release_ability(&mut self, ability: &str, now: f64, aim: Option<Vec2>, held: f32) -> bool {
        self.with_ability(ability, aim, |ability, owner| ability.release(now, owner, held))
            .unwrap_or(false)
    }

    /// Time the charge of an ability began, while it is charging.
    #[must_use]
    pub fn charge_start(&self, ability: &str) -> Option<f64> {
        match self.abilities.get(ability).map(Ability::kind) {
            Some(AbilityKind::Charged(charged)) if charged.is_charging() => Some(charged.charge_start()),
            _ => None,
        }
    }

    /// Advances every ability.
    pub fn update_abilities(&mut self, dt: f32) {
        let Self {
            id,
            body,
            machine,
            abilities,
            stats,
            mana,
            ..
        } = self;
        for ability in abilities.values_mut() {
            let mut owner = AbilityOwner {
                id: *id,
                body: &mut *body,
                machine: &mut *machine,
                aim: None,
                move_speed: stats.move_speed,
                mana: mana.as_mut(),
            };
            ability.update(dt, &mut owner);
        }
    }

    /// Freezes every ability for one skipped tick.
    pub fn pause_abilities(&mut self, dt: f32) {
        for ability in self.abilities.values_mut() {
            ability.pause(dt);
        }
    }

    /// Cancels charges and running effects of every ability.
    pub fn cancel_abilities(&mut self) {
        for ability in self.abilities.values_mut() {
            ability.cancel();
        }
    }

    /// Whether an ability currently holds the body in place.
    #[must_use]
    pub fn pins_owner(&self) -> bool {
        self.abilities.values().any(Ability::pins_owner)
    }

    /// Whether an ability currently drives horizontal movement.
    #[must_use]
    pub fn overrides_movement(&self) -> bool {
        self.abilities.values().any(Ability::overrides_movement)
    }

    /// Whether a dash is running.
    #[must_use]
    pub fn is_dashing(&self) -> bool {
        self.abilities.values().any(|ability| {
            matches!(ability.kind(), AbilityKind::Instant(InstantEffect::Dash(dash)) if dash.is_running())
        })
    }

    /// Enabled auras, sorted by ability id.
    #[must_use]
    pub fn auras(&self) -> Vec<&AuraAbility> {
        let mut ids: Vec<&String> = self.abilities.keys().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| self.abilities.get(id).and_then(Ability::aura))
            .filter(|aura| aura.is_enabled())
            .collect()
    }

    fn with_ability<R>(
        &mut self,
        ability: &str,
        aim: Option<Vec2>,
        f: impl FnOnce(&mut Ability, &mut AbilityOwner<'_>) -> R,
    ) -> Option<R> {
        let Self {
            id,
            body,
            machine,
            abilities,
            stats,
            mana,
            ..
        } = self;
        let ability = abilities.get_mut(ability)?;
        let mut owner = AbilityOwner {
            id: *id,
            body,
            machine,
            aim,
            move_speed: stats.move_speed,
            mana: mana.as_mut(),
        };
        Some(f(ability, &mut owner))
    }
}

impl Damageable for EntityCore {
    fn health_mut(&mut self) -> &mut Health {
        &mut self.health
    }

    fn state_machine_mut(&mut self) -> &mut StateMachine {
        &mut self.machine
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn status_mut(&mut self) -> &mut StatusEffects {
        &mut self.status
    }

    fn invincibility(&self) -> &Countdown {
        &self.invincibility
    }

    fn hurt_stun(&self) -> f32 {
        self.stats.hurt_stun
    }
}

// ============================================================================
// Entity
// ============================================================================

/// An actor: core data plus its decision policy.
#[derive(Debug)]
pub struct Entity {
    core: EntityCore,
    behavior: Box<dyn BehaviorPolicy>,
}

impl Entity {
    /// Wraps a core with a policy and lets the policy prepare the core.
    #[must_use]
    pub fn new(mut core: EntityCore, mut behavior: Box<dyn BehaviorPolicy>) -> Self {
        behavior.attach(&mut core);
        Self { core, behavior }
    }

    /// Entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.core.id
    }

    /// Archetype family.
    #[must_use]
    pub fn kind(&self) -> BehaviorKind {
        self.behavior.kind()
    }

    /// Shared core.
    #[must_use]
    pub fn core(&self) -> &EntityCore {
        &self.core
    }

    /// Mutable shared core.
    pub fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EntityState {
        self.core.machine.state()
    }

    /// Hitbox.
    #[must_use]
    pub fn rect(&self) -> Rect {
        self.core.body.rect
    }

    /// Whether the entity reached `Dead`.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.core.machine.is_dead()
    }

    /// Whether the entity is `Dying` or `Dead`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.core.machine.is_terminal()
    }

    /// Whether damage is currently rejected.
    #[must_use]
    pub fn is_invincible(&self) -> bool {
        self.core.invincibility.is_running()
    }

    /// Whether the rage phase is active.
    #[must_use]
    pub fn is_raging(&self) -> bool {
        self.behavior.is_raging()
    }

    /// Takes the events raised since the last call.
    pub fn drain_notices(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.core.notices)
    }

    /// Runs one simulation step.
    pub fn update(&mut self, ctx: &mut TickContext<'_>) {
        let core = &mut self.core;
        if core.machine.is_dead() {
            return;
        }
        let before = core.machine.state();
        let dt = ctx.dt;

        core.status.tick(dt);
        core.invincibility.tick(dt);
        if let Some(mana) = core.mana.as_mut() {
            mana.regenerate(dt);
        }

        if core.machine.is_terminal() {
            self.behavior.dying(core, ctx);
        } else if core.machine.is_stunned() && self.behavior.obeys_stun() {
            core.body.velocity.x = 0.0;
        } else {
            self.behavior.decide(core, ctx);
        }

        core.update_abilities(dt);

        if !core.pins_owner() {
            let physics = core.physics.unwrap_or(*ctx.physics);
            core.body.step(dt, &physics, ctx.solids);
            if core.body.recover_if_fallen(&physics, ctx.solids) {
                debug!("{} recovered after falling out of the world", core.id);
            }
        }

        let recovery = Recovery {
            on_ground: core.body.on_ground,
            moving: core.body.velocity.x.abs() > 0.01,
        };
        let tick = core.machine.tick(dt, &core.animations, recovery);
        self.behavior.on_animation(core, tick, ctx);

        let after = core.machine.state();
        if after != before {
            ctx.outbox.event(CombatEvent::StateChanged {
                entity_id: core.id,
                from: before,
                to: after,
            });
        }
    }

    /// Snapshot for the presentation layer.
    #[must_use]
    pub fn view(&self) -> EntityView {
        EntityView {
            id: self.core.id,
            archetype: self.core.archetype.clone(),
            rect: self.core.body.rect,
            facing_right: self.core.body.facing_right,
            state: self.core.machine.state(),
            frame: self.core.machine.frame(),
            health: self.core.health.fraction(),
            placeholder: self.core.placeholder,
            invincible: self.is_invincible(),
            rage: self.is_raging(),
        }
    }
}

impl HitTarget for Entity {
    fn target_id(&self) -> EntityId {
        self.core.id
    }

    fn hitbox(&self) -> Rect {
        self.core.body.rect
    }

    fn is_targetable(&self) -> bool {
        !self.core.machine.is_terminal()
    }

    fn receive_hit(&mut self, hit: &Hit) -> DamageOutcome {
        let outcome = apply_hit(&mut self.core, hit);
        if outcome.killed() {
            debug!("{} ({}) is dying", self.core.id, self.core.archetype);
            self.core.cancel_abilities();
            self.core.notices.push(CombatEvent::EntityDying {
                entity_id: self.core.id,
            });
        }
        if outcome.landed() {
            self.core.notices.push(CombatEvent::HitLanded {
                target: self.core.id,
                source: hit.source,
                amount: outcome.dealt(),
                outcome,
            });
        }
        self.behavior.on_damaged(&mut self.core, outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::AbilityConfig;
    use crate::behavior::tests::{core_at, Harness};
    use crate::behavior::{PatrolPolicy, PatrolTuning};
    use crate::state::EntityState;

    fn patroller(x: f32) -> Entity {
        let core = core_at(BehaviorKind::Patrol, x);
        Entity::new(core, Box::new(PatrolPolicy::new(PatrolTuning::default(), x)))
    }

    #[test]
    fn test_core_spawns_on_its_feet() {
        let core = core_at(BehaviorKind::Patrol, 100.0);
        assert!((core.body.rect.max_y).abs() < 0.001);
        assert!((core.center().x - 100.0).abs() < 0.001);
        assert!(core.placeholder);
    }

    #[test]
    fn test_hit_raises_notices() {
        let mut entity = patroller(0.0);
        let outcome = entity.receive_hit(&Hit::new(30.0));
        assert!(matches!(outcome, DamageOutcome::Hurt { .. }));
        assert_eq!(entity.state(), EntityState::Hurt);
        let notices = entity.drain_notices();
        assert!(notices.iter().any(|e| matches!(e, CombatEvent::HitLanded { .. })));
        assert!(entity.drain_notices().is_empty());
    }

    #[test]
    fn test_lethal_hit_cancels_abilities() {
        let mut entity = patroller(0.0);
        let mut abilities = AHashMap::new();
        if let Some(ability) = AbilityConfig::reference("charge").and_then(|c| c.build().ok()) {
            abilities.insert("charge".to_string(), ability);
        }
        entity.core_mut().abilities = abilities;
        assert!(entity.core_mut().begin_ability("charge", 0.0, None));
        assert!(entity.core().charge_start("charge").is_some());

        let outcome = entity.receive_hit(&Hit::new(500.0));
        assert!(outcome.killed());
        assert_eq!(entity.state(), EntityState::Dying);
        assert!(entity.core().charge_start("charge").is_none());
        assert!(!entity.is_targetable());
        let notices = entity.drain_notices();
        assert!(notices.iter().any(|e| matches!(e, CombatEvent::EntityDying { .. })));
    }

    #[test]
    fn test_stun_suspends_decisions() {
        let mut harness = Harness::new();
        harness.player_at(60.0);
        let mut entity = patroller(0.0);
        entity.receive_hit(&Hit::new(10.0));
        let start = entity.core().center().x;
        {
            let mut ctx = harness.ctx(0.1);
            entity.update(&mut ctx);
        }
        assert!((entity.core().center().x - start).abs() < 0.001);
        assert_eq!(entity.state(), EntityState::Hurt);
        assert!(harness.outbox.hits.is_empty());
    }

    #[test]
    fn test_dying_runs_to_dead_and_stops() {
        let mut harness = Harness::new();
        let mut entity = patroller(0.0);
        entity.receive_hit(&Hit::new(1000.0));
        for _ in 0..200 {
            let mut ctx = harness.ctx(0.05);
            entity.update(&mut ctx);
        }
        assert!(entity.is_dead());
        let rect = entity.rect();
        let mut ctx = harness.ctx(0.05);
        entity.update(&mut ctx);
        assert_eq!(entity.rect(), rect);
    }

    #[test]
    fn test_invincibility_wears_off() {
        let mut harness = Harness::new();
        let mut entity = patroller(0.0);
        entity.core_mut().invincibility.start(0.2);
        assert!(matches!(entity.receive_hit(&Hit::new(10.0)), DamageOutcome::Rejected(_)));
        for _ in 0..3 {
            let mut ctx = harness.ctx(0.1);
            entity.update(&mut ctx);
        }
        assert!(!entity.is_invincible());
        assert!(entity.receive_hit(&Hit::new(10.0)).landed());
    }

    #[test]
    fn test_view_reports_health_fraction() {
        let mut entity = patroller(0.0);
        entity.receive_hit(&Hit::new(25.0));
        let view = entity.view();
        assert!((view.health - 0.75).abs() < 0.001);
        assert_eq!(view.archetype, "test");
        assert!(!view.rage);
    }
}
