//! Per-archetype decision policies.
//!
//! Every actor is an [`Entity`](crate::entity::Entity) holding an
//! [`EntityCore`] and one boxed [`BehaviorPolicy`]. The policy only decides:
//! it changes the core's state, walks the body, triggers abilities and queues
//! effects for the player in the [`Outbox`]. Physics, ability updates and the
//! animation clock are run by the entity itself.
//!
//! This module provides:
//! - [`BehaviorPolicy`]: the policy interface
//! - [`TickContext`]: what a policy may read and write during one tick
//! - [`PatrolRoute`]: the x-bounded walk shared by the ground archetypes
//! - [`BehaviorTuning`]: serializable archetype tuning that builds a policy

pub mod boss;
pub mod caster;
pub mod controller;
pub mod exploder;
pub mod patrol;
pub mod player;

use std::fmt;

use ember_common::{EntityId, Rect};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::SoundCue;
use crate::damage::{DamageOutcome, Hit};
use crate::entity::EntityCore;
use crate::events::CombatEvent;
use crate::input::Intent;
use crate::physics::{Body, CollisionQuery, Platform, PhysicsConfig};
use crate::rng::SimRng;
use crate::state::{EntityState, StateSet, StateTick};

pub use boss::{BossPolicy, BossTuning};
pub use caster::{CasterPolicy, CasterTuning};
pub use controller::{ControllerPolicy, ControllerTuning};
pub use exploder::{ExploderPolicy, ExploderTuning};
pub use patrol::{PatrolPolicy, PatrolTuning};
pub use player::{PlayerPolicy, PlayerTuning};

/// Vertical gate shared by the ground archetypes: the player must be within
/// this many pixels vertically to be noticed.
pub const VERTICAL_GATE: f32 = 140.0;

/// Archetype family of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    /// Input-driven player
    Player,
    /// Patrol and melee
    Patrol,
    /// Ranged kiter
    Caster,
    /// Crowd controller
    Controller,
    /// Delayed self-detonation
    Exploder,
    /// Multi-phase boss
    Boss,
}

impl BehaviorKind {
    /// States the archetype may enter.
    #[must_use]
    pub const fn allowed_states(self) -> StateSet {
        match self {
            Self::Player => StateSet::CORE.with(&[EntityState::Jump, EntityState::Dash]),
            Self::Patrol | Self::Exploder => StateSet::CORE.with(&[EntityState::Attack]),
            Self::Caster | Self::Controller => StateSet::CORE.with(&[EntityState::Cast]),
            Self::Boss => StateSet::CORE.with(&[EntityState::Run, EntityState::Attack]),
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Patrol => "patrol",
            Self::Caster => "caster",
            Self::Controller => "controller",
            Self::Exploder => "exploder",
            Self::Boss => "boss",
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only snapshot of the player as seen by enemy policies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetView {
    /// Player id
    pub id: EntityId,
    /// Player hitbox
    pub rect: Rect,
}

impl TargetView {
    /// Center of the player's hitbox.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        self.rect.center()
    }

    /// Offset from `body`'s center to the player's center.
    #[must_use]
    pub fn offset_from(&self, body: &Body) -> Vec2 {
        self.center() - body.center()
    }

    /// Whether the player is inside the detection box of a ground archetype.
    #[must_use]
    pub fn detected_by(&self, body: &Body, range: f32) -> bool {
        let offset = self.offset_from(body);
        offset.x.abs() < range && offset.y.abs() < VERTICAL_GATE
    }
}

/// Falloff blast aimed at the player, resolved by the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaBlast {
    /// Entity that detonated
    pub source: EntityId,
    /// Blast center
    pub center: Vec2,
    /// Blast radius
    pub radius: f32,
    /// Damage at the center
    pub damage: f32,
    /// Minimum falloff multiplier
    pub min_falloff: f32,
    /// Knockback: x is the speed away from the center, y the vertical velocity
    pub knockback: Option<Vec2>,
}

/// Effects queued by policies during a tick.
///
/// Enemies never touch the player directly: melee swings, auras and blasts
/// land here and the world applies them through the damage resolver.
#[derive(Debug, Default)]
pub struct Outbox {
    /// Hits for the player
    pub hits: Vec<Hit>,
    /// Area blasts
    pub blasts: Vec<AreaBlast>,
    /// Events for subscribers
    pub events: Vec<CombatEvent>,
    /// Sound cues
    pub cues: Vec<SoundCue>,
}

impl Outbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a hit for the player.
    pub fn hit(&mut self, hit: Hit) {
        self.hits.push(hit);
    }

    /// Queues a blast.
    pub fn blast(&mut self, blast: AreaBlast) {
        self.blasts.push(blast);
    }

    /// Queues an event.
    pub fn event(&mut self, event: CombatEvent) {
        self.events.push(event);
    }

    /// Queues a sound cue.
    pub fn cue(&mut self, cue: SoundCue) {
        self.cues.push(cue);
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty() && self.blasts.is_empty() && self.events.is_empty() && self.cues.is_empty()
    }

    /// Drops everything queued.
    pub fn clear(&mut self) {
        self.hits.clear();
        self.blasts.clear();
        self.events.clear();
        self.cues.clear();
    }
}

/// Everything a policy sees during one tick.
pub struct TickContext<'a> {
    /// Frame delta in seconds
    pub dt: f32,
    /// Simulation clock in seconds
    pub now: f64,
    /// Platforms near the entity
    pub solids: &'a [Platform],
    /// World physics
    pub physics: &'a PhysicsConfig,
    /// The player, when alive
    pub target: Option<TargetView>,
    /// Player intent; ignored by enemy policies
    pub intent: &'a Intent,
    /// Shared random source
    pub rng: &'a mut SimRng,
    /// Queued effects
    pub outbox: &'a mut Outbox,
}

/// Decision policy of one archetype.
pub trait BehaviorPolicy: Send + fmt::Debug {
    /// Archetype family.
    fn kind(&self) -> BehaviorKind;

    /// Prepares a freshly built core for this policy.
    fn attach(&mut self, _core: &mut EntityCore) {}

    /// Runs one decision step. Not called while dying, nor while stunned when
    /// [`BehaviorPolicy::obeys_stun`] holds.
    fn decide(&mut self, core: &mut EntityCore, ctx: &mut TickContext<'_>);

    /// Called instead of `decide` while the entity is `Dying`.
    fn dying(&mut self, _core: &mut EntityCore, _ctx: &mut TickContext<'_>) {}

    /// Called after the animation clock advanced.
    fn on_animation(&mut self, _core: &mut EntityCore, _tick: StateTick, _ctx: &mut TickContext<'_>) {}

    /// Called after the resolver handled a hit on this entity.
    fn on_damaged(&mut self, _core: &mut EntityCore, _outcome: DamageOutcome) {}

    /// Whether a hurt stun suspends `decide`.
    fn obeys_stun(&self) -> bool {
        true
    }

    /// Whether the archetype's rage phase is active.
    fn is_raging(&self) -> bool {
        false
    }
}

/// Serializable tuning for one archetype family.
///
/// Externally tagged: `Caster((cast_cooldown: 3.0))` in RON,
/// `{"Caster": {"cast_cooldown": 3.0}}` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BehaviorTuning {
    /// Input-driven player
    Player(PlayerTuning),
    /// Patrol and melee
    Patrol(PatrolTuning),
    /// Ranged kiter
    Caster(CasterTuning),
    /// Crowd controller
    Controller(ControllerTuning),
    /// Delayed self-detonation
    Exploder(ExploderTuning),
    /// Multi-phase boss
    Boss(BossTuning),
}

impl BehaviorTuning {
    /// Archetype family.
    #[must_use]
    pub fn kind(&self) -> BehaviorKind {
        match self {
            Self::Player(_) => BehaviorKind::Player,
            Self::Patrol(_) => BehaviorKind::Patrol,
            Self::Caster(_) => BehaviorKind::Caster,
            Self::Controller(_) => BehaviorKind::Controller,
            Self::Exploder(_) => BehaviorKind::Exploder,
            Self::Boss(_) => BehaviorKind::Boss,
        }
    }

    /// Builds a fresh policy for an entity spawned at `spawn_x`.
    #[must_use]
    pub fn build(&self, spawn_x: f32) -> Box<dyn BehaviorPolicy> {
        match self {
            Self::Player(t) => Box::new(PlayerPolicy::new(t.clone())),
            Self::Patrol(t) => Box::new(PatrolPolicy::new(t.clone(), spawn_x)),
            Self::Caster(t) => Box::new(CasterPolicy::new(t.clone(), spawn_x)),
            Self::Controller(t) => Box::new(ControllerPolicy::new(t.clone(), spawn_x)),
            Self::Exploder(t) => Box::new(ExploderPolicy::new(t.clone(), spawn_x)),
            Self::Boss(t) => Box::new(BossPolicy::new(t.clone())),
        }
    }
}

impl Default for BehaviorTuning {
    fn default() -> Self {
        Self::Patrol(PatrolTuning::default())
    }
}

// ============================================================================
// Patrol route
// ============================================================================

/// Horizontal patrol bounds around a spawn point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatrolRoute {
    /// Left bound for the body center
    pub min_x: f32,
    /// Right bound for the body center
    pub max_x: f32,
    /// Current walking direction, -1 or 1
    pub direction: f32,
}

impl PatrolRoute {
    /// Route spanning `range` pixels each side of `x`, starting leftwards.
    #[must_use]
    pub fn around(x: f32, range: f32) -> Self {
        let range = range.max(0.0);
        Self {
            min_x: x - range,
            max_x: x + range,
            direction: -1.0,
        }
    }

    /// Whether a center x lies within the bounds.
    #[must_use]
    pub fn contains(&self, x: f32) -> bool {
        (self.min_x..=self.max_x).contains(&x)
    }

    /// Walks the body along the route, turning around at either bound.
    ///
    /// A body left outside the bounds by a chase walks back towards them.
    pub fn patrol<C: CollisionQuery + ?Sized>(&mut self, body: &mut Body, speed: f32, dt: f32, solids: &C) {
        let x = body.center().x;
        if !self.contains(x) {
            self.direction = if x < self.min_x { 1.0 } else { -1.0 };
            body.move_horizontal(speed * self.direction * dt, solids);
            body.facing_right = self.direction > 0.0;
            return;
        }
        body.move_horizontal(speed * self.direction * dt, solids);
        let center = body.center();
        if center.x < self.min_x {
            body.rect.set_center(Vec2::new(self.min_x, center.y));
            self.direction = 1.0;
        } else if center.x > self.max_x {
            body.rect.set_center(Vec2::new(self.max_x, center.y));
            self.direction = -1.0;
        }
        body.facing_right = self.direction > 0.0;
    }

    /// Moves by `dx` only if the new center stays inside the bounds.
    pub fn step_within<C: CollisionQuery + ?Sized>(&mut self, body: &mut Body, dx: f32, solids: &C) -> bool {
        if !self.contains(body.center().x + dx) {
            return false;
        }
        body.move_horizontal(dx, solids);
        self.direction = dx.signum();
        body.face_towards(dx);
        true
    }
}

/// How [`activate`] drives an ability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Activation {
    /// Instant use
    Use,
    /// Start charging
    Begin,
    /// Release a charge held for the given seconds
    Release(f32),
}

/// Drives an ability on the core and reports what happened to the outbox.
///
/// Emits `AbilityUsed`, `ProjectileSpawned` when the ability's pool grew and
/// the ability's sound cue on use or release.
pub(crate) fn activate(
    core: &mut EntityCore,
    ability: &str,
    activation: Activation,
    aim: Option<Vec2>,
    ctx: &mut TickContext<'_>,
) -> bool {
    let before = core.projectile_count(ability);
    let done = match activation {
        Activation::Use => core.use_ability(ability, ctx.now, aim),
        Activation::Begin => core.begin_ability(ability, ctx.now, aim),
        Activation::Release(held) => core.release_ability(ability, ctx.now, aim, held),
    };
    if !done {
        return false;
    }
    debug!("{} {:?} '{ability}'", core.id, activation);
    ctx.outbox.event(CombatEvent::AbilityUsed {
        entity_id: core.id,
        ability: ability.to_string(),
    });
    if core.projectile_count(ability) > before {
        ctx.outbox.event(CombatEvent::ProjectileSpawned {
            owner: core.id,
            ability: ability.to_string(),
        });
    }
    if activation != Activation::Begin {
        if let Some(cue) = SoundCue::for_ability(ability) {
            ctx.outbox.cue(cue);
        }
    }
    true
}

/// Sign of `dx` as a walking direction; zero counts as left.
#[must_use]
pub(crate) fn direction_to(dx: f32) -> f32 {
    if dx > 0.0 {
        1.0
    } else {
        -1.0
    }
}
