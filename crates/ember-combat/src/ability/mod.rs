//! Abilities: cooldown-gated capabilities owned by actors.
//!
//! This module provides:
//! - [`Ability`]: cooldown, mana cost and active flag shared by every kind
//! - [`AbilityKind`]: the closed set of behaviors (instant, charged, area, aura)
//! - [`AbilityOwner`]: the mutable view of the owning actor an ability acts on
//! - [`AbilityVisual`]: read-only presentation state for the renderer

pub mod area;
pub mod aura;
pub mod charged;
pub mod config;
pub mod instant;

use ember_common::{EntityId, Rect};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::damage::HitTarget;
use crate::mana::Mana;
use crate::physics::Body;
use crate::projectile::{HitRecord, ProjectilePool};
use crate::state::StateMachine;
use crate::timer::Cooldown;

pub use area::AreaAbility;
pub use aura::AuraAbility;
pub use charged::{ChargeScaling, ChargedAbility};
pub use config::{AbilityConfig, AbilityError, AbilityResult};
pub use instant::{DashEffect, HoverEffect, InstantEffect, ProjectileLauncher};

/// Gap between the owner's edge and a freshly spawned projectile.
pub const SPAWN_GAP: f32 = 8.0;

/// Mutable view of the actor using an ability.
pub struct AbilityOwner<'a> {
    /// Owner identity
    pub id: EntityId,
    /// Owner body
    pub body: &'a mut Body,
    /// Owner state machine
    pub machine: &'a mut StateMachine,
    /// Aim direction; facing is used when absent or zero
    pub aim: Option<Vec2>,
    /// Base horizontal speed of the owner
    pub move_speed: f32,
    /// Resource pool, for owners that pay for abilities
    pub mana: Option<&'a mut Mana>,
}

impl AbilityOwner<'_> {
    /// Normalized aim direction, falling back to the facing direction.
    #[must_use]
    pub fn aim_direction(&self) -> Vec2 {
        self.aim
            .and_then(Vec2::try_normalize)
            .unwrap_or(Vec2::new(self.body.facing_sign(), 0.0))
    }

    /// Facing direction as a unit vector.
    #[must_use]
    pub fn facing_direction(&self) -> Vec2 {
        Vec2::new(self.body.facing_sign(), 0.0)
    }

    /// Spawn point for a projectile travelling along `direction`.
    #[must_use]
    pub fn projectile_origin(&self, direction: Vec2) -> Vec2 {
        let offset = (self.body.rect.width() / 2.0).floor() + SPAWN_GAP;
        self.body.center() + direction * offset
    }

    fn can_afford(&self, cost: f32) -> bool {
        self.mana.as_ref().map_or(true, |m| m.can_afford(cost))
    }

    fn pay(&mut self, cost: f32) {
        if let Some(mana) = self.mana.as_mut() {
            mana.spend(cost);
        }
    }
}

/// Behavior of an ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Fires immediately on use.
    Instant(InstantEffect),
    /// Charges while held and fires on release.
    Charged(ChargedAbility),
    /// Detonates around the owner and damages everything in a radius.
    AreaEffect(AreaAbility),
    /// Continuous effect around the owner.
    Aura(AuraAbility),
}

/// One usable capability of an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    id: String,
    cooldown: Cooldown,
    mana_cost: f32,
    active: bool,
    kind: AbilityKind,
}

impl Ability {
    /// Creates a ready ability.
    #[must_use]
    pub fn new(id: impl Into<String>, cooldown: f64, kind: AbilityKind) -> Self {
        Self {
            id: id.into(),
            cooldown: Cooldown::new(cooldown),
            mana_cost: 0.0,
            active: false,
            kind,
        }
    }

    /// Sets the mana cost.
    #[must_use]
    pub fn with_mana_cost(mut self, cost: f32) -> Self {
        self.mana_cost = cost.max(0.0);
        self
    }

    /// Ability identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ability behavior.
    #[must_use]
    pub fn kind(&self) -> &AbilityKind {
        &self.kind
    }

    /// Cooldown gate.
    #[must_use]
    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    /// Mana cost per use.
    #[must_use]
    pub fn mana_cost(&self) -> f32 {
        self.mana_cost
    }

    /// Whether the ability's effect is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether this is a charge-and-release ability.
    #[must_use]
    pub fn is_charged(&self) -> bool {
        matches!(self.kind, AbilityKind::Charged(_))
    }

    /// Whether a charged ability is currently charging.
    #[must_use]
    pub fn is_charging(&self) -> bool {
        matches!(&self.kind, AbilityKind::Charged(c) if c.is_charging())
    }

    /// True iff the cooldown has elapsed and no charge is in progress.
    #[must_use]
    pub fn can_use(&self, now: f64) -> bool {
        self.cooldown.can_use(now) && !self.is_charging()
    }

    /// Uses the ability.
    ///
    /// On success records the use time, marks the ability active, pays the mana
    /// cost and applies the immediate effect. A charged ability starts charging
    /// instead (see [`Ability::begin`]). Returns false with no side effect when on
    /// cooldown or when mana is insufficient.
    pub fn try_use(&mut self, now: f64, owner: &mut AbilityOwner<'_>) -> bool {
        if self.is_charged() {
            return self.begin(now, owner);
        }
        if !self.can_use(now) || !owner.can_afford(self.mana_cost) {
            return false;
        }
        let used = match &mut self.kind {
            AbilityKind::Instant(effect) => effect.activate(owner),
            AbilityKind::AreaEffect(area) => {
                area.detonate(owner.body.center());
                true
            },
            AbilityKind::Aura(aura) => {
                aura.enable();
                true
            },
            AbilityKind::Charged(_) => false,
        };
        if used {
            self.cooldown.trigger(now);
            self.active = true;
            owner.pay(self.mana_cost);
            debug!("{} used ability {}", owner.id, self.id);
        }
        used
    }

    /// Starts charging a charged ability. Mana is paid here.
    pub fn begin(&mut self, now: f64, owner: &mut AbilityOwner<'_>) -> bool {
        if !self.can_use(now) || !owner.can_afford(self.mana_cost) {
            return false;
        }
        match &mut self.kind {
            AbilityKind::Charged(charged) => {
                charged.begin(now);
                owner.pay(self.mana_cost);
                true
            },
            _ => false,
        }
    }

    /// Releases a charging ability after `held` seconds and fires it.
    pub fn release(&mut self, now: f64, owner: &mut AbilityOwner<'_>, held: f32) -> bool {
        match &mut self.kind {
            AbilityKind::Charged(charged) if charged.is_charging() => {
                charged.release(owner, held);
                self.cooldown.trigger(now);
                self.active = true;
                debug!("{} released {} after {held:.2}s", owner.id, self.id);
                true
            },
            _ => false,
        }
    }

    /// Advances timers and projectiles; clears `active` once the effect ends.
    pub fn update(&mut self, dt: f32, owner: &mut AbilityOwner<'_>) {
        let running = match &mut self.kind {
            AbilityKind::Instant(effect) => effect.update(dt, owner),
            AbilityKind::Charged(charged) => charged.update(dt),
            AbilityKind::AreaEffect(area) => area.update(dt),
            AbilityKind::Aura(aura) => aura.is_enabled(),
        };
        self.active = running;
    }

    /// Keeps the cooldown and any charge where they are while the owner is frozen.
    pub fn pause(&mut self, dt: f32) {
        let dt = f64::from(dt);
        self.cooldown.pause(dt);
        if let AbilityKind::Charged(charged) = &mut self.kind {
            charged.pause(dt);
        }
    }

    /// Stops any running effect and drops in-flight projectiles.
    pub fn cancel(&mut self) {
        match &mut self.kind {
            AbilityKind::Instant(effect) => effect.cancel(),
            AbilityKind::Charged(charged) => charged.cancel(),
            AbilityKind::AreaEffect(area) => area.cancel(),
            AbilityKind::Aura(aura) => aura.disable(),
        }
        self.active = false;
    }

    /// Projectiles in flight, if this ability launches any.
    #[must_use]
    pub fn projectiles(&self) -> Option<&ProjectilePool> {
        match &self.kind {
            AbilityKind::Instant(InstantEffect::Projectile(launcher)) => Some(launcher.pool()),
            AbilityKind::Charged(charged) => Some(charged.pool()),
            _ => None,
        }
    }

    /// Resolves projectile and area hits against `targets`.
    pub fn handle_collisions<T: HitTarget>(
        &mut self,
        source: EntityId,
        targets: &mut [T],
    ) -> Vec<HitRecord> {
        match &mut self.kind {
            AbilityKind::Instant(InstantEffect::Projectile(launcher)) => {
                launcher.pool_mut().resolve_hits(targets)
            },
            AbilityKind::Charged(charged) => charged.pool_mut().resolve_hits(targets),
            AbilityKind::AreaEffect(area) => area.handle_collisions(source, targets),
            _ => Vec::new(),
        }
    }

    /// Aura carried by this ability, when enabled.
    #[must_use]
    pub fn aura(&self) -> Option<&AuraAbility> {
        match &self.kind {
            AbilityKind::Aura(aura) if aura.is_enabled() => Some(aura),
            _ => None,
        }
    }

    /// Whether the ability currently pins or propels its owner.
    #[must_use]
    pub fn overrides_movement(&self) -> bool {
        matches!(&self.kind, AbilityKind::Instant(effect) if effect.overrides_movement())
    }

    /// Whether the ability holds its owner in place, so physics must not move it.
    #[must_use]
    pub fn pins_owner(&self) -> bool {
        matches!(&self.kind, AbilityKind::Instant(InstantEffect::Hover(hover)) if hover.anchor().is_some())
    }

    /// Presentation state.
    #[must_use]
    pub fn visual(&self, now: f64) -> AbilityVisual {
        let phase = match &self.kind {
            AbilityKind::Instant(InstantEffect::Dash(dash)) if dash.is_running() => {
                VisualPhase::Dashing {
                    remaining: dash.remaining(),
                }
            },
            AbilityKind::Instant(InstantEffect::Hover(hover)) => match hover.anchor() {
                Some(anchor) => VisualPhase::Hovering { anchor },
                None => VisualPhase::Idle,
            },
            AbilityKind::Charged(charged) if charged.is_charging() => VisualPhase::Charging {
                fraction: charged.charge_fraction(now),
            },
            AbilityKind::AreaEffect(area) => match area.detonation() {
                Some(d) => VisualPhase::Exploding {
                    center: d.center,
                    radius: area.radius,
                    progress: area.progress(),
                },
                None => VisualPhase::Idle,
            },
            AbilityKind::Aura(aura) if aura.is_enabled() => VisualPhase::Aura {
                radius: aura.radius,
            },
            _ => VisualPhase::Idle,
        };
        AbilityVisual {
            active: self.active,
            cooldown_remaining: self.cooldown.remaining(now) as f32,
            phase,
        }
    }
}

/// What an ability is visibly doing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VisualPhase {
    /// Nothing to draw.
    Idle,
    /// Dash trail.
    Dashing {
        /// Seconds left
        remaining: f32,
    },
    /// Hover cloud under the owner.
    Hovering {
        /// Pinned top-left corner of the owner
        anchor: Vec2,
    },
    /// Charge glow.
    Charging {
        /// Charge progress in `[0, 1]`
        fraction: f32,
    },
    /// Explosion burst.
    Exploding {
        /// Explosion center
        center: Vec2,
        /// Damage radius
        radius: f32,
        /// Progress in `[0, 1]`
        progress: f32,
    },
    /// Aura ring.
    Aura {
        /// Aura radius
        radius: f32,
    },
}

/// Presentation state of one ability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilityVisual {
    /// Effect running
    pub active: bool,
    /// Seconds until ready
    pub cooldown_remaining: f32,
    /// Phase to draw
    pub phase: VisualPhase,
}

/// Returns the square around `center` with half-extent `radius`.
#[must_use]
pub(crate) fn radius_box(center: Vec2, radius: f32) -> Rect {
    Rect::from_center(center, radius, radius)
}
