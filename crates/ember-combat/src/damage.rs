//! Damage and health resolution.
//!
//! Every source of harm (melee contact, projectiles, explosions, auras) funnels
//! through this module:
//! - [`Health`] keeps `0 <= current <= max`
//! - [`Hit`] describes one application of damage plus optional side effects
//! - [`apply_hit`] enforces invincibility and terminal states, then drives the
//!   `Hurt`/`Dying` transitions on the target's state machine

use ember_common::{EntityId, Rect};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::physics::Body;
use crate::state::StateMachine;
use crate::status::{Slow, StatusEffects};
use crate::timer::Countdown;

/// Health pool clamped to `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    current: f32,
    max: f32,
}

impl Health {
    /// Creates a full health pool.
    #[must_use]
    pub fn new(max: f32) -> Self {
        let max = max.max(1.0);
        Self { current: max, max }
    }

    /// Current health.
    #[must_use]
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Maximum health.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Health as a fraction of max.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        self.current / self.max
    }

    /// Whether health is exhausted.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }

    /// Removes health. Returns the amount actually removed.
    pub fn take(&mut self, amount: f32) -> f32 {
        let before = self.current;
        self.current = (self.current - amount.max(0.0)).max(0.0);
        before - self.current
    }

    /// Restores health up to max.
    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount.max(0.0)).min(self.max);
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// One application of harm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Entity responsible, if any
    pub source: Option<EntityId>,
    /// Health to remove
    pub amount: f32,
    /// Velocity imparted to the target
    pub knockback: Option<Vec2>,
    /// Slow applied to the target
    pub slow: Option<Slow>,
    /// Overrides the target's configured stun duration
    pub stun: Option<f32>,
}

impl Hit {
    /// Creates a plain damage hit.
    #[must_use]
    pub fn new(amount: f32) -> Self {
        Self {
            source: None,
            amount: amount.max(0.0),
            knockback: None,
            slow: None,
            stun: None,
        }
    }

    /// Creates a hit that only slows.
    #[must_use]
    pub fn slow_only(slow: Slow) -> Self {
        Self::new(0.0).with_slow(slow)
    }

    /// Sets the source of the hit.
    #[must_use]
    pub fn with_source(mut self, source: EntityId) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets knockback velocity.
    #[must_use]
    pub fn with_knockback(mut self, velocity: Vec2) -> Self {
        self.knockback = Some(velocity);
        self
    }

    /// Attaches a slow.
    #[must_use]
    pub fn with_slow(mut self, slow: Slow) -> Self {
        self.slow = Some(slow);
        self
    }

    /// Overrides the stun duration.
    #[must_use]
    pub fn with_stun(mut self, seconds: f32) -> Self {
        self.stun = Some(seconds.max(0.0));
        self
    }
}

/// Why a hit was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Target's invincibility window is open
    Invincible,
    /// Target is already dying or dead
    Terminal,
}

/// Result of resolving a hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DamageOutcome {
    /// Nothing happened.
    Rejected(RejectReason),
    /// Side effects applied without removing health.
    Unharmed,
    /// Health removed; the target is stunned.
    Hurt {
        /// Health removed
        dealt: f32,
    },
    /// Health reached zero; the target entered `Dying`.
    Killed {
        /// Health removed
        dealt: f32,
    },
}

impl DamageOutcome {
    /// Whether the hit reached the target.
    #[must_use]
    pub fn landed(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// Health removed by the hit.
    #[must_use]
    pub fn dealt(&self) -> f32 {
        match self {
            Self::Hurt { dealt } | Self::Killed { dealt } => *dealt,
            Self::Rejected(_) | Self::Unharmed => 0.0,
        }
    }

    /// Whether the hit started the death sequence.
    #[must_use]
    pub fn killed(&self) -> bool {
        matches!(self, Self::Killed { .. })
    }
}

/// Anything the resolver can harm.
pub trait Damageable {
    /// Health pool.
    fn health_mut(&mut self) -> &mut Health;
    /// State machine.
    fn state_machine_mut(&mut self) -> &mut StateMachine;
    /// Kinematic body, for knockback.
    fn body_mut(&mut self) -> &mut Body;
    /// Status effects, for slows.
    fn status_mut(&mut self) -> &mut StatusEffects;
    /// Invincibility window.
    fn invincibility(&self) -> &Countdown;
    /// Stun applied when the target survives a damaging hit.
    fn hurt_stun(&self) -> f32;
}

/// A damageable actor addressable by id, as seen by projectiles and area effects.
pub trait HitTarget {
    /// Identity used for piercing hit-sets.
    fn target_id(&self) -> EntityId;
    /// Current hitbox.
    fn hitbox(&self) -> Rect;
    /// Whether the target still takes part in collisions (not `Dead`).
    fn is_targetable(&self) -> bool;
    /// Routes a hit through the resolver, including any archetype reaction.
    fn receive_hit(&mut self, hit: &Hit) -> DamageOutcome;
}

impl<T: HitTarget + ?Sized> HitTarget for &mut T {
    fn target_id(&self) -> EntityId {
        (**self).target_id()
    }

    fn hitbox(&self) -> Rect {
        (**self).hitbox()
    }

    fn is_targetable(&self) -> bool {
        (**self).is_targetable()
    }

    fn receive_hit(&mut self, hit: &Hit) -> DamageOutcome {
        (**self).receive_hit(hit)
    }
}

/// Resolves a hit against a target.
///
/// Ignored while the target is invincible, dying or dead. Otherwise removes
/// health (clamped at zero), enters `Dying` when health runs out or `Hurt`
/// otherwise, then applies knockback and slows.
pub fn apply_hit<T: Damageable + ?Sized>(target: &mut T, hit: &Hit) -> DamageOutcome {
    if target.invincibility().is_running() {
        debug!("Hit rejected: target invincible");
        return DamageOutcome::Rejected(RejectReason::Invincible);
    }
    if target.state_machine_mut().is_terminal() {
        return DamageOutcome::Rejected(RejectReason::Terminal);
    }

    let outcome = if hit.amount > 0.0 {
        let dealt = target.health_mut().take(hit.amount);
        if target.health_mut().is_depleted() {
            target.state_machine_mut().enter_dying();
            DamageOutcome::Killed { dealt }
        } else {
            let stun = hit.stun.unwrap_or_else(|| target.hurt_stun());
            if stun > 0.0 {
                target.state_machine_mut().enter_hurt(stun);
            }
            DamageOutcome::Hurt { dealt }
        }
    } else {
        DamageOutcome::Unharmed
    };

    if let Some(knockback) = hit.knockback {
        apply_knockback(target, knockback);
    }
    if let Some(slow) = hit.slow {
        target.status_mut().apply_slow(slow);
    }
    outcome
}

/// Applies `amount` damage with no side effects.
pub fn apply_damage<T: Damageable + ?Sized>(target: &mut T, amount: f32) -> DamageOutcome {
    apply_hit(target, &Hit::new(amount))
}

/// Sets the target's velocity to a knockback impulse.
pub fn apply_knockback<T: Damageable + ?Sized>(target: &mut T, velocity: Vec2) {
    let body = target.body_mut();
    body.velocity = velocity;
    if velocity.y < 0.0 {
        body.on_ground = false;
    }
}
