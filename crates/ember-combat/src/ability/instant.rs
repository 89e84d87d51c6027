//! Instant abilities: dash, hover and projectile launchers.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::AbilityOwner;
use crate::projectile::{Projectile, ProjectilePool, ProjectileSpec};
use crate::state::{EntityState, Recovery};
use crate::timer::Countdown;

/// Effect applied by an instant ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstantEffect {
    /// Horizontal speed burst.
    Dash(DashEffect),
    /// Freezes the owner in place.
    Hover(HoverEffect),
    /// Fires a projectile.
    Projectile(ProjectileLauncher),
}

impl InstantEffect {
    /// Applies the immediate effect. Returns whether anything happened.
    pub fn activate(&mut self, owner: &mut AbilityOwner<'_>) -> bool {
        match self {
            Self::Dash(dash) => dash.activate(owner),
            Self::Hover(hover) => hover.activate(owner),
            Self::Projectile(launcher) => launcher.fire(owner),
        }
    }

    /// Advances the effect. Returns whether it is still running.
    pub fn update(&mut self, dt: f32, owner: &mut AbilityOwner<'_>) -> bool {
        match self {
            Self::Dash(dash) => dash.update(dt, owner),
            Self::Hover(hover) => hover.update(dt, owner),
            Self::Projectile(launcher) => launcher.update(dt),
        }
    }

    /// Stops the effect.
    pub fn cancel(&mut self) {
        match self {
            Self::Dash(dash) => dash.timer.cancel(),
            Self::Hover(hover) => hover.cancel(),
            Self::Projectile(launcher) => launcher.pool.clear(),
        }
    }

    /// Whether the effect currently drives the owner's movement.
    #[must_use]
    pub fn overrides_movement(&self) -> bool {
        match self {
            Self::Dash(dash) => dash.is_running(),
            Self::Hover(hover) => hover.anchor.is_some(),
            Self::Projectile(_) => false,
        }
    }
}

impl From<DashEffect> for InstantEffect {
    fn from(dash: DashEffect) -> Self {
        Self::Dash(dash)
    }
}

impl From<HoverEffect> for InstantEffect {
    fn from(hover: HoverEffect) -> Self {
        Self::Hover(hover)
    }
}

impl From<ProjectileLauncher> for InstantEffect {
    fn from(launcher: ProjectileLauncher) -> Self {
        Self::Projectile(launcher)
    }
}

// ============================================================================
// Dash
// ============================================================================

/// Multiplies the owner's horizontal speed for a short time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashEffect {
    /// Dash length in seconds
    pub duration: f32,
    /// Horizontal speed multiplier
    pub speed_multiplier: f32,
    timer: Countdown,
}

impl DashEffect {
    /// Creates a dash.
    #[must_use]
    pub fn new(duration: f32, speed_multiplier: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            speed_multiplier,
            timer: Countdown::idle(),
        }
    }

    /// Whether the dash is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Seconds left.
    #[must_use]
    pub fn remaining(&self) -> f32 {
        self.timer.remaining()
    }

    fn activate(&mut self, owner: &mut AbilityOwner<'_>) -> bool {
        self.timer.start(self.duration);
        let vx = owner.body.velocity.x;
        owner.body.velocity.x = if vx == 0.0 {
            owner.body.facing_sign() * owner.move_speed * self.speed_multiplier
        } else {
            vx * self.speed_multiplier
        };
        owner.machine.transition(EntityState::Dash);
        true
    }

    fn update(&mut self, dt: f32, owner: &mut AbilityOwner<'_>) -> bool {
        if !self.timer.is_running() {
            return false;
        }
        if self.timer.tick(dt) {
            owner.body.velocity.x = 0.0;
            let recovery = Recovery {
                on_ground: owner.body.on_ground,
                moving: false,
            };
            owner.machine.transition(recovery.neutral_state());
            return false;
        }
        true
    }
}

// ============================================================================
// Hover
// ============================================================================

/// Holds the owner still in mid-air.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverEffect {
    /// Hover length in seconds
    pub duration: f32,
    timer: Countdown,
    anchor: Option<Vec2>,
}

impl HoverEffect {
    /// Creates a hover.
    #[must_use]
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            timer: Countdown::idle(),
            anchor: None,
        }
    }

    /// Pinned top-left corner while hovering.
    #[must_use]
    pub fn anchor(&self) -> Option<Vec2> {
        self.anchor
    }

    fn activate(&mut self, owner: &mut AbilityOwner<'_>) -> bool {
        self.anchor = Some(owner.body.rect.origin());
        self.timer.start(self.duration);
        owner.body.velocity = Vec2::ZERO;
        true
    }

    fn update(&mut self, dt: f32, owner: &mut AbilityOwner<'_>) -> bool {
        let Some(anchor) = self.anchor else {
            return false;
        };
        if self.timer.tick(dt) {
            self.anchor = None;
            return false;
        }
        let offset = anchor - owner.body.rect.origin();
        owner.body.rect = owner.body.rect.translated(offset);
        owner.body.velocity = Vec2::ZERO;
        true
    }

    fn cancel(&mut self) {
        self.timer.cancel();
        self.anchor = None;
    }
}

// ============================================================================
// Projectile launcher
// ============================================================================

/// Fires one projectile per use along the owner's aim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileLauncher {
    /// Projectile parameters
    pub spec: ProjectileSpec,
    pool: ProjectilePool,
}

impl ProjectileLauncher {
    /// Creates a launcher.
    #[must_use]
    pub fn new(spec: ProjectileSpec) -> Self {
        Self {
            spec,
            pool: ProjectilePool::new(),
        }
    }

    /// Projectiles in flight.
    #[must_use]
    pub fn pool(&self) -> &ProjectilePool {
        &self.pool
    }

    /// Mutable projectiles in flight.
    pub fn pool_mut(&mut self) -> &mut ProjectilePool {
        &mut self.pool
    }

    fn fire(&mut self, owner: &mut AbilityOwner<'_>) -> bool {
        let direction = owner.aim_direction();
        let origin = owner.projectile_origin(direction);
        self.pool
            .push(Projectile::spawn(owner.id, origin, direction, &self.spec));
        true
    }

    fn update(&mut self, dt: f32) -> bool {
        self.pool.update(dt);
        !self.pool.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::tests::OwnerParts;
    use crate::ability::{Ability, AbilityKind};

    #[test]
    fn test_dash_multiplies_velocity() {
        let mut parts = OwnerParts::new();
        parts.body.velocity.x = 100.0;
        let mut dash = InstantEffect::from(DashEffect::new(0.8, 2.5));
        dash.activate(&mut parts.owner());
        assert!((parts.body.velocity.x - 250.0).abs() < 0.001);
        assert_eq!(parts.machine.state(), EntityState::Dash);
    }

    #[test]
    fn test_dash_from_standstill_uses_facing() {
        let mut parts = OwnerParts::new();
        parts.body.facing_right = false;
        let mut dash = InstantEffect::from(DashEffect::new(0.8, 2.5));
        dash.activate(&mut parts.owner());
        assert!((parts.body.velocity.x + 750.0).abs() < 0.001);
    }

    #[test]
    fn test_dash_expiry_restores_state() {
        let mut parts = OwnerParts::new();
        let mut ability = Ability::new(
            "dash",
            1.0,
            AbilityKind::Instant(DashEffect::new(0.8, 2.5).into()),
        );
        ability.try_use(0.0, &mut parts.owner());
        for _ in 0..7 {
            ability.update(0.1, &mut parts.owner());
            assert!(ability.is_active());
        }
        ability.update(0.1, &mut parts.owner());
        assert!(!ability.is_active());
        assert!(parts.body.velocity.x.abs() < 0.001);
        assert_eq!(parts.machine.state(), EntityState::Idle);

        parts.body.on_ground = false;
        ability.try_use(2.0, &mut parts.owner());
        ability.update(1.0, &mut parts.owner());
        assert_eq!(parts.machine.state(), EntityState::Jump);
    }

    #[test]
    fn test_hover_pins_owner() {
        let mut parts = OwnerParts::new();
        parts.body.velocity = Vec2::new(50.0, 300.0);
        let mut hover = InstantEffect::from(HoverEffect::new(1.0));
        hover.activate(&mut parts.owner());
        assert_eq!(parts.body.velocity, Vec2::ZERO);

        parts.body.rect = parts.body.rect.translated(Vec2::new(0.0, 40.0));
        assert!(hover.update(0.1, &mut parts.owner()));
        assert!(parts.body.rect.min_y.abs() < 0.001);
        assert!(hover.overrides_movement());

        assert!(!hover.update(1.0, &mut parts.owner()));
        assert!(!hover.overrides_movement());
    }

    #[test]
    fn test_launcher_spawns_along_aim() {
        let mut parts = OwnerParts::new();
        parts.aim = Some(Vec2::new(0.0, -2.0));
        let mut launcher = ProjectileLauncher::new(ProjectileSpec::new(3600.0, 25.0, 1.2, false));
        assert!(launcher.fire(&mut parts.owner()));
        let p = &launcher.pool().as_slice()[0];
        assert!((p.velocity.y + 3600.0).abs() < 0.001);
        assert!(p.velocity.x.abs() < 0.001);
        assert_eq!(p.owner, parts.id);
    }
}
