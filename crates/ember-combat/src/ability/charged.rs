//! Charge-and-release abilities.
//!
//! Holding the trigger accumulates charge up to `max_charge` seconds. On release
//! the charge fraction `c / max_charge` scales the projectile:
//! - [`ChargeScaling::Power`]: speed and damage by `1 + 2c/max`
//! - [`ChargeScaling::StatusDuration`]: speed and slow duration by `1 + c/max`,
//!   damage unchanged

use serde::{Deserialize, Serialize};

use super::AbilityOwner;
use crate::projectile::{Projectile, ProjectilePool, ProjectileSpec};
use crate::status::StatusPayload;

/// How charge scales the released projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ChargeScaling {
    /// Piercing power shot; fires along the aim direction.
    Power,
    /// Slowing shot; fires along the facing direction.
    StatusDuration {
        /// Speed reduction percentage
        slow_percent: f32,
        /// Slow duration at zero charge
        base_duration: f32,
    },
}

/// Scaled values for a release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargePower {
    /// Charge multiplier
    pub multiplier: f32,
    /// Projectile speed
    pub speed: f32,
    /// Projectile damage
    pub damage: f32,
    /// Status applied on hit
    pub payload: Option<StatusPayload>,
}

/// A charged projectile ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargedAbility {
    /// Speed at zero charge
    pub base_speed: f32,
    /// Damage at zero charge
    pub base_damage: f32,
    /// Seconds of charge for full power
    pub max_charge: f32,
    /// Projectile lifetime
    pub lifetime: f32,
    /// Whether released projectiles pierce
    pub piercing: bool,
    /// Scaling rule
    pub scaling: ChargeScaling,
    charging: bool,
    charge_start: f64,
    pool: ProjectilePool,
}

impl ChargedAbility {
    /// Creates a charged ability.
    #[must_use]
    pub fn new(
        base_speed: f32,
        base_damage: f32,
        max_charge: f32,
        lifetime: f32,
        piercing: bool,
        scaling: ChargeScaling,
    ) -> Self {
        Self {
            base_speed,
            base_damage,
            max_charge: max_charge.max(0.001),
            lifetime,
            piercing,
            scaling,
            charging: false,
            charge_start: 0.0,
            pool: ProjectilePool::new(),
        }
    }

    /// Piercing power shot scaled `1 + 2c/max` on speed and damage.
    #[must_use]
    pub fn power_shot(base_speed: f32, base_damage: f32, max_charge: f32, lifetime: f32) -> Self {
        Self::new(
            base_speed,
            base_damage,
            max_charge,
            lifetime,
            true,
            ChargeScaling::Power,
        )
    }

    /// Non-piercing slowing shot scaled `1 + c/max` on speed and slow duration.
    #[must_use]
    pub fn slowing_shot(
        base_speed: f32,
        base_damage: f32,
        max_charge: f32,
        lifetime: f32,
        slow_percent: f32,
        base_duration: f32,
    ) -> Self {
        Self::new(
            base_speed,
            base_damage,
            max_charge,
            lifetime,
            false,
            ChargeScaling::StatusDuration {
                slow_percent,
                base_duration,
            },
        )
    }

    /// Whether the trigger is being held.
    #[must_use]
    pub fn is_charging(&self) -> bool {
        self.charging
    }

    /// Simulation time charging started.
    #[must_use]
    pub fn charge_start(&self) -> f64 {
        self.charge_start
    }

    /// Charge progress at `now` in `[0, 1]`.
    #[must_use]
    pub fn charge_fraction(&self, now: f64) -> f32 {
        if !self.charging {
            return 0.0;
        }
        ((now - self.charge_start) as f32 / self.max_charge).clamp(0.0, 1.0)
    }

    /// Projectile values for a release after `held` seconds.
    #[must_use]
    pub fn power_at(&self, held: f32) -> ChargePower {
        let fraction = held.clamp(0.0, self.max_charge) / self.max_charge;
        match self.scaling {
            ChargeScaling::Power => {
                let multiplier = 1.0 + 2.0 * fraction;
                ChargePower {
                    multiplier,
                    speed: self.base_speed * multiplier,
                    damage: (self.base_damage * multiplier).floor(),
                    payload: None,
                }
            },
            ChargeScaling::StatusDuration {
                slow_percent,
                base_duration,
            } => {
                let multiplier = 1.0 + fraction;
                ChargePower {
                    multiplier,
                    speed: self.base_speed * multiplier,
                    damage: self.base_damage.floor(),
                    payload: Some(StatusPayload::Slow {
                        percent: slow_percent,
                        duration: base_duration * multiplier,
                    }),
                }
            },
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

    pub(super) fn pause(&mut self, dt: f64) {
        if self.charging {
            self.charge_start += dt;
        }
    }

    pub(super) fn begin(&mut self, now: f64) {
        self.charging = true;
        self.charge_start = now;
    }

    pub(super) fn release(&mut self, owner: &mut AbilityOwner<'_>, held: f32) {
        let power = self.power_at(held);
        let direction = match self.scaling {
            ChargeScaling::Power => owner.aim_direction(),
            ChargeScaling::StatusDuration { .. } => owner.facing_direction(),
        };
        let mut spec = ProjectileSpec::new(power.speed, power.damage, self.lifetime, self.piercing);
        spec.payload = power.payload;
        let origin = owner.projectile_origin(direction);
        self.pool
            .push(Projectile::spawn(owner.id, origin, direction, &spec));
        self.charging = false;
    }

    pub(super) fn update(&mut self, dt: f32) -> bool {
        self.pool.update(dt);
        !self.pool.is_empty()
    }

    pub(super) fn cancel(&mut self) {
        self.charging = false;
        self.pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::tests::OwnerParts;
    use crate::ability::{Ability, AbilityKind};
    use glam::Vec2;

    #[test]
    fn test_power_shot_scaling() {
        let charge = ChargedAbility::power_shot(1200.0, 30.0, 3.0, 1.5);
        let full = charge.power_at(3.0);
        assert!((full.damage - 90.0).abs() < 0.001);
        assert!((full.speed - 3600.0).abs() < 0.001);
        let none = charge.power_at(0.0);
        assert!((none.damage - 30.0).abs() < 0.001);
        let over = charge.power_at(10.0);
        assert!((over.damage - 90.0).abs() < 0.001);
        let half = charge.power_at(1.5);
        assert!((half.multiplier - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_release_damage_scenario() {
        let mut parts = OwnerParts::new();
        let mut ability = Ability::new(
            "charge",
            0.2,
            AbilityKind::Charged(ChargedAbility::power_shot(1200.0, 30.0, 3.0, 1.5)),
        );
        assert!(ability.begin(0.0, &mut parts.owner()));
        assert!(ability.release(3.0, &mut parts.owner(), 3.0));
        assert!(ability.begin(4.0, &mut parts.owner()));
        assert!(ability.release(4.0, &mut parts.owner(), 0.0));

        let damages: Vec<f32> = ability
            .projectiles()
            .map(|pool| pool.as_slice().iter().map(|p| p.damage).collect())
            .unwrap_or_default();
        assert_eq!(damages.len(), 2);
        assert!((damages[0] - 90.0).abs() < 0.001);
        assert!((damages[1] - 30.0).abs() < 0.001);
        assert!(ability.projectiles().is_some_and(|pool| pool.as_slice()[0].piercing));
    }

    #[test]
    fn test_slowing_shot_scales_duration_not_damage() {
        let shot = ChargedAbility::slowing_shot(400.0, 3.0, 2.0, 1.8, 50.0, 2.0);
        let full = shot.power_at(2.0);
        assert!((full.damage - 3.0).abs() < 0.001);
        assert!((full.speed - 800.0).abs() < 0.001);
        match full.payload {
            Some(StatusPayload::Slow { percent, duration }) => {
                assert!((percent - 50.0).abs() < 0.001);
                assert!((duration - 4.0).abs() < 0.001);
            },
            None => panic!("slowing shot must carry a payload"),
        }
    }

    #[test]
    fn test_slowing_shot_ignores_aim() {
        let mut parts = OwnerParts::new();
        parts.aim = Some(Vec2::new(0.0, 1.0));
        parts.body.facing_right = false;
        let mut shot = ChargedAbility::slowing_shot(400.0, 3.0, 2.0, 1.8, 50.0, 2.0);
        shot.begin(0.0);
        shot.release(&mut parts.owner(), 0.0);
        let p = &shot.pool().as_slice()[0];
        assert!((p.velocity.x + 400.0).abs() < 0.001);
        assert!(p.velocity.y.abs() < 0.001);
        assert!(!p.piercing);
    }

    #[test]
    fn test_charge_fraction() {
        let mut charge = ChargedAbility::power_shot(1200.0, 30.0, 3.0, 1.5);
        assert!(charge.charge_fraction(5.0).abs() < 0.001);
        charge.begin(1.0);
        assert!((charge.charge_fraction(2.5) - 0.5).abs() < 0.001);
        assert!((charge.charge_fraction(9.0) - 1.0).abs() < 0.001);
    }
}
