//! Area-effect abilities: a detonation around the owner with distance falloff.

use ember_common::EntityId;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::radius_box;
use crate::damage::{Hit, HitTarget};
use crate::projectile::HitRecord;

/// Damage after distance falloff: `damage * max(min_falloff, 1 - distance / radius)`,
/// floored to whole points.
#[must_use]
pub fn falloff_damage(damage: f32, distance: f32, radius: f32, min_falloff: f32) -> f32 {
    if radius <= 0.0 {
        return damage.floor();
    }
    (damage * min_falloff.max(1.0 - distance / radius)).floor()
}

/// Applies one falloff blast centered on `center` to every target in `radius`.
///
/// A target qualifies when its hitbox overlaps the blast square and its center
/// lies within `radius`. Returns one record per landed hit.
pub fn detonate_at<T: HitTarget>(
    source: EntityId,
    center: Vec2,
    radius: f32,
    damage: f32,
    min_falloff: f32,
    targets: &mut [T],
    mut decorate: impl FnMut(Hit, Vec2) -> Hit,
) -> Vec<HitRecord> {
    let area = radius_box(center, radius);
    let mut records = Vec::new();
    for target in targets.iter_mut() {
        if !target.is_targetable() {
            continue;
        }
        let hitbox = target.hitbox();
        if !hitbox.overlaps(&area) {
            continue;
        }
        let offset = hitbox.center() - center;
        let distance = offset.length();
        if distance > radius {
            continue;
        }
        let amount = falloff_damage(damage, distance, radius, min_falloff);
        let hit = decorate(Hit::new(amount).with_source(source), offset);
        let outcome = target.receive_hit(&hit);
        records.push(HitRecord {
            source,
            target: target.target_id(),
            outcome,
            position: center,
        });
    }
    records
}

/// A running detonation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detonation {
    /// Blast center
    pub center: Vec2,
    /// Seconds since detonation
    pub elapsed: f32,
    /// Whether damage was already dealt
    pub applied: bool,
}

/// Explosion centered on the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaAbility {
    /// Damage at the center
    pub damage: f32,
    /// Blast radius
    pub radius: f32,
    /// Visual duration in seconds
    pub duration: f32,
    /// Minimum falloff multiplier at the edge
    pub min_falloff: f32,
    detonation: Option<Detonation>,
}

impl AreaAbility {
    /// Creates an area ability.
    #[must_use]
    pub fn new(damage: f32, radius: f32, duration: f32, min_falloff: f32) -> Self {
        Self {
            damage,
            radius: radius.max(0.0),
            duration: duration.max(0.0),
            min_falloff: min_falloff.clamp(0.0, 1.0),
            detonation: None,
        }
    }

    /// Current detonation, if any.
    #[must_use]
    pub fn detonation(&self) -> Option<&Detonation> {
        self.detonation.as_ref()
    }

    /// Visual progress of the detonation in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        match &self.detonation {
            Some(d) if self.duration > 0.0 => (d.elapsed / self.duration).min(1.0),
            Some(_) => 1.0,
            None => 0.0,
        }
    }

    pub(super) fn detonate(&mut self, center: Vec2) {
        self.detonation = Some(Detonation {
            center,
            elapsed: 0.0,
            applied: false,
        });
    }

    pub(super) fn update(&mut self, dt: f32) -> bool {
        let Some(detonation) = &mut self.detonation else {
            return false;
        };
        detonation.elapsed += dt;
        // A detonation stays until its damage has been applied.
        if detonation.applied && detonation.elapsed > self.duration {
            self.detonation = None;
            return false;
        }
        true
    }

    pub(super) fn cancel(&mut self) {
        self.detonation = None;
    }

    /// Applies falloff damage to every target in range, once per detonation.
    pub fn handle_collisions<T: HitTarget>(
        &mut self,
        source: EntityId,
        targets: &mut [T],
    ) -> Vec<HitRecord> {
        let Some(detonation) = &mut self.detonation else {
            return Vec::new();
        };
        if detonation.applied {
            return Vec::new();
        }
        detonation.applied = true;
        let records = detonate_at(
            source,
            detonation.center,
            self.radius,
            self.damage,
            self.min_falloff,
            targets,
            |hit, _| hit,
        );
        debug!("Detonation by {source} hit {} targets", records.len());
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::tests::OwnerParts;
    use crate::ability::{Ability, AbilityKind};
    use crate::damage::tests::MockTarget;

    #[test]
    fn test_falloff_formula() {
        assert!((falloff_damage(80.0, 0.0, 200.0, 0.3) - 80.0).abs() < 0.001);
        assert!((falloff_damage(80.0, 100.0, 200.0, 0.3) - 40.0).abs() < 0.001);
        assert!((falloff_damage(80.0, 190.0, 200.0, 0.3) - 24.0).abs() < 0.001);
    }

    #[test]
    fn test_detonation_applies_once() {
        let mut parts = OwnerParts::new();
        let mut ability = Ability::new(
            "fire_explosion",
            5.0,
            AbilityKind::AreaEffect(AreaAbility::new(80.0, 200.0, 1.0, 0.3)),
        );
        assert!(ability.try_use(0.0, &mut parts.owner()));
        let mut targets = vec![MockTarget::at(200.0, 50.0, 0.0), MockTarget::at(200.0, 2000.0, 0.0)];

        let first = ability.handle_collisions(parts.id, &mut targets);
        assert_eq!(first.len(), 1);
        for _ in 0..5 {
            ability.update(0.1, &mut parts.owner());
            assert!(ability.handle_collisions(parts.id, &mut targets).is_empty());
        }
        // target centers 50 px apart: 80 * 0.75
        assert!((targets[0].health.current() - 140.0).abs() < 0.001);
        assert!((targets[1].health.current() - 200.0).abs() < 0.001);
    }

    #[test]
    fn test_detonation_expires() {
        let mut area = AreaAbility::new(80.0, 200.0, 1.0, 0.3);
        area.detonate(Vec2::ZERO);
        assert!(area.update(0.5));
        assert!((area.progress() - 0.5).abs() < 0.001);
        let mut targets: Vec<MockTarget> = Vec::new();
        area.handle_collisions(EntityId::new(), &mut targets);
        assert!(!area.update(0.6));
        assert!(area.detonation().is_none());
    }

    #[test]
    fn test_zero_duration_detonation_still_lands() {
        let mut parts = OwnerParts::new();
        let mut ability = Ability::new(
            "fire_explosion",
            5.0,
            AbilityKind::AreaEffect(AreaAbility::new(80.0, 200.0, 0.0, 0.3)),
        );
        assert!(ability.try_use(0.0, &mut parts.owner()));
        // the owner's own update runs before collisions are resolved
        ability.update(1.0 / 120.0, &mut parts.owner());
        let mut targets = vec![MockTarget::at(200.0, 50.0, 0.0)];
        assert_eq!(ability.handle_collisions(parts.id, &mut targets).len(), 1);
        assert!((targets[0].health.current() - 140.0).abs() < 0.001);

        ability.update(1.0 / 120.0, &mut parts.owner());
        assert!(ability.handle_collisions(parts.id, &mut targets).is_empty());
        assert!(!ability.is_active());
    }

    #[test]
    fn test_out_of_radius_corner_is_skipped() {
        // hitbox overlaps the square but its center is outside the circle
        let mut targets = vec![MockTarget::at(100.0, 160.0, 160.0)];
        let records = detonate_at(
            EntityId::new(),
            Vec2::ZERO,
            200.0,
            80.0,
            0.3,
            &mut targets,
            |hit, _| hit,
        );
        assert!(records.is_empty());
    }
}
