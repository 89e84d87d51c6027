//! Projectiles and per-ability projectile pools.
//!
//! A projectile is a moving hitbox with a damage payload. Piercing projectiles
//! remember every target they hit and never hit it twice; non-piercing
//! projectiles are consumed by their first hit.

use ahash::AHashSet;
use ember_common::{EntityId, Rect};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::damage::{DamageOutcome, Hit, HitTarget};
use crate::status::StatusPayload;

/// Default projectile hitbox edge length.
pub const DEFAULT_PROJECTILE_SIZE: f32 = 8.0;

/// Seconds per presentation frame.
pub const PROJECTILE_FRAME_TIME: f32 = 0.06;

/// Frames in the presentation cycle.
const PROJECTILE_FRAMES: usize = 4;

/// Parameters for spawning a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpec {
    /// Speed in px/s
    pub speed: f32,
    /// Damage on hit
    pub damage: f32,
    /// Seconds before expiry
    pub lifetime: f32,
    /// Whether the projectile continues after a hit
    pub piercing: bool,
    /// Hitbox edge length
    pub size: f32,
    /// Status applied on hit
    pub payload: Option<StatusPayload>,
    /// Removed when its center leaves these bounds
    pub bounds: Option<Rect>,
}

impl ProjectileSpec {
    /// Creates a spec with the default size and no payload.
    #[must_use]
    pub fn new(speed: f32, damage: f32, lifetime: f32, piercing: bool) -> Self {
        Self {
            speed,
            damage,
            lifetime,
            piercing,
            size: DEFAULT_PROJECTILE_SIZE,
            payload: None,
            bounds: None,
        }
    }

    /// Attaches a status payload.
    #[must_use]
    pub fn with_payload(mut self, payload: StatusPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Restricts the projectile to world bounds.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Overrides the hitbox size.
    #[must_use]
    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size.max(1.0);
        self
    }
}

/// One projectile in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Spawning entity
    pub owner: EntityId,
    /// Center position
    pub position: Vec2,
    /// Velocity in px/s
    pub velocity: Vec2,
    /// Damage on hit
    pub damage: f32,
    /// Lifetime in seconds
    pub lifetime: f32,
    /// Seconds since spawn
    pub age: f32,
    /// Whether the projectile continues after a hit
    pub piercing: bool,
    /// Status applied on hit
    pub payload: Option<StatusPayload>,
    size: f32,
    bounds: Option<Rect>,
    hit_targets: AHashSet<EntityId>,
    spent: bool,
    frame: usize,
    frame_timer: f32,
}

impl Projectile {
    /// Spawns a projectile moving along `direction` (normalized; zero means right).
    #[must_use]
    pub fn spawn(owner: EntityId, origin: Vec2, direction: Vec2, spec: &ProjectileSpec) -> Self {
        let direction = direction.try_normalize().unwrap_or(Vec2::X);
        Self {
            owner,
            position: origin,
            velocity: direction * spec.speed,
            damage: spec.damage,
            lifetime: spec.lifetime,
            age: 0.0,
            piercing: spec.piercing,
            payload: spec.payload,
            size: spec.size,
            bounds: spec.bounds,
            hit_targets: AHashSet::new(),
            spent: false,
            frame: 0,
            frame_timer: 0.0,
        }
    }

    /// Hitbox centered on the position.
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::from_center(self.position, self.size / 2.0, self.size / 2.0)
    }

    /// Presentation frame index.
    #[must_use]
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Hitbox edge length.
    #[must_use]
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Whether a non-piercing projectile already landed.
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Whether the projectile already hit `target`.
    #[must_use]
    pub fn has_hit(&self, target: EntityId) -> bool {
        self.hit_targets.contains(&target)
    }

    /// Advances the projectile. Returns false once it should be removed.
    pub fn update(&mut self, dt: f32) -> bool {
        if self.spent {
            return false;
        }
        self.age += dt;
        if self.age > self.lifetime {
            return false;
        }
        self.position += self.velocity * dt;
        self.frame_timer += dt;
        if self.frame_timer >= PROJECTILE_FRAME_TIME {
            self.frame = (self.frame + 1) % PROJECTILE_FRAMES;
            self.frame_timer = 0.0;
        }
        self.bounds.map_or(true, |b| b.contains(self.position))
    }

    /// Tests the projectile against one target and applies the hit when it lands.
    ///
    /// Returns `None` when the projectile cannot hit this target (no overlap,
    /// already hit, or already spent).
    pub fn check_hit<T: HitTarget + ?Sized>(&mut self, target: &mut T) -> Option<DamageOutcome> {
        if self.spent || !target.is_targetable() {
            return None;
        }
        let id = target.target_id();
        if self.hit_targets.contains(&id) || !self.rect().overlaps(&target.hitbox()) {
            return None;
        }
        self.hit_targets.insert(id);
        if !self.piercing {
            self.spent = true;
        }

        let mut hit = Hit::new(self.damage).with_source(self.owner);
        if let Some(payload) = self.payload {
            hit = hit.with_slow(payload.to_slow());
        }
        let outcome = target.receive_hit(&hit);
        debug!("Projectile from {} hit {id}: {outcome:?}", self.owner);
        Some(outcome)
    }
}

/// A landed projectile or area hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    /// Entity responsible
    pub source: EntityId,
    /// Entity hit
    pub target: EntityId,
    /// Resolver outcome
    pub outcome: DamageOutcome,
    /// Where the hit happened
    pub position: Vec2,
}

/// Contiguous projectile storage owned by one ability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectilePool {
    projectiles: Vec<Projectile>,
}

impl ProjectilePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a projectile.
    pub fn push(&mut self, projectile: Projectile) {
        self.projectiles.push(projectile);
    }

    /// Live projectiles.
    #[must_use]
    pub fn as_slice(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Number of live projectiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    /// Removes every projectile.
    pub fn clear(&mut self) {
        self.projectiles.clear();
    }

    /// Advances all projectiles and swap-removes the dead ones.
    pub fn update(&mut self, dt: f32) {
        let mut i = 0;
        while i < self.projectiles.len() {
            if self.projectiles[i].update(dt) {
                i += 1;
            } else {
                self.projectiles.swap_remove(i);
            }
        }
    }

    /// Tests every projectile against every target.
    ///
    /// A projectile may land on several targets in the same call; a
    /// non-piercing projectile stops at its first hit and is removed.
    pub fn resolve_hits<T: HitTarget>(&mut self, targets: &mut [T]) -> Vec<HitRecord> {
        let mut records = Vec::new();
        for projectile in &mut self.projectiles {
            for target in targets.iter_mut() {
                if let Some(outcome) = projectile.check_hit(target) {
                    records.push(HitRecord {
                        source: projectile.owner,
                        target: target.target_id(),
                        outcome,
                        position: projectile.position,
                    });
                }
                if projectile.is_spent() {
                    break;
                }
            }
        }
        self.projectiles.retain(|p| !p.is_spent());
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::tests::MockTarget;
    use proptest::prelude::*;

    fn spec(piercing: bool) -> ProjectileSpec {
        ProjectileSpec::new(100.0, 10.0, 1.0, piercing)
    }

    #[test]
    fn test_spawn_normalizes_direction() {
        let p = Projectile::spawn(EntityId::new(), Vec2::ZERO, Vec2::new(3.0, 4.0), &spec(false));
        assert!((p.velocity.x - 60.0).abs() < 0.001);
        assert!((p.velocity.y - 80.0).abs() < 0.001);

        let p = Projectile::spawn(EntityId::new(), Vec2::ZERO, Vec2::ZERO, &spec(false));
        assert!((p.velocity.x - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_expires_after_lifetime() {
        let mut p = Projectile::spawn(EntityId::new(), Vec2::ZERO, Vec2::X, &spec(false));
        for _ in 0..10 {
            assert!(p.update(0.1));
        }
        assert!(!p.update(0.1));
    }

    #[test]
    fn test_leaves_bounds() {
        let bounds = Rect::from_edges(-100.0, -100.0, 4000.0, 1000.0);
        let spec = ProjectileSpec::new(1200.0, 40.0, 20.0, false).with_bounds(bounds);
        let mut p = Projectile::spawn(EntityId::new(), Vec2::new(3900.0, 0.0), Vec2::X, &spec);
        assert!(!p.update(0.1));
    }

    #[test]
    fn test_non_piercing_consumed_on_first_hit() {
        let mut pool = ProjectilePool::new();
        pool.push(Projectile::spawn(
            EntityId::new(),
            Vec2::new(10.0, 10.0),
            Vec2::X,
            &spec(false),
        ));
        let mut targets = vec![MockTarget::at(100.0, 0.0, 0.0), MockTarget::at(100.0, 0.0, 0.0)];
        let records = pool.resolve_hits(&mut targets);
        assert_eq!(records.len(), 1);
        assert!(pool.is_empty());
        assert!((targets[0].health.current() - 90.0).abs() < 0.001);
        assert!((targets[1].health.current() - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_piercing_hits_all_overlapping_once() {
        let mut pool = ProjectilePool::new();
        pool.push(Projectile::spawn(
            EntityId::new(),
            Vec2::new(10.0, 10.0),
            Vec2::X,
            &spec(true),
        ));
        let mut targets = vec![MockTarget::at(100.0, 0.0, 0.0), MockTarget::at(100.0, 0.0, 0.0)];
        for _ in 0..5 {
            pool.resolve_hits(&mut targets);
        }
        assert_eq!(pool.len(), 1);
        for target in &targets {
            assert!((target.health.current() - 90.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_payload_slows_target() {
        let spec = spec(false).with_payload(StatusPayload::Slow {
            percent: 50.0,
            duration: 2.0,
        });
        let mut p = Projectile::spawn(EntityId::new(), Vec2::new(10.0, 10.0), Vec2::X, &spec);
        let mut target = MockTarget::at(100.0, 0.0, 0.0);
        assert!(p.check_hit(&mut target).is_some());
        assert!((target.status.speed_multiplier() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_pool_update_swap_removes() {
        let mut pool = ProjectilePool::new();
        let short = ProjectileSpec::new(10.0, 1.0, 0.05, false);
        let long = ProjectileSpec::new(10.0, 1.0, 5.0, false);
        pool.push(Projectile::spawn(EntityId::new(), Vec2::ZERO, Vec2::X, &short));
        pool.push(Projectile::spawn(EntityId::new(), Vec2::ZERO, Vec2::X, &long));
        pool.update(0.1);
        assert_eq!(pool.len(), 1);
        assert!((pool.as_slice()[0].lifetime - 5.0).abs() < 0.001);
    }

    proptest! {
        #[test]
        fn prop_piercing_damages_each_target_once(
            count in 1usize..8,
            ticks in 1usize..20,
            damage in 1.0f32..20.0,
        ) {
            let spec = ProjectileSpec::new(0.0, damage, 100.0, true).with_size(64.0);
            let mut pool = ProjectilePool::new();
            pool.push(Projectile::spawn(EntityId::new(), Vec2::new(16.0, 24.0), Vec2::X, &spec));
            let mut targets: Vec<MockTarget> =
                (0..count).map(|_| MockTarget::at(1000.0, 0.0, 0.0)).collect();
            for _ in 0..ticks {
                pool.update(0.016);
                pool.resolve_hits(&mut targets);
            }
            for target in &targets {
                prop_assert!((target.health.current() - (1000.0 - damage)).abs() < 0.01);
            }
        }
    }
}
