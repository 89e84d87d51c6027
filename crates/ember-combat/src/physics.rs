//! Platform collision and body integration.
//!
//! This module provides physics for every actor in the simulation:
//! - Static platform rectangles supplied by the map collaborator
//! - Gravity with terminal velocity
//! - Axis-separated collision resolution (horizontal push-out, landing, head bump)
//! - Recovery of bodies that fell out of the world

use ember_common::{Rect, VisualHandle};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A solid platform: an opaque visual handle plus its collision rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    /// Visual handle owned by the map collaborator
    pub handle: VisualHandle,
    /// Collision rectangle
    pub rect: Rect,
}

impl Platform {
    /// Creates a platform.
    #[must_use]
    pub const fn new(handle: VisualHandle, rect: Rect) -> Self {
        Self { handle, rect }
    }

    /// Creates a platform without a visual.
    #[must_use]
    pub const fn solid(rect: Rect) -> Self {
        Self::new(VisualHandle::NONE, rect)
    }
}

/// Collision query interface over solid geometry.
///
/// Implemented for plain platform slices so the driver can hand each entity
/// only the platforms near it.
pub trait CollisionQuery {
    /// All platforms visible to this query.
    fn platforms(&self) -> &[Platform];

    /// First platform overlapping `rect`, if any.
    fn first_overlap(&self, rect: &Rect) -> Option<Rect> {
        self.platforms()
            .iter()
            .map(|p| p.rect)
            .find(|r| r.overlaps(rect))
    }

    /// Top edge of the highest platform whose center lies within `search_width`
    /// horizontally of `x` and whose top is above `max_top`.
    fn highest_platform_near(&self, x: f32, search_width: f32, max_top: f32) -> Option<f32> {
        self.platforms()
            .iter()
            .filter(|p| (p.rect.center().x - x).abs() < search_width && p.rect.min_y < max_top)
            .map(|p| p.rect.min_y)
            .reduce(f32::min)
    }

    /// Platform whose top surface is closest to `point`.
    fn nearest_platform(&self, point: Vec2) -> Option<Rect> {
        self.platforms()
            .iter()
            .map(|p| p.rect)
            .min_by(|a, b| {
                let da = Vec2::new(a.center().x, a.min_y).distance_squared(point);
                let db = Vec2::new(b.center().x, b.min_y).distance_squared(point);
                da.total_cmp(&db)
            })
    }
}

impl CollisionQuery for [Platform] {
    fn platforms(&self) -> &[Platform] {
        self
    }
}

impl CollisionQuery for Vec<Platform> {
    fn platforms(&self) -> &[Platform] {
        self
    }
}

/// Static level geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolidGeometry {
    platforms: Vec<Platform>,
}

impl SolidGeometry {
    /// Creates geometry from platform pairs.
    #[must_use]
    pub fn new(platforms: Vec<Platform>) -> Self {
        Self { platforms }
    }

    /// Creates geometry from bare rectangles.
    #[must_use]
    pub fn from_rects(rects: impl IntoIterator<Item = Rect>) -> Self {
        Self::new(rects.into_iter().map(Platform::solid).collect())
    }

    /// Adds a platform.
    pub fn push(&mut self, platform: Platform) {
        self.platforms.push(platform);
    }

    /// Number of platforms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    /// Whether the geometry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Platforms intersecting `window`.
    #[must_use]
    pub fn nearby(&self, window: &Rect) -> Vec<Platform> {
        self.platforms
            .iter()
            .filter(|p| p.rect.overlaps(window))
            .copied()
            .collect()
    }

    /// Smallest rectangle enclosing every platform.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect> {
        self.platforms.iter().map(|p| p.rect).reduce(|a, b| {
            Rect::from_edges(
                a.min_x.min(b.min_x),
                a.min_y.min(b.min_y),
                a.max_x.max(b.max_x),
                a.max_y.max(b.max_y),
            )
        })
    }

    /// Top of the platform under `x` whose top is closest to `y`.
    #[must_use]
    pub fn ground_near(&self, x: f32, y: f32) -> Option<f32> {
        self.platforms
            .iter()
            .filter(|p| p.rect.min_x <= x && x <= p.rect.max_x)
            .map(|p| p.rect.min_y)
            .min_by(|a, b| (a - y).abs().total_cmp(&(b - y).abs()))
    }
}

impl CollisionQuery for SolidGeometry {
    fn platforms(&self) -> &[Platform] {
        &self.platforms
    }
}

/// World physics configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity acceleration in px/s² (positive = down)
    pub gravity: f32,
    /// Maximum falling speed in px/s
    pub terminal_velocity: f32,
    /// Bodies whose top is below this y are recovered onto a platform
    pub respawn_depth: f32,
    /// Horizontal search distance for a recovery platform
    pub respawn_search_width: f32,
    /// Platforms whose top is below this are not used for recovery
    pub respawn_max_platform_top: f32,
    /// Recovery height when no platform is found
    pub respawn_fallback_y: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 1200.0,
            terminal_velocity: 800.0,
            respawn_depth: 20_000.0,
            respawn_search_width: 1000.0,
            respawn_max_platform_top: 18_000.0,
            respawn_fallback_y: 9000.0,
        }
    }
}

/// Contacts produced by one physics step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contact {
    /// Landed on or resting on a platform
    pub on_ground: bool,
    /// Pushed out of a platform horizontally
    pub hit_wall: bool,
    /// Bumped a platform from below
    pub hit_ceiling: bool,
}

/// Kinematic state of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Hitbox
    pub rect: Rect,
    /// Velocity in px/s
    pub velocity: Vec2,
    /// Whether the body rests on a platform
    pub on_ground: bool,
    /// Facing direction
    pub facing_right: bool,
}

impl Body {
    /// Creates a body with its top-left corner at `position`.
    #[must_use]
    pub fn new(position: Vec2, width: f32, height: f32) -> Self {
        Self {
            rect: Rect::new(position.x, position.y, width, height),
            velocity: Vec2::ZERO,
            on_ground: false,
            facing_right: true,
        }
    }

    /// Center of the hitbox.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        self.rect.center()
    }

    /// Facing as a horizontal sign.
    #[must_use]
    pub fn facing_sign(&self) -> f32 {
        if self.facing_right {
            1.0
        } else {
            -1.0
        }
    }

    /// Turns the body towards a horizontal offset. Zero leaves facing unchanged.
    pub fn face_towards(&mut self, dx: f32) {
        if dx > 0.0 {
            self.facing_right = true;
        } else if dx < 0.0 {
            self.facing_right = false;
        }
    }

    /// Moves the body horizontally by `dx`, pushing it out of any platform it enters.
    pub fn move_horizontal<C: CollisionQuery + ?Sized>(&mut self, dx: f32, solids: &C) -> bool {
        if dx == 0.0 {
            return false;
        }
        self.rect = self.rect.translated(Vec2::new(dx, 0.0));
        let mut hit = false;
        for platform in solids.platforms() {
            if self.rect.overlaps(&platform.rect) {
                if dx > 0.0 {
                    self.rect.set_right(platform.rect.min_x);
                } else {
                    self.rect.set_left(platform.rect.max_x);
                }
                hit = true;
            }
        }
        hit
    }

    /// Applies gravity and vertical movement, resolving landing and head bumps.
    pub fn fall<C: CollisionQuery + ?Sized>(
        &mut self,
        dt: f32,
        config: &PhysicsConfig,
        solids: &C,
    ) -> Contact {
        self.velocity.y = (self.velocity.y + config.gravity * dt).min(config.terminal_velocity);
        self.rect = self.rect.translated(Vec2::new(0.0, self.velocity.y * dt));

        let mut contact = Contact::default();
        for platform in solids.platforms() {
            if !self.rect.overlaps(&platform.rect) {
                continue;
            }
            if self.velocity.y > 0.0 {
                self.rect.set_bottom(platform.rect.min_y);
                self.velocity.y = 0.0;
                contact.on_ground = true;
                break;
            } else if self.velocity.y < 0.0 {
                self.rect.set_top(platform.rect.max_y);
                self.velocity.y = 0.0;
                contact.hit_ceiling = true;
            }
        }
        self.on_ground = contact.on_ground;
        contact
    }

    /// Full physics step: horizontal velocity, then gravity and vertical resolution.
    pub fn step<C: CollisionQuery + ?Sized>(
        &mut self,
        dt: f32,
        config: &PhysicsConfig,
        solids: &C,
    ) -> Contact {
        let hit_wall = self.move_horizontal(self.velocity.x * dt, solids);
        let mut contact = self.fall(dt, config, solids);
        contact.hit_wall = hit_wall;
        contact
    }

    /// Places a body that fell below the world back onto a platform.
    ///
    /// Returns true when the body was moved.
    pub fn recover_if_fallen<C: CollisionQuery + ?Sized>(
        &mut self,
        config: &PhysicsConfig,
        solids: &C,
    ) -> bool {
        if self.rect.min_y <= config.respawn_depth {
            return false;
        }
        let top = solids
            .highest_platform_near(
                self.center().x,
                config.respawn_search_width,
                config.respawn_max_platform_top,
            )
            .unwrap_or(config.respawn_fallback_y + self.rect.height());
        self.rect.set_bottom(top);
        self.velocity = Vec2::ZERO;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> Vec<Platform> {
        vec![Platform::solid(Rect::new(-1000.0, 100.0, 2000.0, 50.0))]
    }

    /// Geometry that records how often it was queried.
    struct MockSolids {
        platforms: Vec<Platform>,
        queries: std::cell::Cell<usize>,
    }

    impl CollisionQuery for MockSolids {
        fn platforms(&self) -> &[Platform] {
            self.queries.set(self.queries.get() + 1);
            &self.platforms
        }
    }

    #[test]
    fn test_wall_stops_horizontal_move() {
        let solids = MockSolids {
            platforms: vec![Platform::solid(Rect::new(30.0, -100.0, 20.0, 300.0))],
            queries: std::cell::Cell::new(0),
        };
        let mut body = Body::new(Vec2::ZERO, 20.0, 50.0);
        assert!(body.move_horizontal(25.0, &solids));
        assert!((body.rect.max_x - 30.0).abs() < 0.001);
        assert!(!body.move_horizontal(0.0, &solids));
        assert_eq!(solids.queries.get(), 1);
    }

    #[test]
    fn test_body_lands_on_platform() {
        let config = PhysicsConfig::default();
        let solids = floor();
        let mut body = Body::new(Vec2::new(0.0, 40.0), 20.0, 50.0);

        for _ in 0..60 {
            body.step(1.0 / 60.0, &config, &solids);
        }

        assert!(body.on_ground);
        assert!((body.rect.max_y - 100.0).abs() < 0.001);
        assert!(body.velocity.y.abs() < 0.001);
    }

    #[test]
    fn test_resting_body_stays_grounded() {
        let config = PhysicsConfig::default();
        let solids = floor();
        let mut body = Body::new(Vec2::new(0.0, 50.0), 20.0, 50.0);

        for _ in 0..10 {
            let contact = body.step(1.0 / 60.0, &config, &solids);
            assert!(contact.on_ground);
        }
        assert!((body.rect.max_y - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_terminal_velocity() {
        let config = PhysicsConfig::default();
        let solids: Vec<Platform> = Vec::new();
        let mut body = Body::new(Vec2::ZERO, 10.0, 10.0);

        for _ in 0..200 {
            body.step(1.0 / 60.0, &config, &solids);
        }
        assert!((body.velocity.y - config.terminal_velocity).abs() < 0.001);
        assert!(!body.on_ground);
    }

    #[test]
    fn test_wall_push_out() {
        let solids = vec![Platform::solid(Rect::new(100.0, 0.0, 50.0, 200.0))];
        let mut body = Body::new(Vec2::new(70.0, 50.0), 20.0, 20.0);

        let hit = body.move_horizontal(30.0, &solids);
        assert!(hit);
        assert!((body.rect.max_x - 100.0).abs() < 0.001);

        let mut body = Body::new(Vec2::new(160.0, 50.0), 20.0, 20.0);
        assert!(body.move_horizontal(-30.0, &solids));
        assert!((body.rect.min_x - 150.0).abs() < 0.001);
    }

    #[test]
    fn test_head_bump() {
        let config = PhysicsConfig::default();
        let solids = vec![Platform::solid(Rect::new(-100.0, 0.0, 200.0, 20.0))];
        let mut body = Body::new(Vec2::new(0.0, 25.0), 20.0, 20.0);
        body.velocity.y = -600.0;

        let contact = body.fall(1.0 / 60.0, &config, &solids);
        assert!(contact.hit_ceiling);
        assert!((body.rect.min_y - 20.0).abs() < 0.001);
        assert!(body.velocity.y.abs() < 0.001);
    }

    #[test]
    fn test_recover_if_fallen() {
        let config = PhysicsConfig::default();
        let solids = vec![
            Platform::solid(Rect::new(0.0, 500.0, 200.0, 20.0)),
            Platform::solid(Rect::new(0.0, 300.0, 200.0, 20.0)),
            Platform::solid(Rect::new(5000.0, 100.0, 200.0, 20.0)),
        ];
        let mut body = Body::new(Vec2::new(50.0, 25_000.0), 20.0, 40.0);
        body.velocity = Vec2::new(10.0, 800.0);

        assert!(body.recover_if_fallen(&config, &solids));
        assert!((body.rect.max_y - 300.0).abs() < 0.001);
        assert_eq!(body.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_recover_without_platform_uses_fallback() {
        let config = PhysicsConfig::default();
        let solids: Vec<Platform> = Vec::new();
        let mut body = Body::new(Vec2::new(50.0, 25_000.0), 20.0, 40.0);

        assert!(body.recover_if_fallen(&config, &solids));
        assert!((body.rect.min_y - config.respawn_fallback_y).abs() < 0.001);
    }

    #[test]
    fn test_nearby_filters_platforms() {
        let geometry = SolidGeometry::from_rects([
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(1000.0, 0.0, 10.0, 10.0),
        ]);
        let near = geometry.nearby(&Rect::new(-50.0, -50.0, 100.0, 100.0));
        assert_eq!(near.len(), 1);
        assert_eq!(geometry.len(), 2);
    }

    #[test]
    fn test_bounds_and_ground_near() {
        let geometry = SolidGeometry::from_rects([
            Rect::new(0.0, 0.0, 500.0, 50.0),
            Rect::new(100.0, -300.0, 100.0, 20.0),
        ]);
        let bounds = geometry.bounds().unwrap();
        assert!((bounds.min_y + 300.0).abs() < 0.001);
        assert!((bounds.max_x - 500.0).abs() < 0.001);
        assert_eq!(geometry.ground_near(150.0, -250.0), Some(-300.0));
        assert_eq!(geometry.ground_near(150.0, -10.0), Some(0.0));
        assert_eq!(geometry.ground_near(900.0, 0.0), None);
        assert!(SolidGeometry::default().bounds().is_none());
    }

    #[test]
    fn test_face_towards() {
        let mut body = Body::new(Vec2::ZERO, 10.0, 10.0);
        body.face_towards(-5.0);
        assert!(!body.facing_right);
        body.face_towards(0.0);
        assert!(!body.facing_right);
        assert!((body.facing_sign() + 1.0).abs() < 0.001);
    }
}
