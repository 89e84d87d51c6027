//! Read-only snapshots handed to the presentation layer.
//!
//! Renderers never see live entities. After each tick the world exposes one
//! [`EntityView`] per live actor and one [`ProjectileView`] per live
//! projectile; sprite lookup happens on the renderer's side.

use ember_common::{EntityId, Rect};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::projectile::Projectile;
use crate::state::EntityState;

/// Snapshot of one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    /// Entity id
    pub id: EntityId,
    /// Archetype id
    pub archetype: String,
    /// Hitbox
    pub rect: Rect,
    /// Facing direction
    pub facing_right: bool,
    /// Behavioral state
    pub state: EntityState,
    /// Animation frame index
    pub frame: usize,
    /// Health as a fraction of max
    pub health: f32,
    /// Render as a placeholder (no visual data)
    pub placeholder: bool,
    /// Damage currently rejected
    pub invincible: bool,
    /// Boss rage phase active
    pub rage: bool,
}

/// Snapshot of one projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileView {
    /// Owner of the projectile
    pub owner: EntityId,
    /// Center position
    pub position: Vec2,
    /// Side length of the square hitbox
    pub size: f32,
    /// Animation frame index
    pub frame: usize,
}

impl From<&Projectile> for ProjectileView {
    fn from(projectile: &Projectile) -> Self {
        Self {
            owner: projectile.owner,
            position: projectile.position,
            size: projectile.size(),
            frame: projectile.frame(),
        }
    }
}
