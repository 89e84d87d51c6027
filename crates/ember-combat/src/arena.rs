//! Arena encounter: a wave of regular enemies followed by a boss.
//!
//! The arena never spawns anything itself. It hands out [`SpawnRequest`]s
//! which the world turns into entities and reports back through
//! [`Arena::track`].

use ember_common::{EntityId, Rect};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ArenaConfig;
use crate::physics::SolidGeometry;
use crate::rng::SimRng;

/// Progress of the encounter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArenaPhase {
    /// Not started
    #[default]
    Inactive,
    /// Regular enemies alive
    Fighting,
    /// Boss alive
    BossFight,
    /// Boss defeated
    Completed,
}

/// An entity the arena wants spawned.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    /// Archetype id
    pub archetype: String,
    /// Bottom-center of the hitbox
    pub foot: Vec2,
    /// Whether this is the boss
    pub boss: bool,
}

/// Arena encounter state.
#[derive(Debug, Clone)]
pub struct Arena {
    config: ArenaConfig,
    phase: ArenaPhase,
    enemies: Vec<EntityId>,
    boss: Option<EntityId>,
    changes: Vec<(ArenaPhase, ArenaPhase)>,
}

impl Arena {
    /// Creates an inactive arena.
    #[must_use]
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            config,
            phase: ArenaPhase::Inactive,
            enemies: Vec::new(),
            boss: None,
            changes: Vec::new(),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ArenaPhase {
        self.phase
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Regular enemies spawned for this encounter.
    #[must_use]
    pub fn enemies(&self) -> &[EntityId] {
        &self.enemies
    }

    /// The boss, once spawned.
    #[must_use]
    pub fn boss(&self) -> Option<EntityId> {
        self.boss
    }

    /// Starts the fight and returns the regular enemies to spawn.
    ///
    /// Enemies are placed at a random horizontal offset within the spawn
    /// radius on either side of the center. Does nothing unless inactive.
    pub fn start(&mut self, rng: &mut SimRng) -> Vec<SpawnRequest> {
        if self.phase != ArenaPhase::Inactive {
            return Vec::new();
        }
        self.set_phase(ArenaPhase::Fighting);

        let center = self.config.spawn_center;
        let ids = &self.config.enemy_ids;
        (0..self.config.enemy_count)
            .map(|i| {
                let archetype = if ids.is_empty() {
                    String::new()
                } else {
                    ids[i % ids.len()].clone()
                };
                let offset = rng.range(self.config.spawn_radius_min, self.config.spawn_radius_max) * rng.sign();
                SpawnRequest {
                    archetype,
                    foot: Vec2::new(center.x + offset, center.y),
                    boss: false,
                }
            })
            .collect()
    }

    /// Records an entity spawned from one of this arena's requests.
    pub fn track(&mut self, id: EntityId, boss: bool) {
        if boss {
            self.boss = Some(id);
        } else {
            self.enemies.push(id);
        }
    }

    /// Advances the encounter.
    ///
    /// `is_alive` reports whether a tracked id is still in the live set.
    /// Returns the boss spawn when the last regular enemy fell.
    pub fn update(
        &mut self,
        is_alive: impl Fn(EntityId) -> bool,
        player: Option<(Rect, bool)>,
        geometry: &SolidGeometry,
    ) -> Option<SpawnRequest> {
        match self.phase {
            ArenaPhase::Fighting => {
                if self.enemies.iter().any(|id| is_alive(*id)) {
                    return None;
                }
                self.set_phase(ArenaPhase::BossFight);
                let foot = match player {
                    Some((rect, facing_right)) => self.boss_spot(rect, facing_right, geometry),
                    None => self.config.spawn_center,
                };
                Some(SpawnRequest {
                    archetype: self.config.boss_id.clone(),
                    foot,
                    boss: true,
                })
            },
            ArenaPhase::BossFight => {
                if self.boss.is_some_and(|id| !is_alive(id)) {
                    self.set_phase(ArenaPhase::Completed);
                }
                None
            },
            ArenaPhase::Inactive | ArenaPhase::Completed => None,
        }
    }

    /// Takes the phase changes since the last call.
    pub fn take_changes(&mut self) -> Vec<(ArenaPhase, ArenaPhase)> {
        std::mem::take(&mut self.changes)
    }

    /// Boss foot position: `boss_spawn_distance` from the player on the side
    /// with more room, opposite the player's facing when both are equal.
    fn boss_spot(&self, player: Rect, facing_right: bool, geometry: &SolidGeometry) -> Vec2 {
        let center = player.center();
        let (left_room, right_room) = geometry
            .bounds()
            .map_or((0.0, 0.0), |b| (center.x - b.min_x, b.max_x - center.x));
        let side = if (right_room - left_room).abs() < f32::EPSILON {
            if facing_right {
                -1.0
            } else {
                1.0
            }
        } else if right_room > left_room {
            1.0
        } else {
            -1.0
        };
        let x = center.x + side * self.config.boss_spawn_distance;
        let y = geometry.ground_near(x, player.max_y).unwrap_or(player.max_y);
        debug!("Boss spot at ({x:.0}, {y:.0})");
        Vec2::new(x, y)
    }

    fn set_phase(&mut self, to: ArenaPhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        info!("Arena phase {from:?} -> {to:?}");
        self.phase = to;
        self.changes.push((from, to));
    }
}
