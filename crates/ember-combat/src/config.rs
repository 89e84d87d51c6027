//! Simulation configuration.
//!
//! Loaded from TOML. Missing or broken files fall back to defaults so the
//! simulation always starts.

use std::path::{Path, PathBuf};

use ember_common::{ConfigError, EmberResult, SchemaVersion};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ability::config::AbilityEntry;
use crate::audio::ThrottleConfig;
use crate::behavior::{BehaviorTuning, PlayerTuning};
use crate::mana::Mana;
use crate::physics::PhysicsConfig;
use crate::registry::{ArchetypeDef, ArchetypeStats, PLAYER_ARCHETYPE};
use crate::state::{AnimationSet, EntityState};

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for spawn placement and AI rolls
    pub seed: u64,
    /// Margin around the player's hitbox inside which enemies are updated
    pub activity_margin: f32,
    /// Capacity of the combat event bus
    pub event_bus_capacity: usize,
    /// Emit JSON log lines instead of plain text
    pub log_json: bool,
    /// Directory of RON/JSON archetype tables layered over the built-in ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archetype_dir: Option<PathBuf>,
    /// Schema version of this document
    pub version: SchemaVersion,
    /// World physics for enemies
    pub physics: PhysicsConfig,
    /// Player tuning
    pub player: PlayerConfig,
    /// Minimum interval between sound cues
    pub audio: ThrottleConfig,
    /// Arena encounter
    pub arena: ArenaConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            activity_margin: 800.0,
            event_bus_capacity: 1024,
            log_json: false,
            archetype_dir: None,
            version: SchemaVersion::SIM_CONFIG,
            physics: PhysicsConfig::default(),
            player: PlayerConfig::default(),
            audio: ThrottleConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

impl SimConfig {
    /// Loads configuration from a TOML file, falling back to defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file not found at {}, using defaults", path.display());
            return Self::default();
        }

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file {}: {e}", path.display());
                return Self::default();
            },
        };

        match toml::from_str::<Self>(&contents) {
            Ok(mut config) => {
                if !SchemaVersion::SIM_CONFIG.can_read(&config.version) {
                    warn!(
                        "Config {} has version {}, expected {}; using defaults",
                        path.display(),
                        config.version,
                        SchemaVersion::SIM_CONFIG
                    );
                    return Self::default();
                }
                config.validate();
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            },
        }
    }

    /// Saves configuration to a TOML file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> EmberResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::serialize("toml", e))?;
        std::fs::write(path, contents)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamps every value into a usable range.
    pub fn validate(&mut self) {
        self.activity_margin = self.activity_margin.max(0.0);
        self.event_bus_capacity = self.event_bus_capacity.clamp(1, 1 << 20);

        // Physics
        self.physics.gravity = self.physics.gravity.max(0.0);
        self.physics.terminal_velocity = self.physics.terminal_velocity.max(1.0);
        self.physics.respawn_search_width = self.physics.respawn_search_width.max(0.0);

        // Player
        self.player.validate();

        // Arena
        self.arena.spawn_radius_min = self.arena.spawn_radius_min.max(0.0);
        self.arena.spawn_radius_max = self.arena.spawn_radius_max.max(self.arena.spawn_radius_min);
        self.arena.boss_spawn_distance = self.arena.boss_spawn_distance.max(0.0);
        self.arena.enemy_count = self.arena.enemy_count.min(256);
    }
}

/// Player tuning, in px and px/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Walking speed
    pub move_speed: f32,
    /// Jump velocity (negative is up)
    pub jump_velocity: f32,
    /// Gravity applied to the player only
    pub gravity: f32,
    /// Maximum falling speed of the player
    pub terminal_velocity: f32,
    /// Hitbox width
    pub width: f32,
    /// Hitbox height
    pub height: f32,
    /// Maximum health
    pub max_health: f32,
    /// Displayed hurt duration; the player keeps control meanwhile
    pub hurt_stun: f32,
    /// Spawn point (bottom-center of the hitbox)
    pub spawn: Vec2,
    /// Ability ids attached to the player
    pub abilities: Vec<String>,
    /// Mana pool
    pub mana: Mana,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            move_speed: 3600.0,
            jump_velocity: -8400.0,
            gravity: 28_800.0,
            terminal_velocity: 4800.0,
            width: 150.0,
            height: 300.0,
            max_health: 100.0,
            hurt_stun: 0.25,
            spawn: Vec2::ZERO,
            abilities: ["dash", "blast", "fire", "cloud", "charge", "slow", "fire_explosion"]
                .into_iter()
                .map(String::from)
                .collect(),
            mana: Mana::default(),
        }
    }
}

impl PlayerConfig {
    fn validate(&mut self) {
        self.move_speed = self.move_speed.max(0.0);
        self.gravity = self.gravity.max(0.0);
        self.terminal_velocity = self.terminal_velocity.max(1.0);
        self.width = self.width.max(1.0);
        self.height = self.height.max(1.0);
        self.max_health = self.max_health.max(1.0);
        self.hurt_stun = self.hurt_stun.max(0.0);
        self.mana.max = self.mana.max.max(0.0);
        self.mana.current = self.mana.current.clamp(0.0, self.mana.max);
        self.mana.regen_per_sec = self.mana.regen_per_sec.max(0.0);
    }

    /// Player archetype built on top of the world physics.
    #[must_use]
    pub fn archetype(&self, world: &PhysicsConfig) -> ArchetypeDef {
        let physics = PhysicsConfig {
            gravity: self.gravity,
            terminal_velocity: self.terminal_velocity,
            ..*world
        };
        let animation = AnimationSet::new(0.08)
            .with_speed(EntityState::Hurt, 0.08)
            .with_speed(EntityState::Dying, 0.1);
        ArchetypeDef {
            id: PLAYER_ARCHETYPE.to_string(),
            behavior: BehaviorTuning::Player(PlayerTuning {
                jump_velocity: self.jump_velocity,
            }),
            stats: ArchetypeStats {
                max_health: self.max_health,
                damage: 0.0,
                move_speed: self.move_speed,
                hurt_stun: self.hurt_stun,
                width: self.width,
                height: self.height,
            },
            animation,
            abilities: self.abilities.iter().cloned().map(AbilityEntry::Named).collect(),
            mana: Some(self.mana),
            physics: Some(physics),
        }
    }
}

/// Arena encounter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Number of regular enemies spawned when the fight starts
    pub enemy_count: usize,
    /// Smallest horizontal spawn offset from the center
    pub spawn_radius_min: f32,
    /// Largest horizontal spawn offset from the center
    pub spawn_radius_max: f32,
    /// Distance from the player at which the boss appears
    pub boss_spawn_distance: f32,
    /// Boss archetype
    pub boss_id: String,
    /// Regular archetypes, picked in rotation
    pub enemy_ids: Vec<String>,
    /// Enemy spawn center (bottom-center of their hitboxes)
    pub spawn_center: Vec2,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            enemy_count: 5,
            spawn_radius_min: 50.0,
            spawn_radius_max: 150.0,
            boss_spawn_distance: 800.0,
            boss_id: "Troll1".to_string(),
            enemy_ids: ["Golem_02", "minotaur_01", "Wraith_01", "Wraith_03", "Exploder_01"]
                .into_iter()
                .map(String::from)
                .collect(),
            spawn_center: Vec2::new(1200.0, 0.0),
        }
    }
}
