//! Archetype registry and entity factory.
//!
//! This module provides:
//! - [`ArchetypeDef`]: serializable description of one archetype
//! - [`ArchetypeTable`]: versioned RON or JSON document of archetypes
//! - [`ArchetypeRegistry`]: lookup by id and spawning, with the built-in
//!   reference archetypes registered by [`ArchetypeRegistry::with_defaults`]
//!
//! Spawning never fails: an unknown id logs a warning and produces a generic
//! patroller.

use std::fs;
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use ember_common::{ConfigError, SchemaVersion};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ability::config::{build_abilities, AbilityEntry};
use crate::behavior::{
    BehaviorTuning, BossTuning, CasterTuning, ControllerTuning, ExploderTuning, PatrolTuning,
};
use crate::config::PlayerConfig;
use crate::entity::{Entity, EntityCore, Stats};
use crate::mana::Mana;
use crate::physics::PhysicsConfig;
use crate::state::{AnimationSet, EntityState, StateMachine};

/// Archetype id of the player.
pub const PLAYER_ARCHETYPE: &str = "player";

/// Errors raised while building or loading the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Archetype without an id
    #[error("Archetype id must not be empty")]
    EmptyId,

    /// Id registered twice
    #[error("Duplicate archetype id: {0}")]
    Duplicate(String),

    /// Document could not be parsed or has the wrong version
    #[error("Archetype table error: {0}")]
    Config(#[from] ConfigError),

    /// File could not be read
    #[error("Failed to read archetype table: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Health, damage and hitbox of an archetype.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeStats {
    /// Maximum health
    pub max_health: f32,
    /// Melee or fallback damage
    pub damage: f32,
    /// Walking speed in px/s
    pub move_speed: f32,
    /// Stun after a survivable hit, in seconds
    pub hurt_stun: f32,
    /// Hitbox width
    pub width: f32,
    /// Hitbox height
    pub height: f32,
}

impl Default for ArchetypeStats {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            damage: 10.0,
            move_speed: 80.0,
            hurt_stun: 0.25,
            width: 120.0,
            height: 240.0,
        }
    }
}

impl ArchetypeStats {
    /// Stats with the given health, damage and speed.
    #[must_use]
    pub fn new(max_health: f32, damage: f32, move_speed: f32) -> Self {
        Self {
            max_health,
            damage,
            move_speed,
            ..Self::default()
        }
    }
}

/// Everything needed to spawn one kind of actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeDef {
    /// Unique id, e.g. `Golem_02`
    pub id: String,
    /// Behavior family and its tuning
    pub behavior: BehaviorTuning,
    /// Base stats
    pub stats: ArchetypeStats,
    /// Animation timing and frame counts
    pub animation: AnimationSet,
    /// Attached abilities; malformed entries are skipped at spawn
    pub abilities: Vec<AbilityEntry>,
    /// Mana pool, if abilities cost mana
    pub mana: Option<Mana>,
    /// Physics override; world physics when absent
    pub physics: Option<PhysicsConfig>,
}

impl Default for ArchetypeDef {
    fn default() -> Self {
        Self::new("", BehaviorTuning::default(), ArchetypeStats::default())
    }
}

impl ArchetypeDef {
    /// Creates a definition with the patrol animation timing and no abilities.
    #[must_use]
    pub fn new(id: impl Into<String>, behavior: BehaviorTuning, stats: ArchetypeStats) -> Self {
        Self {
            id: id.into(),
            behavior,
            stats,
            animation: patrol_animation(),
            abilities: Vec::new(),
            mana: None,
            physics: None,
        }
    }

    /// Sets the animation timing.
    #[must_use]
    pub fn with_animation(mut self, animation: AnimationSet) -> Self {
        self.animation = animation;
        self
    }

    /// Attaches built-in abilities by id.
    #[must_use]
    pub fn with_abilities(mut self, ids: &[&str]) -> Self {
        self.abilities = ids.iter().map(|id| AbilityEntry::Named((*id).to_string())).collect();
        self
    }

    /// Checks the definition for values the factory cannot use.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if self.stats.max_health <= 0.0 {
            return Err(ConfigError::invalid(format!("{}.stats.max_health", self.id), "must be positive").into());
        }
        if self.stats.width <= 0.0 || self.stats.height <= 0.0 {
            return Err(ConfigError::invalid(format!("{}.stats", self.id), "hitbox must have a positive size").into());
        }
        Ok(())
    }

    /// States the archetype may enter that have no registered frames.
    #[must_use]
    pub fn missing_clips(&self) -> Vec<EntityState> {
        let allowed = self.behavior.kind().allowed_states();
        EntityState::all()
            .iter()
            .copied()
            .filter(|state| allowed.contains(*state) && !self.animation.has_clip(*state))
            .collect()
    }

    /// Builds an entity whose hitbox bottom-center sits at `foot`.
    #[must_use]
    pub fn build(&self, foot: Vec2) -> Entity {
        let kind = self.behavior.kind();
        let stats = Stats {
            move_speed: self.stats.move_speed,
            damage: self.stats.damage,
            hurt_stun: self.stats.hurt_stun,
        };
        let mut core = EntityCore::new(
            self.id.as_str(),
            foot,
            Vec2::new(self.stats.width, self.stats.height),
            self.stats.max_health,
            stats,
            StateMachine::new(kind.allowed_states()),
            self.animation.clone(),
        )
        .with_abilities(build_abilities(&self.id, &self.abilities));
        if let Some(mana) = self.mana {
            core = core.with_mana(mana);
        }
        if let Some(physics) = self.physics {
            core = core.with_physics(physics);
        }
        Entity::new(core, self.behavior.build(foot.x))
    }
}

/// Versioned archetype document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeTable {
    /// Schema version
    #[serde(default)]
    pub version: SchemaVersion,
    /// Archetypes
    #[serde(default)]
    pub archetypes: Vec<ArchetypeDef>,
}

impl ArchetypeTable {
    /// Parses a RON document.
    pub fn from_ron_str(text: &str) -> RegistryResult<Self> {
        let table: Self = ron::from_str(text).map_err(|e| ConfigError::parse("ron", e))?;
        table.check_version()?;
        Ok(table)
    }

    /// Parses a JSON document.
    pub fn from_json_str(text: &str) -> RegistryResult<Self> {
        let table: Self = serde_json::from_str(text).map_err(|e| ConfigError::parse("json", e))?;
        table.check_version()?;
        Ok(table)
    }

    /// Serializes to pretty RON.
    pub fn to_ron_string(&self) -> RegistryResult<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::serialize("ron", e))?)
    }

    /// Serializes to pretty JSON.
    pub fn to_json_string(&self) -> RegistryResult<String> {
        Ok(serde_json::to_string_pretty(self).map_err(|e| ConfigError::serialize("json", e))?)
    }

    fn check_version(&self) -> RegistryResult<()> {
        if SchemaVersion::ARCHETYPE_TABLE.can_read(&self.version) {
            Ok(())
        } else {
            Err(ConfigError::VersionMismatch {
                expected: SchemaVersion::ARCHETYPE_TABLE.to_string(),
                actual: self.version.to_string(),
            }
            .into())
        }
    }
}

/// Archetypes by id.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeRegistry {
    archetypes: AHashMap<String, ArchetypeDef>,
}

impl ArchetypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every reference archetype.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for def in reference_archetypes() {
            registry.replace(def);
        }
        registry
    }

    /// Number of archetypes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Registers a new archetype.
    pub fn register(&mut self, def: ArchetypeDef) -> RegistryResult<()> {
        def.validate()?;
        if self.archetypes.contains_key(&def.id) {
            return Err(RegistryError::Duplicate(def.id));
        }
        self.archetypes.insert(def.id.clone(), def);
        Ok(())
    }

    /// Registers or overwrites an archetype. Returns the previous definition.
    pub fn replace(&mut self, def: ArchetypeDef) -> Option<ArchetypeDef> {
        self.archetypes.insert(def.id.clone(), def)
    }

    /// Looks up an archetype.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ArchetypeDef> {
        self.archetypes.get(id)
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.archetypes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Registers a frame count for one state of an archetype.
    ///
    /// Called by the asset collaborator once visual data is known. Returns
    /// false for an unknown id.
    pub fn set_frames(&mut self, id: &str, state: EntityState, frames: usize) -> bool {
        match self.archetypes.get_mut(id) {
            Some(def) => {
                def.animation.set_frames(state, frames);
                true
            },
            None => false,
        }
    }

    /// Spawns an entity. Unknown ids fall back to a generic patroller.
    #[must_use]
    pub fn spawn(&self, id: &str, foot: Vec2) -> Entity {
        match self.archetypes.get(id) {
            Some(def) => def.build(foot),
            None => {
                warn!("Unknown archetype '{id}', spawning a generic patroller");
                ArchetypeDef::new(id, BehaviorTuning::default(), ArchetypeStats::default()).build(foot)
            },
        }
    }

    /// Merges a table, overriding archetypes with the same id.
    ///
    /// The whole table is rejected when an entry is invalid or an id appears
    /// twice in it.
    pub fn merge(&mut self, table: ArchetypeTable) -> RegistryResult<usize> {
        let mut seen = AHashSet::new();
        for def in &table.archetypes {
            def.validate()?;
            if !seen.insert(def.id.as_str()) {
                return Err(RegistryError::Duplicate(def.id.clone()));
            }
        }

        let count = table.archetypes.len();
        for def in table.archetypes {
            let missing = def.missing_clips();
            if !def.animation.frame_counts.is_empty() && !missing.is_empty() {
                warn!("Archetype '{}' has no frames for {missing:?}; those states use placeholders", def.id);
            }
            if self.replace(def).is_some() {
                debug!("Archetype overridden by table");
            }
        }
        Ok(count)
    }

    /// Loads a `.ron` or `.json` archetype table.
    pub fn load_file(&mut self, path: &Path) -> RegistryResult<usize> {
        let text = fs::read_to_string(path)?;
        let table = match path.extension().and_then(|ext| ext.to_str()) {
            Some("ron") => ArchetypeTable::from_ron_str(&text)?,
            Some("json") => ArchetypeTable::from_json_str(&text)?,
            _ => {
                return Err(ConfigError::invalid(path.display().to_string(), "expected a .ron or .json file").into());
            },
        };
        self.merge(table)
    }

    /// Loads every table in a directory. Broken files are skipped with a warning.
    pub fn load_dir(&mut self, dir: &Path) -> RegistryResult<usize> {
        if !dir.exists() {
            info!("Archetype directory {} does not exist", dir.display());
            return Ok(0);
        }

        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "ron" || ext == "json"))
            .collect();
        paths.sort();

        let mut count = 0;
        for path in paths {
            match self.load_file(&path) {
                Ok(n) => {
                    count += n;
                    debug!("Loaded {n} archetypes from {}", path.display());
                },
                Err(e) => {
                    warn!("Failed to load archetype file {}: {e}", path.display());
                },
            }
        }

        info!("Loaded {count} archetypes total");
        Ok(count)
    }
}

// ============================================================================
// Reference archetypes
// ============================================================================

fn patrol_animation() -> AnimationSet {
    AnimationSet::new(0.11)
        .with_speed(EntityState::Attack, 0.11)
        .with_speed(EntityState::Hurt, 0.08)
        .with_speed(EntityState::Dying, 0.05)
}

fn caster_animation() -> AnimationSet {
    AnimationSet::new(0.12)
        .with_speed(EntityState::Cast, 0.1)
        .with_speed(EntityState::Hurt, 0.08)
        .with_speed(EntityState::Dying, 0.06)
}

fn boss_animation() -> AnimationSet {
    AnimationSet::new(0.1)
        .with_speed(EntityState::Run, 0.08)
        .with_speed(EntityState::Attack, 0.09)
        .with_speed(EntityState::Dying, 0.08)
}

fn patrol(id: &str, max_health: f32, damage: f32, move_speed: f32) -> ArchetypeDef {
    ArchetypeDef::new(
        id,
        BehaviorTuning::Patrol(PatrolTuning::default()),
        ArchetypeStats::new(max_health, damage, move_speed),
    )
}

/// The built-in archetypes of the reference game.
#[must_use]
pub fn reference_archetypes() -> Vec<ArchetypeDef> {
    let boss_stats = ArchetypeStats {
        hurt_stun: 0.0,
        width: 200.0,
        height: 320.0,
        ..ArchetypeStats::new(1000.0, 20.0, 200.0)
    };
    let player = PlayerConfig::default();

    vec![
        patrol("Golem_02", 120.0, 20.0, 40.0),
        patrol("Golem_03", 150.0, 25.0, 60.0),
        patrol("minotaur_01", 100.0, 10.0, 80.0),
        patrol("minotaur_02", 100.0, 10.0, 80.0),
        patrol("minotaur_03", 100.0, 10.0, 80.0),
        ArchetypeDef::new(
            "Wraith_01",
            BehaviorTuning::Caster(CasterTuning::default()),
            ArchetypeStats::new(80.0, 15.0, 60.0),
        )
        .with_animation(caster_animation())
        .with_abilities(&["blast"]),
        ArchetypeDef::new(
            "Wraith_03",
            BehaviorTuning::Controller(ControllerTuning::default()),
            ArchetypeStats::new(120.0, 5.0, 70.0),
        )
        .with_animation(caster_animation())
        .with_abilities(&["slow", "charge"]),
        ArchetypeDef::new(
            "Exploder_01",
            BehaviorTuning::Exploder(ExploderTuning::default()),
            ArchetypeStats::new(150.0, 25.0, 40.0),
        ),
        ArchetypeDef::new("Troll1", BehaviorTuning::Boss(BossTuning::default()), boss_stats)
            .with_animation(boss_animation()),
        player.archetype(&PhysicsConfig::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorKind;

    #[test]
    fn test_reference_ids_map_to_families() {
        let registry = ArchetypeRegistry::with_defaults();
        let expected = [
            ("Golem_02", BehaviorKind::Patrol),
            ("Golem_03", BehaviorKind::Patrol),
            ("minotaur_01", BehaviorKind::Patrol),
            ("minotaur_02", BehaviorKind::Patrol),
            ("minotaur_03", BehaviorKind::Patrol),
            ("Wraith_01", BehaviorKind::Caster),
            ("Wraith_03", BehaviorKind::Controller),
            ("Exploder_01", BehaviorKind::Exploder),
            ("Troll1", BehaviorKind::Boss),
            (PLAYER_ARCHETYPE, BehaviorKind::Player),
        ];
        assert_eq!(registry.len(), expected.len());
        for (id, kind) in expected {
            let entity = registry.spawn(id, Vec2::ZERO);
            assert_eq!(entity.kind(), kind, "{id}");
            assert_eq!(entity.core().archetype, id);
        }
    }

    #[test]
    fn test_golem_overrides() {
        let registry = ArchetypeRegistry::with_defaults();
        let golem = registry.spawn("Golem_03", Vec2::new(100.0, 0.0));
        assert!((golem.core().health.max() - 150.0).abs() < 0.001);
        assert!((golem.core().stats.damage - 25.0).abs() < 0.001);
        assert!((golem.core().stats.move_speed - 60.0).abs() < 0.001);
        let rect = golem.rect();
        assert!((rect.max_y).abs() < 0.001);
        assert!((rect.center().x - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_unknown_id_spawns_generic_patroller() {
        let registry = ArchetypeRegistry::with_defaults();
        let entity = registry.spawn("Dragon_99", Vec2::ZERO);
        assert_eq!(entity.kind(), BehaviorKind::Patrol);
        assert_eq!(entity.core().archetype, "Dragon_99");
        assert!(entity.core().placeholder);
    }

    #[test]
    fn test_abilities_attached() {
        let registry = ArchetypeRegistry::with_defaults();
        let wraith = registry.spawn("Wraith_03", Vec2::ZERO);
        assert!(wraith.core().has_ability("slow"));
        assert!(wraith.core().has_ability("charge"));
        let player = registry.spawn(PLAYER_ARCHETYPE, Vec2::ZERO);
        assert!(player.core().mana.is_some());
        assert!(player.core().has_ability("fire_explosion"));
    }

    #[test]
    fn test_register_rejects_duplicates_and_empty_ids() {
        let mut registry = ArchetypeRegistry::new();
        let def = patrol("Golem_02", 120.0, 20.0, 40.0);
        assert!(registry.register(def.clone()).is_ok());
        assert!(matches!(registry.register(def), Err(RegistryError::Duplicate(id)) if id == "Golem_02"));
        assert!(matches!(
            registry.register(patrol(" ", 1.0, 1.0, 1.0)),
            Err(RegistryError::EmptyId)
        ));
        assert!(matches!(
            registry.register(patrol("Zero", 0.0, 1.0, 1.0)),
            Err(RegistryError::Config(ConfigError::InvalidValue { .. }))
        ));
        assert_eq!(registry.ids(), vec!["Golem_02"]);
    }

    #[test]
    fn test_ron_table_overrides_defaults() {
        let text = r#"(
            version: (major: 1, minor: 2, patch: 0),
            archetypes: [
                (
                    id: "Wraith_01",
                    behavior: Caster((cast_cooldown: 4.0)),
                    stats: (max_health: 90.0, damage: 12.0),
                    abilities: ["blast", "teleport"],
                ),
            ],
        )"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wraiths.ron");
        fs::write(&path, text).unwrap();

        let mut registry = ArchetypeRegistry::with_defaults();
        assert_eq!(registry.load_file(&path).unwrap(), 1);
        let def = registry.get("Wraith_01").unwrap();
        assert!((def.stats.max_health - 90.0).abs() < 0.001);
        assert!((def.stats.move_speed - 80.0).abs() < 0.001);
        match &def.behavior {
            BehaviorTuning::Caster(tuning) => {
                assert!((tuning.cast_cooldown - 4.0).abs() < 0.001);
                assert!((tuning.max_cast_range - 800.0).abs() < 0.001);
            },
            other => panic!("unexpected behavior {other:?}"),
        }

        let wraith = registry.spawn("Wraith_01", Vec2::ZERO);
        assert!(wraith.core().has_ability("blast"));
        assert!(!wraith.core().has_ability("teleport"));
    }

    #[test]
    fn test_json_table_skips_malformed_abilities() {
        let text = r#"{
            "archetypes": [
                {
                    "id": "Imp",
                    "behavior": {"Patrol": {"attack_range": 90.0}},
                    "abilities": [42, "fire"]
                }
            ]
        }"#;
        let table = ArchetypeTable::from_json_str(text).unwrap();
        assert_eq!(table.version, SchemaVersion::ARCHETYPE_TABLE);
        assert_eq!(table.archetypes[0].abilities[0], AbilityEntry::Malformed);

        let mut registry = ArchetypeRegistry::new();
        assert_eq!(registry.merge(table).unwrap(), 1);
        let imp = registry.spawn("Imp", Vec2::ZERO);
        assert_eq!(imp.core().abilities.len(), 1);
        assert!(imp.core().has_ability("fire"));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let text = r#"{"version": {"major": 2, "minor": 0, "patch": 0}, "archetypes": []}"#;
        assert!(matches!(
            ArchetypeTable::from_json_str(text),
            Err(RegistryError::Config(ConfigError::VersionMismatch { .. }))
        ));
    }

    #[test]
    fn test_table_with_duplicate_ids_rejected() {
        let table = ArchetypeTable {
            version: SchemaVersion::ARCHETYPE_TABLE,
            archetypes: vec![patrol("Twin", 10.0, 1.0, 1.0), patrol("Twin", 20.0, 1.0, 1.0)],
        };
        let mut registry = ArchetypeRegistry::new();
        assert!(matches!(registry.merge(table), Err(RegistryError::Duplicate(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_table_roundtrip_through_ron() {
        let table = ArchetypeTable {
            version: SchemaVersion::ARCHETYPE_TABLE,
            archetypes: vec![patrol("Golem_02", 120.0, 20.0, 40.0).with_abilities(&["blast"])],
        };
        let text = table.to_ron_string().unwrap();
        let parsed = ArchetypeTable::from_ron_str(&text).unwrap();
        assert_eq!(parsed.archetypes[0].id, "Golem_02");
        assert_eq!(parsed.archetypes[0].abilities, table.archetypes[0].abilities);
    }

    #[test]
    fn test_load_dir_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"archetypes": [{"id": "Imp"}]}"#).unwrap();
        fs::write(dir.path().join("b.ron"), "(archetypes: [").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = ArchetypeRegistry::new();
        assert_eq!(registry.load_dir(dir.path()).unwrap(), 1);
        assert!(registry.get("Imp").is_some());
        assert_eq!(registry.load_dir(&dir.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn test_frames_clear_placeholder_and_missing_clips() {
        let mut registry = ArchetypeRegistry::with_defaults();
        assert!(registry.spawn("Golem_02", Vec2::ZERO).core().placeholder);
        assert!(registry.set_frames("Golem_02", EntityState::Walk, 8));
        assert!(!registry.set_frames("Nope", EntityState::Walk, 8));

        let def = registry.get("Golem_02").unwrap();
        assert!(!def.missing_clips().contains(&EntityState::Walk));
        assert!(def.missing_clips().contains(&EntityState::Attack));
        assert!(!registry.spawn("Golem_02", Vec2::ZERO).core().placeholder);
    }
}
