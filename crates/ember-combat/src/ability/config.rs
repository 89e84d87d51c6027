//! Data-driven ability configuration and the ability factory.
//!
//! Abilities are attached to actors by id from serialized configuration. An
//! entry that fails to parse or validate is skipped with a warning; the rest of
//! the actor still loads.

use ahash::AHashMap;
use ember_common::Rect;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    Ability, AbilityKind, AreaAbility, AuraAbility, ChargedAbility, DashEffect, HoverEffect,
    ProjectileLauncher,
};
use crate::projectile::{ProjectileSpec, DEFAULT_PROJECTILE_SIZE};

/// Ability configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbilityError {
    /// Ability id is empty
    #[error("ability id is empty")]
    EmptyId,
    /// A parameter is out of range
    #[error("ability '{id}': invalid {field}: {reason}")]
    InvalidParameter {
        /// Ability id
        id: String,
        /// Offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
    /// Entry could not be parsed
    #[error("malformed ability entry")]
    Malformed,
}

/// Result type for ability configuration.
pub type AbilityResult<T> = Result<T, AbilityError>;

/// Kind-specific ability parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbilityParams {
    /// Horizontal speed burst
    Dash {
        /// Seconds
        duration: f32,
        /// Horizontal speed multiplier
        speed_multiplier: f32,
    },
    /// Hold position in the air
    Hover {
        /// Seconds
        duration: f32,
    },
    /// Straight projectile
    Projectile {
        /// px/s
        speed: f32,
        /// Damage on hit
        damage: f32,
        /// Seconds
        lifetime: f32,
        /// Continue after hits
        #[serde(default)]
        piercing: bool,
        /// Hitbox size
        #[serde(default = "default_projectile_size")]
        size: f32,
        /// Culling bounds
        #[serde(default)]
        bounds: Option<Rect>,
    },
    /// Charged piercing shot
    PowerShot {
        /// Speed at zero charge
        base_speed: f32,
        /// Damage at zero charge
        base_damage: f32,
        /// Seconds for full charge
        max_charge: f32,
        /// Projectile lifetime
        lifetime: f32,
    },
    /// Charged slowing shot
    SlowShot {
        /// Speed at zero charge
        base_speed: f32,
        /// Damage per hit
        base_damage: f32,
        /// Seconds for full charge
        max_charge: f32,
        /// Projectile lifetime
        lifetime: f32,
        /// Speed reduction percentage
        slow_percent: f32,
        /// Slow duration at zero charge
        base_slow_duration: f32,
    },
    /// Explosion around the owner
    Explosion {
        /// Damage at the center
        damage: f32,
        /// Radius
        radius: f32,
        /// Visual duration
        duration: f32,
        /// Minimum falloff multiplier
        #[serde(default = "default_min_falloff")]
        min_falloff: f32,
    },
    /// Slow aura
    SlowAura {
        /// Radius
        radius: f32,
        /// Speed reduction percentage
        slow_percent: f32,
    },
}

fn default_projectile_size() -> f32 {
    DEFAULT_PROJECTILE_SIZE
}

fn default_min_falloff() -> f32 {
    0.3
}

/// Serialized ability definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityConfig {
    /// Ability id, unique per actor
    pub id: String,
    /// Cooldown in seconds
    #[serde(default)]
    pub cooldown: f64,
    /// Mana cost per use
    #[serde(default)]
    pub mana_cost: f32,
    /// Kind-specific parameters
    pub params: AbilityParams,
}

/// World bounds outside which fire projectiles are culled.
pub const FIRE_BOUNDS: Rect = Rect::from_edges(-100.0, -100.0, 4000.0, 1000.0);

impl AbilityConfig {
    /// Creates a config.
    #[must_use]
    pub fn new(id: impl Into<String>, cooldown: f64, params: AbilityParams) -> Self {
        Self {
            id: id.into(),
            cooldown,
            mana_cost: 0.0,
            params,
        }
    }

    /// Sets the mana cost.
    #[must_use]
    pub fn with_mana_cost(mut self, cost: f32) -> Self {
        self.mana_cost = cost;
        self
    }

    /// Reference configuration for a known ability id.
    #[must_use]
    pub fn reference(id: &str) -> Option<Self> {
        let config = match id {
            "dash" => Self::new(
                id,
                1.0,
                AbilityParams::Dash {
                    duration: 0.8,
                    speed_multiplier: 2.5,
                },
            ),
            "blast" => Self::new(
                id,
                0.5,
                AbilityParams::Projectile {
                    speed: 3600.0,
                    damage: 25.0,
                    lifetime: 1.2,
                    piercing: false,
                    size: DEFAULT_PROJECTILE_SIZE,
                    bounds: None,
                },
            )
            .with_mana_cost(5.0),
            "fire" => Self::new(
                id,
                1.0,
                AbilityParams::Projectile {
                    speed: 1200.0,
                    damage: 40.0,
                    lifetime: 2.0,
                    piercing: false,
                    size: DEFAULT_PROJECTILE_SIZE,
                    bounds: Some(FIRE_BOUNDS),
                },
            )
            .with_mana_cost(10.0),
            "cloud" => Self::new(id, 2.0, AbilityParams::Hover { duration: 1.0 }).with_mana_cost(10.0),
            "charge" => Self::new(
                id,
                0.2,
                AbilityParams::PowerShot {
                    base_speed: 1200.0,
                    base_damage: 30.0,
                    max_charge: 3.0,
                    lifetime: 1.5,
                },
            )
            .with_mana_cost(15.0),
            "slow" => Self::new(
                id,
                3.5,
                AbilityParams::SlowShot {
                    base_speed: 400.0,
                    base_damage: 3.0,
                    max_charge: 2.0,
                    lifetime: 1.8,
                    slow_percent: 50.0,
                    base_slow_duration: 2.0,
                },
            )
            .with_mana_cost(15.0),
            "fire_explosion" => Self::new(
                id,
                5.0,
                AbilityParams::Explosion {
                    damage: 80.0,
                    radius: 200.0,
                    duration: 1.0,
                    min_falloff: 0.3,
                },
            )
            .with_mana_cost(30.0),
            "slow_aura" => Self::new(
                id,
                0.0,
                AbilityParams::SlowAura {
                    radius: 180.0,
                    slow_percent: 50.0,
                },
            ),
            _ => return None,
        };
        Some(config)
    }

    /// Checks parameter ranges.
    pub fn validate(&self) -> AbilityResult<()> {
        if self.id.trim().is_empty() {
            return Err(AbilityError::EmptyId);
        }
        if !self.cooldown.is_finite() || self.cooldown < 0.0 {
            return Err(self.invalid("cooldown", "must be a non-negative number"));
        }
        if !self.mana_cost.is_finite() || self.mana_cost < 0.0 {
            return Err(self.invalid("mana_cost", "must be a non-negative number"));
        }
        match &self.params {
            AbilityParams::Dash {
                duration,
                speed_multiplier,
            } => {
                self.positive("duration", *duration)?;
                self.positive("speed_multiplier", *speed_multiplier)?;
            },
            AbilityParams::Hover { duration } => self.positive("duration", *duration)?,
            AbilityParams::Projectile {
                speed,
                damage,
                lifetime,
                size,
                ..
            } => {
                self.positive("speed", *speed)?;
                self.non_negative("damage", *damage)?;
                self.positive("lifetime", *lifetime)?;
                self.positive("size", *size)?;
            },
            AbilityParams::PowerShot {
                base_speed,
                base_damage,
                max_charge,
                lifetime,
            } => {
                self.positive("base_speed", *base_speed)?;
                self.non_negative("base_damage", *base_damage)?;
                self.positive("max_charge", *max_charge)?;
                self.positive("lifetime", *lifetime)?;
            },
            AbilityParams::SlowShot {
                base_speed,
                base_damage,
                max_charge,
                lifetime,
                slow_percent,
                base_slow_duration,
            } => {
                self.positive("base_speed", *base_speed)?;
                self.non_negative("base_damage", *base_damage)?;
                self.positive("max_charge", *max_charge)?;
                self.positive("lifetime", *lifetime)?;
                self.percent("slow_percent", *slow_percent)?;
                self.positive("base_slow_duration", *base_slow_duration)?;
            },
            AbilityParams::Explosion {
                damage,
                radius,
                duration,
                min_falloff,
            } => {
                self.non_negative("damage", *damage)?;
                self.positive("radius", *radius)?;
                self.non_negative("duration", *duration)?;
                if !(0.0..=1.0).contains(min_falloff) {
                    return Err(self.invalid("min_falloff", "must be within [0, 1]"));
                }
            },
            AbilityParams::SlowAura {
                radius,
                slow_percent,
            } => {
                self.positive("radius", *radius)?;
                self.percent("slow_percent", *slow_percent)?;
            },
        }
        Ok(())
    }

    /// Validates and builds the ability.
    pub fn build(&self) -> AbilityResult<Ability> {
        self.validate()?;
        let kind = match &self.params {
            AbilityParams::Dash {
                duration,
                speed_multiplier,
            } => AbilityKind::Instant(DashEffect::new(*duration, *speed_multiplier).into()),
            AbilityParams::Hover { duration } => {
                AbilityKind::Instant(HoverEffect::new(*duration).into())
            },
            AbilityParams::Projectile {
                speed,
                damage,
                lifetime,
                piercing,
                size,
                bounds,
            } => {
                let mut spec = ProjectileSpec::new(*speed, *damage, *lifetime, *piercing).with_size(*size);
                spec.bounds = *bounds;
                AbilityKind::Instant(ProjectileLauncher::new(spec).into())
            },
            AbilityParams::PowerShot {
                base_speed,
                base_damage,
                max_charge,
                lifetime,
            } => AbilityKind::Charged(ChargedAbility::power_shot(
                *base_speed,
                *base_damage,
                *max_charge,
                *lifetime,
            )),
            AbilityParams::SlowShot {
                base_speed,
                base_damage,
                max_charge,
                lifetime,
                slow_percent,
                base_slow_duration,
            } => AbilityKind::Charged(ChargedAbility::slowing_shot(
                *base_speed,
                *base_damage,
                *max_charge,
                *lifetime,
                *slow_percent,
                *base_slow_duration,
            )),
            AbilityParams::Explosion {
                damage,
                radius,
                duration,
                min_falloff,
            } => AbilityKind::AreaEffect(AreaAbility::new(*damage, *radius, *duration, *min_falloff)),
            AbilityParams::SlowAura {
                radius,
                slow_percent,
            } => AbilityKind::Aura(AuraAbility::new(*radius, *slow_percent)),
        };
        Ok(Ability::new(self.id.clone(), self.cooldown, kind).with_mana_cost(self.mana_cost))
    }

    fn invalid(&self, field: &'static str, reason: &str) -> AbilityError {
        AbilityError::InvalidParameter {
            id: self.id.clone(),
            field,
            reason: reason.to_string(),
        }
    }

    fn positive(&self, field: &'static str, value: f32) -> AbilityResult<()> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(self.invalid(field, "must be positive"))
        }
    }

    fn non_negative(&self, field: &'static str, value: f32) -> AbilityResult<()> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(self.invalid(field, "must not be negative"))
        }
    }

    fn percent(&self, field: &'static str, value: f32) -> AbilityResult<()> {
        if (0.0..=100.0).contains(&value) {
            Ok(())
        } else {
            Err(self.invalid(field, "must be within [0, 100]"))
        }
    }
}

/// One ability slot in a serialized archetype: either a usable config or an
/// entry that failed to parse.
#[derive(Debug, Clone, PartialEq)]
pub enum AbilityEntry {
    /// Parsed configuration
    Config(AbilityConfig),
    /// Reference to a built-in ability by id
    Named(String),
    /// Unparseable entry
    Malformed,
}

impl AbilityEntry {
    /// Resolves the entry into a configuration.
    pub fn resolve(&self) -> AbilityResult<AbilityConfig> {
        match self {
            Self::Config(config) => Ok(config.clone()),
            Self::Named(id) => AbilityConfig::reference(id).ok_or_else(|| AbilityError::InvalidParameter {
                id: id.clone(),
                field: "id",
                reason: "unknown built-in ability".to_string(),
            }),
            Self::Malformed => Err(AbilityError::Malformed),
        }
    }
}

impl From<AbilityConfig> for AbilityEntry {
    fn from(config: AbilityConfig) -> Self {
        Self::Config(config)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Named(String),
    Config(AbilityConfig),
    Malformed(IgnoredAny),
}

impl<'de> Deserialize<'de> for AbilityEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawEntry::deserialize(deserializer)? {
            RawEntry::Named(id) => Self::Named(id),
            RawEntry::Config(config) => Self::Config(config),
            RawEntry::Malformed(_) => Self::Malformed,
        })
    }
}

impl Serialize for AbilityEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Config(config) => config.serialize(serializer),
            Self::Named(id) => serializer.serialize_str(id),
            Self::Malformed => serializer.serialize_unit(),
        }
    }
}

/// Builds every valid ability in `entries`, keyed by id.
///
/// Malformed or invalid entries are skipped with a warning. A later entry with
/// a duplicate id replaces the earlier one.
pub fn build_abilities<'a>(
    owner: &str,
    entries: impl IntoIterator<Item = &'a AbilityEntry>,
) -> AHashMap<String, Ability> {
    let mut abilities = AHashMap::new();
    for entry in entries {
        match entry.resolve().and_then(|config| config.build()) {
            Ok(ability) => {
                debug!("Attached ability '{}' to {owner}", ability.id());
                abilities.insert(ability.id().to_string(), ability);
            },
            Err(e) => warn!("Skipping ability for {owner}: {e}"),
        }
    }
    abilities
}
