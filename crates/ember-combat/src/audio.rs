//! Sound cue notifications for the audio collaborator.
//!
//! The simulation never plays audio itself. It emits [`SoundCue`]s through an
//! injected [`AudioSink`], rate-limited per cue by a [`SoundThrottle`]. With no
//! sink installed, [`NullAudio`] swallows everything.

use ahash::AHashMap;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Discrete sound notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundCue {
    /// Player melee or generic attack
    Attack,
    /// Enemy attack landed or started
    EnemyAttack,
    /// Enemy died
    EnemyDeath,
    /// Player took damage
    Hurt,
    /// Explosion
    Explosion,
    /// Fire projectile launched
    Fire,
    /// Dash started
    Dash,
    /// Blast projectile launched
    Blast,
}

impl SoundCue {
    /// Stable name of the cue, as used by asset tables.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::EnemyAttack => "enemy_attack",
            Self::EnemyDeath => "enemy_death",
            Self::Hurt => "hurt",
            Self::Explosion => "explosion",
            Self::Fire => "fire",
            Self::Dash => "dash",
            Self::Blast => "blast",
        }
    }

    /// Cue played when an ability with this id fires.
    #[must_use]
    pub fn for_ability(ability_id: &str) -> Option<Self> {
        match ability_id {
            "dash" => Some(Self::Dash),
            "blast" => Some(Self::Blast),
            "fire" => Some(Self::Fire),
            "fire_explosion" => Some(Self::Explosion),
            "charge" | "slow" => Some(Self::Attack),
            _ => None,
        }
    }
}

/// Minimum interval between two plays of the same cue, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Attack interval
    pub attack: u32,
    /// Enemy attack interval
    pub enemy_attack: u32,
    /// Enemy death interval
    pub enemy_death: u32,
    /// Hurt interval
    pub hurt: u32,
    /// Explosion interval
    pub explosion: u32,
    /// Fire interval
    pub fire: u32,
    /// Dash interval
    pub dash: u32,
    /// Blast interval
    pub blast: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            attack: 100,
            enemy_attack: 500,
            enemy_death: 0,
            hurt: 200,
            explosion: 200,
            fire: 120,
            dash: 150,
            blast: 100,
        }
    }
}

impl ThrottleConfig {
    /// Interval for a cue in seconds.
    #[must_use]
    pub fn interval(&self, cue: SoundCue) -> f64 {
        let ms = match cue {
            SoundCue::Attack => self.attack,
            SoundCue::EnemyAttack => self.enemy_attack,
            SoundCue::EnemyDeath => self.enemy_death,
            SoundCue::Hurt => self.hurt,
            SoundCue::Explosion => self.explosion,
            SoundCue::Fire => self.fire,
            SoundCue::Dash => self.dash,
            SoundCue::Blast => self.blast,
        };
        f64::from(ms) / 1000.0
    }
}

/// Per-cue rate limiter.
#[derive(Debug, Default)]
pub struct SoundThrottle {
    config: ThrottleConfig,
    /// Last play time for each cue.
    last_played: AHashMap<SoundCue, f64>,
}

impl SoundThrottle {
    /// Creates a throttle.
    #[must_use]
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            last_played: AHashMap::new(),
        }
    }

    /// Check if a cue can play (not throttled).
    #[must_use]
    pub fn can_play(&self, cue: SoundCue, now: f64) -> bool {
        let interval = self.config.interval(cue);
        if interval <= 0.0 {
            return true;
        }
        match self.last_played.get(&cue) {
            Some(last) => now - last >= interval,
            None => true,
        }
    }

    /// Mark a cue as played.
    pub fn mark_played(&mut self, cue: SoundCue, now: f64) {
        if self.config.interval(cue) > 0.0 {
            self.last_played.insert(cue, now);
        }
    }

    /// Checks and marks in one step.
    pub fn try_play(&mut self, cue: SoundCue, now: f64) -> bool {
        if self.can_play(cue, now) {
            self.mark_played(cue, now);
            true
        } else {
            false
        }
    }

    /// Clear entries older than `max_age` seconds.
    pub fn cleanup(&mut self, now: f64, max_age: f64) {
        self.last_played.retain(|_, last| now - *last < max_age);
    }
}

/// Receiver of sound cues. Implementations must not block.
pub trait AudioSink: Send {
    /// Requests playback of a cue.
    fn play(&mut self, cue: SoundCue);
}

/// Sink that ignores every cue.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _cue: SoundCue) {}
}

/// Sink forwarding cues over a bounded channel; cues are dropped when full.
#[derive(Debug, Clone)]
pub struct ChannelAudio {
    sender: Sender<SoundCue>,
}

impl ChannelAudio {
    /// Creates a sink and the receiver the audio layer reads from.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<SoundCue>) {
        let (sender, receiver) = bounded(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl AudioSink for ChannelAudio {
    fn play(&mut self, cue: SoundCue) {
        let _ = self.sender.try_send(cue);
    }
}

/// Throttled front for an audio sink.
pub struct AudioDispatcher {
    sink: Box<dyn AudioSink>,
    throttle: SoundThrottle,
}

impl AudioDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(sink: Box<dyn AudioSink>, config: ThrottleConfig) -> Self {
        Self {
            sink,
            throttle: SoundThrottle::new(config),
        }
    }

    /// Dispatcher that plays nothing.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(Box::new(NullAudio), ThrottleConfig::default())
    }

    /// Forwards a cue unless throttled. Returns whether it was forwarded.
    pub fn notify(&mut self, cue: SoundCue, now: f64) -> bool {
        if self.throttle.try_play(cue, now) {
            self.sink.play(cue);
            true
        } else {
            false
        }
    }

    /// Drops stale throttle entries.
    pub fn cleanup(&mut self, now: f64) {
        self.throttle.cleanup(now, 5.0);
    }
}

impl std::fmt::Debug for AudioDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDispatcher")
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}
