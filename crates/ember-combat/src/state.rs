//! Entity state machine and animation clock.
//!
//! This module provides:
//! - The closed set of behavioral states shared by every archetype
//! - Per-archetype allowed-state sets with fallback to `Idle`
//! - Animation frame advancement (looping, clamped, one-shot dying)
//! - Hurt stun expiry and the automatic `Dying -> Dead` transition

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::timer::Countdown;

/// Number of frames assumed for a state whose clip is missing.
pub const FALLBACK_FRAMES: usize = 6;

/// Discrete behavioral state of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Standing still.
    Idle,
    /// Walking or patrolling.
    Walk,
    /// Running (boss chase in rage).
    Run,
    /// Airborne.
    Jump,
    /// Dash burst.
    Dash,
    /// Melee attack cycle.
    Attack,
    /// Casting or charging a ranged ability.
    Cast,
    /// Stunned after taking damage.
    Hurt,
    /// Terminal death sequence.
    Dying,
    /// Dead; excluded from updates.
    Dead,
}

impl EntityState {
    /// All states in declaration order.
    #[must_use]
    pub const fn all() -> &'static [EntityState] {
        &[
            Self::Idle,
            Self::Walk,
            Self::Run,
            Self::Jump,
            Self::Dash,
            Self::Attack,
            Self::Cast,
            Self::Hurt,
            Self::Dying,
            Self::Dead,
        ]
    }

    /// Whether the state is part of the terminal death path.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Dying | Self::Dead)
    }

    /// Whether the animation for this state wraps around.
    #[must_use]
    pub const fn loops(self) -> bool {
        !matches!(self, Self::Jump | Self::Dying | Self::Dead)
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Set of states an archetype is allowed to enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateSet(u16);

impl StateSet {
    /// States every actor supports.
    pub const CORE: Self = Self::of(&[
        EntityState::Idle,
        EntityState::Walk,
        EntityState::Hurt,
        EntityState::Dying,
        EntityState::Dead,
    ]);

    /// Every state.
    pub const ALL: Self = Self::of(EntityState::all());

    /// Builds a set from a list of states.
    #[must_use]
    pub const fn of(states: &[EntityState]) -> Self {
        let mut bits = 0u16;
        let mut i = 0;
        while i < states.len() {
            bits |= states[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Returns the union with extra states.
    #[must_use]
    pub const fn with(self, states: &[EntityState]) -> Self {
        Self(self.0 | Self::of(states).0)
    }

    /// Whether the set contains a state.
    #[must_use]
    pub const fn contains(self, state: EntityState) -> bool {
        self.0 & state.bit() != 0
    }
}

impl Default for StateSet {
    fn default() -> Self {
        Self::CORE
    }
}

/// Frame timing for a single state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Number of frames
    pub frames: usize,
    /// Seconds per frame
    pub frame_time: f32,
    /// True when no visual data was registered and the clip is synthesized
    pub synthesized: bool,
}

/// Animation data for an archetype: frame counts and per-state speeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSet {
    /// Seconds per frame for states without an override
    pub default_frame_time: f32,
    /// Per-state frame time overrides
    pub frame_times: AHashMap<EntityState, f32>,
    /// Frame counts registered by the asset collaborator
    pub frame_counts: AHashMap<EntityState, usize>,
}

impl Default for AnimationSet {
    fn default() -> Self {
        Self::new(0.11)
    }
}

impl AnimationSet {
    /// Creates an animation set with a default frame time and no frames.
    #[must_use]
    pub fn new(default_frame_time: f32) -> Self {
        Self {
            default_frame_time: default_frame_time.max(0.001),
            frame_times: AHashMap::new(),
            frame_counts: AHashMap::new(),
        }
    }

    /// Overrides the frame time of a state.
    #[must_use]
    pub fn with_speed(mut self, state: EntityState, frame_time: f32) -> Self {
        self.frame_times.insert(state, frame_time.max(0.001));
        self
    }

    /// Registers the frame count of a state.
    #[must_use]
    pub fn with_frames(mut self, state: EntityState, frames: usize) -> Self {
        self.set_frames(state, frames);
        self
    }

    /// Registers the frame count of a state. Zero removes the clip.
    pub fn set_frames(&mut self, state: EntityState, frames: usize) {
        if frames == 0 {
            self.frame_counts.remove(&state);
        } else {
            self.frame_counts.insert(state, frames);
        }
    }

    /// Whether visual data exists for a state.
    #[must_use]
    pub fn has_clip(&self, state: EntityState) -> bool {
        self.frame_counts.contains_key(&state)
    }

    /// Clip for a state, synthesized when no frames were registered.
    #[must_use]
    pub fn clip(&self, state: EntityState) -> Clip {
        let frame_time = self
            .frame_times
            .get(&state)
            .copied()
            .unwrap_or(self.default_frame_time);
        match self.frame_counts.get(&state) {
            Some(&frames) => Clip {
                frames,
                frame_time,
                synthesized: false,
            },
            None => Clip {
                frames: FALLBACK_FRAMES,
                frame_time,
                synthesized: true,
            },
        }
    }
}

/// Context used to pick the state a stun recovers into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovery {
    /// Body is on the ground
    pub on_ground: bool,
    /// Body is moving horizontally
    pub moving: bool,
}

impl Recovery {
    /// Neutral state for this context.
    #[must_use]
    pub fn neutral_state(self) -> EntityState {
        if !self.on_ground {
            EntityState::Jump
        } else if self.moving {
            EntityState::Walk
        } else {
            EntityState::Idle
        }
    }
}

/// How the `Dying` state ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DyingMode {
    /// `Dead` once the dying clip reaches its last frame.
    #[default]
    Animated,
    /// `Dead` only when the owning behavior calls [`StateMachine::finish_dying`].
    Held,
}

/// What happened during one state-machine tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateTick {
    /// A looping clip wrapped back to frame 0
    pub looped: bool,
    /// The hurt stun expired this tick
    pub hurt_expired: bool,
    /// The entity became `Dead` this tick
    pub died: bool,
}

/// State machine for one actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachine {
    state: EntityState,
    allowed: StateSet,
    frame: usize,
    frame_timer: f32,
    state_time: f32,
    hurt: Countdown,
    dying_mode: DyingMode,
}

impl StateMachine {
    /// Creates a machine in `Idle`.
    #[must_use]
    pub fn new(allowed: StateSet) -> Self {
        Self {
            state: EntityState::Idle,
            allowed: allowed.with(&[EntityState::Idle, EntityState::Dying, EntityState::Dead]),
            frame: 0,
            frame_timer: 0.0,
            state_time: 0.0,
            hurt: Countdown::idle(),
            dying_mode: DyingMode::Animated,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Current animation frame index.
    #[must_use]
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Seconds spent in the current state.
    #[must_use]
    pub fn state_time(&self) -> f32 {
        self.state_time
    }

    /// Remaining stun time.
    #[must_use]
    pub fn hurt_remaining(&self) -> f32 {
        self.hurt.remaining()
    }

    /// Whether AI decisions are currently suppressed by a stun.
    #[must_use]
    pub fn is_stunned(&self) -> bool {
        self.state == EntityState::Hurt && self.hurt.is_running()
    }

    /// Whether the machine is in `Dying` or `Dead`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the machine is `Dead`.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.state == EntityState::Dead
    }

    /// States this machine accepts.
    #[must_use]
    pub fn allowed(&self) -> StateSet {
        self.allowed
    }

    /// Sets how `Dying` completes.
    pub fn set_dying_mode(&mut self, mode: DyingMode) {
        self.dying_mode = mode;
    }

    /// Requests a state change.
    ///
    /// Terminal states are never left through this call and `Dying`/`Dead`
    /// cannot be entered through it either. A state the archetype does not
    /// support falls back to `Idle`. Entering a new state resets the frame
    /// counter and state timer. Returns the resulting state.
    pub fn transition(&mut self, to: EntityState) -> EntityState {
        if self.state.is_terminal() || to.is_terminal() {
            return self.state;
        }
        let target = if self.allowed.contains(to) {
            to
        } else {
            debug!("State {to:?} not supported, falling back to Idle");
            EntityState::Idle
        };
        if target != self.state {
            if self.state == EntityState::Hurt {
                self.hurt.cancel();
            }
            self.enter(target);
        }
        self.state
    }

    /// Restarts the current state's animation from frame 0.
    pub fn restart(&mut self) {
        self.frame = 0;
        self.frame_timer = 0.0;
        self.state_time = 0.0;
    }

    /// Enters `Hurt` for `stun` seconds. Ignored while dying or dead.
    pub fn enter_hurt(&mut self, stun: f32) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.enter(EntityState::Hurt);
        self.hurt.start(stun);
        true
    }

    /// Enters `Dying`. Returns false if already dying or dead.
    pub fn enter_dying(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.hurt.cancel();
        self.enter(EntityState::Dying);
        true
    }

    /// Completes a held `Dying` state.
    pub fn finish_dying(&mut self) -> bool {
        if self.state != EntityState::Dying {
            return false;
        }
        self.enter(EntityState::Dead);
        true
    }

    /// Advances the animation clock and automatic transitions.
    pub fn tick(&mut self, dt: f32, animations: &AnimationSet, recovery: Recovery) -> StateTick {
        let mut result = StateTick::default();
        if self.state == EntityState::Dead {
            return result;
        }
        self.state_time += dt;

        if self.state == EntityState::Hurt && self.hurt.tick(dt) {
            result.hurt_expired = true;
            self.enter(recovery.neutral_state());
            return result;
        }

        let clip = animations.clip(self.state);
        self.frame_timer += dt;
        if self.frame_timer < clip.frame_time {
            return result;
        }
        self.frame_timer = 0.0;

        match self.state {
            EntityState::Dying => {
                if self.frame + 1 < clip.frames {
                    self.frame += 1;
                }
                if self.frame + 1 >= clip.frames && self.dying_mode == DyingMode::Animated {
                    self.enter(EntityState::Dead);
                    result.died = true;
                }
            },
            EntityState::Jump => {
                self.frame = (self.frame + 1).min(clip.frames.saturating_sub(1));
            },
            _ => {
                let next = (self.frame + 1) % clip.frames.max(1);
                result.looped = next < self.frame;
                self.frame = next;
            },
        }
        result
    }

    fn enter(&mut self, state: EntityState) {
        self.state = state;
        self.restart();
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new(StateSet::CORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anims() -> AnimationSet {
        AnimationSet::new(0.1)
            .with_frames(EntityState::Attack, 6)
            .with_frames(EntityState::Dying, 4)
            .with_speed(EntityState::Dying, 0.05)
    }

    #[test]
    fn test_state_set_contains() {
        let set = StateSet::CORE.with(&[EntityState::Attack]);
        assert!(set.contains(EntityState::Attack));
        assert!(set.contains(EntityState::Hurt));
        assert!(!set.contains(EntityState::Cast));
        assert!(StateSet::ALL.contains(EntityState::Run));
    }

    #[test]
    fn test_unsupported_state_falls_back_to_idle() {
        let mut sm = StateMachine::new(StateSet::CORE);
        sm.transition(EntityState::Walk);
        assert_eq!(sm.transition(EntityState::Cast), EntityState::Idle);
    }

    #[test]
    fn test_transition_resets_frame() {
        let mut sm = StateMachine::new(StateSet::ALL);
        let anims = anims();
        sm.transition(EntityState::Attack);
        for _ in 0..3 {
            sm.tick(0.1, &anims, Recovery::default());
        }
        assert!(sm.frame() > 0);
        sm.transition(EntityState::Walk);
        assert_eq!(sm.frame(), 0);
        assert!(sm.state_time().abs() < 0.001);
    }

    #[test]
    fn test_same_state_transition_keeps_frame() {
        let mut sm = StateMachine::new(StateSet::ALL);
        let anims = anims();
        sm.transition(EntityState::Attack);
        sm.tick(0.1, &anims, Recovery::default());
        let frame = sm.frame();
        sm.transition(EntityState::Attack);
        assert_eq!(sm.frame(), frame);
    }

    #[test]
    fn test_looping_clip_reports_loop() {
        let mut sm = StateMachine::new(StateSet::ALL);
        let anims = anims();
        sm.transition(EntityState::Attack);
        let mut looped = false;
        for _ in 0..6 {
            looped |= sm.tick(0.1, &anims, Recovery::default()).looped;
        }
        assert!(looped);
        assert_eq!(sm.frame(), 0);
    }

    #[test]
    fn test_hurt_expires_to_context_state() {
        let anims = anims();

        let mut sm = StateMachine::new(StateSet::ALL);
        sm.enter_hurt(0.25);
        assert!(sm.is_stunned());
        let mut expired = false;
        for _ in 0..3 {
            expired |= sm
                .tick(
                    0.1,
                    &anims,
                    Recovery {
                        on_ground: false,
                        moving: false,
                    },
                )
                .hurt_expired;
        }
        assert!(expired);
        assert_eq!(sm.state(), EntityState::Jump);

        let mut sm = StateMachine::new(StateSet::ALL);
        sm.enter_hurt(0.1);
        sm.tick(
            0.2,
            &anims,
            Recovery {
                on_ground: true,
                moving: true,
            },
        );
        assert_eq!(sm.state(), EntityState::Walk);
    }

    #[test]
    fn test_dying_becomes_dead_after_clip() {
        let mut sm = StateMachine::new(StateSet::ALL);
        let anims = anims();
        assert!(sm.enter_dying());
        assert_eq!(sm.state(), EntityState::Dying);

        let mut died_on = None;
        for step in 1..=10 {
            if sm.tick(0.05, &anims, Recovery::default()).died {
                died_on = Some(step);
                break;
            }
        }
        // 4 frames: three advances reach the last frame
        assert_eq!(died_on, Some(3));
        assert!(sm.is_dead());
    }

    #[test]
    fn test_dying_is_one_way() {
        let mut sm = StateMachine::new(StateSet::ALL);
        sm.enter_dying();
        assert_eq!(sm.transition(EntityState::Idle), EntityState::Dying);
        assert!(!sm.enter_hurt(0.25));
        assert!(!sm.enter_dying());
        assert_eq!(sm.state(), EntityState::Dying);
    }

    #[test]
    fn test_held_dying_waits_for_finish() {
        let mut sm = StateMachine::new(StateSet::ALL);
        let anims = anims();
        sm.set_dying_mode(DyingMode::Held);
        sm.enter_dying();
        for _ in 0..20 {
            assert!(!sm.tick(0.05, &anims, Recovery::default()).died);
        }
        assert_eq!(sm.state(), EntityState::Dying);
        assert!(sm.finish_dying());
        assert!(sm.is_dead());
        assert!(!sm.finish_dying());
    }

    #[test]
    fn test_missing_clip_is_synthesized() {
        let anims = AnimationSet::new(0.11);
        let clip = anims.clip(EntityState::Attack);
        assert!(clip.synthesized);
        assert_eq!(clip.frames, FALLBACK_FRAMES);
        assert!(!anims.has_clip(EntityState::Attack));
    }

    #[test]
    fn test_jump_clamps_on_last_frame() {
        let anims = AnimationSet::new(0.1).with_frames(EntityState::Jump, 3);
        let mut sm = StateMachine::new(StateSet::ALL);
        sm.transition(EntityState::Jump);
        for _ in 0..10 {
            sm.tick(0.1, &anims, Recovery::default());
        }
        assert_eq!(sm.frame(), 2);
    }
}
