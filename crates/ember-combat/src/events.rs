//! Combat event bus for presentation-layer subscribers.

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use ember_common::EntityId;

use crate::arena::ArenaPhase;
use crate::damage::DamageOutcome;
use crate::state::EntityState;

/// Event types published by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Entity spawned
    Spawned {
        /// Entity ID
        entity_id: EntityId,
        /// Archetype id
        archetype: String,
    },
    /// Entity changed behavioral state
    StateChanged {
        /// Entity ID
        entity_id: EntityId,
        /// Previous state
        from: EntityState,
        /// New state
        to: EntityState,
    },
    /// Ability used or released
    AbilityUsed {
        /// Entity ID
        entity_id: EntityId,
        /// Ability id
        ability: String,
    },
    /// Melee attack swing started
    AttackStarted {
        /// Entity ID
        entity_id: EntityId,
    },
    /// Projectile launched
    ProjectileSpawned {
        /// Owner
        owner: EntityId,
        /// Ability id
        ability: String,
    },
    /// Damage resolved
    HitLanded {
        /// Entity hit
        target: EntityId,
        /// Responsible entity (if any)
        source: Option<EntityId>,
        /// Health removed
        amount: f32,
        /// Resolver outcome
        outcome: DamageOutcome,
    },
    /// Entity entered `Dying`
    EntityDying {
        /// Entity ID
        entity_id: EntityId,
    },
    /// Entity reached `Dead` and left the live set
    EntityDied {
        /// Entity ID
        entity_id: EntityId,
        /// Archetype id
        archetype: String,
    },
    /// Boss entered rage mode
    RageActivated {
        /// Boss ID
        entity_id: EntityId,
    },
    /// Entity teleported
    Teleported {
        /// Entity ID
        entity_id: EntityId,
        /// Origin
        from: Vec2,
        /// Destination
        to: Vec2,
    },
    /// Self-destruct or area detonation
    Exploded {
        /// Entity ID
        entity_id: EntityId,
        /// Blast center
        center: Vec2,
        /// Blast radius
        radius: f32,
    },
    /// Arena encounter advanced
    ArenaPhaseChanged {
        /// Previous phase
        from: ArenaPhase,
        /// New phase
        to: ArenaPhase,
    },
}

impl CombatEvent {
    /// Entity the event is mainly about, if any.
    #[must_use]
    pub fn subject(&self) -> Option<EntityId> {
        match self {
            Self::Spawned { entity_id, .. }
            | Self::StateChanged { entity_id, .. }
            | Self::AbilityUsed { entity_id, .. }
            | Self::AttackStarted { entity_id }
            | Self::EntityDying { entity_id }
            | Self::EntityDied { entity_id, .. }
            | Self::RageActivated { entity_id }
            | Self::Teleported { entity_id, .. }
            | Self::Exploded { entity_id, .. } => Some(*entity_id),
            Self::ProjectileSpawned { owner, .. } => Some(*owner),
            Self::HitLanded { target, .. } => Some(*target),
            Self::ArenaPhaseChanged { .. } => None,
        }
    }
}

/// Event bus for broadcasting combat events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<CombatEvent>,
    /// Receiver for collecting events
    receiver: Receiver<CombatEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event. Never blocks; the event is dropped when the bus is full.
    pub fn publish(&self, event: CombatEvent) {
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<CombatEvent> {
        self.sender.clone()
    }
}

/// Typed event handler trait.
pub trait EventHandler: Send + Sync {
    /// Handles an event.
    fn handle(&self, event: &CombatEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        deaths: AtomicUsize,
    }

    impl EventHandler for CountingHandler {
        fn handle(&self, event: &CombatEvent) {
            if matches!(event, CombatEvent::EntityDied { .. }) {
                self.deaths.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(8);
        let id = EntityId::new();
        bus.publish(CombatEvent::RageActivated { entity_id: id });
        bus.publish(CombatEvent::EntityDying { entity_id: id });
        assert_eq!(bus.pending_count(), 2);
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].subject(), Some(id));
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops_without_blocking() {
        let bus = EventBus::new(2);
        for _ in 0..5 {
            bus.publish(CombatEvent::AttackStarted {
                entity_id: EntityId::new(),
            });
        }
        assert_eq!(bus.pending_count(), 2);
        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_handler_dispatch() {
        let bus = EventBus::default();
        let sender = bus.sender();
        let _ = sender.try_send(CombatEvent::EntityDied {
            entity_id: EntityId::new(),
            archetype: "Golem_02".to_string(),
        });
        let handler = CountingHandler {
            deaths: AtomicUsize::new(0),
        };
        for event in bus.drain() {
            handler.handle(&event);
        }
        assert_eq!(handler.deaths.load(Ordering::Relaxed), 1);
    }
}
