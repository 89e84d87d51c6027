//! Simulation driver.
//!
//! [`World`] owns the player, the live enemies, the level geometry and the
//! injected collaborators, and advances everything by one fixed `dt` per
//! [`World::tick`]:
//!
//! 1. clock, then the player (input, abilities, physics)
//! 2. enemies inside the activity window; the rest stay frozen, cooldowns
//!    included
//! 3. queued enemy effects on the player, through the resolver
//! 4. projectile and area hits for every ability
//! 5. arena progress
//! 6. pruning of `Dead` enemies

use std::iter;

use ember_common::{EntityId, Rect};
use glam::Vec2;
use tracing::{debug, info};

use crate::ability::area::detonate_at;
use crate::arena::{Arena, ArenaPhase};
use crate::audio::{AudioDispatcher, SoundCue};
use crate::behavior::{Outbox, TargetView, TickContext};
use crate::config::SimConfig;
use crate::damage::HitTarget;
use crate::entity::Entity;
use crate::events::{CombatEvent, EventBus};
use crate::input::Intent;
use crate::physics::SolidGeometry;
use crate::projectile::HitRecord;
use crate::registry::{ArchetypeRegistry, PLAYER_ARCHETYPE};
use crate::rng::SimRng;
use crate::view::{EntityView, ProjectileView};

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Resolved hits, including rejected ones
    pub hits: Vec<HitRecord>,
    /// Entities that reached `Dead` this tick
    pub deaths: Vec<EntityId>,
    /// Enemies updated this tick
    pub active_enemies: usize,
    /// Enemies outside the activity window
    pub frozen_enemies: usize,
}

/// The combat simulation.
#[derive(Debug)]
pub struct World {
    config: SimConfig,
    registry: ArchetypeRegistry,
    geometry: SolidGeometry,
    audio: AudioDispatcher,
    bus: EventBus,
    rng: SimRng,
    arena: Arena,
    player: Entity,
    player_death_reported: bool,
    enemies: Vec<Entity>,
    outbox: Outbox,
    now: f64,
}

impl World {
    /// Creates a world and spawns the player at the configured spawn point.
    ///
    /// The player archetype is rebuilt from `config.player`; frame counts
    /// already registered for it are kept.
    #[must_use]
    pub fn new(
        mut config: SimConfig,
        mut registry: ArchetypeRegistry,
        geometry: SolidGeometry,
        audio: AudioDispatcher,
    ) -> Self {
        config.validate();
        let mut player_def = config.player.archetype(&config.physics);
        if let Some(existing) = registry.get(PLAYER_ARCHETYPE) {
            player_def.animation.frame_counts = existing.animation.frame_counts.clone();
        }
        registry.replace(player_def);

        let player = registry.spawn(PLAYER_ARCHETYPE, config.player.spawn);
        let bus = EventBus::new(config.event_bus_capacity);
        bus.publish(CombatEvent::Spawned {
            entity_id: player.id(),
            archetype: PLAYER_ARCHETYPE.to_string(),
        });
        info!(
            "World created: {} platforms, {} archetypes, seed {}",
            geometry.len(),
            registry.len(),
            config.seed
        );

        Self {
            rng: SimRng::new(config.seed),
            arena: Arena::new(config.arena.clone()),
            config,
            registry,
            geometry,
            audio,
            bus,
            player,
            player_death_reported: false,
            enemies: Vec::new(),
            outbox: Outbox::new(),
            now: 0.0,
        }
    }

    /// Simulation clock in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Archetype registry.
    #[must_use]
    pub fn registry(&self) -> &ArchetypeRegistry {
        &self.registry
    }

    /// Level geometry.
    #[must_use]
    pub fn geometry(&self) -> &SolidGeometry {
        &self.geometry
    }

    /// The player.
    #[must_use]
    pub fn player(&self) -> &Entity {
        &self.player
    }

    /// The player, mutably.
    pub fn player_mut(&mut self) -> &mut Entity {
        &mut self.player
    }

    /// Live enemies.
    #[must_use]
    pub fn enemies(&self) -> &[Entity] {
        &self.enemies
    }

    /// Looks up a live enemy.
    #[must_use]
    pub fn enemy(&self, id: EntityId) -> Option<&Entity> {
        self.enemies.iter().find(|e| e.id() == id)
    }

    /// Looks up a live enemy, mutably.
    pub fn enemy_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.enemies.iter_mut().find(|e| e.id() == id)
    }

    /// Arena encounter.
    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Current arena phase.
    #[must_use]
    pub fn phase(&self) -> ArenaPhase {
        self.arena.phase()
    }

    /// Event bus for presentation-layer subscribers.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Drains pending events.
    pub fn drain_events(&self) -> Vec<CombatEvent> {
        self.bus.drain()
    }

    /// Activity window: the player's hitbox grown by the configured margin.
    #[must_use]
    pub fn activity_window(&self) -> Rect {
        self.player.rect().expanded(self.config.activity_margin)
    }

    /// Spawns an enemy. Unknown ids spawn a generic patroller.
    pub fn spawn(&mut self, archetype: &str, foot: Vec2) -> EntityId {
        let entity = self.registry.spawn(archetype, foot);
        let id = entity.id();
        info!("Spawned {} '{archetype}' as {id} at ({:.0}, {:.0})", entity.kind(), foot.x, foot.y);
        self.bus.publish(CombatEvent::Spawned {
            entity_id: id,
            archetype: archetype.to_string(),
        });
        self.enemies.push(entity);
        id
    }

    /// Replaces the player with a fresh one at the configured spawn point.
    pub fn respawn_player(&mut self) -> EntityId {
        self.player = self.registry.spawn(PLAYER_ARCHETYPE, self.config.player.spawn);
        self.player_death_reported = false;
        let id = self.player.id();
        info!("Player respawned as {id}");
        self.bus.publish(CombatEvent::Spawned {
            entity_id: id,
            archetype: PLAYER_ARCHETYPE.to_string(),
        });
        id
    }

    /// Starts the arena encounter. Returns the number of enemies spawned.
    pub fn start_arena(&mut self) -> usize {
        let requests = self.arena.start(&mut self.rng);
        let count = requests.len();
        for request in requests {
            let id = self.spawn(&request.archetype, request.foot);
            self.arena.track(id, request.boss);
        }
        self.publish_phase_changes();
        count
    }

    /// Advances the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32, intent: &Intent) -> TickReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.now += f64::from(dt);
        let mut report = TickReport::default();

        // Player
        let solids = self.geometry.nearby(&self.activity_window());
        {
            let mut ctx = TickContext {
                dt,
                now: self.now,
                solids: &solids,
                physics: &self.config.physics,
                target: None,
                intent,
                rng: &mut self.rng,
                outbox: &mut self.outbox,
            };
            self.player.update(&mut ctx);
        }

        // Enemies inside the activity window
        let window = self.activity_window();
        let solids = self.geometry.nearby(&window);
        let target = (!self.player.is_terminal()).then(|| TargetView {
            id: self.player.id(),
            rect: self.player.rect(),
        });
        let idle = Intent::idle();
        let mut active = Vec::with_capacity(self.enemies.len());
        for enemy in &mut self.enemies {
            let awake = enemy.rect().overlaps(&window);
            active.push(awake);
            if !awake {
                enemy.core_mut().pause_abilities(dt);
                continue;
            }
            let mut ctx = TickContext {
                dt,
                now: self.now,
                solids: &solids,
                physics: &self.config.physics,
                target,
                intent: &idle,
                rng: &mut self.rng,
                outbox: &mut self.outbox,
            };
            enemy.update(&mut ctx);
        }
        report.active_enemies = active.iter().filter(|awake| **awake).count();
        report.frozen_enemies = active.len() - report.active_enemies;

        // Queued effects on the player
        let player_id = self.player.id();
        for hit in std::mem::take(&mut self.outbox.hits) {
            let outcome = self.player.receive_hit(&hit);
            if outcome.dealt() > 0.0 {
                report.hits.push(HitRecord {
                    source: hit.source.unwrap_or(EntityId::NULL),
                    target: player_id,
                    outcome,
                    position: self.player.core().center(),
                });
            }
        }
        for blast in std::mem::take(&mut self.outbox.blasts) {
            let records = detonate_at(
                blast.source,
                blast.center,
                blast.radius,
                blast.damage,
                blast.min_falloff,
                std::slice::from_mut(&mut self.player),
                |hit, offset| match blast.knockback {
                    Some(knockback) => {
                        let away = if offset.x < 0.0 { -knockback.x } else { knockback.x };
                        hit.with_knockback(Vec2::new(away, knockback.y))
                    },
                    None => hit,
                },
            );
            report.hits.extend(records);
        }

        // Projectiles and area effects
        {
            let mut targets: Vec<&mut Entity> = self
                .enemies
                .iter_mut()
                .zip(&active)
                .filter(|(_, awake)| **awake)
                .map(|(enemy, _)| enemy)
                .collect();
            let core = self.player.core_mut();
            let mut ids: Vec<String> = core.abilities.keys().cloned().collect();
            ids.sort_unstable();
            for id in ids {
                if let Some(ability) = core.abilities.get_mut(&id) {
                    report.hits.extend(ability.handle_collisions(player_id, &mut targets));
                }
            }
        }
        for (enemy, awake) in self.enemies.iter_mut().zip(&active) {
            if !*awake {
                continue;
            }
            let source = enemy.id();
            for ability in enemy.core_mut().abilities.values_mut() {
                report
                    .hits
                    .extend(ability.handle_collisions(source, std::slice::from_mut(&mut self.player)));
            }
        }
        self.collect_notices();

        // Arena
        let player = (!self.player.is_terminal())
            .then(|| (self.player.rect(), self.player.core().body.facing_right));
        let enemies = &self.enemies;
        let request = self.arena.update(
            |id| enemies.iter().any(|e| e.id() == id && !e.is_dead()),
            player,
            &self.geometry,
        );
        if let Some(request) = request {
            let id = self.spawn(&request.archetype, request.foot);
            self.arena.track(id, request.boss);
        }
        self.publish_phase_changes();

        // Prune
        let mut died = Vec::new();
        self.enemies.retain(|enemy| {
            if enemy.is_dead() {
                died.push((enemy.id(), enemy.core().archetype.clone()));
                false
            } else {
                true
            }
        });
        for (entity_id, archetype) in died {
            debug!("{entity_id} ({archetype}) removed");
            report.deaths.push(entity_id);
            self.outbox.event(CombatEvent::EntityDied { entity_id, archetype });
        }
        if self.player.is_dead() && !self.player_death_reported {
            self.player_death_reported = true;
            info!("Player {player_id} died");
            report.deaths.push(player_id);
            self.outbox.event(CombatEvent::EntityDied {
                entity_id: player_id,
                archetype: PLAYER_ARCHETYPE.to_string(),
            });
        }

        self.flush();
        report
    }

    /// Snapshots of the player and every live enemy.
    #[must_use]
    pub fn views(&self) -> Vec<EntityView> {
        iter::once(&self.player).chain(&self.enemies).map(Entity::view).collect()
    }

    /// Snapshots of every projectile in flight.
    #[must_use]
    pub fn projectile_views(&self) -> Vec<ProjectileView> {
        iter::once(&self.player)
            .chain(&self.enemies)
            .flat_map(|entity| entity.core().abilities.values())
            .filter_map(|ability| ability.projectiles())
            .flat_map(|pool| pool.as_slice().iter().map(ProjectileView::from))
            .collect()
    }

    /// Moves events raised during damage into the outbox, with their cues.
    fn collect_notices(&mut self) {
        for event in self.player.drain_notices() {
            if matches!(event, CombatEvent::HitLanded { amount, .. } if amount > 0.0) {
                self.outbox.cue(SoundCue::Hurt);
            }
            self.outbox.event(event);
        }
        for enemy in &mut self.enemies {
            for event in enemy.drain_notices() {
                if matches!(event, CombatEvent::EntityDying { .. }) {
                    self.outbox.cue(SoundCue::EnemyDeath);
                }
                self.outbox.event(event);
            }
        }
    }

    fn publish_phase_changes(&mut self) {
        for (from, to) in self.arena.take_changes() {
            self.outbox.event(CombatEvent::ArenaPhaseChanged { from, to });
        }
        self.flush();
    }

    /// Publishes queued events and plays queued cues.
    fn flush(&mut self) {
        for event in self.outbox.events.drain(..) {
            self.bus.publish(event);
        }
        for cue in self.outbox.cues.drain(..) {
            self.audio.notify(cue, self.now);
        }
        self.audio.cleanup(self.now);
    }
}
