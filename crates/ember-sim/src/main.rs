//! # Ember Sim
//!
//! Headless driver for the Project Ember combat core.
//!
//! Loads a simulation config (and any archetype tables it points at), builds
//! a small arena level, starts the encounter and lets a scripted pilot fight
//! it at a fixed 120 Hz step:
//! - `ember-sim [config.toml] [max_ticks]`
//! - `RUST_LOG` overrides the default `info` filter

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod pilot;

use anyhow::{Context, Result};
use ember_combat::{
    ArchetypeRegistry, ArenaPhase, AudioDispatcher, ChannelAudio, CombatEvent, SimConfig, SolidGeometry, World,
    PLAYER_ARCHETYPE,
};
use ember_common::Rect;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::pilot::{Pilot, PilotTimings};

/// Fixed simulation step.
const TICK_RATE: u32 = 120;
/// Two minutes of simulated time.
const DEFAULT_MAX_TICKS: u64 = 120 * 120;
/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "ember_sim=info,ember_combat=info";

/// Main entry point.
fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next();
    let max_ticks = match args.next() {
        Some(raw) => raw.parse::<u64>().with_context(|| format!("invalid tick count {raw:?}"))?,
        None => DEFAULT_MAX_TICKS,
    };

    // Config warnings are emitted before the configured subscriber exists.
    let config = tracing::subscriber::with_default(fmt().with_env_filter(filter()).finish(), || {
        config_path.as_deref().map_or_else(SimConfig::default, SimConfig::load_from)
    });
    init_tracing(config.log_json);

    info!("Project Ember sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    run(config, max_ticks);

    info!("Project Ember sim finished");
    Ok(())
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn init_tracing(json: bool) {
    let (plain, structured) = if json {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };
    tracing_subscriber::registry()
        .with(plain)
        .with(structured)
        .with(filter())
        .init();
}

/// Floor with two ledges on either side of the arena center.
fn arena_level(config: &SimConfig) -> SolidGeometry {
    let center = config.arena.spawn_center;
    SolidGeometry::from_rects([
        Rect::new(center.x - 3000.0, center.y, 6000.0, 200.0),
        Rect::new(center.x - 900.0, center.y - 400.0, 400.0, 40.0),
        Rect::new(center.x + 500.0, center.y - 400.0, 400.0, 40.0),
    ])
}

#[derive(Debug, Default)]
struct Summary {
    ticks: u64,
    hits: usize,
    damage_dealt: f32,
    deaths: usize,
    events: usize,
    cues: usize,
}

fn run(config: SimConfig, max_ticks: u64) {
    let dt = 1.0 / TICK_RATE as f32;
    let geometry = arena_level(&config);
    let (sink, cues) = ChannelAudio::new(256);
    let audio = AudioDispatcher::new(Box::new(sink), config.audio.clone());

    let mut registry = ArchetypeRegistry::with_defaults();
    if let Some(dir) = &config.archetype_dir {
        match registry.load_dir(dir) {
            Ok(count) => info!("Layered {count} archetypes from {}", dir.display()),
            Err(e) => warn!("Failed to load archetypes from {}: {e}", dir.display()),
        }
    }

    let mut world = World::new(config, registry, geometry, audio);
    let spawned = world.start_arena();
    info!("Arena started with {spawned} enemies");

    let mut pilot = Pilot::new(PilotTimings::default());
    let mut summary = Summary::default();

    while summary.ticks < max_ticks {
        let intent = pilot.intent(&world, dt);
        let report = world.tick(dt, &intent);
        summary.ticks += 1;
        summary.hits += report.hits.len();
        summary.damage_dealt += report.hits.iter().map(|hit| hit.outcome.dealt()).sum::<f32>();
        summary.deaths += report.deaths.len();
        summary.cues += cues.try_iter().count();

        for event in world.drain_events() {
            summary.events += 1;
            match event {
                CombatEvent::EntityDied { archetype, .. } if archetype == PLAYER_ARCHETYPE => {
                    warn!("Player died at t={:.2}s", world.now());
                },
                CombatEvent::EntityDied { archetype, .. } => info!("{archetype} defeated"),
                CombatEvent::ArenaPhaseChanged { to, .. } => info!("Arena phase: {to:?}"),
                other => debug!("{other:?}"),
            }
        }

        if world.phase() == ArenaPhase::Completed {
            info!("Arena cleared after {} ticks", summary.ticks);
            break;
        }
        if world.player().is_dead() {
            info!("Run ended with the player down");
            break;
        }
    }

    info!(
        "Summary: {} ticks, {} hits for {:.0} damage, {} deaths, {} events, {} sound cues, phase {:?}",
        summary.ticks,
        summary.hits,
        summary.damage_dealt,
        summary.deaths,
        summary.events,
        summary.cues,
        world.phase()
    );
}
