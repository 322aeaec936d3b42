//! Project Arc - headless level runner
//!
//! Usage: `project-arc [LEVEL.json] [SECONDS]`
//!
//! Runs a level at the fixed timestep with a sweeping player turret at the
//! origin and logs every level transition and kill. Without a path the
//! bundled skirmish level is used.

use std::process::ExitCode;

use glam::{Quat, Vec3};

use project_arc::config::{EntityPrototype, LevelConfig, WeaponSlotSpec};
use project_arc::consts::*;
use project_arc::sim::{Arena, SimEvent, Simulation, Transform, Weapon};

/// Half width of the corridor the level is played in
const ARENA_HALF_WIDTH: f32 = 12.0;
/// Default run length (seconds)
const DEFAULT_RUN_SECONDS: f32 = 90.0;
/// Turret sweep half-angle (radians) and rate (rad/s)
const TURRET_SWEEP: f32 = 0.35;
const TURRET_SWEEP_RATE: f32 = 1.3;

#[cfg(not(target_arch = "wasm32"))]
fn main() -> ExitCode {
    env_logger::init();
    log::info!("Project Arc (headless) starting...");

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match LevelConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => LevelConfig::demo(),
    };
    let seconds = args
        .next()
        .and_then(|s| s.parse::<f32>().ok())
        .unwrap_or(DEFAULT_RUN_SECONDS);

    run(config, seconds);
    ExitCode::SUCCESS
}

#[cfg(target_arch = "wasm32")]
fn main() {}

/// Weapon for the player turret: the first projectile prototype named like
/// a player shot, else the first projectile in the theme
fn player_weapon(config: &LevelConfig) -> Option<Weapon> {
    let projectiles: Vec<_> = config
        .theme
        .prototypes
        .iter()
        .filter_map(|p| match p {
            EntityPrototype::Projectile(p) => Some(p),
            _ => None,
        })
        .collect();
    let bolt = projectiles
        .iter()
        .find(|p| p.name.contains("player"))
        .or_else(|| projectiles.first())?;
    Some(Weapon::new(
        &[WeaponSlotSpec {
            projectile: bolt.id,
            fire_rate: 4.0,
            ..Default::default()
        }],
        false,
    ))
}

fn run(config: LevelConfig, seconds: f32) {
    let mut weapon = player_weapon(&config);
    if weapon.is_none() {
        log::warn!("Theme has no projectile prototype; the turret stays silent");
    }

    let mut sim = Simulation::new(config, Arena::corridor(ARENA_HALF_WIDTH));
    let ticks = (seconds / SIM_DT).ceil() as u64;
    let mut kills = 0u32;
    let mut escapes = 0u32;

    for _ in 0..ticks {
        sim.advance(SIM_DT);

        if let Some(weapon) = weapon.as_mut() {
            weapon.cool_down(SIM_DT);
            let t = sim.time_ticks as f32 * SIM_DT;
            let yaw = (t * TURRET_SWEEP_RATE).sin() * TURRET_SWEEP;
            let turret = Transform::new(Vec3::ZERO, Quat::from_rotation_y(yaw));
            sim.fire_player_weapon(weapon, &turret);
        }

        for event in sim.drain_events() {
            match event {
                SimEvent::Level(t) => {
                    log::info!("{} -> {} at {:.1}s", t.from.name(), t.to.name(), t.elapsed)
                }
                SimEvent::EnemyKilled { id, score, .. } => {
                    kills += 1;
                    log::info!("Enemy {} destroyed (+{}), score {}", id, score, sim.score);
                }
                SimEvent::EnemyEscaped { id, .. } => {
                    escapes += 1;
                    log::info!("Enemy {} escaped", id);
                }
                other => log::trace!("{:?}", other),
            }
        }

        if sim.state().is_finished() {
            break;
        }
    }

    log::info!(
        "Finished in state {} after {:.1}s of play: score {}, {} kills, {} escapes, {} instances live",
        sim.state().name(),
        sim.elapsed(),
        sim.score,
        kills,
        escapes,
        sim.pool.live_count()
    );
}
