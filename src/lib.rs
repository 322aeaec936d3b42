//! Project Arc - simulation core of an arcade shooter
//!
//! Core modules:
//! - `sim`: Deterministic simulation (entity pool, projectiles, waves, level state)
//! - `config`: Data-driven level, theme and prototype records

pub mod config;
pub mod sim;

pub use config::{ConfigError, LevelConfig};
pub use sim::{LevelState, Simulation};

use glam::{Quat, Vec3};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest frame delta the accumulator will accept
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Size of a pool created on demand by `spawn`
    pub const AUTO_POOL_SIZE: usize = 5;
    /// Pre-warm sizes used when a theme is loaded
    pub const ENEMY_PREWARM: usize = 10;
    pub const PROJECTILE_PREWARM: usize = 40;
    pub const EFFECT_PREWARM: usize = 20;

    /// Intro dwell before waves start (seconds)
    pub const INTRO_DURATION: f32 = 1.0;

    /// Distance a ricocheting projectile is pushed off the surface
    pub const RICOCHET_SURFACE_OFFSET: f32 = 0.1;
    /// Extra distance added to the backward ricochet cast
    pub const RICOCHET_BACKTRACK_PADDING: f32 = 1.0;

    /// Projectile defaults
    pub const PROJECTILE_SPEED: f32 = 20.0;
    pub const PROJECTILE_LIFETIME: f32 = 3.0;
    pub const PROJECTILE_RADIUS: f32 = 0.25;

    /// Enemy defaults
    pub const ENEMY_HEALTH: f32 = 10.0;
    pub const ENEMY_SPEED: f32 = 3.0;
    pub const ENEMY_DESPAWN_LIMIT: f32 = -20.0;
    pub const ENEMY_RADIUS: f32 = 0.75;

    /// Effect default duration (seconds)
    pub const EFFECT_DURATION: f32 = 2.0;
}

/// Reflect a vector off a surface with the given unit normal
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect(v: Vec3, normal: Vec3) -> Vec3 {
    v - 2.0 * v.dot(normal) * normal
}

/// Orientation whose forward (+Z) axis points along `direction`
///
/// A zero direction keeps the identity rotation.
#[inline]
pub fn look_rotation(direction: Vec3) -> Quat {
    match direction.try_normalize() {
        Some(dir) => Quat::from_rotation_arc(Vec3::Z, dir),
        None => Quat::IDENTITY,
    }
}
