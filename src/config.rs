//! Level configuration records
//!
//! Themes, prototypes and level scripts are loaded once before a level starts
//! and are read-only afterwards. Values are sanitized at load time so the
//! simulation never has to clamp them per tick.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;
use crate::sim::pool::{PoolCategory, Prototype, PrototypeId};

/// Errors raised while loading a level config
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read level config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse level config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("prototype id {0} is defined more than once")]
    DuplicatePrototype(PrototypeId),
}

/// One fire point of a weapon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponSlotSpec {
    /// Projectile prototype fired from this slot
    pub projectile: PrototypeId,
    /// Fire point relative to the owner
    pub offset: Vec3,
    /// Fire direction in the owner's local space
    pub direction: Vec3,
    /// Shots per second
    pub fire_rate: f32,
    pub damage_multiplier: f32,
    pub speed_multiplier: f32,
}

impl Default for WeaponSlotSpec {
    fn default() -> Self {
        Self {
            projectile: PrototypeId(0),
            offset: Vec3::ZERO,
            direction: Vec3::Z,
            fire_rate: 0.5,
            damage_multiplier: 1.0,
            speed_multiplier: 1.0,
        }
    }
}

impl WeaponSlotSpec {
    fn sanitize(&mut self, owner: &str) {
        if self.fire_rate.is_nan() || self.fire_rate < 0.0 {
            log::warn!("{}: negative fire rate; slot disabled", owner);
            self.fire_rate = 0.0;
        }
        if self.direction.try_normalize().is_none() {
            log::warn!("{}: zero fire direction; using +Z", owner);
            self.direction = Vec3::Z;
        }
        self.damage_multiplier = non_negative(self.damage_multiplier, owner, "damage_multiplier");
        self.speed_multiplier = non_negative(self.speed_multiplier, owner, "speed_multiplier");
    }
}

/// Enemy template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyPrototype {
    pub id: PrototypeId,
    pub name: String,
    pub max_health: f32,
    /// Score awarded when destroyed
    pub score_value: u64,
    pub move_speed: f32,
    pub move_direction: Vec3,
    /// Recycled once its z coordinate drops below this
    pub despawn_limit: f32,
    pub radius: f32,
    pub death_effect: Option<PrototypeId>,
    pub weapons: Vec<WeaponSlotSpec>,
    pub auto_fire: bool,
}

impl Default for EnemyPrototype {
    fn default() -> Self {
        Self {
            id: PrototypeId(0),
            name: String::new(),
            max_health: ENEMY_HEALTH,
            score_value: 100,
            move_speed: ENEMY_SPEED,
            move_direction: Vec3::NEG_Z,
            despawn_limit: ENEMY_DESPAWN_LIMIT,
            radius: ENEMY_RADIUS,
            death_effect: None,
            weapons: Vec::new(),
            auto_fire: true,
        }
    }
}

/// Projectile template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectilePrototype {
    pub id: PrototypeId,
    pub name: String,
    pub speed: f32,
    /// Seconds before a silent despawn
    pub lifetime: f32,
    pub damage_power: f32,
    pub max_durability: f32,
    pub max_bounces: u32,
    /// Speed multiplier per ricochet, in [0, 1]
    pub bounce_speed_decay: f32,
    /// Damage multiplier per ricochet, in [0, 1]
    pub bounce_damage_decay: f32,
    pub radius: f32,
    /// Played when the projectile is destroyed by a hit
    pub hit_effect: Option<PrototypeId>,
    /// Played on ricochets and survived hits
    pub bounce_effect: Option<PrototypeId>,
}

impl Default for ProjectilePrototype {
    fn default() -> Self {
        Self {
            id: PrototypeId(0),
            name: String::new(),
            speed: PROJECTILE_SPEED,
            lifetime: PROJECTILE_LIFETIME,
            damage_power: 1.0,
            max_durability: 1.0,
            max_bounces: 0,
            bounce_speed_decay: 0.9,
            bounce_damage_decay: 0.8,
            radius: PROJECTILE_RADIUS,
            hit_effect: None,
            bounce_effect: None,
        }
    }
}

/// Visual effect template; returns itself to the pool after `duration`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectPrototype {
    pub id: PrototypeId,
    pub name: String,
    pub duration: f32,
}

impl Default for EffectPrototype {
    fn default() -> Self {
        Self {
            id: PrototypeId(0),
            name: String::new(),
            duration: EFFECT_DURATION,
        }
    }
}

/// Any spawnable template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityPrototype {
    Enemy(EnemyPrototype),
    Projectile(ProjectilePrototype),
    Effect(EffectPrototype),
}

impl Prototype for EntityPrototype {
    fn id(&self) -> PrototypeId {
        match self {
            EntityPrototype::Enemy(p) => p.id,
            EntityPrototype::Projectile(p) => p.id,
            EntityPrototype::Effect(p) => p.id,
        }
    }

    fn category(&self) -> PoolCategory {
        match self {
            EntityPrototype::Enemy(_) => PoolCategory::Enemy,
            EntityPrototype::Projectile(_) => PoolCategory::Projectile,
            EntityPrototype::Effect(_) => PoolCategory::Effect,
        }
    }

    fn name(&self) -> &str {
        match self {
            EntityPrototype::Enemy(p) => &p.name,
            EntityPrototype::Projectile(p) => &p.name,
            EntityPrototype::Effect(p) => &p.name,
        }
    }
}

impl EntityPrototype {
    /// Clamp out-of-range values, reporting each fix
    pub fn sanitize(&mut self) {
        let label = format!("{} '{}'", self.id(), self.name());
        match self {
            EntityPrototype::Enemy(p) => {
                p.max_health = non_negative(p.max_health, &label, "max_health");
                p.move_speed = non_negative(p.move_speed, &label, "move_speed");
                p.radius = non_negative(p.radius, &label, "radius");
                for slot in &mut p.weapons {
                    slot.sanitize(&label);
                }
            }
            EntityPrototype::Projectile(p) => {
                p.speed = non_negative(p.speed, &label, "speed");
                p.lifetime = non_negative(p.lifetime, &label, "lifetime");
                p.damage_power = non_negative(p.damage_power, &label, "damage_power");
                p.max_durability = non_negative(p.max_durability, &label, "max_durability");
                p.radius = non_negative(p.radius, &label, "radius");
                p.bounce_speed_decay = unit_interval(p.bounce_speed_decay, &label, "bounce_speed_decay");
                p.bounce_damage_decay =
                    unit_interval(p.bounce_damage_decay, &label, "bounce_damage_decay");
            }
            EntityPrototype::Effect(p) => {
                p.duration = non_negative(p.duration, &label, "duration");
            }
        }
    }
}

fn non_negative(value: f32, owner: &str, field: &str) -> f32 {
    if value.is_nan() || value < 0.0 {
        log::warn!("{}: {} = {} clamped to 0", owner, field, value);
        0.0
    } else {
        value
    }
}

fn unit_interval(value: f32, owner: &str, field: &str) -> f32 {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        let clamped = if value.is_nan() { 1.0 } else { value.clamp(0.0, 1.0) };
        log::warn!("{}: {} = {} clamped to {}", owner, field, value, clamped);
        clamped
    } else {
        value
    }
}

/// Environment parameters forwarded to the renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub skybox: Option<String>,
    /// Linear RGBA
    pub fog_color: [f32; 4],
    pub fog_density: f32,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            skybox: None,
            fog_color: [0.0, 0.0, 0.0, 1.0],
            fog_density: 0.01,
        }
    }
}

/// Prototype set and environment of one level's look and feel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelTheme {
    pub name: String,
    pub environment: Environment,
    pub prototypes: Vec<EntityPrototype>,
}

/// One scripted burst of enemy spawns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveSpec {
    pub name: String,
    pub enemy: PrototypeId,
    pub count: u32,
    pub spawn_interval: f32,
    pub base_offset: Vec3,
    /// Full extent of the placement jitter; samples fall in ±range/2
    pub random_range: Vec3,
    pub post_wave_wait: f32,
}

impl Default for WaveSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            enemy: PrototypeId(0),
            count: 5,
            spawn_interval: 1.0,
            base_offset: Vec3::ZERO,
            random_range: Vec3::new(10.0, 0.0, 0.0),
            post_wave_wait: 3.0,
        }
    }
}

impl WaveSpec {
    /// Time from the wave's first spawn to the next wave's start
    pub fn duration(&self) -> f32 {
        let spawning = self.count.saturating_sub(1) as f32 * self.spawn_interval;
        spawning + self.post_wave_wait
    }

    fn sanitize(&mut self, index: usize) {
        let label = format!("wave {} '{}'", index + 1, self.name);
        self.spawn_interval = non_negative(self.spawn_interval, &label, "spawn_interval");
        self.post_wave_wait = non_negative(self.post_wave_wait, &label, "post_wave_wait");
        self.random_range = self.random_range.abs();
    }
}

/// How a level is won
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WinCondition {
    /// Every wave has been sequenced
    #[default]
    ClearAllWaves,
    /// Playing time reaches `seconds`
    SurvivalTime { seconds: f32 },
    /// Score reaches `score`; needs a score signal
    ScoreTarget { score: u64 },
}

/// Ordered waves plus the rules that end the level
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelScript {
    pub waves: Vec<WaveSpec>,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub win_condition: WinCondition,
    /// `ClearAllWaves` additionally waits for every spawned enemy to be gone
    pub require_clear_arena: bool,
    /// Intro dwell before the first wave (seconds)
    pub intro_duration: f32,
}

impl Default for LevelScript {
    fn default() -> Self {
        Self {
            waves: Vec::new(),
            looping: false,
            win_condition: WinCondition::ClearAllWaves,
            require_clear_arena: false,
            intro_duration: INTRO_DURATION,
        }
    }
}

impl LevelScript {
    /// Length of one full pass over the waves
    pub fn cycle_duration(&self) -> f32 {
        self.waves.iter().map(WaveSpec::duration).sum()
    }

    pub fn sanitize(&mut self) {
        for (index, wave) in self.waves.iter_mut().enumerate() {
            wave.sanitize(index);
        }
        self.intro_duration = non_negative(self.intro_duration, "level script", "intro_duration");
        if self.looping && !self.waves.is_empty() && self.cycle_duration() <= 0.0 {
            log::warn!("Looping level script takes no time per cycle; looping disabled");
            self.looping = false;
        }
    }
}

/// Everything needed to run one level
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub name: String,
    pub description: String,
    pub theme: LevelTheme,
    /// Missing script means no waves are ever spawned
    pub script: Option<LevelScript>,
    /// World position waves are placed relative to
    pub spawn_origin: Vec3,
    /// Seed for spawn jitter
    pub seed: u64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            name: "Level 1".to_string(),
            description: String::new(),
            theme: LevelTheme::default(),
            script: None,
            spawn_origin: Vec3::ZERO,
            seed: 0,
        }
    }
}

impl LevelConfig {
    /// Parse and sanitize a JSON level config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: LevelConfig = serde_json::from_str(json)?;
        config.sanitize()?;
        Ok(config)
    }

    /// Read a JSON level config from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded level '{}' from {}", config.name, path.as_ref().display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamp values and reject duplicate prototype ids
    pub fn sanitize(&mut self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for prototype in &mut self.theme.prototypes {
            prototype.sanitize();
            if !seen.insert(prototype.id()) {
                return Err(ConfigError::DuplicatePrototype(prototype.id()));
            }
        }

        match &mut self.script {
            Some(script) => {
                script.sanitize();
                let catalog = PrototypeCatalog::from_theme(&self.theme);
                for (index, wave) in script.waves.iter().enumerate() {
                    if catalog.enemy(wave.enemy).is_none() {
                        log::warn!(
                            "Wave {} references {} which is not an enemy prototype; it will spawn nothing",
                            index + 1,
                            wave.enemy
                        );
                    }
                }
            }
            None => log::warn!("Level '{}' has no script; no waves will spawn", self.name),
        }
        Ok(())
    }

    /// Small two-wave skirmish used by the binary and tests
    pub fn demo() -> Self {
        let mut config = Self::from_json(include_str!("../levels/skirmish.json"))
            .unwrap_or_else(|e| {
                log::warn!("Bundled skirmish level is invalid: {}", e);
                Self::default()
            });
        config.name = "Skirmish".to_string();
        config
    }
}

/// Prototype lookup by id
#[derive(Debug, Clone, Default)]
pub struct PrototypeCatalog {
    prototypes: BTreeMap<PrototypeId, EntityPrototype>,
}

impl PrototypeCatalog {
    /// Index a theme's prototypes; the first definition of an id wins
    pub fn from_theme(theme: &LevelTheme) -> Self {
        let mut prototypes = BTreeMap::new();
        for prototype in &theme.prototypes {
            if prototypes.contains_key(&prototype.id()) {
                log::warn!("Theme '{}' redefines {}; ignoring", theme.name, prototype.id());
                continue;
            }
            prototypes.insert(prototype.id(), prototype.clone());
        }
        Self { prototypes }
    }

    pub fn get(&self, id: PrototypeId) -> Option<&EntityPrototype> {
        self.prototypes.get(&id)
    }

    pub fn enemy(&self, id: PrototypeId) -> Option<&EnemyPrototype> {
        match self.prototypes.get(&id) {
            Some(EntityPrototype::Enemy(p)) => Some(p),
            _ => None,
        }
    }

    pub fn projectile(&self, id: PrototypeId) -> Option<&ProjectilePrototype> {
        match self.prototypes.get(&id) {
            Some(EntityPrototype::Projectile(p)) => Some(p),
            _ => None,
        }
    }

    pub fn effect(&self, id: PrototypeId) -> Option<&EffectPrototype> {
        match self.prototypes.get(&id) {
            Some(EntityPrototype::Effect(p)) => Some(p),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityPrototype> {
        self.prototypes.values()
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}
