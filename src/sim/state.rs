//! Simulation state and the events it reports to the host

use std::collections::BTreeSet;

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::config::{LevelConfig, PrototypeCatalog};

use super::collision::{Arena, PhysicsWorld};
use super::entity::{Entity, Faction};
use super::level::{LevelDirector, LevelState, LevelTransition, ListenerId};
use super::pool::{EntityPool, InstanceId, PrototypeId};
use super::weapon::FireRequest;

/// Something the host may want to render, play or display
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    EnemySpawned {
        id: InstanceId,
        prototype: PrototypeId,
        position: Vec3,
    },
    ProjectileFired {
        id: InstanceId,
        prototype: PrototypeId,
        faction: Faction,
    },
    /// Play effect `prototype` at `position`
    EffectSpawned {
        id: InstanceId,
        prototype: PrototypeId,
        position: Vec3,
    },
    EnemyKilled {
        id: InstanceId,
        prototype: PrototypeId,
        score: u64,
    },
    EnemyEscaped {
        id: InstanceId,
        prototype: PrototypeId,
    },
    ProjectileExpired {
        id: InstanceId,
    },
    Level(LevelTransition),
}

/// One running level
pub struct Simulation<P: PhysicsWorld = Arena> {
    /// Every pooled enemy, projectile and effect
    pub pool: EntityPool<Entity>,
    pub physics: P,
    pub(super) director: LevelDirector,
    pub(super) config: LevelConfig,
    pub(super) catalog: PrototypeCatalog,
    pub(super) rng: Pcg32,
    /// Sum of score values of every enemy killed since the last restart
    pub score: u64,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub(super) accumulator: f32,
    pub(super) events: Vec<SimEvent>,
    pub(super) shots: Vec<FireRequest>,
    /// Effect prototypes already reported missing
    pub(super) missing: BTreeSet<PrototypeId>,
}

impl<P: PhysicsWorld> std::fmt::Debug for Simulation<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("level", &self.config.name)
            .field("director", &self.director)
            .field("live", &self.pool.live_count())
            .field("score", &self.score)
            .field("time_ticks", &self.time_ticks)
            .finish()
    }
}

impl<P: PhysicsWorld> Simulation<P> {
    /// Set up a level; pools are filled on the first tick (Loading)
    pub fn new(config: LevelConfig, physics: P) -> Self {
        let catalog = PrototypeCatalog::from_theme(&config.theme);
        log::info!(
            "Level '{}' with theme '{}': {} prototypes, seed {}",
            config.name,
            config.theme.name,
            catalog.len(),
            config.seed
        );
        Self {
            pool: EntityPool::new(),
            physics,
            director: LevelDirector::new(config.script.clone()),
            rng: Pcg32::seed_from_u64(config.seed),
            catalog,
            config,
            score: 0,
            time_ticks: 0,
            accumulator: 0.0,
            events: Vec::new(),
            shots: Vec::new(),
            missing: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> LevelState {
        self.director.state()
    }

    pub fn elapsed(&self) -> f64 {
        self.director.elapsed()
    }

    pub fn current_wave_index(&self) -> usize {
        self.director.current_wave_index()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&LevelTransition) + 'static,
    {
        self.director.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.director.unsubscribe(id)
    }

    /// Events since the last drain, in the order they happened
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Enemies currently alive
    pub fn live_enemies(&self) -> usize {
        self.pool
            .iter_active()
            .filter(|(_, _, entity)| entity.as_enemy().is_some_and(|e| e.is_alive()))
            .count()
    }

    /// Projectiles currently in flight
    pub fn live_projectiles(&self) -> usize {
        self.pool
            .iter_active()
            .filter(|(_, _, entity)| entity.as_projectile().is_some_and(|p| p.is_active()))
            .count()
    }
}
