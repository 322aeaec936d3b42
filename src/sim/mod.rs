//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by instance id)
//! - No rendering or platform dependencies

pub mod collision;
pub mod effect;
pub mod enemy;
pub mod entity;
pub mod level;
pub mod pool;
pub mod projectile;
pub mod schedule;
pub mod state;
pub mod tick;
pub mod wave;
pub mod weapon;

pub use collision::{Arena, Body, Collider, Contact, Layer, PhysicsWorld, Ray, RayHit, Surface, SurfaceId};
pub use effect::Effect;
pub use enemy::{Enemy, EnemyFate};
pub use entity::{DamageOutcome, Damageable, EffectTier, Entity, Faction, LifeState};
pub use level::{
    LevelContext, LevelDirector, LevelObservation, LevelState, LevelTransition, ListenerId,
};
pub use pool::{EntityPool, InstanceId, PoolCategory, Poolable, Prototype, PrototypeId, ReturnOutcome, Transform};
pub use projectile::{BounceOutcome, Projectile, resolve_clash};
pub use schedule::{Resume, Schedule};
pub use state::{SimEvent, Simulation};
pub use wave::{SequencerStatus, WaveSequencer, WaveStep};
pub use weapon::{FireRequest, Weapon, WeaponSlot};
