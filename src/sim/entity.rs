//! Pooled entity kinds and the damage capability they share

use crate::config::EntityPrototype;

use super::effect::Effect;
use super::enemy::Enemy;
use super::pool::{InstanceId, Poolable, PrototypeId};
use super::projectile::Projectile;

/// Side a projectile was fired for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Faction {
    #[default]
    Player,
    Enemy,
}

/// Lifecycle shared by every pooled entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifeState {
    /// Parked in its pool
    #[default]
    Inactive,
    Active,
    /// Finished; waiting for the end-of-tick sweep to hand it back
    PendingReturn,
}

/// Two-tier hit feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectTier {
    /// Survived glancing hit or ricochet
    Weak,
    /// Terminal hit
    Strong,
}

/// Result of applying damage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    Survived,
    Destroyed,
}

impl DamageOutcome {
    pub fn effect_tier(self) -> EffectTier {
        match self {
            DamageOutcome::Survived => EffectTier::Weak,
            DamageOutcome::Destroyed => EffectTier::Strong,
        }
    }
}

/// Anything that can be hurt: enemies and projectiles
pub trait Damageable {
    fn take_damage(&mut self, amount: f32, attacker: Option<InstanceId>) -> DamageOutcome;
    fn current_health(&self) -> f32;
}

/// Every kind of instance the simulation pools
#[derive(Debug, Clone)]
pub enum Entity {
    Enemy(Enemy),
    Projectile(Projectile),
    Effect(Effect),
}

impl Entity {
    pub fn prototype(&self) -> PrototypeId {
        match self {
            Entity::Enemy(e) => e.prototype,
            Entity::Projectile(p) => p.prototype,
            Entity::Effect(fx) => fx.prototype,
        }
    }

    pub fn life(&self) -> LifeState {
        match self {
            Entity::Enemy(e) => e.life,
            Entity::Projectile(p) => p.life,
            Entity::Effect(fx) => fx.life,
        }
    }

    /// Finished this tick and due back in the pool
    pub fn is_spent(&self) -> bool {
        self.life() == LifeState::PendingReturn
    }

    pub fn as_enemy(&self) -> Option<&Enemy> {
        match self {
            Entity::Enemy(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_projectile(&self) -> Option<&Projectile> {
        match self {
            Entity::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_projectile_mut(&mut self) -> Option<&mut Projectile> {
        match self {
            Entity::Projectile(p) => Some(p),
            _ => None,
        }
    }
}

impl Poolable for Entity {
    type Prototype = EntityPrototype;

    fn instantiate(prototype: &EntityPrototype) -> Self {
        match prototype {
            EntityPrototype::Enemy(p) => Entity::Enemy(Enemy::from_prototype(p)),
            EntityPrototype::Projectile(p) => Entity::Projectile(Projectile::from_prototype(p)),
            EntityPrototype::Effect(p) => Entity::Effect(Effect::from_prototype(p)),
        }
    }

    fn on_spawn(&mut self) {
        match self {
            Entity::Enemy(e) => e.activate(),
            // Armed by `Projectile::initialize` once the caller knows the aim
            Entity::Projectile(_) => {}
            Entity::Effect(fx) => fx.activate(),
        }
    }

    fn on_return(&mut self) {
        match self {
            Entity::Enemy(e) => e.life = LifeState::Inactive,
            Entity::Projectile(p) => p.life = LifeState::Inactive,
            Entity::Effect(fx) => fx.life = LifeState::Inactive,
        }
    }
}
