//! Straight-line enemies with auto-firing weapons

use glam::Vec3;

use crate::config::EnemyPrototype;

use super::entity::{DamageOutcome, Damageable, Faction, LifeState};
use super::pool::{InstanceId, PrototypeId, Transform};
use super::weapon::{FireRequest, Weapon};

/// How an enemy left play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyFate {
    /// Health ran out; awards score and plays the death effect
    Killed,
    /// Crossed the despawn limit; recycled silently
    Escaped,
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub prototype: PrototypeId,
    pub life: LifeState,
    pub fate: Option<EnemyFate>,
    pub health: f32,
    pub max_health: f32,
    pub score_value: u64,
    pub move_speed: f32,
    /// Unit length
    pub move_direction: Vec3,
    pub despawn_limit: f32,
    pub radius: f32,
    pub death_effect: Option<PrototypeId>,
    pub weapon: Weapon,
}

impl Enemy {
    pub fn from_prototype(prototype: &EnemyPrototype) -> Self {
        Self {
            prototype: prototype.id,
            life: LifeState::Inactive,
            fate: None,
            health: prototype.max_health,
            max_health: prototype.max_health,
            score_value: prototype.score_value,
            move_speed: prototype.move_speed,
            move_direction: prototype.move_direction.normalize_or_zero(),
            despawn_limit: prototype.despawn_limit,
            radius: prototype.radius,
            death_effect: prototype.death_effect,
            weapon: Weapon::new(&prototype.weapons, prototype.auto_fire),
        }
    }

    /// Restore full health and rearm on spawn
    pub fn activate(&mut self) {
        self.health = self.max_health;
        self.fate = None;
        self.life = LifeState::Active;
        self.weapon.reset();
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.life == LifeState::Active
    }

    /// Move, check the despawn limit and run the weapon.
    /// Returns true if the enemy escaped this step.
    pub fn advance(&mut self, transform: &mut Transform, dt: f32, shots: &mut Vec<FireRequest>) -> bool {
        if !self.is_alive() {
            return false;
        }
        transform.position += self.move_direction * self.move_speed * dt;
        if transform.position.z < self.despawn_limit {
            self.fate = Some(EnemyFate::Escaped);
            self.life = LifeState::PendingReturn;
            return true;
        }
        self.weapon.tick(transform, Faction::Enemy, dt, shots);
        false
    }
}

impl Damageable for Enemy {
    fn take_damage(&mut self, amount: f32, attacker: Option<InstanceId>) -> DamageOutcome {
        if !self.is_alive() {
            return DamageOutcome::Destroyed;
        }
        self.health -= amount;
        if self.health > 0.0 {
            return DamageOutcome::Survived;
        }
        match attacker {
            Some(attacker) => log::debug!("Enemy {} destroyed by {}", self.prototype, attacker),
            None => log::debug!("Enemy {} destroyed", self.prototype),
        }
        self.fate = Some(EnemyFate::Killed);
        self.life = LifeState::PendingReturn;
        DamageOutcome::Destroyed
    }

    fn current_health(&self) -> f32 {
        self.health
    }
}
