//! Projectile motion, clashes, unit hits and ricochet
//!
//! A projectile is Inactive while pooled, Active once `initialize` has aimed
//! it, and PendingReturn after `die`. Only the end-of-tick sweep hands it
//! back to the pool, so dying twice in one tick still yields one return.

use glam::Vec3;

use crate::config::ProjectilePrototype;
use crate::consts::*;
use crate::look_rotation;
use crate::reflect;

use super::collision::{Ray, RayHit};
use super::entity::{DamageOutcome, Damageable, EffectTier, Faction, LifeState};
use super::pool::{InstanceId, PrototypeId, Transform};

/// Result of touching an environment surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BounceOutcome {
    /// Reflected off the surface at `point`
    Ricocheted { point: Vec3 },
    /// Bounce budget spent; the projectile died
    Exhausted,
    /// The backward cast found nothing; the projectile died without effect
    Lost,
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub prototype: PrototypeId,
    pub life: LifeState,
    pub faction: Faction,
    /// Unit length
    pub direction: Vec3,
    pub speed: f32,
    pub damage_power: f32,
    pub durability: f32,
    pub max_durability: f32,
    pub bounce_count: u32,
    pub max_bounces: u32,
    pub bounce_speed_decay: f32,
    pub bounce_damage_decay: f32,
    /// Seconds left before a silent despawn; `None` never expires
    pub lifetime: Option<f32>,
    pub radius: f32,
    pub hit_effect: Option<PrototypeId>,
    pub bounce_effect: Option<PrototypeId>,
    base_speed: f32,
    base_damage: f32,
    base_lifetime: f32,
}

impl Projectile {
    pub fn from_prototype(prototype: &ProjectilePrototype) -> Self {
        Self {
            prototype: prototype.id,
            life: LifeState::Inactive,
            faction: Faction::Player,
            direction: Vec3::Z,
            speed: prototype.speed,
            damage_power: prototype.damage_power,
            durability: prototype.max_durability,
            max_durability: prototype.max_durability,
            bounce_count: 0,
            max_bounces: prototype.max_bounces,
            bounce_speed_decay: prototype.bounce_speed_decay,
            bounce_damage_decay: prototype.bounce_damage_decay,
            lifetime: None,
            radius: prototype.radius,
            hit_effect: prototype.hit_effect,
            bounce_effect: prototype.bounce_effect,
            base_speed: prototype.speed,
            base_damage: prototype.damage_power,
            base_lifetime: prototype.lifetime,
        }
    }

    /// Aim and arm a freshly spawned projectile
    ///
    /// Speed and damage are the prototype's base values scaled by the
    /// multipliers; durability, bounces and lifetime are reset.
    pub fn initialize(&mut self, direction: Vec3, speed_multiplier: f32, damage_multiplier: f32) {
        self.direction = direction.try_normalize().unwrap_or(Vec3::Z);
        self.speed = self.base_speed * speed_multiplier;
        self.damage_power = self.base_damage * damage_multiplier;
        self.durability = self.max_durability;
        self.bounce_count = 0;
        self.lifetime = (self.base_lifetime > 0.0).then_some(self.base_lifetime);
        self.life = LifeState::Active;
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.life == LifeState::Active
    }

    /// Move along the current direction and count down the lifetime.
    /// Returns true if the projectile expired this step.
    pub fn advance(&mut self, transform: &mut Transform, dt: f32) -> bool {
        if !self.is_active() {
            return false;
        }
        transform.position += self.direction * self.speed * dt;
        transform.orientation = look_rotation(self.direction);

        if let Some(remaining) = self.lifetime.as_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                return self.die();
            }
        }
        false
    }

    /// Mark for return to the pool. True on the first call only.
    pub fn die(&mut self) -> bool {
        if self.life != LifeState::Active {
            return false;
        }
        self.life = LifeState::PendingReturn;
        true
    }

    /// Damage this projectile deals to another in a clash: its power,
    /// capped by what it has left to break with
    #[inline]
    pub fn clash_damage(&self) -> f32 {
        self.damage_power.min(self.durability)
    }

    /// Effect prototype for a hit outcome
    pub fn effect_for(&self, tier: EffectTier) -> Option<PrototypeId> {
        match tier {
            EffectTier::Strong => self.hit_effect,
            EffectTier::Weak => self.bounce_effect,
        }
    }

    /// Hit a damageable unit. The unit takes this projectile's power, then
    /// the projectile takes its own durability and so never survives.
    pub fn hit_unit(
        &mut self,
        me: InstanceId,
        unit: &mut dyn Damageable,
        unit_id: InstanceId,
    ) -> DamageOutcome {
        unit.take_damage(self.damage_power, Some(me));
        let recoil = self.durability;
        self.take_damage(recoil, Some(unit_id))
    }

    /// Touch an environment surface
    ///
    /// With bounce budget left, a backward cast from behind the current
    /// position finds the true impact point so fast projectiles that
    /// overshot the surface still reflect from where they struck it.
    pub fn hit_environment<F>(&mut self, transform: &mut Transform, dt: f32, cast: F) -> BounceOutcome
    where
        F: FnOnce(Ray, f32) -> Option<RayHit>,
    {
        if self.bounce_count >= self.max_bounces {
            self.die();
            return BounceOutcome::Exhausted;
        }

        let backtrack = self.speed * dt * 2.0 + RICOCHET_BACKTRACK_PADDING;
        let ray = Ray::new(transform.position - self.direction * backtrack, self.direction);
        let Some(hit) = cast(ray, backtrack * 2.0) else {
            log::debug!("Ricochet cast missed; projectile {} lost", self.prototype);
            self.die();
            return BounceOutcome::Lost;
        };

        self.direction = reflect(self.direction, hit.normal)
            .try_normalize()
            .unwrap_or(hit.normal);
        transform.position = hit.point + self.direction * RICOCHET_SURFACE_OFFSET;
        transform.orientation = look_rotation(self.direction);
        self.speed *= self.bounce_speed_decay;
        self.damage_power *= self.bounce_damage_decay;
        self.bounce_count += 1;
        BounceOutcome::Ricocheted { point: hit.point }
    }
}

/// Resolve a clash between two projectiles
///
/// Both transfers are computed from pre-hit values and applied before either
/// side checks survival, so the result does not depend on argument order
/// and both may die.
pub fn resolve_clash(
    a: &mut Projectile,
    a_id: InstanceId,
    b: &mut Projectile,
    b_id: InstanceId,
) -> (DamageOutcome, DamageOutcome) {
    let a_deals = a.clash_damage();
    let b_deals = b.clash_damage();
    let b_outcome = b.take_damage(a_deals, Some(a_id));
    let a_outcome = a.take_damage(b_deals, Some(b_id));
    (a_outcome, b_outcome)
}

impl Damageable for Projectile {
    fn take_damage(&mut self, amount: f32, attacker: Option<InstanceId>) -> DamageOutcome {
        self.durability -= amount;
        if self.durability <= 0.0 {
            if let Some(attacker) = attacker {
                log::trace!("Projectile {} broken by {}", self.prototype, attacker);
            }
            self.die();
            DamageOutcome::Destroyed
        } else {
            DamageOutcome::Survived
        }
    }

    fn current_health(&self) -> f32 {
        self.durability
    }
}
