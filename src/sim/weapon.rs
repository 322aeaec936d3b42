//! Multi-slot weapon emitters
//!
//! A weapon never touches the pool itself. Firing produces `FireRequest`s
//! that the simulation turns into pooled projectiles after the movement
//! phase, so emitters can run while the pool is borrowed elsewhere.

use glam::Vec3;

use crate::config::WeaponSlotSpec;

use super::entity::Faction;
use super::pool::{PrototypeId, Transform};

/// Request to spawn and initialize one projectile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireRequest {
    pub projectile: PrototypeId,
    pub position: Vec3,
    /// Unit length
    pub direction: Vec3,
    pub speed_multiplier: f32,
    pub damage_multiplier: f32,
    pub faction: Faction,
}

#[derive(Debug, Clone)]
pub struct WeaponSlot {
    pub spec: WeaponSlotSpec,
    /// Seconds until the slot may fire again
    cooldown: f32,
}

impl WeaponSlot {
    pub fn new(spec: WeaponSlotSpec) -> Self {
        Self { spec, cooldown: 0.0 }
    }

    /// Seconds between shots; `None` when the slot is disabled
    pub fn interval(&self) -> Option<f32> {
        (self.spec.fire_rate > 0.0).then(|| 1.0 / self.spec.fire_rate)
    }

    pub fn is_ready(&self) -> bool {
        self.cooldown <= 0.0 && self.interval().is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Weapon {
    pub slots: Vec<WeaponSlot>,
    /// Fire every ready slot on each tick
    pub auto_fire: bool,
}

impl Weapon {
    pub fn new(specs: &[WeaponSlotSpec], auto_fire: bool) -> Self {
        Self {
            slots: specs.iter().cloned().map(WeaponSlot::new).collect(),
            auto_fire,
        }
    }

    /// Make every slot ready to fire
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.cooldown = 0.0;
        }
    }

    pub fn cool_down(&mut self, dt: f32) {
        for slot in &mut self.slots {
            if slot.cooldown > 0.0 {
                slot.cooldown -= dt;
            }
        }
    }

    /// Fire every ready slot from `owner`; returns the number of shots
    pub fn fire_into(
        &mut self,
        owner: &Transform,
        faction: Faction,
        out: &mut Vec<FireRequest>,
    ) -> usize {
        let mut fired = 0;
        for slot in &mut self.slots {
            if !slot.is_ready() {
                continue;
            }
            let Some(interval) = slot.interval() else {
                continue;
            };
            out.push(FireRequest {
                projectile: slot.spec.projectile,
                position: owner.position + owner.orientation * slot.spec.offset,
                direction: (owner.orientation * slot.spec.direction).normalize_or_zero(),
                speed_multiplier: slot.spec.speed_multiplier,
                damage_multiplier: slot.spec.damage_multiplier,
                faction,
            });
            slot.cooldown = interval;
            fired += 1;
        }
        fired
    }

    /// Advance cooldowns and, when auto-firing, fire every ready slot
    pub fn tick(
        &mut self,
        owner: &Transform,
        faction: Faction,
        dt: f32,
        out: &mut Vec<FireRequest>,
    ) -> usize {
        self.cool_down(dt);
        if self.auto_fire {
            self.fire_into(owner, faction, out)
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn slot(rate: f32) -> WeaponSlotSpec {
        WeaponSlotSpec {
            projectile: PrototypeId(9),
            offset: Vec3::new(0.0, 0.0, 1.0),
            direction: Vec3::Z,
            fire_rate: rate,
            damage_multiplier: 2.0,
            speed_multiplier: 0.5,
        }
    }

    #[test]
    fn test_fires_immediately_then_waits() {
        let mut weapon = Weapon::new(&[slot(2.0)], true);
        let owner = Transform::default();
        let mut out = Vec::new();

        assert_eq!(weapon.tick(&owner, Faction::Enemy, 0.125, &mut out), 1);
        for _ in 0..3 {
            assert_eq!(weapon.tick(&owner, Faction::Enemy, 0.125, &mut out), 0);
        }
        // 0.5 s interval
        assert_eq!(weapon.tick(&owner, Faction::Enemy, 0.125, &mut out), 1);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_fire_point_follows_owner() {
        let mut weapon = Weapon::new(&[slot(1.0)], false);
        let owner = Transform::new(Vec3::new(1.0, 0.0, 0.0), Quat::from_rotation_y(std::f32::consts::PI));
        let mut out = Vec::new();

        assert_eq!(weapon.tick(&owner, Faction::Player, 0.1, &mut out), 0);
        assert_eq!(weapon.fire_into(&owner, Faction::Player, &mut out), 1);

        let shot = out[0];
        assert_eq!(shot.projectile, PrototypeId(9));
        assert!((shot.position - Vec3::new(1.0, 0.0, -1.0)).length() < 1e-5);
        assert!((shot.direction - Vec3::NEG_Z).length() < 1e-5);
        assert_eq!(shot.damage_multiplier, 2.0);
        assert_eq!(shot.speed_multiplier, 0.5);
        assert_eq!(shot.faction, Faction::Player);
    }

    #[test]
    fn test_zero_rate_slot_never_fires() {
        let mut weapon = Weapon::new(&[slot(0.0)], true);
        let mut out = Vec::new();
        for _ in 0..10 {
            weapon.tick(&Transform::default(), Faction::Enemy, 0.5, &mut out);
        }
        assert!(out.is_empty());
    }

    #[test]
    fn test_reset_rearms_slots() {
        let mut weapon = Weapon::new(&[slot(0.1)], false);
        let mut out = Vec::new();
        weapon.fire_into(&Transform::default(), Faction::Enemy, &mut out);
        assert!(!weapon.slots[0].is_ready());
        weapon.reset();
        assert!(weapon.slots[0].is_ready());
    }
}
