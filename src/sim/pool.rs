//! Prototype-keyed entity pool
//!
//! Instances live in a slot arena addressed by `InstanceId`. Every prototype
//! owns a queue of inactive ids, and a reverse map records which prototype
//! issued each id so an instance can be handed back without naming its pool.
//!
//! Destroyed slots are recycled under a new generation, so the arena stays
//! bounded across level loads while a stale handle can never alias a newer
//! instance.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Stable identity of a spawnable template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrototypeId(pub u32);

impl fmt::Display for PrototypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proto:{}", self.0)
    }
}

/// Handle to a pooled instance: slot index plus the generation it was issued in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

impl InstanceId {
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}v{}", self.index, self.generation)
        }
    }
}

/// Broad kind of a prototype, used to size pre-warmed pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolCategory {
    Enemy,
    Projectile,
    Effect,
}

impl PoolCategory {
    /// Number of inactive instances created when a theme is loaded
    pub fn prewarm_size(self) -> usize {
        match self {
            PoolCategory::Enemy => ENEMY_PREWARM,
            PoolCategory::Projectile => PROJECTILE_PREWARM,
            PoolCategory::Effect => EFFECT_PREWARM,
        }
    }
}

/// A template the pool can create instances from
pub trait Prototype: Clone + fmt::Debug {
    fn id(&self) -> PrototypeId;
    fn category(&self) -> PoolCategory;
    fn name(&self) -> &str {
        ""
    }
}

/// Something that can live in an `EntityPool`
pub trait Poolable: Sized {
    type Prototype: Prototype;

    /// Build a fresh, inactive instance
    fn instantiate(prototype: &Self::Prototype) -> Self;

    /// Called after the instance is activated by `spawn`
    fn on_spawn(&mut self) {}

    /// Called after the instance is deactivated by `return_instance`
    fn on_return(&mut self) {}
}

/// World placement of a pooled instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Local +Z axis in world space
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::Z
    }
}

/// What `return_instance` did with the handle it was given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// Deactivated and queued for reuse
    Recycled,
    /// Already inactive; nothing changed
    AlreadyInactive,
    /// Not issued by any live pool; the instance was destroyed
    Discarded,
    /// No such instance exists
    Unknown,
}

#[derive(Debug)]
struct Occupant<T> {
    value: T,
    transform: Transform,
    active: bool,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    occupant: Option<Occupant<T>>,
}

/// Slot storage with a free list of destroyed slots
#[derive(Debug)]
struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> SlotArena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, value: T) -> InstanceId {
        let occupant = Occupant {
            value,
            transform: Transform::default(),
            active: false,
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.occupant = Some(occupant);
                InstanceId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    occupant: Some(occupant),
                });
                InstanceId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Destroy the occupant and retire the handle. False if already gone.
    fn remove(&mut self, instance: InstanceId) -> bool {
        match self.slots.get_mut(instance.index()) {
            Some(slot) if slot.generation == instance.generation && slot.occupant.is_some() => {
                slot.occupant = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(instance.index);
                true
            }
            _ => false,
        }
    }

    fn get(&self, instance: InstanceId) -> Option<&Occupant<T>> {
        self.slots
            .get(instance.index())
            .filter(|slot| slot.generation == instance.generation)
            .and_then(|slot| slot.occupant.as_ref())
    }

    fn get_mut(&mut self, instance: InstanceId) -> Option<&mut Occupant<T>> {
        self.slots
            .get_mut(instance.index())
            .filter(|slot| slot.generation == instance.generation)
            .and_then(|slot| slot.occupant.as_mut())
    }

    fn pair_mut(
        &mut self,
        a: InstanceId,
        b: InstanceId,
    ) -> Option<(&mut Occupant<T>, &mut Occupant<T>)> {
        if a.index == b.index || self.get(a).is_none() || self.get(b).is_none() {
            return None;
        }
        let (lo, hi) = if a.index < b.index { (a, b) } else { (b, a) };
        let (left, right) = self.slots.split_at_mut(hi.index());
        let low = left[lo.index()].occupant.as_mut()?;
        let high = right[0].occupant.as_mut()?;
        Some(if a.index < b.index { (low, high) } else { (high, low) })
    }

    fn iter(&self) -> impl Iterator<Item = (InstanceId, &Occupant<T>)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let id = InstanceId {
                index: i as u32,
                generation: slot.generation,
            };
            slot.occupant.as_ref().map(|occupant| (id, occupant))
        })
    }

    /// Slots allocated, occupied or free
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Per-prototype pool state
#[derive(Debug)]
struct PoolEntry<P> {
    inactive: Vec<InstanceId>,
    allow_grow: bool,
    prototype: P,
    issued: usize,
}

impl<P> PoolEntry<P> {
    fn inactive_len(&self) -> usize {
        self.inactive.len()
    }

    /// Instances ever created for this entry
    fn issued(&self) -> usize {
        self.issued
    }
}

/// Recycling store for transient instances, keyed by prototype identity
#[derive(Debug)]
pub struct EntityPool<T: Poolable> {
    arena: SlotArena<T>,
    pools: BTreeMap<PrototypeId, PoolEntry<T::Prototype>>,
    owners: BTreeMap<InstanceId, PrototypeId>,
}

impl<T: Poolable> Default for EntityPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> EntityPool<T> {
    pub fn new() -> Self {
        Self {
            arena: SlotArena::new(),
            pools: BTreeMap::new(),
            owners: BTreeMap::new(),
        }
    }

    /// Create a growable pool pre-filled with `initial_size` inactive instances.
    /// A second call for the same prototype is a no-op.
    pub fn create_pool(&mut self, prototype: T::Prototype, initial_size: usize) {
        self.create_pool_with_policy(prototype, initial_size, true);
    }

    pub fn create_pool_with_policy(
        &mut self,
        prototype: T::Prototype,
        initial_size: usize,
        allow_grow: bool,
    ) {
        let id = prototype.id();
        if self.pools.contains_key(&id) {
            log::debug!("Pool for {} already exists", id);
            return;
        }

        let mut entry = PoolEntry {
            inactive: Vec::with_capacity(initial_size),
            allow_grow,
            prototype,
            issued: 0,
        };
        for _ in 0..initial_size {
            let instance =
                Self::instantiate(&mut self.arena, &mut self.owners, id, &entry.prototype);
            entry.inactive.push(instance);
            entry.issued += 1;
        }
        self.pools.insert(id, entry);
    }

    fn instantiate(
        arena: &mut SlotArena<T>,
        owners: &mut BTreeMap<InstanceId, PrototypeId>,
        id: PrototypeId,
        prototype: &T::Prototype,
    ) -> InstanceId {
        let instance = arena.insert(T::instantiate(prototype));
        owners.insert(instance, id);
        instance
    }

    /// Activate an instance of `prototype` at the given placement.
    ///
    /// Creates the pool on demand and grows it by one instance when it is
    /// empty. Returns `None` only when the pool forbids growth and is drained.
    pub fn spawn(
        &mut self,
        prototype: &T::Prototype,
        position: Vec3,
        orientation: Quat,
    ) -> Option<InstanceId> {
        let id = prototype.id();
        if !self.pools.contains_key(&id) {
            log::warn!(
                "No pool for {} '{}'; creating {} instances on demand",
                id,
                prototype.name(),
                AUTO_POOL_SIZE
            );
            self.create_pool(prototype.clone(), AUTO_POOL_SIZE);
        }

        let Self {
            arena,
            pools,
            owners,
        } = self;
        let entry = pools.get_mut(&id)?;
        let instance = match entry.inactive.pop() {
            Some(instance) => instance,
            None if entry.allow_grow => {
                entry.issued += 1;
                log::debug!("Pool {} expanded to {}", id, entry.issued);
                Self::instantiate(arena, owners, id, &entry.prototype)
            }
            None => {
                log::warn!("Pool {} is empty and expansion is disabled", id);
                return None;
            }
        };

        let Some(slot) = arena.get_mut(instance) else {
            log::warn!("Pool {} queued destroyed instance {}", id, instance);
            return None;
        };
        slot.active = true;
        slot.transform = Transform::new(position, orientation);
        slot.value.on_spawn();
        Some(instance)
    }

    /// Hand an instance back to the pool that issued it.
    pub fn return_instance(&mut self, instance: InstanceId) -> ReturnOutcome {
        let Some(&owner) = self.owners.get(&instance) else {
            return if self.arena.remove(instance) {
                log::warn!("Instance {} was not issued by a live pool; destroying it", instance);
                ReturnOutcome::Discarded
            } else {
                log::warn!("Return of unknown instance {}", instance);
                ReturnOutcome::Unknown
            };
        };

        let Some(slot) = self.arena.get_mut(instance) else {
            log::warn!("Instance {} of {} no longer exists", instance, owner);
            self.owners.remove(&instance);
            return ReturnOutcome::Unknown;
        };
        if !slot.active {
            log::warn!("Instance {} of {} returned while already inactive", instance, owner);
            return ReturnOutcome::AlreadyInactive;
        }

        match self.pools.get_mut(&owner) {
            Some(entry) => {
                slot.active = false;
                slot.value.on_return();
                entry.inactive.push(instance);
                ReturnOutcome::Recycled
            }
            None => {
                log::warn!("Pool {} vanished; destroying instance {}", owner, instance);
                self.arena.remove(instance);
                self.owners.remove(&instance);
                ReturnOutcome::Discarded
            }
        }
    }

    /// Drop every pooled inactive instance and pre-warm pools for a new
    /// prototype set. Active instances are left alone; their later returns
    /// take the discard path because the reverse map is cleared. Destroyed
    /// slots are reused by the new pools.
    pub fn reinitialize_pools<I>(&mut self, prototypes: I)
    where
        I: IntoIterator<Item = T::Prototype>,
    {
        let queued: Vec<InstanceId> = self
            .pools
            .values()
            .flat_map(|entry| entry.inactive.iter().copied())
            .collect();
        let destroyed = queued
            .into_iter()
            .filter(|&instance| self.arena.remove(instance))
            .count();
        let in_flight = self.live_count();
        if in_flight > 0 {
            log::warn!("Reinitializing pools with {} instances still in use", in_flight);
        }
        self.pools.clear();
        self.owners.clear();

        for prototype in prototypes {
            let size = prototype.category().prewarm_size();
            self.create_pool(prototype, size);
        }
        log::info!(
            "Pools reinitialized: destroyed {}, {} prototypes pre-warmed",
            destroyed,
            self.pools.len()
        );
    }

    pub fn has_pool(&self, id: PrototypeId) -> bool {
        self.pools.contains_key(&id)
    }

    /// Prototype that issued `instance`, if any live pool did
    pub fn owner_of(&self, instance: InstanceId) -> Option<PrototypeId> {
        self.owners.get(&instance).copied()
    }

    pub fn exists(&self, instance: InstanceId) -> bool {
        self.arena.get(instance).is_some()
    }

    pub fn is_active(&self, instance: InstanceId) -> bool {
        self.arena.get(instance).is_some_and(|slot| slot.active)
    }

    /// True if `instance` sits in some pool's inactive queue
    pub fn is_queued(&self, instance: InstanceId) -> bool {
        self.pools.values().any(|entry| entry.inactive.contains(&instance))
    }

    pub fn get(&self, instance: InstanceId) -> Option<&T> {
        self.arena.get(instance).map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, instance: InstanceId) -> Option<&mut T> {
        self.arena.get_mut(instance).map(|slot| &mut slot.value)
    }

    pub fn transform(&self, instance: InstanceId) -> Option<&Transform> {
        self.arena.get(instance).map(|slot| &slot.transform)
    }

    pub fn entry_mut(&mut self, instance: InstanceId) -> Option<(&mut Transform, &mut T)> {
        self.arena
            .get_mut(instance)
            .map(|slot| (&mut slot.transform, &mut slot.value))
    }

    /// Mutable access to two distinct instances at once
    #[allow(clippy::type_complexity)]
    pub fn pair_mut(
        &mut self,
        a: InstanceId,
        b: InstanceId,
    ) -> Option<((&mut Transform, &mut T), (&mut Transform, &mut T))> {
        let (a, b) = self.arena.pair_mut(a, b)?;
        Some((
            (&mut a.transform, &mut a.value),
            (&mut b.transform, &mut b.value),
        ))
    }

    /// Active instances in ascending slot order
    pub fn active_ids(&self) -> Vec<InstanceId> {
        self.iter_active().map(|(id, _, _)| id).collect()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (InstanceId, &Transform, &T)> {
        self.arena
            .iter()
            .filter(|(_, slot)| slot.active)
            .map(|(id, slot)| (id, &slot.transform, &slot.value))
    }

    /// Number of active instances across all pools (including orphans)
    pub fn live_count(&self) -> usize {
        self.iter_active().count()
    }

    /// Slots allocated by the pool, including recycled ones awaiting reuse
    pub fn slot_capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Active instances issued by `id`'s pool
    pub fn in_use_count(&self, id: PrototypeId) -> usize {
        self.owners
            .iter()
            .filter(|&(instance, owner)| *owner == id && self.is_active(*instance))
            .count()
    }

    pub fn inactive_count(&self, id: PrototypeId) -> usize {
        self.pools.get(&id).map_or(0, PoolEntry::inactive_len)
    }

    pub fn issued_count(&self, id: PrototypeId) -> usize {
        self.pools.get(&id).map_or(0, PoolEntry::issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    struct Template {
        id: u32,
        category: PoolCategory,
    }

    impl Template {
        fn new(id: u32) -> Self {
            Self {
                id,
                category: PoolCategory::Projectile,
            }
        }
    }

    impl Prototype for Template {
        fn id(&self) -> PrototypeId {
            PrototypeId(self.id)
        }

        fn category(&self) -> PoolCategory {
            self.category
        }
    }

    #[derive(Debug)]
    struct Token {
        spawns: u32,
        returns: u32,
    }

    impl Poolable for Token {
        type Prototype = Template;

        fn instantiate(_prototype: &Template) -> Self {
            Token {
                spawns: 0,
                returns: 0,
            }
        }

        fn on_spawn(&mut self) {
            self.spawns += 1;
        }

        fn on_return(&mut self) {
            self.returns += 1;
        }
    }

    fn spawn(pool: &mut EntityPool<Token>, template: &Template) -> InstanceId {
        pool.spawn(template, Vec3::ZERO, Quat::IDENTITY).unwrap()
    }

    #[test]
    fn test_create_pool_is_idempotent() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(1);
        pool.create_pool(template.clone(), 3);
        pool.create_pool(template, 10);
        assert_eq!(pool.inactive_count(PrototypeId(1)), 3);
        assert_eq!(pool.issued_count(PrototypeId(1)), 3);
    }

    #[test]
    fn test_spawn_reuses_returned_instance() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(1);
        pool.create_pool(template.clone(), 1);

        let first = spawn(&mut pool, &template);
        assert!(pool.is_active(first));
        assert_eq!(pool.return_instance(first), ReturnOutcome::Recycled);

        let second = spawn(&mut pool, &template);
        assert_eq!(first, second);
        assert_eq!(pool.get(second).unwrap().spawns, 2);
        assert_eq!(pool.get(second).unwrap().returns, 1);
    }

    #[test]
    fn test_spawn_sets_transform() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(1);
        let rot = Quat::from_rotation_y(1.0);
        let id = pool.spawn(&template, Vec3::new(1.0, 2.0, 3.0), rot).unwrap();
        let transform = pool.transform(id).unwrap();
        assert_eq!(transform.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.orientation, rot);
    }

    #[test]
    fn test_empty_pool_grows_by_one() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(1);
        pool.create_pool(template.clone(), 2);

        let a = spawn(&mut pool, &template);
        let b = spawn(&mut pool, &template);
        assert_eq!(pool.issued_count(PrototypeId(1)), 2);

        let c = spawn(&mut pool, &template);
        assert_eq!(pool.issued_count(PrototypeId(1)), 3);
        assert_eq!(pool.inactive_count(PrototypeId(1)), 0);
        assert!(a != c && b != c);
        assert!(pool.is_active(c));
    }

    #[test]
    fn test_spawn_unknown_prototype_creates_pool() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(7);
        assert!(!pool.has_pool(PrototypeId(7)));

        let id = spawn(&mut pool, &template);
        assert!(pool.has_pool(PrototypeId(7)));
        assert_eq!(pool.owner_of(id), Some(PrototypeId(7)));
        assert_eq!(pool.issued_count(PrototypeId(7)), AUTO_POOL_SIZE);
        assert_eq!(pool.inactive_count(PrototypeId(7)), AUTO_POOL_SIZE - 1);
    }

    #[test]
    fn test_fixed_pool_refuses_to_grow() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(1);
        pool.create_pool_with_policy(template.clone(), 1, false);

        assert!(pool.spawn(&template, Vec3::ZERO, Quat::IDENTITY).is_some());
        assert!(pool.spawn(&template, Vec3::ZERO, Quat::IDENTITY).is_none());
        assert_eq!(pool.issued_count(PrototypeId(1)), 1);
    }

    #[test]
    fn test_double_return_is_noop() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(1);
        pool.create_pool(template.clone(), 2);
        let id = spawn(&mut pool, &template);

        assert_eq!(pool.return_instance(id), ReturnOutcome::Recycled);
        let queued = pool.inactive_count(PrototypeId(1));
        assert_eq!(pool.return_instance(id), ReturnOutcome::AlreadyInactive);
        assert_eq!(pool.inactive_count(PrototypeId(1)), queued);
        assert_eq!(pool.get(id).unwrap().returns, 1);
    }

    #[test]
    fn test_unknown_return_leaves_queues_alone() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(1);
        pool.create_pool(template, 3);

        let stranger = InstanceId {
            index: 99,
            generation: 0,
        };
        assert_eq!(pool.return_instance(stranger), ReturnOutcome::Unknown);
        assert_eq!(pool.inactive_count(PrototypeId(1)), 3);
    }

    #[test]
    fn test_reinitialize_orphans_in_flight_instances() {
        let mut pool = EntityPool::<Token>::new();
        let old = Template::new(1);
        pool.create_pool(old.clone(), 2);
        let in_flight = spawn(&mut pool, &old);

        let enemy = Template {
            id: 2,
            category: PoolCategory::Enemy,
        };
        let effect = Template {
            id: 3,
            category: PoolCategory::Effect,
        };
        pool.reinitialize_pools([enemy, effect]);

        assert!(!pool.has_pool(PrototypeId(1)));
        assert_eq!(pool.inactive_count(PrototypeId(2)), ENEMY_PREWARM);
        assert_eq!(pool.inactive_count(PrototypeId(3)), EFFECT_PREWARM);

        // Still alive, but no longer owned by any pool
        assert!(pool.is_active(in_flight));
        assert_eq!(pool.owner_of(in_flight), None);
        assert_eq!(pool.return_instance(in_flight), ReturnOutcome::Discarded);
        assert!(!pool.exists(in_flight));
        assert_eq!(pool.inactive_count(PrototypeId(2)), ENEMY_PREWARM);
    }

    #[test]
    fn test_repeated_reinitialize_reuses_slots() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(1);

        for _ in 0..5 {
            pool.reinitialize_pools([template.clone()]);
            assert_eq!(pool.inactive_count(PrototypeId(1)), PROJECTILE_PREWARM);
            assert_eq!(pool.slot_capacity(), PROJECTILE_PREWARM);
        }

        // An orphan keeps its slot; everything else is recycled
        let in_flight = spawn(&mut pool, &template);
        for _ in 0..5 {
            pool.reinitialize_pools([template.clone()]);
        }
        assert!(pool.is_active(in_flight));
        assert_eq!(pool.slot_capacity(), PROJECTILE_PREWARM + 1);
    }

    #[test]
    fn test_stale_handle_does_not_alias_reused_slot() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(1);
        pool.create_pool(template.clone(), 1);
        let stale = spawn(&mut pool, &template);
        pool.return_instance(stale);

        pool.reinitialize_pools([template.clone()]);
        let fresh = spawn(&mut pool, &template);
        assert_eq!(pool.slot_capacity(), PROJECTILE_PREWARM);
        assert_ne!(stale, fresh);

        assert!(!pool.exists(stale));
        assert!(pool.get(stale).is_none());
        assert_eq!(pool.return_instance(stale), ReturnOutcome::Unknown);
        assert!(pool.is_active(fresh));
    }

    #[test]
    fn test_pair_mut_preserves_argument_order() {
        let mut pool = EntityPool::<Token>::new();
        let template = Template::new(1);
        let a = spawn(&mut pool, &template);
        let b = spawn(&mut pool, &template);
        pool.get_mut(a).unwrap().spawns = 10;
        pool.get_mut(b).unwrap().spawns = 20;

        let ((_, first), (_, second)) = pool.pair_mut(b, a).unwrap();
        assert_eq!(first.spawns, 20);
        assert_eq!(second.spawns, 10);
        assert!(pool.pair_mut(a, a).is_none());
    }

    proptest! {
        #[test]
        fn test_pool_conservation(ops in proptest::collection::vec((any::<bool>(), 0usize..32), 1..200)) {
            let mut pool = EntityPool::<Token>::new();
            let template = Template::new(1);
            let id = PrototypeId(1);
            pool.create_pool(template.clone(), 4);

            let mut in_use: Vec<InstanceId> = Vec::new();
            let mut last_total = pool.issued_count(id);

            for (do_spawn, pick) in ops {
                if do_spawn || in_use.is_empty() {
                    let instance = pool.spawn(&template, Vec3::ZERO, Quat::IDENTITY).unwrap();
                    prop_assert!(!in_use.contains(&instance));
                    in_use.push(instance);
                } else {
                    let instance = in_use.swap_remove(pick % in_use.len());
                    prop_assert_eq!(pool.return_instance(instance), ReturnOutcome::Recycled);
                }

                let total = pool.issued_count(id);
                prop_assert!(total >= last_total);
                last_total = total;
                prop_assert_eq!(pool.in_use_count(id) + pool.inactive_count(id), total);
                for instance in &in_use {
                    prop_assert!(pool.is_active(*instance));
                    prop_assert!(!pool.is_queued(*instance));
                }
            }
        }

        #[test]
        fn test_double_return_matches_single(spawned in 1usize..12, victim in 0usize..12) {
            let template = Template::new(1);
            let id = PrototypeId(1);
            let mut once = EntityPool::<Token>::new();
            let mut twice = EntityPool::<Token>::new();

            let ids_once: Vec<_> = (0..spawned).map(|_| spawn(&mut once, &template)).collect();
            let ids_twice: Vec<_> = (0..spawned).map(|_| spawn(&mut twice, &template)).collect();
            let target = victim % spawned;

            once.return_instance(ids_once[target]);
            twice.return_instance(ids_twice[target]);
            twice.return_instance(ids_twice[target]);

            prop_assert_eq!(once.inactive_count(id), twice.inactive_count(id));
            prop_assert_eq!(once.in_use_count(id), twice.in_use_count(id));
            prop_assert_eq!(once.active_ids(), twice.active_ids());
        }
    }
}
