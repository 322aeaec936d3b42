//! Fixed timestep simulation tick
//!
//! Core loop that advances one level deterministically. Phase order:
//! level director, enemies, projectiles, effects, queued shots, contacts,
//! reap, transitions. Instances that die during a tick stay in the arena
//! until the reap phase returns each of them to the pool exactly once.

use glam::{Quat, Vec3};

use super::collision::{Body, Collider, Contact, Layer, PhysicsWorld};
use super::enemy::EnemyFate;
use super::entity::{EffectTier, Entity, Faction};
use super::level::{LevelContext, LevelObservation};
use super::pool::{InstanceId, PrototypeId, Transform};
use super::projectile::{BounceOutcome, resolve_clash};
use super::state::{SimEvent, Simulation};
use super::weapon::{FireRequest, Weapon};
use crate::consts::*;
use crate::look_rotation;

impl<P: PhysicsWorld> Simulation<P> {
    /// Advance the level by one fixed timestep
    pub fn tick(&mut self, dt: f32) {
        self.run_director(dt);

        let ids = self.pool.active_ids();
        self.move_enemies(&ids, dt);
        self.move_projectiles(&ids, dt);
        self.age_effects(&ids, dt);

        for shot in std::mem::take(&mut self.shots) {
            self.fire(&shot);
        }

        self.resolve_contacts(dt);
        self.reap();
        self.collect_transitions();
        self.time_ticks += 1;
    }

    /// Feed a frame delta through the fixed-step accumulator.
    /// Returns the number of ticks run.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        self.accumulator += frame_dt.clamp(0.0, MAX_FRAME_DT);

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            self.tick(SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        substeps
    }

    /// Spawn and launch one projectile
    pub fn fire(&mut self, shot: &FireRequest) -> Option<InstanceId> {
        let (Some(prototype), Some(_)) = (
            self.catalog.get(shot.projectile),
            self.catalog.projectile(shot.projectile),
        ) else {
            if self.missing.insert(shot.projectile) {
                log::warn!("{} is not a loaded projectile prototype", shot.projectile);
            }
            return None;
        };

        let id = self
            .pool
            .spawn(prototype, shot.position, look_rotation(shot.direction))?;
        if let Some(projectile) = self.pool.get_mut(id).and_then(Entity::as_projectile_mut) {
            projectile.faction = shot.faction;
            projectile.initialize(shot.direction, shot.speed_multiplier, shot.damage_multiplier);
        }
        self.events.push(SimEvent::ProjectileFired {
            id,
            prototype: shot.projectile,
            faction: shot.faction,
        });
        Some(id)
    }

    /// Fire every ready slot of a host-owned player weapon.
    /// The host advances its cooldowns with `Weapon::cool_down`.
    pub fn fire_player_weapon(&mut self, weapon: &mut Weapon, owner: &Transform) -> Vec<InstanceId> {
        let mut shots = Vec::new();
        weapon.fire_into(owner, Faction::Player, &mut shots);
        shots.iter().filter_map(|shot| self.fire(shot)).collect()
    }

    /// Signal from the host that its player died
    pub fn player_destroyed(&mut self) {
        self.director.player_destroyed();
        self.collect_transitions();
    }

    /// Recall every active instance, clear the score and restart a finished
    /// level. Returns false, changing nothing, while the level is unfinished.
    pub fn restart_level(&mut self) -> bool {
        if !self.state().is_finished() {
            log::debug!("Restart requested in {}; ignored", self.state().name());
            return false;
        }
        let ids = self.pool.active_ids();
        log::info!("Restarting level; recalling {} instances", ids.len());
        for id in ids {
            self.pool.return_instance(id);
            self.physics.release(id);
        }
        self.shots.clear();
        self.score = 0;
        self.accumulator = 0.0;
        let restarted = self.director.restart();
        self.collect_transitions();
        restarted
    }

    fn run_director(&mut self, dt: f32) {
        let observation = LevelObservation {
            live_enemies: self.live_enemies(),
            score: Some(self.score),
        };
        let mut spawned = Vec::new();
        let mut ctx = LevelContext {
            pool: &mut self.pool,
            catalog: &self.catalog,
            rng: &mut self.rng,
            origin: self.config.spawn_origin,
            observation,
            spawned: &mut spawned,
        };
        self.director.tick(dt, &mut ctx);

        for id in spawned {
            if let (Some(entity), Some(transform)) = (self.pool.get(id), self.pool.transform(id)) {
                self.events.push(SimEvent::EnemySpawned {
                    id,
                    prototype: entity.prototype(),
                    position: transform.position,
                });
            }
        }
    }

    fn move_enemies(&mut self, ids: &[InstanceId], dt: f32) {
        for &id in ids {
            let Some((transform, Entity::Enemy(enemy))) = self.pool.entry_mut(id) else {
                continue;
            };
            if enemy.advance(transform, dt, &mut self.shots) {
                log::debug!("Enemy {} escaped at z = {:.1}", id, transform.position.z);
                self.events.push(SimEvent::EnemyEscaped {
                    id,
                    prototype: enemy.prototype,
                });
            }
        }
    }

    fn move_projectiles(&mut self, ids: &[InstanceId], dt: f32) {
        for &id in ids {
            let Some((transform, Entity::Projectile(projectile))) = self.pool.entry_mut(id) else {
                continue;
            };
            if projectile.advance(transform, dt) {
                self.events.push(SimEvent::ProjectileExpired { id });
            }
        }
    }

    fn age_effects(&mut self, ids: &[InstanceId], dt: f32) {
        for &id in ids {
            if let Some(Entity::Effect(effect)) = self.pool.get_mut(id) {
                effect.advance(dt);
            }
        }
    }

    fn resolve_contacts(&mut self, dt: f32) {
        let bodies: Vec<Body> = self
            .pool
            .iter_active()
            .filter_map(|(id, transform, entity)| {
                let (radius, layer) = match entity {
                    Entity::Enemy(enemy) if enemy.is_alive() => (enemy.radius, Layer::Enemy),
                    Entity::Projectile(projectile) if projectile.is_active() => {
                        let layer = match projectile.faction {
                            Faction::Player => Layer::PlayerProjectile,
                            Faction::Enemy => Layer::EnemyProjectile,
                        };
                        (projectile.radius, layer)
                    }
                    _ => return None,
                };
                Some(Body {
                    id,
                    position: transform.position,
                    radius,
                    layer,
                })
            })
            .collect();

        let contacts = self.physics.contacts(&bodies);
        let mut effects = Vec::new();
        for contact in contacts {
            self.resolve_contact(contact, dt, &mut effects);
        }
        for (prototype, position) in effects {
            self.spawn_effect(prototype, position);
        }
    }

    fn resolve_contact(&mut self, contact: Contact, dt: f32, effects: &mut Vec<(PrototypeId, Vec3)>) {
        let mut play = |effect: Option<PrototypeId>, position: Vec3| {
            if let Some(effect) = effect {
                effects.push((effect, position));
            }
        };

        match contact.other {
            Collider::Instance(other) => {
                let Some(((a_transform, a), (b_transform, b))) = self.pool.pair_mut(contact.body, other)
                else {
                    return;
                };
                match (a, b) {
                    (Entity::Projectile(a), Entity::Projectile(b)) => {
                        if !a.is_active() || !b.is_active() {
                            return;
                        }
                        let (a_outcome, b_outcome) = resolve_clash(a, contact.body, b, other);
                        play(a.effect_for(a_outcome.effect_tier()), a_transform.position);
                        play(b.effect_for(b_outcome.effect_tier()), b_transform.position);
                    }
                    (Entity::Projectile(projectile), Entity::Enemy(enemy)) => {
                        if !projectile.is_active() || !enemy.is_alive() {
                            return;
                        }
                        let outcome = projectile.hit_unit(contact.body, enemy, other);
                        play(projectile.effect_for(outcome.effect_tier()), a_transform.position);
                    }
                    _ => {}
                }
            }
            Collider::Surface(surface) => {
                if !self.physics.is_environment(surface) {
                    return;
                }
                let Some((transform, Entity::Projectile(projectile))) = self.pool.entry_mut(contact.body)
                else {
                    return;
                };
                if !projectile.is_active() {
                    return;
                }
                let physics = &self.physics;
                let outcome =
                    projectile.hit_environment(transform, dt, |ray, max| physics.raycast(surface, ray, max));
                match outcome {
                    BounceOutcome::Ricocheted { point } => {
                        play(projectile.effect_for(EffectTier::Weak), point);
                    }
                    BounceOutcome::Exhausted => {
                        play(projectile.effect_for(EffectTier::Strong), transform.position);
                    }
                    BounceOutcome::Lost => {}
                }
            }
        }
    }

    /// Return every instance that finished this tick
    fn reap(&mut self) {
        let spent: Vec<InstanceId> = self
            .pool
            .iter_active()
            .filter(|(_, _, entity)| entity.is_spent())
            .map(|(id, _, _)| id)
            .collect();

        for id in spent {
            let (Some(entity), Some(transform)) = (self.pool.get(id), self.pool.transform(id)) else {
                continue;
            };
            let position = transform.position;
            let killed = entity
                .as_enemy()
                .filter(|enemy| enemy.fate == Some(EnemyFate::Killed))
                .map(|enemy| (enemy.prototype, enemy.score_value, enemy.death_effect));

            self.pool.return_instance(id);
            self.physics.release(id);

            if let Some((prototype, score, death_effect)) = killed {
                self.score += score;
                self.events.push(SimEvent::EnemyKilled {
                    id,
                    prototype,
                    score,
                });
                if let Some(effect) = death_effect {
                    self.spawn_effect(effect, position);
                }
            }
        }
    }

    fn spawn_effect(&mut self, effect: PrototypeId, position: Vec3) -> Option<InstanceId> {
        let (Some(prototype), Some(_)) = (self.catalog.get(effect), self.catalog.effect(effect)) else {
            if self.missing.insert(effect) {
                log::warn!("{} is not a loaded effect prototype", effect);
            }
            return None;
        };
        let id = self.pool.spawn(prototype, position, Quat::IDENTITY)?;
        self.events.push(SimEvent::EffectSpawned {
            id,
            prototype: effect,
            position,
        });
        Some(id)
    }

    fn collect_transitions(&mut self) {
        self.events.extend(
            self.director
                .drain_transitions()
                .into_iter()
                .map(SimEvent::Level),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        EffectPrototype, EnemyPrototype, EntityPrototype, LevelConfig, LevelScript, LevelTheme,
        ProjectilePrototype, WaveSpec, WeaponSlotSpec, WinCondition,
    };
    use crate::sim::collision::Arena;
    use crate::sim::level::LevelState;

    const ENEMY: PrototypeId = PrototypeId(1);
    const BOLT: PrototypeId = PrototypeId(10);
    const PELLET: PrototypeId = PrototypeId(11);
    const HIT_FX: PrototypeId = PrototypeId(20);
    const DEATH_FX: PrototypeId = PrototypeId(21);
    const BOUNCE_FX: PrototypeId = PrototypeId(22);

    fn theme() -> LevelTheme {
        let effect = |id| {
            EntityPrototype::Effect(EffectPrototype {
                id,
                duration: 0.5,
                ..Default::default()
            })
        };
        LevelTheme {
            name: "test".to_string(),
            prototypes: vec![
                EntityPrototype::Enemy(EnemyPrototype {
                    id: ENEMY,
                    max_health: 2.0,
                    score_value: 250,
                    move_speed: 0.0,
                    death_effect: Some(DEATH_FX),
                    ..Default::default()
                }),
                EntityPrototype::Projectile(ProjectilePrototype {
                    id: BOLT,
                    speed: 20.0,
                    damage_power: 2.0,
                    max_durability: 2.0,
                    max_bounces: 1,
                    hit_effect: Some(HIT_FX),
                    bounce_effect: Some(BOUNCE_FX),
                    ..Default::default()
                }),
                EntityPrototype::Projectile(ProjectilePrototype {
                    id: PELLET,
                    speed: 12.0,
                    damage_power: 1.0,
                    max_durability: 1.0,
                    hit_effect: Some(HIT_FX),
                    bounce_effect: Some(BOUNCE_FX),
                    ..Default::default()
                }),
                effect(HIT_FX),
                effect(DEATH_FX),
                effect(BOUNCE_FX),
            ],
            ..Default::default()
        }
    }

    fn level(waves: Vec<WaveSpec>) -> LevelConfig {
        LevelConfig {
            theme: theme(),
            script: Some(LevelScript {
                waves,
                intro_duration: 0.0,
                win_condition: WinCondition::ScoreTarget { score: 10_000 },
                ..Default::default()
            }),
            spawn_origin: Vec3::new(0.0, 0.0, 10.0),
            seed: 3,
            ..Default::default()
        }
    }

    fn one_enemy() -> Vec<WaveSpec> {
        vec![WaveSpec {
            enemy: ENEMY,
            count: 1,
            random_range: Vec3::ZERO,
            ..Default::default()
        }]
    }

    fn shot(projectile: PrototypeId, position: Vec3, direction: Vec3, faction: Faction) -> FireRequest {
        FireRequest {
            projectile,
            position,
            direction: direction.normalize(),
            speed_multiplier: 1.0,
            damage_multiplier: 1.0,
            faction,
        }
    }

    fn effects_played(events: &[SimEvent]) -> Vec<PrototypeId> {
        events
            .iter()
            .filter_map(|event| match event {
                SimEvent::EffectSpawned { prototype, .. } => Some(*prototype),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_tick_enters_playing_and_spawns() {
        let mut sim = Simulation::new(level(one_enemy()), Arena::new());
        sim.tick(SIM_DT);
        assert_eq!(sim.state(), LevelState::Playing);
        assert_eq!(sim.live_enemies(), 1);

        let events = sim.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::EnemySpawned { prototype, position, .. }
                if *prototype == ENEMY && *position == Vec3::new(0.0, 0.0, 10.0)
        )));
        let transitions: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Level(t) => Some(t.to),
                _ => None,
            })
            .collect();
        assert_eq!(transitions, vec![LevelState::Intro, LevelState::Playing]);
    }

    #[test]
    fn test_player_shot_kills_enemy() {
        let mut sim = Simulation::new(level(one_enemy()), Arena::new());
        sim.tick(SIM_DT);
        sim.drain_events();

        let mut weapon = Weapon::new(
            &[WeaponSlotSpec {
                projectile: BOLT,
                ..Default::default()
            }],
            false,
        );
        let fired = sim.fire_player_weapon(&mut weapon, &Transform::default());
        assert_eq!(fired.len(), 1);
        assert_eq!(sim.live_projectiles(), 1);

        for _ in 0..60 {
            sim.tick(SIM_DT);
        }
        let events = sim.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::EnemyKilled { score: 250, .. }
        )));
        assert_eq!(sim.score, 250);
        assert_eq!(sim.live_enemies(), 0);
        assert_eq!(sim.live_projectiles(), 0);

        // A unit hit always consumes the projectile: strong effect, then the death effect
        assert_eq!(effects_played(&events), vec![HIT_FX, DEATH_FX]);
        assert_eq!(sim.pool.in_use_count(ENEMY), 0);
        assert_eq!(sim.pool.in_use_count(BOLT), 0);
    }

    #[test]
    fn test_clash_between_factions() {
        let mut sim = Simulation::new(level(Vec::new()), Arena::new());
        sim.tick(SIM_DT);

        let bolt = sim
            .fire(&shot(BOLT, Vec3::ZERO, Vec3::Z, Faction::Player))
            .unwrap();
        let pellet = sim
            .fire(&shot(PELLET, Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, Faction::Enemy))
            .unwrap();
        sim.drain_events();

        for _ in 0..30 {
            sim.tick(SIM_DT);
        }
        assert!(!sim.pool.is_active(pellet));
        let survivor = sim.pool.get(bolt).and_then(Entity::as_projectile).unwrap();
        assert!(survivor.is_active());
        assert!((survivor.durability - 1.0).abs() < 1e-5);

        let mut played = effects_played(&sim.drain_events());
        played.sort();
        assert_eq!(played, vec![HIT_FX, BOUNCE_FX]);
    }

    #[test]
    fn test_enemy_projectiles_pass_through_enemies() {
        let mut sim = Simulation::new(level(one_enemy()), Arena::new());
        sim.tick(SIM_DT);
        let pellet = sim
            .fire(&shot(PELLET, Vec3::new(0.0, 0.0, 12.0), Vec3::NEG_Z, Faction::Enemy))
            .unwrap();
        for _ in 0..20 {
            sim.tick(SIM_DT);
        }
        assert!(sim.pool.is_active(pellet));
        assert_eq!(sim.live_enemies(), 1);
    }

    #[test]
    fn test_ricochet_then_exhausted_in_corridor() {
        let mut sim = Simulation::new(level(Vec::new()), Arena::corridor(4.0));
        sim.tick(SIM_DT);
        let bolt = sim
            .fire(&shot(BOLT, Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0), Faction::Player))
            .unwrap();
        sim.drain_events();

        let mut bounced = false;
        for _ in 0..30 {
            sim.tick(SIM_DT);
            let projectile = sim.pool.get(bolt).and_then(Entity::as_projectile).unwrap();
            if projectile.bounce_count == 1 {
                bounced = true;
                assert!(projectile.direction.x < 0.0);
                assert!((projectile.speed - 20.0 * 0.9).abs() < 1e-4);
                assert!((projectile.damage_power - 2.0 * 0.8).abs() < 1e-4);
                break;
            }
        }
        assert!(bounced);

        for _ in 0..90 {
            sim.tick(SIM_DT);
        }
        assert!(!sim.pool.is_active(bolt));
        assert_eq!(effects_played(&sim.drain_events()), vec![BOUNCE_FX, HIT_FX]);
        assert_eq!(sim.physics.touching_len(), 0);
    }

    #[test]
    fn test_projectile_expires_silently() {
        let mut sim = Simulation::new(level(Vec::new()), Arena::new());
        sim.tick(SIM_DT);
        let bolt = sim
            .fire(&shot(BOLT, Vec3::ZERO, Vec3::Z, Faction::Player))
            .unwrap();
        sim.drain_events();

        // Default lifetime is 3 s
        for _ in 0..200 {
            sim.tick(SIM_DT);
        }
        assert!(!sim.pool.is_active(bolt));
        let events = sim.drain_events();
        assert!(events.contains(&SimEvent::ProjectileExpired { id: bolt }));
        assert!(effects_played(&events).is_empty());
        assert!(sim.pool.is_queued(bolt));
    }

    #[test]
    fn test_restart_level_recalls_everything() {
        let mut sim = Simulation::new(level(one_enemy()), Arena::new());
        sim.tick(SIM_DT);
        sim.fire(&shot(PELLET, Vec3::new(0.0, 0.0, 30.0), Vec3::Z, Faction::Enemy));
        let live = sim.pool.live_count();
        assert!(live > 0);

        // Mid-level restarts are refused
        assert!(!sim.restart_level());
        assert_eq!(sim.state(), LevelState::Playing);
        assert_eq!(sim.pool.live_count(), live);

        sim.player_destroyed();
        assert!(sim.restart_level());
        assert_eq!(sim.pool.live_count(), 0);
        assert_eq!(sim.score, 0);
        assert_eq!(sim.state(), LevelState::Loading);
        assert!(sim.drain_events().iter().any(|e| matches!(
            e,
            SimEvent::Level(t) if t.to == LevelState::Loading
        )));

        sim.tick(SIM_DT);
        assert_eq!(sim.state(), LevelState::Playing);
        assert_eq!(sim.live_enemies(), 1);
    }

    #[test]
    fn test_player_destroyed_defeats() {
        let mut sim = Simulation::new(level(one_enemy()), Arena::new());
        sim.tick(SIM_DT);
        sim.player_destroyed();
        assert_eq!(sim.state(), LevelState::Defeat);
        assert!(matches!(
            sim.drain_events().last(),
            Some(SimEvent::Level(t)) if t.to == LevelState::Defeat
        ));
    }

    #[test]
    fn test_advance_accumulates_partial_frames() {
        let mut sim = Simulation::new(level(Vec::new()), Arena::new());
        assert_eq!(sim.advance(SIM_DT * 0.5), 0);
        assert_eq!(sim.advance(SIM_DT * 0.5), 1);
        assert_eq!(sim.time_ticks, 1);

        // Long frames are clamped
        let ran = sim.advance(10.0);
        assert!((5..=MAX_SUBSTEPS).contains(&ran));
    }

    #[test]
    fn test_demo_level_is_won_and_deterministic() {
        let run = || {
            let mut sim = Simulation::new(LevelConfig::demo(), Arena::corridor(12.0));
            let mut events = Vec::new();
            for _ in 0..(90.0 / SIM_DT) as usize {
                sim.tick(SIM_DT);
                events.extend(sim.drain_events());
                if sim.state().is_finished() {
                    break;
                }
            }
            (sim.state(), events)
        };

        let (state, events) = run();
        assert_eq!(state, LevelState::Victory);
        let spawned = events
            .iter()
            .filter(|e| matches!(e, SimEvent::EnemySpawned { .. }))
            .count();
        let escaped = events
            .iter()
            .filter(|e| matches!(e, SimEvent::EnemyEscaped { .. }))
            .count();
        assert_eq!(spawned, 8);
        assert_eq!(escaped, 8);
        assert!(events.iter().any(|e| matches!(e, SimEvent::ProjectileFired { faction: Faction::Enemy, .. })));

        let (_, replay) = run();
        assert_eq!(events, replay);
    }
}
