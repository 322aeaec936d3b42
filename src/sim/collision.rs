//! Collision queries for projectiles
//!
//! The simulation does not own a physics engine. It asks a `PhysicsWorld`
//! for contact events and for raycasts against individual surfaces, so a
//! host engine can stand in for the built-in `Arena`.

use std::collections::BTreeSet;

use glam::Vec3;

use super::pool::InstanceId;

/// Half-line used for ricochet casts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length
    pub direction: Vec3,
}

impl Ray {
    /// Build a ray; a zero direction falls back to +Z
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(Vec3::Z),
        }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Result of a successful raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    /// Unit surface normal facing the ray origin
    pub normal: Vec3,
    pub distance: f32,
}

/// Handle to a static surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

/// The other party of a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collider {
    Instance(InstanceId),
    Surface(SurfaceId),
}

/// A contact that began this tick; `body` is always a projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub body: InstanceId,
    pub other: Collider,
}

/// Collision layer of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    PlayerProjectile,
    EnemyProjectile,
    Enemy,
}

impl Layer {
    /// Layer interaction matrix
    ///
    /// Player shots hit enemies and enemy shots. Enemy shots only clash with
    /// player shots; hits on the player are the host's business.
    pub fn interacts_with(self, other: Layer) -> bool {
        matches!(
            (self, other),
            (Layer::PlayerProjectile, Layer::Enemy)
                | (Layer::Enemy, Layer::PlayerProjectile)
                | (Layer::PlayerProjectile, Layer::EnemyProjectile)
                | (Layer::EnemyProjectile, Layer::PlayerProjectile)
        )
    }

    pub fn is_projectile(self) -> bool {
        matches!(self, Layer::PlayerProjectile | Layer::EnemyProjectile)
    }

    /// Whether bodies on this layer collide with static surfaces
    pub fn hits_world(self) -> bool {
        self.is_projectile()
    }
}

/// Collision proxy of a pooled instance for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub id: InstanceId,
    pub position: Vec3,
    pub radius: f32,
    pub layer: Layer,
}

/// Collision services the projectile simulation relies on
pub trait PhysicsWorld {
    /// True for surfaces projectiles ricochet off
    fn is_environment(&self, surface: SurfaceId) -> bool;

    /// Cast against a single surface
    fn raycast(&self, surface: SurfaceId, ray: Ray, max_distance: f32) -> Option<RayHit>;

    /// Contacts that began since the previous call
    fn contacts(&mut self, bodies: &[Body]) -> Vec<Contact>;

    /// Forget any contact state held for an instance that left the world
    fn release(&mut self, _id: InstanceId) {}
}

/// Signed distance to a sphere
#[inline]
pub fn sd_sphere(p: Vec3, center: Vec3, radius: f32) -> f32 {
    (p - center).length() - radius
}

/// Infinite one-sided plane wall
///
/// Points with `normal · p > offset` are in front of the wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub id: SurfaceId,
    /// Unit normal pointing into the playable space
    pub normal: Vec3,
    pub offset: f32,
    /// Projectiles ricochet off environment surfaces and ignore the rest
    pub environment: bool,
}

impl Surface {
    pub fn new(id: SurfaceId, normal: Vec3, offset: f32) -> Self {
        Self {
            id,
            normal: normal.try_normalize().unwrap_or(Vec3::Y),
            offset,
            environment: true,
        }
    }

    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.offset
    }

    /// Front-face raycast; rays leaving the wall or running parallel miss
    pub fn raycast(&self, ray: Ray, max_distance: f32) -> Option<RayHit> {
        let denom = self.normal.dot(ray.direction);
        if denom >= -f32::EPSILON {
            return None;
        }
        let t = -self.signed_distance(ray.origin) / denom;
        if !(0.0..=max_distance).contains(&t) {
            return None;
        }
        Some(RayHit {
            point: ray.at(t),
            normal: self.normal,
            distance: t,
        })
    }
}

/// Plane-walled arena with sphere bodies and enter-only contact reporting
#[derive(Debug, Clone, Default)]
pub struct Arena {
    surfaces: Vec<Surface>,
    touching: BTreeSet<(InstanceId, Collider)>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two environment walls at `x = ±half_width` facing each other
    pub fn corridor(half_width: f32) -> Self {
        let mut arena = Self::new();
        arena.add_surface(Vec3::X, -half_width, true);
        arena.add_surface(Vec3::NEG_X, -half_width, true);
        arena
    }

    pub fn add_surface(&mut self, normal: Vec3, offset: f32, environment: bool) -> SurfaceId {
        let id = SurfaceId(self.surfaces.len() as u32);
        let mut surface = Surface::new(id, normal, offset);
        surface.environment = environment;
        self.surfaces.push(surface);
        id
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(id.0 as usize)
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    /// Pairs currently in contact
    pub fn touching_len(&self) -> usize {
        self.touching.len()
    }

    fn overlapping(&self, bodies: &[Body]) -> BTreeSet<(InstanceId, Collider)> {
        let mut pairs = BTreeSet::new();
        for (i, a) in bodies.iter().enumerate() {
            for b in &bodies[i + 1..] {
                if !a.layer.interacts_with(b.layer) {
                    continue;
                }
                if sd_sphere(a.position, b.position, a.radius + b.radius) >= 0.0 {
                    continue;
                }
                // Projectile first; two projectiles are keyed by the lower id
                let (first, second) = match (a.layer.is_projectile(), b.layer.is_projectile()) {
                    (true, true) if b.id < a.id => (b, a),
                    (true, _) => (a, b),
                    (false, _) => (b, a),
                };
                pairs.insert((first.id, Collider::Instance(second.id)));
            }

            if a.layer.hits_world() {
                for surface in &self.surfaces {
                    if surface.signed_distance(a.position) < a.radius {
                        pairs.insert((a.id, Collider::Surface(surface.id)));
                    }
                }
            }
        }
        pairs
    }
}

impl PhysicsWorld for Arena {
    fn is_environment(&self, surface: SurfaceId) -> bool {
        self.surface(surface).is_some_and(|s| s.environment)
    }

    fn raycast(&self, surface: SurfaceId, ray: Ray, max_distance: f32) -> Option<RayHit> {
        self.surface(surface)?.raycast(ray, max_distance)
    }

    fn contacts(&mut self, bodies: &[Body]) -> Vec<Contact> {
        let current = self.overlapping(bodies);
        let began = current
            .difference(&self.touching)
            .map(|&(body, other)| Contact { body, other })
            .collect();
        self.touching = current;
        began
    }

    fn release(&mut self, id: InstanceId) {
        self.touching
            .retain(|&(body, other)| body != id && other != Collider::Instance(id));
    }
}
