//! Collision processor: keeps the spatial index in step with the ECS world and
//! turns it into pairs and contacts.

use std::collections::{HashMap, HashSet};

use glam::{Affine2, Vec2};
use hecs::Entity;

use super::bounds::BoundingBox;
use super::broadphase::{create_index, Proxy, SpatialIndex};
use super::collider::{Collider, ColliderHandle, ColliderId};
use super::config::{BroadphaseConfig, FastBodyConfig, PhysicsConfig};
use super::contact::Contact;
use super::narrowphase;
use super::pair::{Pair, PairId};
use super::ray::{Ray, RayCastHit};
use crate::ecs::components::physics::{CollisionGroup, CollisionType, RigidBody};
use crate::ecs::components::transform::{GlobalTransform, Transform};
use crate::error::{PhysicsError, Result};

/// Counters for the most recent step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub pairs: usize,
    pub contacts: usize,
    pub fast_bodies: usize,
    pub fast_body_collisions: usize,
    /// Proxies whose index placement changed during `update`.
    pub moved: usize,
}

/// Options for [`CollisionProcessor::ray_cast`].
#[derive(Clone, Copy)]
pub struct RayCastOptions<'a> {
    pub max_distance: f32,
    /// Only hit bodies whose group collides with this one.
    pub collision_group: Option<CollisionGroup>,
    /// Only hit bodies whose category intersects this mask.
    pub collision_mask: Option<u32>,
    /// Return every hit ordered by distance instead of only the nearest.
    pub search_all_colliders: bool,
    /// Applied to each hit after the group checks.
    pub filter: Option<&'a dyn Fn(&RayCastHit) -> bool>,
}

impl Default for RayCastOptions<'_> {
    fn default() -> Self {
        Self {
            max_distance: f32::INFINITY,
            collision_group: None,
            collision_mask: None,
            search_all_colliders: false,
            filter: None,
        }
    }
}

/// Broadphase and narrowphase front end over a [`SpatialIndex`].
pub struct CollisionProcessor {
    index: Box<dyn SpatialIndex>,
    broadphase: BroadphaseConfig,
    fast_body: FastBodyConfig,
    gravity: Vec2,
    /// Leaf ids tracked per entity.
    tracked: HashMap<Entity, Vec<ColliderId>>,
    /// Entities dropped for leaving the world bounds or removed by the
    /// caller. `sync` skips them until they are tracked explicitly.
    excluded: HashSet<Entity>,
    stats: FrameStats,
}

impl CollisionProcessor {
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            index: create_index(&config.broadphase),
            broadphase: config.broadphase,
            fast_body: config.fast_body,
            gravity: config.gravity,
            tracked: HashMap::new(),
            excluded: HashSet::new(),
            stats: FrameStats::default(),
        }
    }

    /// Apply a new configuration. A change of index settings drops every
    /// proxy; the next [`sync`](Self::sync) re-tracks the world.
    pub fn configure(&mut self, config: &PhysicsConfig) {
        self.fast_body = config.fast_body;
        self.gravity = config.gravity;
        if self.broadphase == config.broadphase {
            return;
        }
        tracing::debug!("replacing spatial index with {:?}", config.broadphase.kind);
        self.broadphase = config.broadphase;
        self.index = create_index(&config.broadphase);
        self.tracked.clear();
    }

    pub fn index(&self) -> &dyn SpatialIndex {
        self.index.as_ref()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn is_tracked(&self, entity: Entity) -> bool {
        self.tracked.contains_key(&entity)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Start tracking an entity's collider. The entity needs a [`Collider`]
    /// and a [`RigidBody`]; re-tracking replaces the previous proxies.
    pub fn track(&mut self, world: &hecs::World, entity: Entity) -> Result<()> {
        let velocity = world
            .get::<&RigidBody>(entity)
            .map_err(|_| PhysicsError::MissingBody(entity))?
            .linear_velocity;
        let transform = world_transform(world, entity);
        let mut collider = world
            .get::<&mut Collider>(entity)
            .map_err(|_| PhysicsError::MissingCollider(entity))?;
        collider.set_owner(entity);
        collider.update(&transform);

        if self.tracked.contains_key(&entity) {
            self.untrack(entity);
        }
        let mut ids = Vec::with_capacity(collider.leaves().len());
        for leaf in collider.leaves() {
            self.index.track(Proxy::new(leaf.handle(), leaf.bounds(), velocity));
            ids.push(leaf.id());
        }
        tracing::debug!("tracking {:?} with {} collider(s)", entity, ids.len());
        self.tracked.insert(entity, ids);
        self.excluded.remove(&entity);
        Ok(())
    }

    /// Stop tracking an entity. Returns false when it was not tracked.
    pub fn untrack(&mut self, entity: Entity) -> bool {
        let Some(ids) = self.tracked.remove(&entity) else {
            return false;
        };
        for id in ids {
            self.index.untrack(id);
        }
        true
    }

    /// Untrack an entity and keep [`sync`](Self::sync) from picking it up
    /// again. Returns false when it was not tracked.
    pub fn exclude(&mut self, entity: Entity) -> bool {
        self.excluded.insert(entity);
        self.untrack(entity)
    }

    pub fn is_excluded(&self, entity: Entity) -> bool {
        self.excluded.contains(&entity)
    }

    /// Track newly spawned bodies, drop despawned ones, and re-track bodies
    /// whose collider changed its leaves.
    pub fn sync(&mut self, world: &hecs::World) {
        let stale: Vec<Entity> = self
            .tracked
            .iter()
            .filter(|(entity, ids)| {
                let Ok(collider) = world.get::<&Collider>(**entity) else {
                    return true;
                };
                world.get::<&RigidBody>(**entity).is_err()
                    || collider.leaves().len() != ids.len()
                    || collider.leaves().iter().zip(ids.iter()).any(|(leaf, id)| leaf.id() != *id)
            })
            .map(|(entity, _)| *entity)
            .collect();
        for entity in stale {
            self.untrack(entity);
        }
        self.excluded.retain(|entity| world.contains(*entity));

        let mut fresh: Vec<Entity> = world
            .query::<(&Collider, &RigidBody)>()
            .iter()
            .map(|(entity, _)| entity)
            .filter(|entity| !self.tracked.contains_key(entity) && !self.excluded.contains(entity))
            .collect();
        fresh.sort_by_key(|entity| entity.id());
        for entity in fresh {
            if let Err(err) = self.track(world, entity) {
                tracing::warn!("could not track {:?}: {}", entity, err);
            }
        }
    }

    /// Push current leaf bounds and velocities into the index. Returns the
    /// number of proxies whose placement changed.
    pub fn update(&mut self, world: &hecs::World, elapsed: f32) -> usize {
        let mut proxies = Vec::with_capacity(self.index.len());
        for (entity, (collider, body)) in world.query::<(&Collider, &RigidBody)>().iter() {
            if !self.tracked.contains_key(&entity) {
                continue;
            }
            for leaf in collider.leaves() {
                proxies.push(Proxy::new(leaf.handle(), leaf.bounds(), body.linear_velocity));
            }
        }
        let moved = self.index.update(&proxies, elapsed);

        let escaped: Vec<Entity> = self
            .tracked
            .iter()
            .filter(|(_, ids)| ids.iter().all(|id| !self.index.contains(*id)))
            .map(|(entity, _)| *entity)
            .collect();
        for entity in escaped {
            self.untrack(entity);
            self.excluded.insert(entity);
        }

        self.stats = FrameStats {
            moved,
            ..FrameStats::default()
        };
        moved
    }

    /// Candidate pairs for this step, including pairs found by the fast body
    /// ray casts (which may move the bodies involved).
    pub fn broadphase(&mut self, world: &hecs::World, elapsed: f32) -> Vec<Pair> {
        let mut seen = HashSet::new();
        let mut pairs = self.overlapping_pairs(world, &mut seen);
        if self.fast_body.enabled {
            self.fast_body_pairs(world, elapsed, &mut pairs, &mut seen);
        }
        self.stats.pairs = pairs.len();
        tracing::trace!("broadphase produced {} pairs", pairs.len());
        pairs
    }

    fn overlapping_pairs(&self, world: &hecs::World, seen: &mut HashSet<PairId>) -> Vec<Pair> {
        let mut query = world.query::<(&Collider, &RigidBody)>();
        let bodies: HashMap<Entity, (&Collider, &RigidBody)> = query
            .iter()
            .filter(|(entity, _)| self.tracked.contains_key(entity))
            .collect();
        let mut entities: Vec<Entity> = bodies.keys().copied().collect();
        entities.sort_by_key(|entity| entity.id());

        let mut pairs = Vec::new();
        for entity in entities {
            let (collider, body) = bodies[&entity];
            for leaf in collider.leaves() {
                self.index.query(&leaf.bounds(), &mut |proxy: &Proxy| {
                    let other_entity = proxy.handle.entity;
                    if other_entity == entity {
                        return false;
                    }
                    let id = PairId::new(leaf.id(), proxy.id());
                    if seen.contains(&id) {
                        return false;
                    }
                    let Some(&(other_collider, other_body)) = bodies.get(&other_entity) else {
                        return false;
                    };
                    let Some(other_leaf) = resolve(other_collider, proxy.id()) else {
                        return false;
                    };
                    if Pair::can_collide(leaf, other_leaf, Some(body), Some(other_body)) {
                        seen.insert(id);
                        pairs.push(ordered_pair(leaf.handle(), other_leaf.handle()));
                    }
                    false
                });
            }
        }
        pairs
    }

    /// Ray casts along the velocity of fast active bodies and snaps any body
    /// that would tunnel through a collider back onto its surface.
    fn fast_body_pairs(
        &mut self,
        world: &hecs::World,
        elapsed: f32,
        pairs: &mut Vec<Pair>,
        seen: &mut HashSet<PairId>,
    ) {
        let surface_epsilon = self.fast_body.surface_epsilon;
        let mut snaps: Vec<(Entity, Vec2)> = Vec::new();
        {
            let mut query = world.query::<(&Collider, &RigidBody, Option<&Transform>)>();
            let bodies: HashMap<Entity, (&Collider, &RigidBody, Option<&Transform>)> = query
                .iter()
                .filter(|(entity, _)| self.tracked.contains_key(entity))
                .collect();
            let mut entities: Vec<Entity> = bodies.keys().copied().collect();
            entities.sort_by_key(|entity| entity.id());

            for entity in entities {
                let (collider, body, transform) = bodies[&entity];
                let Some(transform) = transform else {
                    continue;
                };
                if body.collision_type != CollisionType::Active || !body.active || body.is_sleeping() {
                    continue;
                }
                let velocity = body.linear_velocity;
                if velocity == Vec2::ZERO {
                    continue;
                }

                let gravity = if body.use_gravity { self.gravity } else { Vec2::ZERO };
                let acceleration = body.acceleration + gravity;
                let travel =
                    velocity.length() * elapsed + 0.5 * acceleration.length() * elapsed * elapsed;
                let bounds = collider.bounds();
                let min_dimension = bounds.width().min(bounds.height());
                if !self.fast_body.force && travel <= min_dimension * 0.5 {
                    continue;
                }
                self.stats.fast_bodies += 1;

                // Start from where the leading point was before integration.
                let step = transform.position - body.old_position();
                let center = collider.center();
                let furthest = collider.furthest_point(velocity);
                let origin = furthest - step;
                let mut ray = Ray::new(origin, velocity);
                ray.origin -= ray.dir * (2.0 * surface_epsilon);
                let reach = travel + 4.0 * surface_epsilon;

                let mut nearest: Option<(RayCastHit, ColliderHandle)> = None;
                self.index.ray_cast_query(&ray, reach, &mut |proxy: &Proxy| {
                    let other_entity = proxy.handle.entity;
                    if other_entity == entity {
                        return false;
                    }
                    let Some(&(other_collider, other_body, _)) = bodies.get(&other_entity) else {
                        return false;
                    };
                    let Some(other_leaf) = resolve(other_collider, proxy.id()) else {
                        return false;
                    };
                    if !Pair::can_collide(collider, other_leaf, Some(body), Some(other_body)) {
                        return false;
                    }
                    if let Some(hit) = other_leaf.ray_cast(&ray, reach) {
                        if nearest.map_or(true, |(best, _)| hit.distance < best.distance) {
                            nearest = Some((hit, other_leaf.handle()));
                        }
                    }
                    false
                });

                let Some((hit, other)) = nearest else {
                    continue;
                };
                let pair = ordered_pair(collider.handle(), other);
                if seen.insert(pair.id) {
                    pairs.push(pair);
                }
                // Leave the leading point just inside the surface so the
                // contact resolves it this step.
                let target_center = hit.point + (center - furthest) + ray.dir * surface_epsilon;
                snaps.push((entity, target_center - center));
                self.stats.fast_body_collisions += 1;
                tracing::debug!(
                    "fast body {:?} hit collider {} at distance {:.3}",
                    entity,
                    other.id,
                    hit.distance
                );
            }
        }

        for (entity, shift) in snaps {
            let Ok(mut transform) = world.get::<&mut Transform>(entity) else {
                continue;
            };
            transform.position += shift;
            let affine = transform.to_affine();
            if let Ok(mut global) = world.get::<&mut GlobalTransform>(entity) {
                global.0 = affine;
            }
            if let Ok(mut collider) = world.get::<&mut Collider>(entity) {
                collider.update(&affine);
            }
        }
    }

    /// Contacts for the given pairs. Pairs whose colliders vanished are skipped.
    pub fn narrowphase(&mut self, world: &hecs::World, pairs: &[Pair]) -> Vec<Contact> {
        let mut contacts = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let (Ok(a), Ok(b)) = (
                world.get::<&Collider>(pair.a.entity),
                world.get::<&Collider>(pair.b.entity),
            ) else {
                continue;
            };
            let (Some(leaf_a), Some(leaf_b)) = (resolve(&a, pair.a.id), resolve(&b, pair.b.id)) else {
                continue;
            };
            contacts.extend(narrowphase::collide(leaf_a, leaf_b));
        }
        self.stats.contacts = contacts.len();
        contacts
    }

    /// Leaf colliders whose world bounds overlap `bounds`.
    pub fn query(&self, world: &hecs::World, bounds: &BoundingBox) -> Vec<ColliderHandle> {
        let mut found = Vec::new();
        self.index.query(bounds, &mut |proxy: &Proxy| {
            if let Some(true) = with_leaf(world, proxy.handle, |leaf| leaf.bounds().overlaps(bounds, 0.0)) {
                found.push(proxy.handle);
            }
            false
        });
        found
    }

    /// Leaf colliders containing `point`.
    pub fn query_point(&self, world: &hecs::World, point: Vec2) -> Vec<ColliderHandle> {
        let mut found = Vec::new();
        self.index.query_point(point, &mut |proxy: &Proxy| {
            if let Some(true) = with_leaf(world, proxy.handle, |leaf| leaf.contains(point)) {
                found.push(proxy.handle);
            }
            false
        });
        found
    }

    /// Hits ordered nearest first; only the nearest unless
    /// `search_all_colliders` is set.
    pub fn ray_cast(&self, world: &hecs::World, ray: &Ray, options: RayCastOptions<'_>) -> Vec<RayCastHit> {
        let mut hits: Vec<RayCastHit> = Vec::new();
        self.index.ray_cast_query(ray, options.max_distance, &mut |proxy: &Proxy| {
            let Ok(body) = world.get::<&RigidBody>(proxy.handle.entity) else {
                return false;
            };
            if let Some(group) = options.collision_group {
                if !group.collides_with(&body.group) {
                    return false;
                }
            }
            if let Some(mask) = options.collision_mask {
                if body.group.category & mask == 0 {
                    return false;
                }
            }
            if let Some(Some(hit)) = with_leaf(world, proxy.handle, |leaf| leaf.ray_cast(ray, options.max_distance)) {
                hits.push(hit);
            }
            false
        });
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        if let Some(filter) = options.filter {
            hits.retain(|hit| filter(hit));
        }
        if !options.search_all_colliders {
            hits.truncate(1);
        }
        hits
    }
}

/// The collider itself or the composite leaf with `id`.
fn resolve(collider: &Collider, id: ColliderId) -> Option<&Collider> {
    if collider.id() == id {
        Some(collider)
    } else {
        collider.find_leaf(id)
    }
}

fn with_leaf<T>(world: &hecs::World, handle: ColliderHandle, f: impl FnOnce(&Collider) -> T) -> Option<T> {
    let collider = world.get::<&Collider>(handle.entity).ok()?;
    resolve(&collider, handle.id).map(f)
}

fn ordered_pair(a: ColliderHandle, b: ColliderHandle) -> Pair {
    if a.id <= b.id {
        Pair::new(a, b)
    } else {
        Pair::new(b, a)
    }
}

fn world_transform(world: &hecs::World, entity: Entity) -> Affine2 {
    if let Ok(global) = world.get::<&GlobalTransform>(entity) {
        return global.0;
    }
    world
        .get::<&Transform>(entity)
        .map(|t| t.to_affine())
        .unwrap_or(Affine2::IDENTITY)
}
