//! Sleep islands.
//!
//! Active bodies linked by contacts form an island. Islands are rebuilt from
//! scratch every step and fall asleep or wake up as a whole. Fixed bodies
//! never join an island, so a resting stack on the ground is an island of its
//! own even though every member touches the same floor.

use std::collections::{HashMap, HashSet};

use hecs::Entity;

use super::config::SleepConfig;
use super::contact::Contact;
use crate::ecs::components::physics::{CollisionType, RigidBody};

/// Outcome of one island pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IslandStats {
    pub islands: usize,
    pub slept: usize,
    pub woken: usize,
}

/// Union-find over body indices.
#[derive(Debug, Default)]
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn reset(&mut self, len: usize) {
        self.parent.clear();
        self.parent.extend(0..len);
        self.rank.clear();
        self.rank.resize(len, 0);
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct IslandManager {
    sets: DisjointSet,
    stats: IslandStats,
}

impl IslandManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> IslandStats {
        self.stats
    }

    /// Update sleep averages for bodies the solver did not touch, group the
    /// Active bodies by this step's contacts, then put still islands to sleep
    /// and wake islands with a moving member.
    pub fn update(
        &mut self,
        world: &mut hecs::World,
        contacts: &[Contact],
        motion_tracked: &HashSet<Entity>,
        config: &SleepConfig,
        wake_motion: f32,
        dt: f32,
    ) -> IslandStats {
        let mut members: Vec<Entity> = Vec::new();
        for (entity, body) in world.query_mut::<&mut RigidBody>() {
            body.island = None;
            if body.collision_type != CollisionType::Active || !body.active {
                continue;
            }
            if !body.is_sleeping() && !motion_tracked.contains(&entity) {
                body.sleep
                    .update_motion(body.linear_velocity, body.angular_velocity, config, dt);
            }
            members.push(entity);
        }
        members.sort_by_key(|e| e.id());
        let index: HashMap<Entity, usize> = members.iter().enumerate().map(|(i, e)| (*e, i)).collect();

        self.sets.reset(members.len());
        for contact in contacts.iter().filter(|c| !c.is_cancelled()) {
            let (Some(&a), Some(&b)) = (
                index.get(&contact.collider_a.entity),
                index.get(&contact.collider_b.entity),
            ) else {
                continue;
            };
            self.sets.union(a, b);
        }

        let mut islands: HashMap<usize, Vec<Entity>> = HashMap::new();
        for (i, entity) in members.iter().enumerate() {
            islands.entry(self.sets.find(i)).or_default().push(*entity);
        }
        let mut roots: Vec<usize> = islands.keys().copied().collect();
        roots.sort_unstable();

        let mut stats = IslandStats {
            islands: roots.len(),
            ..IslandStats::default()
        };
        for (island, root) in roots.into_iter().enumerate() {
            let bodies = &islands[&root];
            let mut any_sleeping = false;
            let mut any_stirring = false;
            let mut all_candidates = true;
            let mut min_timer = f32::MAX;
            for &entity in bodies {
                let Ok(mut body) = world.get::<&mut RigidBody>(entity) else {
                    continue;
                };
                body.island = Some(island);
                if body.is_sleeping() {
                    any_sleeping = true;
                } else if body.sleep.motion > config.wake_threshold {
                    any_stirring = true;
                }
                all_candidates &= body.is_sleeping() || body.sleep.is_candidate(config);
                min_timer = min_timer.min(body.sleep.timer);
            }

            if !config.enabled || (any_sleeping && any_stirring) {
                stats.woken += self.set_island_sleeping(world, bodies, false, wake_motion);
            } else if all_candidates && min_timer > config.sleep_time {
                stats.slept += self.set_island_sleeping(world, bodies, true, wake_motion);
            }
        }

        if stats.slept > 0 || stats.woken > 0 {
            tracing::debug!(
                "islands: {} total, {} bodies slept, {} woke",
                stats.islands,
                stats.slept,
                stats.woken
            );
        }
        self.stats = stats;
        stats
    }

    fn set_island_sleeping(&self, world: &hecs::World, bodies: &[Entity], sleeping: bool, wake_motion: f32) -> usize {
        let mut changed = 0;
        for &entity in bodies {
            if let Ok(mut body) = world.get::<&mut RigidBody>(entity) {
                if body.is_sleeping() != sleeping {
                    body.set_sleeping(sleeping, wake_motion);
                    changed += 1;
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::physics::collider::Collider;
    use crate::physics::solver::testing::spawn;

    fn chain(world: &mut hecs::World) -> (Vec<Entity>, Vec<Contact>) {
        let mut bodies = Vec::new();
        for i in 0..3 {
            let mut body = RigidBody::new_active(1.0);
            body.use_gravity = false;
            body.sleep.motion = 0.0;
            bodies.push(spawn(world, Collider::rectangle(1.0, 1.0), body, Vec2::new(i as f32 * 0.9, 0.0)));
        }
        let mut contacts = Vec::new();
        for pair in bodies.windows(2) {
            let a = world.get::<&Collider>(pair[0]).unwrap();
            let b = world.get::<&Collider>(pair[1]).unwrap();
            contacts.extend(a.collide(&b));
        }
        assert_eq!(contacts.len(), 2);
        (bodies, contacts)
    }

    fn sleeping(world: &hecs::World, bodies: &[Entity]) -> usize {
        bodies
            .iter()
            .filter(|e| world.get::<&RigidBody>(**e).unwrap().is_sleeping())
            .count()
    }

    #[test]
    fn test_island_sleeps_only_when_every_member_is_still() {
        let mut world = hecs::World::new();
        let (bodies, contacts) = chain(&mut world);
        let config = SleepConfig::default();
        let mut islands = IslandManager::new();
        let tracked = HashSet::new();

        world.get::<&mut RigidBody>(bodies[2]).unwrap().linear_velocity = Vec2::new(2.0, 0.0);
        for _ in 0..10 {
            let stats = islands.update(&mut world, &contacts, &tracked, &config, 0.35, 0.5);
            assert_eq!(stats.islands, 1);
            assert_eq!(sleeping(&world, &bodies), 0, "one moving body keeps the island awake");
        }
        assert!(world.get::<&RigidBody>(bodies[0]).unwrap().sleep.timer > config.sleep_time);

        world.get::<&mut RigidBody>(bodies[2]).unwrap().linear_velocity = Vec2::ZERO;
        let mut steps = 0;
        loop {
            islands.update(&mut world, &contacts, &tracked, &config, 0.35, 0.5);
            steps += 1;
            let count = sleeping(&world, &bodies);
            if count > 0 {
                assert_eq!(count, 3, "the whole island falls asleep together");
                break;
            }
            assert!(steps < 100, "island never slept");
        }
        assert_eq!(world.get::<&RigidBody>(bodies[1]).unwrap().island(), Some(0));
    }

    #[test]
    fn test_one_woken_member_wakes_the_island() {
        let mut world = hecs::World::new();
        let (bodies, contacts) = chain(&mut world);
        let config = SleepConfig::default();
        let mut islands = IslandManager::new();
        for &entity in &bodies {
            world.get::<&mut RigidBody>(entity).unwrap().set_sleeping(true, 0.35);
        }

        {
            let mut body = world.get::<&mut RigidBody>(bodies[0]).unwrap();
            body.set_sleeping(false, 0.35);
            body.linear_velocity = Vec2::new(0.0, 3.0);
        }
        let stats = islands.update(&mut world, &contacts, &HashSet::new(), &config, 0.35, 1.0 / 60.0);
        assert_eq!(stats.woken, 2);
        assert_eq!(sleeping(&world, &bodies), 0);
    }

    #[test]
    fn test_fixed_bodies_do_not_join_islands() {
        let mut world = hecs::World::new();
        let floor = spawn(&mut world, Collider::rectangle(10.0, 1.0), RigidBody::new_fixed(), Vec2::ZERO);
        let left = spawn(&mut world, Collider::rectangle(1.0, 1.0), RigidBody::new_active(1.0), Vec2::new(-3.0, 0.9));
        let right = spawn(&mut world, Collider::rectangle(1.0, 1.0), RigidBody::new_active(1.0), Vec2::new(3.0, 0.9));
        let mut contacts = Vec::new();
        for body in [left, right] {
            let a = world.get::<&Collider>(floor).unwrap();
            let b = world.get::<&Collider>(body).unwrap();
            contacts.extend(a.collide(&b));
        }

        let stats = IslandManager::new().update(
            &mut world,
            &contacts,
            &HashSet::new(),
            &SleepConfig::default(),
            0.35,
            1.0 / 60.0,
        );
        assert_eq!(stats.islands, 2);
        assert_eq!(world.get::<&RigidBody>(floor).unwrap().island(), None);
        assert_ne!(
            world.get::<&RigidBody>(left).unwrap().island(),
            world.get::<&RigidBody>(right).unwrap().island()
        );
    }

    #[test]
    fn test_disabled_sleep_keeps_bodies_awake() {
        let mut world = hecs::World::new();
        let (bodies, contacts) = chain(&mut world);
        let config = SleepConfig {
            enabled: false,
            ..SleepConfig::default()
        };
        let mut islands = IslandManager::new();
        for _ in 0..20 {
            islands.update(&mut world, &contacts, &HashSet::new(), &config, 0.35, 0.5);
        }
        assert_eq!(sleeping(&world, &bodies), 0);
    }
}
