//! Scene builders shared by the benchmarks.

use glam::Vec2;
use hecs::{Entity, World};
use rein2d::physics::config::BroadphaseConfig;
use rein2d::{BroadphaseKind, Collider, GlobalTransform, PhysicsConfig, PhysicsWorld, RigidBody, SolverKind, Transform};

/// Small deterministic generator so runs are comparable.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 40) as f32 / (1u64 << 24) as f32
    }

    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }
}

pub fn spawn_body(world: &mut World, collider: Collider, body: RigidBody, position: Vec2) -> Entity {
    let transform = Transform::from_position(position);
    let global = GlobalTransform::from_transform(&transform);
    let mut collider = collider;
    collider.update(&global.0);
    world.spawn((transform, global, body, collider))
}

fn config(solver: SolverKind, broadphase: BroadphaseKind) -> PhysicsConfig {
    PhysicsConfig {
        solver,
        broadphase: BroadphaseConfig {
            kind: broadphase,
            ..BroadphaseConfig::default()
        },
        ..PhysicsConfig::default()
    }
}

pub fn physics(solver: SolverKind, broadphase: BroadphaseKind) -> anyhow::Result<PhysicsWorld> {
    Ok(PhysicsWorld::new(config(solver, broadphase))?)
}

/// `n` alternating circles and boxes scattered over a square sized so
/// roughly a third of them touch a neighbour.
pub fn setup_mixed_world(n: usize) -> World {
    let mut world = World::new();
    let mut rng = Lcg::new(7);
    let extent = (n as f32).sqrt() * 1.5;
    for i in 0..n {
        let position = Vec2::new(rng.range(-extent, extent), rng.range(-extent, extent));
        let collider = if i % 2 == 0 {
            Collider::circle(0.5)
        } else {
            Collider::rectangle(1.0, 1.0)
        };
        let mut body = RigidBody::new_active(1.0);
        body.linear_velocity = Vec2::new(rng.range(-2.0, 2.0), rng.range(-2.0, 2.0));
        spawn_body(&mut world, collider, body, position);
    }
    world
}

/// Same as [`setup_mixed_world`] but with ten times the spacing.
pub fn setup_sparse_world(n: usize) -> World {
    let mut world = World::new();
    let mut rng = Lcg::new(11);
    let extent = (n as f32).sqrt() * 15.0;
    for _ in 0..n {
        let position = Vec2::new(rng.range(-extent, extent), rng.range(-extent, extent));
        spawn_body(&mut world, Collider::circle(0.5), RigidBody::new_active(1.0), position);
    }
    world
}

/// A floor with a pyramid of `rows` rows of unit boxes on it.
pub fn setup_pyramid(rows: usize, solver: SolverKind) -> anyhow::Result<(World, PhysicsWorld)> {
    let mut world = World::new();
    spawn_body(
        &mut world,
        Collider::rectangle(rows as f32 * 4.0, 1.0),
        RigidBody::new_fixed(),
        Vec2::new(0.0, -0.5),
    );
    for row in 0..rows {
        let count = rows - row;
        let start = -(count as f32 - 1.0) * 0.55;
        for i in 0..count {
            let position = Vec2::new(start + i as f32 * 1.1, 0.5 + row as f32 * 1.0);
            spawn_body(&mut world, Collider::rectangle(1.0, 1.0), RigidBody::new_active(1.0), position);
        }
    }
    Ok((world, physics(solver, BroadphaseKind::AabbTree)?))
}

/// Bodies falling onto a floor, ready for pipeline benchmarks.
pub fn setup_scene(n: usize, solver: SolverKind, broadphase: BroadphaseKind) -> anyhow::Result<(World, PhysicsWorld)> {
    let mut world = setup_mixed_world(n);
    let extent = (n as f32).sqrt() * 1.5;
    spawn_body(
        &mut world,
        Collider::rectangle(extent * 4.0, 1.0),
        RigidBody::new_fixed(),
        Vec2::new(0.0, -extent - 2.0),
    );
    Ok((world, physics(solver, broadphase)?))
}
