//! Headless demo: drop a ball onto a box pyramid and report what happens.
//!
//! RUST_LOG=debug cargo run --manifest-path rein-app/Cargo.toml

use glam::Vec2;
use rein2d::physics::processor::RayCastOptions;
use rein2d::{
    Collider, CollisionEvent, GlobalTransform, PhysicsConfig, PhysicsWorld, Ray, RigidBody, Transform,
};

const ROWS: usize = 6;
const FRAME: f64 = 1.0 / 60.0;

fn spawn(world: &mut hecs::World, collider: Collider, body: RigidBody, position: Vec2) -> hecs::Entity {
    let transform = Transform::from_position(position);
    let global = GlobalTransform::from_transform(&transform);
    world.spawn((transform, global, body, collider))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut world = hecs::World::new();
    let mut physics = PhysicsWorld::new(PhysicsConfig::default())?;

    spawn(
        &mut world,
        Collider::rectangle(30.0, 1.0),
        RigidBody::new_fixed(),
        Vec2::new(0.0, -0.5),
    );
    for row in 0..ROWS {
        let count = ROWS - row;
        let start = -(count as f32 - 1.0) * 0.55;
        for i in 0..count {
            spawn(
                &mut world,
                Collider::rectangle(1.0, 1.0),
                RigidBody::new_active(1.0),
                Vec2::new(start + i as f32 * 1.1, 0.5 + row as f32),
            );
        }
    }

    let mut ball = RigidBody::new_active(4.0);
    ball.linear_velocity = Vec2::new(0.0, -20.0);
    ball.restitution = 0.3;
    let ball = spawn(&mut world, Collider::circle(0.6), ball, Vec2::new(0.3, 12.0));

    let mut frames = 0;
    loop {
        physics.step(&mut world, FRAME);
        frames += 1;

        for event in physics.drain_events() {
            if let CollisionEvent::CollisionStart { this, other, side, .. } = event {
                if this.entity == ball {
                    log::info!("frame {frames}: ball hit {:?} on its {:?} side", other.entity, side);
                }
            }
        }

        let islands = physics.island_stats();
        if islands.slept > 0 {
            log::info!("frame {frames}: {} bodies fell asleep", islands.slept);
        }

        let awake = world.query::<&RigidBody>().iter().filter(|(_, b)| !b.is_fixed() && !b.is_sleeping()).count();
        if awake == 0 || frames >= 1200 {
            break;
        }
    }

    let stats = physics.stats();
    log::info!(
        "settled after {frames} frames: {} pairs, {} contacts, {} fast body hits",
        stats.pairs,
        physics.contacts().len(),
        stats.fast_body_collisions
    );

    let probe = Ray::new(Vec2::new(-20.0, 0.5), Vec2::X);
    for hit in physics.ray_cast(&world, &probe, RayCastOptions::default()).iter().take(3) {
        log::info!("ray hit {:?} at {:?} ({:.2} units)", hit.collider.entity, hit.point, hit.distance);
    }

    Ok(())
}
