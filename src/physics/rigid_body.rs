//! Rigid body integration functions.

use glam::Vec2;

use super::collider::Collider;
use crate::ecs::components::physics::{CollisionType, RigidBody};
use crate::ecs::components::transform::{GlobalTransform, Transform};

/// Advance every awake, active body by `dt` with explicit Euler.
///
/// The pose before the step is remembered for the fast body check. Only
/// Active bodies integrate acceleration, and gravity only when `use_gravity`
/// is set. Fixed and Passive bodies keep their velocity and move by it.
pub fn integrate(world: &mut hecs::World, gravity: Vec2, dt: f32) {
    for (_, (transform, body, collider)) in
        world.query_mut::<(&mut Transform, &mut RigidBody, Option<&Collider>)>()
    {
        body.old_position = transform.position;
        body.old_rotation = transform.rotation;
        if !body.active || body.is_sleeping() {
            continue;
        }

        let acceleration = match body.collision_type {
            CollisionType::Active if body.use_gravity => body.acceleration + gravity,
            CollisionType::Active => body.acceleration,
            _ => Vec2::ZERO,
        };

        if let Some(collider) = collider {
            body.inertia(collider);
        }
        if body.torque != 0.0 {
            body.angular_velocity += body.torque * body.inverse_inertia() * dt;
        }

        transform.position += body.linear_velocity * dt + 0.5 * acceleration * dt * dt;
        body.linear_velocity += acceleration * dt;
        if !body.lock_rotation {
            transform.rotation += body.angular_velocity * dt;
        }
    }
}

/// Refresh world transforms and collider geometry from `Transform`.
pub fn sync_transforms(world: &mut hecs::World) {
    for (_, (transform, global, collider)) in
        world.query_mut::<(&Transform, &mut GlobalTransform, Option<&mut Collider>)>()
    {
        global.0 = transform.to_affine();
        if let Some(collider) = collider {
            collider.update(&global.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_fall() {
        let mut world = hecs::World::new();
        let entity = world.spawn((
            Transform::from_position(Vec2::new(0.0, 10.0)),
            GlobalTransform::default(),
            RigidBody::new_active(1.0),
        ));

        let gravity = Vec2::new(0.0, -9.81);
        let dt = 1.0 / 60.0;
        for _ in 0..60 {
            integrate(&mut world, gravity, dt);
        }

        let transform = world.get::<&Transform>(entity).unwrap();
        // Constant acceleration is integrated exactly: y = 10 - g t^2 / 2.
        let expected = 10.0 - 0.5 * 9.81;
        assert!(
            (transform.position.y - expected).abs() < 1e-3,
            "y = {}",
            transform.position.y
        );
        assert!(transform.position.x.abs() < 1e-6);
        let body = world.get::<&RigidBody>(entity).unwrap();
        assert!((body.linear_velocity.y + 9.81).abs() < 1e-3);
        assert!(body.old_position().y > transform.position.y);
    }

    #[test]
    fn test_fixed_body_ignores_gravity_but_keeps_velocity() {
        let mut world = hecs::World::new();
        let mut platform = RigidBody::new_fixed();
        platform.linear_velocity = Vec2::new(1.0, 0.0);
        platform.acceleration = Vec2::new(0.0, 4.0);
        let mut sensor = RigidBody::new_passive();
        sensor.acceleration = Vec2::new(2.0, 0.0);
        let entity = world.spawn((Transform::identity(), GlobalTransform::default(), platform));
        let sensor = world.spawn((Transform::identity(), GlobalTransform::default(), sensor));

        integrate(&mut world, Vec2::new(0.0, -9.81), 0.5);
        let transform = world.get::<&Transform>(entity).unwrap();
        assert_eq!(transform.position, Vec2::new(0.5, 0.0));
        assert_eq!(world.get::<&RigidBody>(entity).unwrap().linear_velocity, Vec2::X);
        assert_eq!(world.get::<&Transform>(sensor).unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn test_sleeping_and_inactive_bodies_stay_put() {
        let mut world = hecs::World::new();
        let mut asleep = RigidBody::new_active(1.0);
        asleep.set_sleeping(true, 0.0);
        let mut inactive = RigidBody::new_active(1.0);
        inactive.active = false;
        let a = world.spawn((Transform::identity(), GlobalTransform::default(), asleep));
        let b = world.spawn((Transform::identity(), GlobalTransform::default(), inactive));

        integrate(&mut world, Vec2::new(0.0, -9.81), 1.0);
        assert_eq!(world.get::<&Transform>(a).unwrap().position, Vec2::ZERO);
        assert_eq!(world.get::<&Transform>(b).unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn test_torque_spins_unless_locked() {
        let mut world = hecs::World::new();
        let mut spinning = RigidBody::new_active(2.0);
        spinning.torque = 1.0;
        spinning.use_gravity = false;
        let mut locked = spinning.clone();
        locked.lock_rotation = true;
        let a = world.spawn((Transform::identity(), GlobalTransform::default(), spinning, Collider::circle(1.0)));
        let b = world.spawn((Transform::identity(), GlobalTransform::default(), locked, Collider::circle(1.0)));

        integrate(&mut world, Vec2::ZERO, 1.0);
        // I = m r^2 / 2 = 1, so one second of unit torque gives 1 rad/s.
        assert!((world.get::<&RigidBody>(a).unwrap().angular_velocity - 1.0).abs() < 1e-5);
        assert!((world.get::<&Transform>(a).unwrap().rotation - 1.0).abs() < 1e-5);
        assert_eq!(world.get::<&Transform>(b).unwrap().rotation, 0.0);
    }

    #[test]
    fn test_sync_updates_collider_bounds() {
        let mut world = hecs::World::new();
        let entity = world.spawn((
            Transform::from_position(Vec2::new(3.0, 4.0)),
            GlobalTransform::default(),
            Collider::circle(1.0),
        ));
        sync_transforms(&mut world);

        assert_eq!(world.get::<&GlobalTransform>(entity).unwrap().translation(), Vec2::new(3.0, 4.0));
        let bounds = world.get::<&Collider>(entity).unwrap().bounds();
        assert!((bounds.center() - Vec2::new(3.0, 4.0)).length() < 1e-5);
    }
}
