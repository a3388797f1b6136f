//! 2D collision detection and resolution.
//!
//! # Architecture
//!
//! The physics pipeline runs in a fixed timestep loop:
//!
//! 1. Integrate bodies (explicit Euler, gravity on Active bodies)
//! 2. Synchronize transforms and collider geometry
//! 3. Track new colliders and refresh the spatial index
//! 4. Broadphase (AABB tree or sparse hash grid, plus fast body ray casts)
//! 5. Narrowphase (SAT and clipping per leaf shape pair)
//! 6. Solve contacts (arcade or realistic solver)
//! 7. Sleep islands
//! 8. Collision start/end events
//! 9. Synchronize transforms

pub mod bounds;
pub mod broadphase;
pub mod collider;
pub mod config;
pub mod contact;
pub mod events;
pub mod island;
#[cfg(feature = "mirror")]
pub mod mirror;
pub mod narrowphase;
pub mod pair;
pub mod processor;
pub mod ray;
pub mod rigid_body;
pub mod sat;
pub mod solver;

use hecs::Entity;

use crate::error::Result;

use self::collider::Collider;
use self::config::PhysicsConfig;
use self::contact::Contact;
use self::events::{CollisionEvent, CollisionEvents, CollisionHooks, ContactTracker};
use self::island::{IslandManager, IslandStats};
use self::processor::{CollisionProcessor, FrameStats, RayCastOptions};
use self::ray::{Ray, RayCastHit};
use self::solver::{create_solver, CollisionSolver, SolverContext};

/// The main physics world managing simulation state.
pub struct PhysicsWorld {
    config: PhysicsConfig,
    accumulator: f64,
    processor: CollisionProcessor,
    solver: Box<dyn CollisionSolver>,
    islands: IslandManager,
    tracker: ContactTracker,
    events: CollisionEvents,
    contacts: Vec<Contact>,
}

impl PhysicsWorld {
    /// Create a new physics world with the given configuration.
    pub fn new(config: PhysicsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            processor: CollisionProcessor::new(&config),
            solver: create_solver(&config),
            config,
            accumulator: 0.0,
            islands: IslandManager::new(),
            tracker: ContactTracker::new(),
            events: CollisionEvents::new(),
            contacts: Vec::new(),
        })
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Replace the configuration. Switching solvers or solver settings drops
    /// the warm start cache; switching index settings re-tracks every body on
    /// the next step.
    pub fn set_config(&mut self, config: PhysicsConfig) -> Result<()> {
        config.validate()?;
        let solver_changed = config.solver != self.config.solver
            || config.realistic != self.config.realistic
            || config.arcade != self.config.arcade;
        self.processor.configure(&config);
        if solver_changed {
            tracing::debug!("switching to {:?} solver", config.solver);
            self.solver = create_solver(&config);
        }
        self.config = config;
        Ok(())
    }

    pub fn processor(&self) -> &CollisionProcessor {
        &self.processor
    }

    /// Counters from the last fixed step.
    pub fn stats(&self) -> FrameStats {
        self.processor.stats()
    }

    pub fn island_stats(&self) -> IslandStats {
        self.islands.stats()
    }

    /// Contacts found during the last fixed step, cancelled ones included.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Events raised during the last call to `step`, `step_with_hooks` or `fixed_step`.
    pub fn events(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.events.iter()
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, CollisionEvent> {
        self.events.drain()
    }

    /// Logical pairs touching after the last fixed step.
    pub fn contact_tracker(&self) -> &ContactTracker {
        &self.tracker
    }

    /// Stop simulating an entity's collider and report the end of its
    /// ongoing collisions. The entity itself is left in the world and stays
    /// out of the simulation until tracked again through the processor.
    pub fn remove(&mut self, world: &hecs::World, entity: Entity) -> bool {
        if let Ok(collider) = world.get::<&Collider>(entity) {
            for leaf in collider.leaves() {
                self.tracker.forget(leaf.handle().logical_id(), &mut self.events);
            }
        }
        self.processor.exclude(entity)
    }

    /// Bring an entity excluded by [`remove`](Self::remove) or by leaving the
    /// world bounds back into the simulation.
    pub fn restore(&mut self, world: &hecs::World, entity: Entity) -> Result<()> {
        self.processor.track(world, entity)
    }

    pub fn ray_cast(&self, world: &hecs::World, ray: &Ray, options: RayCastOptions<'_>) -> Vec<RayCastHit> {
        self.processor.ray_cast(world, ray, options)
    }

    /// Step the physics simulation forward by `delta_time` seconds.
    ///
    /// Uses a fixed timestep accumulator to ensure deterministic simulation.
    /// Returns the number of fixed steps taken.
    pub fn step(&mut self, world: &mut hecs::World, delta_time: f64) -> u32 {
        self.step_with_hooks(world, delta_time, &mut ())
    }

    /// [`step`](Self::step) consulting `hooks` before each contact is resolved.
    pub fn step_with_hooks(&mut self, world: &mut hecs::World, delta_time: f64, hooks: &mut dyn CollisionHooks) -> u32 {
        self.events.clear();
        self.accumulator += delta_time;

        let mut substeps = 0u32;
        while self.accumulator >= self.config.fixed_timestep && substeps < self.config.max_substeps {
            self.run_step(world, self.config.fixed_timestep as f32, hooks);
            self.accumulator -= self.config.fixed_timestep;
            substeps += 1;
        }

        // Clamp accumulator to avoid spiral of death
        if self.accumulator > self.config.fixed_timestep * self.config.max_substeps as f64 {
            self.accumulator = 0.0;
        }
        substeps
    }

    /// Run exactly one step of `dt` seconds, bypassing the accumulator.
    pub fn fixed_step(&mut self, world: &mut hecs::World, dt: f32) {
        self.events.clear();
        self.run_step(world, dt, &mut ());
    }

    fn run_step(&mut self, world: &mut hecs::World, dt: f32, hooks: &mut dyn CollisionHooks) {
        // 1. Integrate
        rigid_body::integrate(world, self.config.gravity, dt);

        // 2. Synchronize transforms
        rigid_body::sync_transforms(world);

        // 3. Index maintenance
        self.processor.sync(world);
        self.processor.update(world, dt);

        // 4. Broadphase
        let pairs = self.processor.broadphase(world, dt);

        // 5. Narrowphase
        let mut contacts = self.processor.narrowphase(world, &pairs);

        // 6. Solve
        let ctx = SolverContext::new(&self.config, dt);
        let motion_tracked = self
            .solver
            .solve(world, &mut contacts, &mut self.events, hooks, &ctx);

        // 7. Islands
        self.islands.update(
            world,
            &contacts,
            &motion_tracked,
            &self.config.sleep,
            self.config.body.initial_sleep_motion,
            dt,
        );

        // 8. Start/end events
        self.tracker.update(&contacts, &mut self.events);

        // 9. Synchronize transforms
        rigid_body::sync_transforms(world);

        self.contacts = contacts;
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::ecs::components::physics::RigidBody;
    use crate::ecs::components::transform::{GlobalTransform, Transform};
    use crate::physics::config::SolverKind;
    use crate::physics::events::Side;

    fn spawn(world: &mut hecs::World, collider: Collider, body: RigidBody, position: Vec2) -> Entity {
        let transform = Transform::from_position(position);
        world.spawn((transform, GlobalTransform::from_transform(&transform), body, collider))
    }

    fn box_on_ground(solver: SolverKind) -> (hecs::World, PhysicsWorld, Entity) {
        let mut world = hecs::World::new();
        let config = PhysicsConfig {
            solver,
            ..PhysicsConfig::default()
        };
        let physics = PhysicsWorld::new(config).unwrap();
        spawn(&mut world, Collider::rectangle(20.0, 1.0), RigidBody::new_fixed(), Vec2::new(0.0, -0.5));
        let body = spawn(&mut world, Collider::rectangle(1.0, 1.0), RigidBody::new_active(1.0), Vec2::new(0.0, 2.0));
        (world, physics, body)
    }

    #[test]
    fn test_physics_world_free_fall() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        let entity = spawn(&mut world, Collider::circle(0.5), RigidBody::new_active(1.0), Vec2::new(0.0, 10.0));

        // Simulate ~1 second
        for _ in 0..60 {
            physics.step(&mut world, 1.0 / 60.0);
        }

        let transform = world.get::<&Transform>(entity).unwrap();
        assert!(
            transform.position.y < 10.0 && transform.position.y > 0.0,
            "Body should have fallen: y = {}",
            transform.position.y
        );
        let bounds = world.get::<&Collider>(entity).unwrap().bounds();
        assert!((bounds.center() - transform.position).length() < 1e-4, "collider follows the body");
    }

    #[test]
    fn test_box_rests_on_ground_realistic() {
        let (mut world, mut physics, body) = box_on_ground(SolverKind::Realistic);
        for _ in 0..180 {
            physics.step(&mut world, 1.0 / 60.0);
        }

        let transform = world.get::<&Transform>(body).unwrap();
        assert!(
            (transform.position.y - 0.5).abs() < 0.05,
            "Box should rest on the ground: y = {}",
            transform.position.y
        );
        assert!(transform.rotation.abs() < 0.05, "rotation = {}", transform.rotation);
        let rb = world.get::<&RigidBody>(body).unwrap();
        assert!(rb.linear_velocity.length() < 0.5, "speed = {}", rb.linear_velocity.length());
    }

    #[test]
    fn test_box_rests_on_ground_arcade() {
        let (mut world, mut physics, body) = box_on_ground(SolverKind::Arcade);
        for _ in 0..180 {
            physics.step(&mut world, 1.0 / 60.0);
        }
        let transform = world.get::<&Transform>(body).unwrap();
        assert!(
            (transform.position.y - 0.5).abs() < 0.05,
            "Box should rest on the ground: y = {}",
            transform.position.y
        );
        assert_eq!(transform.rotation, 0.0, "arcade never rotates");
    }

    #[test]
    fn test_resting_box_falls_asleep() {
        let (mut world, mut physics, body) = box_on_ground(SolverKind::Realistic);
        for _ in 0..600 {
            physics.step(&mut world, 1.0 / 60.0);
        }
        assert!(world.get::<&RigidBody>(body).unwrap().is_sleeping());
    }

    #[test]
    fn test_fast_body_stops_at_surface() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        let mut plate = RigidBody::new_fixed();
        plate.restitution = 0.0;
        spawn(&mut world, Collider::rectangle(4.0, 0.1), plate, Vec2::ZERO);
        let mut bullet = RigidBody::new_active(1.0);
        bullet.linear_velocity = Vec2::new(0.0, -120.0);
        bullet.restitution = 0.0;
        let bullet = spawn(&mut world, Collider::circle(0.25), bullet, Vec2::new(0.0, 1.5));

        physics.fixed_step(&mut world, 1.0 / 60.0);

        assert_eq!(physics.stats().fast_body_collisions, 1);
        let y = world.get::<&Transform>(bullet).unwrap().position.y;
        assert!(y > 0.2 && y < 0.35, "stopped on top of the plate, y = {y}");
        let velocity = world.get::<&RigidBody>(bullet).unwrap().linear_velocity;
        assert!(velocity.y > -1.0, "downward speed removed, got {velocity:?}");

        for _ in 0..30 {
            physics.fixed_step(&mut world, 1.0 / 60.0);
        }
        let y = world.get::<&Transform>(bullet).unwrap().position.y;
        assert!(y > 0.2, "still above the plate, y = {y}");
    }

    #[test]
    fn test_fast_body_tunnels_when_check_disabled() {
        let mut world = hecs::World::new();
        let mut config = PhysicsConfig::default();
        config.fast_body.enabled = false;
        let mut physics = PhysicsWorld::new(config).unwrap();
        spawn(&mut world, Collider::rectangle(4.0, 0.1), RigidBody::new_fixed(), Vec2::ZERO);
        let mut bullet = RigidBody::new_active(1.0);
        bullet.linear_velocity = Vec2::new(0.0, -120.0);
        let bullet = spawn(&mut world, Collider::circle(0.25), bullet, Vec2::new(0.0, 1.5));

        physics.fixed_step(&mut world, 1.0 / 60.0);

        assert_eq!(physics.stats().fast_bodies, 0);
        assert_eq!(physics.stats().fast_body_collisions, 0);
        assert!(physics.contacts().is_empty());
        let y = world.get::<&Transform>(bullet).unwrap().position.y;
        assert!(y < -0.4, "passed straight through the plate, y = {y}");
    }

    #[test]
    fn test_start_and_end_events() {
        let mut world = hecs::World::new();
        let mut config = PhysicsConfig::default();
        config.gravity = Vec2::ZERO;
        let mut physics = PhysicsWorld::new(config).unwrap();
        let wall = spawn(&mut world, Collider::rectangle(1.0, 4.0), RigidBody::new_fixed(), Vec2::ZERO);
        let mut ball = RigidBody::new_active(1.0);
        ball.linear_velocity = Vec2::new(-3.0, 0.0);
        ball.restitution = 1.0;
        let ball = spawn(&mut world, Collider::circle(0.5), ball, Vec2::new(1.2, 0.0));

        let mut started = false;
        let mut ended = false;
        for _ in 0..60 {
            physics.step(&mut world, 1.0 / 60.0);
            for event in physics.drain_events() {
                match event {
                    CollisionEvent::CollisionStart { this, side, .. } if this.entity == ball => {
                        assert_eq!(side, Side::Left);
                        started = true;
                    }
                    CollisionEvent::CollisionEnd { this, .. } if this.entity == ball => {
                        assert!(started);
                        ended = true;
                    }
                    _ => {}
                }
            }
        }
        assert!(started && ended);
        assert!(world.get::<&RigidBody>(ball).unwrap().linear_velocity.x > 0.0, "bounced off the wall");
        assert!(!physics.contact_tracker().is_touching(crate::physics::pair::PairId::new(
            world.get::<&Collider>(wall).unwrap().id(),
            world.get::<&Collider>(ball).unwrap().id(),
        )));
    }

    #[test]
    fn test_hooks_cancel_contacts() {
        struct Ghost;
        impl CollisionHooks for Ghost {
            fn pre_collision(&mut self, _contact: &Contact) -> bool {
                false
            }
        }

        let (mut world, mut physics, body) = box_on_ground(SolverKind::Realistic);
        for _ in 0..60 {
            physics.step_with_hooks(&mut world, 1.0 / 60.0, &mut Ghost);
        }
        let y = world.get::<&Transform>(body).unwrap().position.y;
        assert!(y < 0.0, "fell through the vetoed ground, y = {y}");
    }

    #[test]
    fn test_set_config_validates_and_switches_solver() {
        let mut physics = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        let mut config = PhysicsConfig::default();
        config.max_substeps = 0;
        assert!(physics.set_config(config).is_err());
        assert!(PhysicsWorld::new(PhysicsConfig {
            fixed_timestep: -1.0,
            ..PhysicsConfig::default()
        })
        .is_err());

        let config = PhysicsConfig {
            solver: SolverKind::Arcade,
            ..PhysicsConfig::default()
        };
        physics.set_config(config).unwrap();
        assert_eq!(physics.config().solver, SolverKind::Arcade);
    }

    #[test]
    fn test_removed_body_falls_through_until_restored() {
        let (mut world, mut physics, body) = box_on_ground(SolverKind::Realistic);
        for _ in 0..75 {
            physics.step(&mut world, 1.0 / 60.0);
        }
        assert_eq!(physics.contact_tracker().len(), 1, "box landed");
        assert!(!world.get::<&RigidBody>(body).unwrap().is_sleeping());

        assert!(physics.remove(&world, body));
        let ended = physics
            .events()
            .filter(|e| matches!(e, CollisionEvent::CollisionEnd { .. }))
            .count();
        assert_eq!(ended, 2);
        assert!(physics.contact_tracker().is_empty());

        for _ in 0..30 {
            physics.step(&mut world, 1.0 / 60.0);
        }
        assert!(!physics.processor().is_tracked(body));
        assert!(world.get::<&Transform>(body).unwrap().position.y < 0.0);

        physics.restore(&world, body).unwrap();
        assert!(physics.processor().is_tracked(body));
    }

    #[test]
    fn test_accumulator_limits_substeps() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::new(PhysicsConfig::default()).unwrap();
        assert_eq!(physics.step(&mut world, 1.0 / 120.0), 0);
        assert_eq!(physics.step(&mut world, 1.0 / 120.0), 1);
        assert_eq!(physics.step(&mut world, 1.0), 4);
        assert_eq!(physics.step(&mut world, 0.0), 0, "backlog dropped");
    }

    #[test]
    fn test_physics_config_default() {
        let config = PhysicsConfig::default();
        assert_eq!(config.gravity, Vec2::new(0.0, -9.81));
        assert!((config.fixed_timestep - 1.0 / 60.0).abs() < 1e-10);
        assert_eq!(config.max_substeps, 4);
        assert_eq!(config.realistic.velocity_iterations, 8);
    }
}
