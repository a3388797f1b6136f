//! Contact resolution.
//!
//! A solver works on a [`SolverBodies`] table gathered from the world for the
//! bodies touched by this step's contacts. Every solver runs the same four
//! phases in order: `pre_solve`, `solve_velocity`, `solve_position` and
//! `post_solve`. The table is written back to the world afterwards.

mod arcade;
mod realistic;

pub use arcade::ArcadeSolver;
pub use realistic::RealisticSolver;

use std::collections::{HashMap, HashSet};

use glam::{Affine2, Vec2};
use hecs::Entity;

use super::collider::Collider;
use super::config::{PhysicsConfig, SleepConfig, SolverKind};
use super::contact::Contact;
use super::events::{CollisionEvents, CollisionHooks};
use crate::ecs::components::physics::{CollisionType, RigidBody, SleepInfo};
use crate::ecs::components::transform::Transform;

/// Contacts whose MTV is smaller than this on both axes are dropped.
pub(crate) const MTV_EPSILON: f32 = 1e-4;

/// Per-step values shared by all phases.
#[derive(Debug, Clone, Copy)]
pub struct SolverContext {
    pub dt: f32,
    pub sleep: SleepConfig,
    /// Motion given to a body woken by a contact.
    pub wake_motion: f32,
}

impl SolverContext {
    pub fn new(config: &PhysicsConfig, dt: f32) -> Self {
        Self {
            dt,
            sleep: config.sleep,
            wake_motion: config.body.initial_sleep_motion,
        }
    }
}

/// Working copy of one body.
#[derive(Debug, Clone)]
pub struct SolverBody {
    pub entity: Entity,
    pub collision_type: CollisionType,
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub restitution: f32,
    pub friction: f32,
    pub sleep: SleepInfo,
    inverse_mass: f32,
    inverse_inertia: f32,
    start_position: Vec2,
    motion_tracked: bool,
}

impl SolverBody {
    fn gather(entity: Entity, transform: &Transform, body: &mut RigidBody, collider: Option<&Collider>) -> Self {
        if let Some(collider) = collider {
            body.inertia(collider);
        }
        Self {
            entity,
            collision_type: body.collision_type,
            position: transform.position,
            rotation: transform.rotation,
            scale: transform.scale,
            linear_velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
            restitution: body.restitution,
            friction: body.friction,
            sleep: body.sleep,
            inverse_mass: body.inverse_mass(),
            inverse_inertia: body.inverse_inertia(),
            start_position: transform.position,
            motion_tracked: false,
        }
    }

    /// Active and awake.
    pub fn is_movable(&self) -> bool {
        self.collision_type == CollisionType::Active && !self.sleep.is_sleeping()
    }

    pub fn is_passive(&self) -> bool {
        self.collision_type == CollisionType::Passive
    }

    /// Zero unless the body can move.
    pub fn inverse_mass(&self) -> f32 {
        if self.is_movable() {
            self.inverse_mass
        } else {
            0.0
        }
    }

    pub fn inverse_inertia(&self) -> f32 {
        if self.is_movable() {
            self.inverse_inertia
        } else {
            0.0
        }
    }

    pub fn transform(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(self.scale, self.rotation, self.position)
    }

    /// Distance moved since the table was gathered.
    pub fn displacement(&self) -> Vec2 {
        self.position - self.start_position
    }

    /// Velocity of a point at offset `r` from the body origin.
    pub fn velocity_at(&self, r: Vec2) -> Vec2 {
        self.linear_velocity + r.perp() * self.angular_velocity
    }

    /// Apply an impulse at offset `r` from the body origin.
    pub fn apply_impulse(&mut self, r: Vec2, impulse: Vec2) {
        if !self.is_movable() {
            return;
        }
        self.linear_velocity += impulse * self.inverse_mass;
        self.angular_velocity += r.perp_dot(impulse) * self.inverse_inertia;
    }

    pub fn wake(&mut self, wake_motion: f32) {
        if self.sleep.is_sleeping() {
            tracing::trace!("contact woke {:?}", self.entity);
            self.sleep.wake(wake_motion);
        }
    }

    /// Update the sleep average once per step. Returns false when already done
    /// or the body does not move.
    pub fn track_motion(&mut self, config: &SleepConfig, dt: f32) -> bool {
        if self.motion_tracked || !self.is_movable() {
            return false;
        }
        self.sleep
            .update_motion(self.linear_velocity, self.angular_velocity, config, dt);
        self.motion_tracked = true;
        true
    }
}

/// Bodies referenced by a set of contacts, indexed by entity.
#[derive(Debug, Default)]
pub struct SolverBodies {
    bodies: Vec<SolverBody>,
    index: HashMap<Entity, usize>,
}

impl SolverBodies {
    /// Copy out every body a contact refers to. Entities without a
    /// `Transform` and `RigidBody` are left out.
    pub fn gather(world: &hecs::World, contacts: &[Contact]) -> Self {
        let mut table = Self::default();
        for contact in contacts {
            for entity in [contact.collider_a.entity, contact.collider_b.entity] {
                if table.index.contains_key(&entity) {
                    continue;
                }
                let (Ok(transform), Ok(mut body)) =
                    (world.get::<&Transform>(entity), world.get::<&mut RigidBody>(entity))
                else {
                    continue;
                };
                let collider = world.get::<&Collider>(entity).ok();
                let gathered = SolverBody::gather(entity, &transform, &mut body, collider.as_deref());
                table.index.insert(entity, table.bodies.len());
                table.bodies.push(gathered);
            }
        }
        table
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn get(&self, entity: Entity) -> Option<&SolverBody> {
        self.index.get(&entity).map(|&i| &self.bodies[i])
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut SolverBody> {
        self.index.get(&entity).map(|&i| &mut self.bodies[i])
    }

    /// Both participants of a contact, mutably.
    pub fn pair_mut(&mut self, contact: &Contact) -> Option<(&mut SolverBody, &mut SolverBody)> {
        let a = *self.index.get(&contact.collider_a.entity)?;
        let b = *self.index.get(&contact.collider_b.entity)?;
        if a == b {
            return None;
        }
        if a < b {
            let (low, high) = self.bodies.split_at_mut(b);
            Some((&mut low[a], &mut high[0]))
        } else {
            let (low, high) = self.bodies.split_at_mut(a);
            Some((&mut high[0], &mut low[b]))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SolverBody> {
        self.bodies.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SolverBody> {
        self.bodies.iter_mut()
    }

    /// Entities whose sleep average was updated this step.
    pub fn motion_tracked(&self) -> HashSet<Entity> {
        self.bodies
            .iter()
            .filter(|b| b.motion_tracked)
            .map(|b| b.entity)
            .collect()
    }

    /// Write poses, velocities and sleep state back to the world.
    pub fn scatter(&self, world: &hecs::World) {
        for solved in &self.bodies {
            if let Ok(mut transform) = world.get::<&mut Transform>(solved.entity) {
                transform.position = solved.position;
                transform.rotation = solved.rotation;
            }
            if let Ok(mut body) = world.get::<&mut RigidBody>(solved.entity) {
                body.linear_velocity = solved.linear_velocity;
                body.angular_velocity = solved.angular_velocity;
                body.sleep = solved.sleep;
            }
        }
    }
}

/// Resolves contacts between bodies.
pub trait CollisionSolver: Send {
    /// Cancel unusable contacts, consult hooks, emit pre collision events and
    /// prepare any per-contact state.
    fn pre_solve(
        &mut self,
        bodies: &mut SolverBodies,
        contacts: &mut [Contact],
        events: &mut CollisionEvents,
        hooks: &mut dyn CollisionHooks,
        ctx: &SolverContext,
    );

    fn solve_velocity(&mut self, bodies: &mut SolverBodies, contacts: &mut [Contact], ctx: &SolverContext);

    fn solve_position(&mut self, bodies: &mut SolverBodies, contacts: &mut [Contact], ctx: &SolverContext);

    /// Emit post collision events and update sleep bookkeeping.
    fn post_solve(
        &mut self,
        bodies: &mut SolverBodies,
        contacts: &[Contact],
        events: &mut CollisionEvents,
        ctx: &SolverContext,
    ) {
        finish_contacts(bodies, contacts, events, ctx);
    }

    /// Run all four phases against the world. Returns the entities whose sleep
    /// average was already updated.
    fn solve(
        &mut self,
        world: &mut hecs::World,
        contacts: &mut [Contact],
        events: &mut CollisionEvents,
        hooks: &mut dyn CollisionHooks,
        ctx: &SolverContext,
    ) -> HashSet<Entity> {
        if contacts.is_empty() {
            return HashSet::new();
        }
        let mut bodies = SolverBodies::gather(world, contacts);
        self.pre_solve(&mut bodies, contacts, events, hooks, ctx);
        self.solve_velocity(&mut bodies, contacts, ctx);
        self.solve_position(&mut bodies, contacts, ctx);
        self.post_solve(&mut bodies, contacts, events, ctx);
        bodies.scatter(world);
        bodies.motion_tracked()
    }
}

/// Build the solver selected by the config.
pub fn create_solver(config: &PhysicsConfig) -> Box<dyn CollisionSolver> {
    match config.solver {
        SolverKind::Arcade => Box::new(ArcadeSolver::new(config.arcade)),
        SolverKind::Realistic => Box::new(RealisticSolver::new(config.realistic)),
    }
}

/// Shared first half of `pre_solve`.
pub(crate) fn begin_contacts(contacts: &mut [Contact], events: &mut CollisionEvents, hooks: &mut dyn CollisionHooks) {
    for contact in contacts.iter_mut() {
        if contact.is_cancelled() {
            continue;
        }
        if contact.mtv.x.abs() < MTV_EPSILON && contact.mtv.y.abs() < MTV_EPSILON {
            contact.cancel();
            continue;
        }
        if !hooks.pre_collision(contact) {
            tracing::trace!("contact {} vetoed", contact.id);
            contact.cancel();
            continue;
        }
        events.pre_collision(contact);
    }
}

/// Shared `post_solve`.
pub(crate) fn finish_contacts(
    bodies: &mut SolverBodies,
    contacts: &[Contact],
    events: &mut CollisionEvents,
    ctx: &SolverContext,
) {
    for contact in contacts.iter().filter(|c| !c.is_cancelled()) {
        events.post_collision(contact);
        for entity in [contact.collider_a.entity, contact.collider_b.entity] {
            if let Some(body) = bodies.get_mut(entity) {
                body.track_motion(&ctx.sleep, ctx.dt);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::physics::events::CollisionEvent;

    #[test]
    fn test_gather_and_scatter() {
        let mut world = hecs::World::new();
        let a = spawn(&mut world, Collider::circle(1.0), RigidBody::new_fixed(), Vec2::ZERO);
        let b = spawn(&mut world, Collider::circle(1.0), RigidBody::new_active(2.0), Vec2::new(1.5, 0.0));
        let contacts = contacts(&world, a, b);
        assert_eq!(contacts.len(), 1);

        let mut bodies = SolverBodies::gather(&world, &contacts);
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies.get(a).unwrap().inverse_mass(), 0.0);
        assert!((bodies.get(b).unwrap().inverse_mass() - 0.5).abs() < 1e-6);
        assert!(bodies.get(b).unwrap().inverse_inertia() > 0.0, "inertia cached from collider");

        let (body_a, body_b) = bodies.pair_mut(&contacts[0]).unwrap();
        assert_eq!(body_a.entity, a);
        body_b.position = Vec2::new(2.0, 0.0);
        body_b.linear_velocity = Vec2::new(1.0, 0.0);
        bodies.scatter(&world);

        assert_eq!(world.get::<&Transform>(b).unwrap().position, Vec2::new(2.0, 0.0));
        assert_eq!(world.get::<&RigidBody>(b).unwrap().linear_velocity, Vec2::X);
    }

    #[test]
    fn test_sleeping_body_is_immovable_until_woken() {
        let mut world = hecs::World::new();
        let mut sleeper = RigidBody::new_active(1.0);
        sleeper.set_sleeping(true, 0.0);
        let a = spawn(&mut world, Collider::circle(1.0), sleeper, Vec2::ZERO);
        let b = spawn(&mut world, Collider::circle(1.0), RigidBody::new_active(1.0), Vec2::new(1.5, 0.0));
        let contacts = contacts(&world, a, b);

        let mut bodies = SolverBodies::gather(&world, &contacts);
        let body = bodies.get_mut(a).unwrap();
        assert_eq!(body.inverse_mass(), 0.0);
        body.apply_impulse(Vec2::ZERO, Vec2::X);
        assert_eq!(body.linear_velocity, Vec2::ZERO);

        body.wake(0.35);
        assert!(body.is_movable());
        body.apply_impulse(Vec2::ZERO, Vec2::X);
        assert_eq!(body.linear_velocity, Vec2::X);
    }

    #[test]
    fn test_begin_cancels_tiny_and_vetoed_contacts() {
        let mut world = hecs::World::new();
        let a = spawn(&mut world, Collider::circle(1.0), RigidBody::new_fixed(), Vec2::ZERO);
        let b = spawn(&mut world, Collider::circle(1.0), RigidBody::new_active(1.0), Vec2::new(1.5, 0.0));
        let mut found = contacts(&world, a, b);
        let mut tiny = found[0].clone();
        tiny.mtv = Vec2::new(5e-5, -5e-5);
        found.push(tiny);

        let mut events = CollisionEvents::new();
        begin_contacts(&mut found, &mut events, &mut ());
        assert!(!found[0].is_cancelled());
        assert!(found[1].is_cancelled());
        assert_eq!(events.len(), 2);

        struct Veto;
        impl CollisionHooks for Veto {
            fn pre_collision(&mut self, _contact: &Contact) -> bool {
                false
            }
        }
        let mut vetoed = contacts(&world, a, b);
        let mut events = CollisionEvents::new();
        begin_contacts(&mut vetoed, &mut events, &mut Veto);
        assert!(vetoed[0].is_cancelled());
        assert!(events.is_empty());
    }

    #[test]
    fn test_finish_reports_and_tracks_motion_once() {
        let mut world = hecs::World::new();
        let a = spawn(&mut world, Collider::circle(1.0), RigidBody::new_fixed(), Vec2::ZERO);
        let b = spawn(&mut world, Collider::circle(1.0), RigidBody::new_active(1.0), Vec2::new(1.5, 0.0));
        let c = spawn(&mut world, Collider::circle(1.0), RigidBody::new_passive(), Vec2::new(1.5, 1.0));
        let mut found = contacts(&world, a, b);
        found.extend(contacts(&world, b, c));
        assert_eq!(found.len(), 2);

        let mut bodies = SolverBodies::gather(&world, &found);
        let before = bodies.get(b).unwrap().sleep.motion;
        let mut events = CollisionEvents::new();
        finish_contacts(&mut bodies, &found, &mut events, &ctx());

        let posts = events
            .iter()
            .filter(|e| matches!(e, CollisionEvent::PostCollision { .. }))
            .count();
        assert_eq!(posts, 4, "passive pairs are still reported");
        let tracked = bodies.motion_tracked();
        assert_eq!(tracked.len(), 1, "only the active body has motion");
        assert!(tracked.contains(&b));
        let after = bodies.get(b).unwrap().sleep.motion;
        assert!((after - before * 0.9).abs() < 1e-6, "averaged exactly once");
    }
}
