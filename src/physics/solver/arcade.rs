//! Positional solver for platformer style games.
//!
//! Contacts are resolved one at a time, nearest first, by pushing Active
//! bodies apart along the MTV and removing the velocity that drives them back
//! into each other. There is no restitution, friction or rotation.

use std::cmp::Ordering;

use super::{begin_contacts, CollisionSolver, SolverBodies, SolverContext};
use crate::physics::config::{ArcadeConfig, ContactSolveBias};
use crate::physics::contact::Contact;
use crate::physics::events::{CollisionEvents, CollisionHooks};

/// Bounds must overlap by more than this to still need resolving.
const BOUNDS_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Default)]
pub struct ArcadeSolver {
    config: ArcadeConfig,
}

impl ArcadeSolver {
    pub fn new(config: ArcadeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArcadeConfig {
        &self.config
    }

    /// Order contacts so the ones nearest their body are resolved first. A
    /// bias puts contacts along the preferred axis ahead of the rest.
    fn sort(&self, contacts: &mut [Contact]) {
        let bias = self.config.contact_solve_bias;
        contacts.sort_by(|a, b| {
            rank(a, bias)
                .cmp(&rank(b, bias))
                .then_with(|| {
                    let da = a.center_a.distance_squared(a.center_b);
                    let db = b.center_a.distance_squared(b.center_b);
                    da.partial_cmp(&db).unwrap_or(Ordering::Equal)
                })
        });
    }
}

fn rank(contact: &Contact, bias: ContactSolveBias) -> u8 {
    let vertical = contact.normal.y.abs() >= contact.normal.x.abs();
    match bias {
        ContactSolveBias::None => 0,
        ContactSolveBias::VerticalFirst => u8::from(!vertical),
        ContactSolveBias::HorizontalFirst => u8::from(vertical),
    }
}

impl CollisionSolver for ArcadeSolver {
    fn pre_solve(
        &mut self,
        _bodies: &mut SolverBodies,
        contacts: &mut [Contact],
        events: &mut CollisionEvents,
        hooks: &mut dyn CollisionHooks,
        _ctx: &SolverContext,
    ) {
        begin_contacts(contacts, events, hooks);
        self.sort(contacts);
    }

    fn solve_velocity(&mut self, bodies: &mut SolverBodies, contacts: &mut [Contact], _ctx: &SolverContext) {
        for contact in contacts.iter() {
            if contact.is_cancelled() {
                continue;
            }
            let Some((a, b)) = bodies.pair_mut(contact) else {
                continue;
            };
            if a.is_passive() || b.is_passive() {
                continue;
            }
            let normal = contact.normal;

            // Only cancel motion into the other body; sliding along it is kept.
            if a.is_movable() && a.linear_velocity.normalize_or_zero().dot(-normal) < 0.0 {
                a.linear_velocity += normal * normal.dot(-a.linear_velocity);
            }
            if b.is_movable() && b.linear_velocity.normalize_or_zero().dot(normal) < 0.0 {
                b.linear_velocity += -normal * (-normal).dot(-b.linear_velocity);
            }
        }
    }

    fn solve_position(&mut self, bodies: &mut SolverBodies, contacts: &mut [Contact], _ctx: &SolverContext) {
        for contact in contacts.iter_mut() {
            if contact.is_cancelled() {
                continue;
            }
            let Some((a, b)) = bodies.pair_mut(contact) else {
                continue;
            };
            if a.is_passive() || b.is_passive() {
                continue;
            }

            // Earlier contacts may already have separated this pair.
            let bounds_a = contact.bounds_a.translate(a.displacement());
            let bounds_b = contact.bounds_b.translate(b.displacement());
            if !bounds_a.overlaps(&bounds_b, BOUNDS_EPSILON) {
                contact.cancel();
                continue;
            }
            let resolved = (b.displacement() - a.displacement()).dot(contact.normal);
            let depth = contact.mtv.length() - resolved;
            if depth <= BOUNDS_EPSILON {
                contact.cancel();
                continue;
            }
            let mtv = contact.normal * depth;

            match (a.is_movable(), b.is_movable()) {
                (true, true) => {
                    a.position -= mtv * 0.5;
                    b.position += mtv * 0.5;
                }
                (true, false) => a.position -= mtv,
                (false, true) => b.position += mtv,
                (false, false) => {}
            }
        }
    }
}
