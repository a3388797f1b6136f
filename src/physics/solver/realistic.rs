//! Sequential impulse solver.
//!
//! Velocities are solved with accumulated impulses (friction first, then the
//! normal constraint) and warm started from the previous step when a contact
//! point persists. Remaining penetration is removed by Baumgarte style pseudo
//! impulses applied straight to the pose.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use super::{begin_contacts, CollisionSolver, SolverBodies, SolverBody, SolverContext};
use crate::physics::config::RealisticConfig;
use crate::physics::contact::Contact;
use crate::physics::events::{CollisionEvents, CollisionHooks};
use crate::physics::pair::PairId;

/// Solver state for one contact point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintPoint {
    pub point: Vec2,
    /// Contact point in the incident collider's frame.
    pub local: Vec2,
    pub r_a: Vec2,
    pub r_b: Vec2,
    /// Effective mass along the normal, zero when neither body can move.
    pub normal_mass: f32,
    /// Effective mass along the tangent.
    pub tangent_mass: f32,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub velocity_bias: f32,
}

#[derive(Debug, Clone, Default)]
pub struct RealisticSolver {
    config: RealisticConfig,
    constraints: HashMap<PairId, Vec<ConstraintPoint>>,
}

impl RealisticSolver {
    pub fn new(config: RealisticConfig) -> Self {
        Self {
            config,
            constraints: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RealisticConfig {
        &self.config
    }

    /// Cached constraint points of a contact.
    pub fn constraint(&self, id: PairId) -> Option<&[ConstraintPoint]> {
        self.constraints.get(&id).map(Vec::as_slice)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    fn build_constraints(&mut self, bodies: &mut SolverBodies, contacts: &[Contact]) {
        let mut stale: HashSet<PairId> = self.constraints.keys().copied().collect();

        for contact in contacts.iter().filter(|c| !c.is_cancelled()) {
            let Some((a, b)) = bodies.pair_mut(contact) else {
                continue;
            };
            if a.is_passive() || b.is_passive() {
                continue;
            }
            stale.remove(&contact.id);

            let previous = self.constraints.remove(&contact.id).unwrap_or_default();
            let normal = contact.normal;
            let tangent = contact.tangent;
            let restitution = a.restitution.max(b.restitution);
            let mut points = Vec::with_capacity(contact.points.len());
            let mut claimed = vec![false; previous.len()];

            for (i, &point) in contact.points.iter().enumerate() {
                let r_a = point - a.position;
                let r_b = point - b.position;
                let rn_a = r_a.perp_dot(normal);
                let rn_b = r_b.perp_dot(normal);
                let rt_a = r_a.perp_dot(tangent);
                let rt_b = r_b.perp_dot(tangent);
                let inverse_mass = a.inverse_mass() + b.inverse_mass();
                let normal_mass = effective_mass(
                    inverse_mass + a.inverse_inertia() * rn_a * rn_a + b.inverse_inertia() * rn_b * rn_b,
                );
                let tangent_mass = effective_mass(
                    inverse_mass + a.inverse_inertia() * rt_a * rt_a + b.inverse_inertia() * rt_b * rt_b,
                );

                // Nearest unclaimed point of last step, whatever its order.
                let nearest = previous
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| !claimed[*j])
                    .map(|(j, p)| (j, p, p.point.distance(point)))
                    .filter(|(_, _, distance)| *distance < self.config.warm_start_distance)
                    .min_by(|x, y| x.2.total_cmp(&y.2));
                let (normal_impulse, tangent_impulse) = match nearest {
                    Some((j, p, _)) => {
                        claimed[j] = true;
                        (p.normal_impulse, p.tangent_impulse)
                    }
                    None => (0.0, 0.0),
                };

                let approach = (b.velocity_at(r_b) - a.velocity_at(r_a)).dot(normal);
                let velocity_bias = if approach < -self.config.restitution_velocity_threshold {
                    -restitution * approach
                } else {
                    0.0
                };

                points.push(ConstraintPoint {
                    point,
                    local: contact.local_points.get(i).copied().unwrap_or(contact.info.local_point),
                    r_a,
                    r_b,
                    normal_mass,
                    tangent_mass,
                    normal_impulse,
                    tangent_impulse,
                    velocity_bias,
                });
            }
            self.constraints.insert(contact.id, points);
        }

        for id in stale {
            self.constraints.remove(&id);
        }
    }

    fn warm_start(&mut self, bodies: &mut SolverBodies, contacts: &[Contact]) {
        for contact in contacts.iter().filter(|c| !c.is_cancelled()) {
            let Some(points) = self.constraints.get_mut(&contact.id) else {
                continue;
            };
            if !self.config.warm_start {
                for point in points.iter_mut() {
                    point.normal_impulse = 0.0;
                    point.tangent_impulse = 0.0;
                }
                continue;
            }
            let Some((a, b)) = bodies.pair_mut(contact) else {
                continue;
            };
            for point in points.iter() {
                let impulse = contact.normal * point.normal_impulse + contact.tangent * point.tangent_impulse;
                a.apply_impulse(point.r_a, -impulse);
                b.apply_impulse(point.r_b, impulse);
            }
        }
    }
}

fn effective_mass(k: f32) -> f32 {
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}

/// Wake a sleeping participant when the other one is moving.
fn match_awake(bodies: &mut SolverBodies, contacts: &[Contact], ctx: &SolverContext) {
    for contact in contacts.iter().filter(|c| !c.is_cancelled()) {
        let Some((a, b)) = bodies.pair_mut(contact) else {
            continue;
        };
        let stirring = |body: &SolverBody| body.is_movable() && body.sleep.motion >= ctx.sleep.wake_threshold;
        if a.sleep.is_sleeping() && stirring(&*b) {
            a.wake(ctx.wake_motion);
        } else if b.sleep.is_sleeping() && stirring(&*a) {
            b.wake(ctx.wake_motion);
        }
    }
}

impl CollisionSolver for RealisticSolver {
    fn pre_solve(
        &mut self,
        bodies: &mut SolverBodies,
        contacts: &mut [Contact],
        events: &mut CollisionEvents,
        hooks: &mut dyn CollisionHooks,
        ctx: &SolverContext,
    ) {
        begin_contacts(contacts, events, hooks);
        if ctx.sleep.enabled {
            match_awake(bodies, contacts, ctx);
        }
        self.build_constraints(bodies, contacts);
        self.warm_start(bodies, contacts);
    }

    fn solve_velocity(&mut self, bodies: &mut SolverBodies, contacts: &mut [Contact], _ctx: &SolverContext) {
        for _ in 0..self.config.velocity_iterations {
            for contact in contacts.iter().filter(|c| !c.is_cancelled()) {
                let Some(points) = self.constraints.get_mut(&contact.id) else {
                    continue;
                };
                let Some((a, b)) = bodies.pair_mut(contact) else {
                    continue;
                };
                let friction = a.friction.min(b.friction).max(0.0);

                for point in points.iter_mut() {
                    if point.tangent_mass <= 0.0 {
                        continue;
                    }
                    let vt = (b.velocity_at(point.r_b) - a.velocity_at(point.r_a)).dot(contact.tangent);
                    let max_friction = friction * point.normal_impulse;
                    let accumulated =
                        (point.tangent_impulse - vt * point.tangent_mass).clamp(-max_friction, max_friction);
                    let delta = accumulated - point.tangent_impulse;
                    point.tangent_impulse = accumulated;

                    let impulse = contact.tangent * delta;
                    a.apply_impulse(point.r_a, -impulse);
                    b.apply_impulse(point.r_b, impulse);
                }

                for point in points.iter_mut() {
                    if point.normal_mass <= 0.0 {
                        continue;
                    }
                    let vn = (b.velocity_at(point.r_b) - a.velocity_at(point.r_a)).dot(contact.normal);
                    let lambda = (-vn + point.velocity_bias) * point.normal_mass;
                    let accumulated = (point.normal_impulse + lambda).max(0.0);
                    let delta = accumulated - point.normal_impulse;
                    point.normal_impulse = accumulated;

                    let impulse = contact.normal * delta;
                    a.apply_impulse(point.r_a, -impulse);
                    b.apply_impulse(point.r_b, impulse);
                }
            }
        }
    }

    fn solve_position(&mut self, bodies: &mut SolverBodies, contacts: &mut [Contact], _ctx: &SolverContext) {
        let config = self.config;
        for _ in 0..config.position_iterations {
            for contact in contacts.iter().filter(|c| !c.is_cancelled()) {
                let Some(points) = self.constraints.get(&contact.id) else {
                    continue;
                };
                let Some((a, b)) = bodies.pair_mut(contact) else {
                    continue;
                };

                for (i, point) in points.iter().enumerate() {
                    if point.normal_mass <= 0.0 {
                        continue;
                    }
                    // Earlier iterations moved the bodies, so measure again.
                    let separation = contact.separation_at(i, &a.transform(), &b.transform());
                    let steering =
                        (config.steering_factor * (separation + config.slop)).clamp(config.max_correction, 0.0);
                    if steering == 0.0 {
                        continue;
                    }
                    let impulse = contact.normal * (-steering * point.normal_mass);

                    a.position -= impulse * a.inverse_mass();
                    a.rotation -= point.r_a.perp_dot(impulse) * a.inverse_inertia();
                    b.position += impulse * b.inverse_mass();
                    b.rotation += point.r_b.perp_dot(impulse) * b.inverse_inertia();
                }
            }
        }
    }
}
