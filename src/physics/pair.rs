//! Candidate collider pairs.

use std::fmt;

use super::collider::{Collider, ColliderHandle, ColliderId};
use crate::ecs::components::physics::{CollisionType, RigidBody};

/// Order independent pair id: the lower collider id always comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairId(ColliderId, ColliderId);

impl PairId {
    pub fn new(a: ColliderId, b: ColliderId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn low(&self) -> ColliderId {
        self.0
    }

    pub fn high(&self) -> ColliderId {
        self.1
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.0, self.1)
    }
}

/// Broadphase candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    pub id: PairId,
    pub a: ColliderHandle,
    pub b: ColliderHandle,
}

impl Pair {
    pub fn new(a: ColliderHandle, b: ColliderHandle) -> Self {
        Self {
            id: PairId::new(a.id, b.id),
            a,
            b,
        }
    }

    /// Eligibility filter applied before narrowphase. Missing bodies never collide.
    pub fn can_collide(
        a: &Collider,
        b: &Collider,
        body_a: Option<&RigidBody>,
        body_b: Option<&RigidBody>,
    ) -> bool {
        if a.id() == b.id() {
            return false;
        }
        if a.owner().is_some() && a.owner() == b.owner() {
            return false;
        }
        if a.is_degenerate() || b.is_degenerate() {
            return false;
        }
        let (Some(body_a), Some(body_b)) = (body_a, body_b) else {
            return false;
        };
        if !body_a.group.collides_with(&body_b.group) {
            return false;
        }
        if body_a.collision_type == CollisionType::Fixed && body_b.collision_type == CollisionType::Fixed {
            return false;
        }
        if body_a.collision_type == CollisionType::PreventCollision
            || body_b.collision_type == CollisionType::PreventCollision
        {
            return false;
        }
        body_a.active && body_b.active
    }
}
