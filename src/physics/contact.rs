//! Contact data produced by the narrowphase and consumed by the solvers.

use glam::{Affine2, Vec2};

use super::bounds::BoundingBox;
use super::collider::{Collider, ColliderHandle};
use super::events::Side;
use super::pair::PairId;
use super::ray::Segment;

/// One of the two colliders of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    A,
    B,
}

impl Participant {
    pub fn other(self) -> Self {
        match self {
            Participant::A => Participant::B,
            Participant::B => Participant::A,
        }
    }
}

/// Recomputes a contact's signed separation from local geometry at the
/// bodies' current world transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeparationQuery {
    /// Centre distance minus both radii.
    Circles {
        local_center_a: Vec2,
        local_center_b: Vec2,
        radius_a: f32,
        radius_b: f32,
    },
    /// Circle against a segment fixed in the other collider's frame.
    CircleSegment {
        circle: Participant,
        local_center: Vec2,
        radius: f32,
        local_segment: Segment,
    },
    /// Incident point against the reference collider's face.
    Face {
        reference: Participant,
        local_side: Segment,
    },
}

impl SeparationQuery {
    /// Signed separation (negative = overlap). `local_point` is the contact
    /// point in the incident collider's frame and only matters for `Face`.
    pub fn separation(&self, transform_a: &Affine2, transform_b: &Affine2, local_point: Vec2) -> f32 {
        let pick = |p: Participant| match p {
            Participant::A => (transform_a, transform_b),
            Participant::B => (transform_b, transform_a),
        };
        match *self {
            SeparationQuery::Circles {
                local_center_a,
                local_center_b,
                radius_a,
                radius_b,
            } => {
                let a = transform_a.transform_point2(local_center_a);
                let b = transform_b.transform_point2(local_center_b);
                a.distance(b) - radius_a - radius_b
            }
            SeparationQuery::CircleSegment {
                circle,
                local_center,
                radius,
                local_segment,
            } => {
                let (circle_tx, segment_tx) = pick(circle);
                let center = circle_tx.transform_point2(local_center);
                let segment = local_segment.transform(segment_tx);
                segment.closest_point(center).distance(center) - radius
            }
            SeparationQuery::Face {
                reference,
                local_side,
            } => {
                let (reference_tx, incident_tx) = pick(reference);
                local_side
                    .transform(reference_tx)
                    .distance_to_point(incident_tx.transform_point2(local_point))
            }
        }
    }

    fn flipped(self) -> Self {
        match self {
            SeparationQuery::Circles {
                local_center_a,
                local_center_b,
                radius_a,
                radius_b,
            } => SeparationQuery::Circles {
                local_center_a: local_center_b,
                local_center_b: local_center_a,
                radius_a: radius_b,
                radius_b: radius_a,
            },
            SeparationQuery::CircleSegment {
                circle,
                local_center,
                radius,
                local_segment,
            } => SeparationQuery::CircleSegment {
                circle: circle.other(),
                local_center,
                radius,
                local_segment,
            },
            SeparationQuery::Face {
                reference,
                local_side,
            } => SeparationQuery::Face {
                reference: reference.other(),
                local_side,
            },
        }
    }
}

/// How the narrowphase separated the two colliders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeparationInfo {
    /// Collider owning the reference geometry.
    pub reference: Participant,
    /// Signed separation, negative when overlapping.
    pub separation: f32,
    /// Separating axis in world space.
    pub axis: Vec2,
    /// Reference side in world space.
    pub side: Option<Segment>,
    /// Reference side in the reference collider's frame.
    pub local_side: Option<Segment>,
    pub side_index: Option<usize>,
    /// Deepest incident point, world and local.
    pub point: Vec2,
    pub local_point: Vec2,
    pub query: SeparationQuery,
}

/// Contact between two leaf colliders.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: PairId,
    /// Composite-aware id used for start/end bookkeeping.
    pub logical_id: PairId,
    pub collider_a: ColliderHandle,
    pub collider_b: ColliderHandle,
    /// Translation that separates B from A.
    pub mtv: Vec2,
    /// Unit normal pointing from A to B.
    pub normal: Vec2,
    pub tangent: Vec2,
    pub points: Vec<Vec2>,
    /// `points` in the incident collider's frame.
    pub local_points: Vec<Vec2>,
    pub info: SeparationInfo,
    pub center_a: Vec2,
    pub center_b: Vec2,
    pub bounds_a: BoundingBox,
    pub bounds_b: BoundingBox,
    cancelled: bool,
}

impl Contact {
    pub fn new(
        a: &Collider,
        b: &Collider,
        mtv: Vec2,
        normal: Vec2,
        points: Vec<Vec2>,
        local_points: Vec<Vec2>,
        info: SeparationInfo,
    ) -> Self {
        let (handle_a, handle_b) = (a.handle(), b.handle());
        Self {
            id: PairId::new(handle_a.id, handle_b.id),
            logical_id: PairId::new(handle_a.logical_id(), handle_b.logical_id()),
            collider_a: handle_a,
            collider_b: handle_b,
            mtv,
            normal,
            tangent: normal.perp(),
            points,
            local_points,
            info,
            center_a: a.center(),
            center_b: b.center(),
            bounds_a: a.bounds(),
            bounds_b: b.bounds(),
            cancelled: false,
        }
    }

    /// Swap the participants, keeping the geometry consistent.
    pub fn flip(self) -> Self {
        let normal = -self.normal;
        Self {
            id: self.id,
            logical_id: self.logical_id,
            collider_a: self.collider_b,
            collider_b: self.collider_a,
            mtv: -self.mtv,
            normal,
            tangent: normal.perp(),
            points: self.points,
            local_points: self.local_points,
            info: SeparationInfo {
                reference: self.info.reference.other(),
                axis: -self.info.axis,
                query: self.info.query.flipped(),
                ..self.info
            },
            center_a: self.center_b,
            center_b: self.center_a,
            bounds_a: self.bounds_b,
            bounds_b: self.bounds_a,
            cancelled: self.cancelled,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Side of A that B touches.
    pub fn side(&self) -> Side {
        Side::from_direction(self.mtv)
    }

    pub fn handle(&self, participant: Participant) -> ColliderHandle {
        match participant {
            Participant::A => self.collider_a,
            Participant::B => self.collider_b,
        }
    }

    /// Recompute the separation of contact point `index` at the given transforms.
    pub fn separation_at(&self, index: usize, transform_a: &Affine2, transform_b: &Affine2) -> f32 {
        let local = self
            .local_points
            .get(index)
            .copied()
            .unwrap_or(self.info.local_point);
        self.info.query.separation(transform_a, transform_b, local)
    }
}
