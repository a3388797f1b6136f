//! Collider shapes and their cached world geometry.
//!
//! A [`Collider`] is an ECS component. Geometry is stored in the owner's
//! local frame (offsets already applied) and mirrored into world space by
//! [`Collider::update`], which must run after the owner moves.

mod circle;
mod composite;
mod edge;
mod polygon;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Affine2, Vec2};

use super::bounds::BoundingBox;
use super::contact::Contact;
use super::narrowphase;
use super::ray::{Ray, RayCastHit};

pub use circle::Circle;
pub use composite::Composite;
pub use edge::Edge;
pub use polygon::Polygon;

static NEXT_COLLIDER_ID: AtomicU32 = AtomicU32::new(1);

/// Stable collider identifier, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderId(u32);

impl ColliderId {
    pub fn next() -> Self {
        Self(NEXT_COLLIDER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ColliderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to a leaf collider by owner entity and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderHandle {
    pub entity: hecs::Entity,
    pub id: ColliderId,
    /// Id of the composite this leaf belongs to, if any.
    pub composite: Option<ColliderId>,
}

impl ColliderHandle {
    /// Id used for logical (start/end) collision bookkeeping.
    pub fn logical_id(&self) -> ColliderId {
        self.composite.unwrap_or(self.id)
    }
}

/// Leaf shape kinds handled by the narrowphase dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Circle = 0,
    Polygon = 1,
    Edge = 2,
}

/// Interval of a shape projected onto an axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub min: f32,
    pub max: f32,
}

impl Projection {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Length of the shared interval; zero or negative means disjoint.
    pub fn overlap(&self, other: &Projection) -> f32 {
        self.max.min(other.max) - self.min.max(other.min)
    }

    pub fn union(&self, other: &Projection) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    fn from_points(points: impl IntoIterator<Item = Vec2>, axis: Vec2) -> Self {
        points.into_iter().fold(Self::new(f32::MAX, f32::MIN), |p, v| {
            let d = v.dot(axis);
            Self::new(p.min.min(d), p.max.max(d))
        })
    }
}

#[derive(Debug, Clone)]
pub enum Shape {
    Circle(Circle),
    Polygon(Polygon),
    Edge(Edge),
    Composite(Composite),
}

/// Collision geometry component.
#[derive(Debug)]
pub struct Collider {
    id: ColliderId,
    owner: Option<hecs::Entity>,
    composite: Option<ColliderId>,
    shape: Shape,
    transform: Affine2,
    bounds: BoundingBox,
    revision: u32,
}

impl Clone for Collider {
    /// Clones receive fresh ids.
    fn clone(&self) -> Self {
        let mut clone = Self::from_shape(self.shape.clone());
        clone.owner = self.owner;
        clone.update(&self.transform);
        clone
    }
}

impl Collider {
    pub fn from_shape(shape: Shape) -> Self {
        let mut collider = Self {
            id: ColliderId::next(),
            owner: None,
            composite: None,
            shape,
            transform: Affine2::IDENTITY,
            bounds: BoundingBox::EMPTY,
            revision: 0,
        };
        collider.adopt_children();
        collider.update(&Affine2::IDENTITY);
        collider
    }

    pub fn circle(radius: f32) -> Self {
        Self::from_shape(Shape::Circle(Circle::new(radius, Vec2::ZERO)))
    }

    pub fn circle_at(radius: f32, offset: Vec2) -> Self {
        Self::from_shape(Shape::Circle(Circle::new(radius, offset)))
    }

    /// Polygon from points in either winding. Non-convex input is accepted
    /// with a warning; see [`Collider::triangulate`].
    pub fn polygon(points: Vec<Vec2>) -> Self {
        Self::polygon_at(points, Vec2::ZERO)
    }

    pub fn polygon_at(points: Vec<Vec2>, offset: Vec2) -> Self {
        let polygon = Polygon::new(points, offset);
        if !polygon.is_convex() {
            tracing::warn!(
                "non-convex polygon collider with {} points; call triangulate() for correct collisions",
                polygon.local_points().len()
            );
        }
        Self::from_shape(Shape::Polygon(polygon))
    }

    /// Box centred on the owner's origin.
    pub fn rectangle(width: f32, height: f32) -> Self {
        Self::rectangle_anchored(width, height, Vec2::splat(0.5), Vec2::ZERO)
    }

    /// Box whose `anchor` (0..1 in each axis) sits at `offset`.
    pub fn rectangle_anchored(width: f32, height: f32, anchor: Vec2, offset: Vec2) -> Self {
        let left = -width * anchor.x;
        let bottom = -height * anchor.y;
        let right = left + width;
        let top = bottom + height;
        Self::from_shape(Shape::Polygon(Polygon::new(
            vec![
                Vec2::new(left, bottom),
                Vec2::new(right, bottom),
                Vec2::new(right, top),
                Vec2::new(left, top),
            ],
            offset,
        )))
    }

    pub fn edge(begin: Vec2, end: Vec2) -> Self {
        Self::from_shape(Shape::Edge(Edge::new(begin, end, Vec2::ZERO)))
    }

    /// Box with two round caps, oriented along its longer side.
    pub fn capsule(width: f32, height: f32) -> Self {
        if width >= height {
            let radius = height * 0.5;
            let span = width - height;
            Self::composite(vec![
                Self::circle_at(radius, Vec2::new(-span * 0.5, 0.0)),
                Self::rectangle(span, height),
                Self::circle_at(radius, Vec2::new(span * 0.5, 0.0)),
            ])
        } else {
            let radius = width * 0.5;
            let span = height - width;
            Self::composite(vec![
                Self::circle_at(radius, Vec2::new(0.0, -span * 0.5)),
                Self::rectangle(width, span),
                Self::circle_at(radius, Vec2::new(0.0, span * 0.5)),
            ])
        }
    }

    /// Composite of the given colliders. Nested composites are flattened.
    pub fn composite(children: Vec<Collider>) -> Self {
        Self::from_shape(Shape::Composite(Composite::new(children)))
    }

    pub fn id(&self) -> ColliderId {
        self.id
    }

    pub fn owner(&self) -> Option<hecs::Entity> {
        self.owner
    }

    pub fn composite_id(&self) -> Option<ColliderId> {
        self.composite
    }

    pub fn handle(&self) -> ColliderHandle {
        ColliderHandle {
            entity: self.owner.unwrap_or(hecs::Entity::DANGLING),
            id: self.id,
            composite: self.composite,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Replace the geometry. Invalidates cached inertia on the owner.
    pub fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
        self.revision = self.revision.wrapping_add(1);
        self.adopt_children();
        let transform = self.transform;
        self.update(&transform);
    }

    /// Geometry revision, bumped by every geometry mutation.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// `None` for composites.
    pub fn kind(&self) -> Option<ShapeKind> {
        match self.shape {
            Shape::Circle(_) => Some(ShapeKind::Circle),
            Shape::Polygon(_) => Some(ShapeKind::Polygon),
            Shape::Edge(_) => Some(ShapeKind::Edge),
            Shape::Composite(_) => None,
        }
    }

    pub fn as_circle(&self) -> Option<&Circle> {
        match &self.shape {
            Shape::Circle(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_polygon(&self) -> Option<&Polygon> {
        match &self.shape {
            Shape::Polygon(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match &self.shape {
            Shape::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&Composite> {
        match &self.shape {
            Shape::Composite(c) => Some(c),
            _ => None,
        }
    }

    /// The leaf colliders: itself, or a composite's children.
    pub fn leaves(&self) -> &[Collider] {
        match &self.shape {
            Shape::Composite(c) => c.children(),
            _ => std::slice::from_ref(self),
        }
    }

    pub fn find_leaf(&self, id: ColliderId) -> Option<&Collider> {
        match &self.shape {
            Shape::Composite(composite) => composite.child(id),
            _ => (self.id == id).then_some(self),
        }
    }

    pub(crate) fn set_owner(&mut self, owner: hecs::Entity) {
        self.owner = Some(owner);
        if let Shape::Composite(c) = &mut self.shape {
            c.set_owner(owner);
        }
    }

    fn adopt_children(&mut self) {
        let id = self.id;
        let owner = self.owner;
        if let Shape::Composite(c) = &mut self.shape {
            c.adopt(id, owner);
        }
    }

    /// Refresh world geometry from the owner's world transform.
    pub fn update(&mut self, transform: &Affine2) {
        self.transform = *transform;
        self.bounds = match &mut self.shape {
            Shape::Circle(c) => c.update(transform),
            Shape::Polygon(p) => p.update(transform),
            Shape::Edge(e) => e.update(transform),
            Shape::Composite(c) => c.update(transform),
        };
    }

    pub fn transform(&self) -> &Affine2 {
        &self.transform
    }

    /// World bounds as of the last [`update`](Self::update).
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn local_bounds(&self) -> BoundingBox {
        match &self.shape {
            Shape::Circle(c) => c.local_bounds(),
            Shape::Polygon(p) => p.local_bounds(),
            Shape::Edge(e) => e.local_bounds(),
            Shape::Composite(c) => c.local_bounds(),
        }
    }

    /// True for geometry that cannot produce meaningful contacts.
    pub fn is_degenerate(&self) -> bool {
        match &self.shape {
            Shape::Circle(c) => c.radius <= 0.0,
            Shape::Polygon(p) => p.local_points().len() < 3 || p.local_bounds().has_zero_dimensions(),
            Shape::Edge(e) => e.local_begin() == e.local_end(),
            Shape::Composite(c) => c.children().is_empty(),
        }
    }

    pub fn center(&self) -> Vec2 {
        match &self.shape {
            Shape::Circle(c) => c.world_center(),
            Shape::Polygon(p) => p.center(),
            Shape::Edge(e) => e.world_segment().midpoint(),
            Shape::Composite(_) => self.bounds.center(),
        }
    }

    /// Candidate separating axes in world space.
    pub fn axes(&self) -> Vec<Vec2> {
        match &self.shape {
            Shape::Circle(_) => Vec::new(),
            Shape::Polygon(p) => p.world_sides().map(|s| s.normal()).collect(),
            Shape::Edge(e) => {
                let n = e.world_segment().normal();
                vec![n, n.perp()]
            }
            Shape::Composite(c) => c.children().iter().flat_map(|c| c.axes()).collect(),
        }
    }

    /// World point furthest along `direction`.
    pub fn furthest_point(&self, direction: Vec2) -> Vec2 {
        match &self.shape {
            Shape::Circle(c) => c.world_center() + direction.normalize_or_zero() * c.world_radius(),
            Shape::Polygon(p) => support(p.world_points().iter().copied(), direction),
            Shape::Edge(e) => {
                let s = e.world_segment();
                support([s.begin, s.end], direction)
            }
            Shape::Composite(c) => support(
                c.children().iter().map(|child| child.furthest_point(direction)),
                direction,
            ),
        }
    }

    /// Local point furthest along a world `direction`.
    pub fn furthest_local_point(&self, direction: Vec2) -> Vec2 {
        let local_dir = self.transform.matrix2.transpose() * direction;
        match &self.shape {
            Shape::Circle(c) => c.offset + local_dir.normalize_or_zero() * c.radius,
            Shape::Polygon(p) => support(p.local_points().iter().copied(), local_dir),
            Shape::Edge(e) => support([e.local_begin(), e.local_end()], local_dir),
            Shape::Composite(c) => support(
                c.children().iter().map(|child| child.furthest_local_point(direction)),
                local_dir,
            ),
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        match &self.shape {
            Shape::Circle(c) => c.world_center().distance_squared(point) <= c.world_radius().powi(2),
            Shape::Polygon(p) => p.contains(point),
            Shape::Edge(e) => {
                let s = e.world_segment();
                s.closest_point(point).distance(point) <= 1e-4
            }
            Shape::Composite(c) => c.children().iter().any(|child| child.contains(point)),
        }
    }

    /// Nearest hit along the ray within `max_distance`.
    pub fn ray_cast(&self, ray: &Ray, max_distance: f32) -> Option<RayCastHit> {
        let handle = self.handle();
        match &self.shape {
            Shape::Circle(c) => c.ray_cast(ray, max_distance, handle),
            Shape::Polygon(p) => polygon::ray_cast_sides(p.world_sides(), ray, max_distance, handle),
            Shape::Edge(e) => {
                polygon::ray_cast_sides(std::iter::once(e.world_segment()), ray, max_distance, handle)
            }
            Shape::Composite(c) => c
                .children()
                .iter()
                .filter_map(|child| child.ray_cast(ray, max_distance))
                .min_by(|a, b| a.distance.total_cmp(&b.distance)),
        }
    }

    /// Project onto a world axis.
    pub fn project(&self, axis: Vec2) -> Projection {
        match &self.shape {
            Shape::Circle(c) => {
                let d = c.world_center().dot(axis);
                let r = c.world_radius() * axis.length();
                Projection::new(d - r, d + r)
            }
            Shape::Polygon(p) => Projection::from_points(p.world_points().iter().copied(), axis),
            Shape::Edge(e) => {
                let s = e.world_segment();
                Projection::from_points([s.begin, s.end], axis)
            }
            Shape::Composite(c) => c
                .children()
                .iter()
                .map(|child| child.project(axis))
                .reduce(|a, b| a.union(&b))
                .unwrap_or(Projection::new(0.0, 0.0)),
        }
    }

    /// Moment of inertia about the owner's origin for the given mass.
    pub fn inertia(&self, mass: f32) -> f32 {
        match &self.shape {
            Shape::Circle(c) => mass * c.radius * c.radius * 0.5 + mass * c.offset.length_squared(),
            Shape::Polygon(p) => p.inertia(mass),
            Shape::Edge(e) => {
                let s = e.local_segment();
                mass * s.length().powi(2) / 12.0 + mass * s.midpoint().length_squared()
            }
            Shape::Composite(c) => c.children().iter().map(|child| child.inertia(mass)).sum(),
        }
    }

    /// Contacts between two colliders (composites are flattened).
    pub fn collide(&self, other: &Collider) -> Vec<Contact> {
        narrowphase::collide(self, other)
    }

    /// Stand-in sharing this collider's identity and transform but not its geometry.
    pub(crate) fn stand_in(&self, shape: Shape) -> Collider {
        let mut stand_in = Collider {
            id: self.id,
            owner: self.owner,
            composite: self.composite,
            shape,
            transform: self.transform,
            bounds: BoundingBox::EMPTY,
            revision: self.revision,
        };
        stand_in.update(&self.transform);
        stand_in
    }

    /// Ear-clip a polygon into a composite of triangles. Other shapes are cloned.
    pub fn triangulate(&self) -> Collider {
        match &self.shape {
            Shape::Polygon(p) => Self::composite(
                p.triangulate()
                    .into_iter()
                    .map(|tri| Self::from_shape(Shape::Polygon(Polygon::new(tri.to_vec(), Vec2::ZERO))))
                    .collect(),
            ),
            _ => self.clone(),
        }
    }

    /// Fan-split a polygon from its first vertex. Other shapes are cloned.
    pub fn tessellate(&self) -> Collider {
        match &self.shape {
            Shape::Polygon(p) => {
                let points = p.local_points();
                Self::composite(
                    (1..points.len().saturating_sub(1))
                        .map(|i| {
                            Self::from_shape(Shape::Polygon(Polygon::new(
                                vec![points[0], points[i], points[i + 1]],
                                Vec2::ZERO,
                            )))
                        })
                        .collect(),
                )
            }
            _ => self.clone(),
        }
    }
}

/// Point with the largest projection on `direction`.
pub(crate) fn support(points: impl IntoIterator<Item = Vec2>, direction: Vec2) -> Vec2 {
    points
        .into_iter()
        .fold((f32::MIN, Vec2::ZERO), |(best, best_point), p| {
            let d = p.dot(direction);
            if d > best {
                (d, p)
            } else {
                (best, best_point)
            }
        })
        .1
}
