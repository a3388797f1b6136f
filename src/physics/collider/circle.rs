use glam::{Affine2, Vec2};

use super::ColliderHandle;
use crate::physics::bounds::BoundingBox;
use crate::physics::ray::{Ray, RayCastHit};

/// Circle in the owner's local frame.
#[derive(Debug, Clone)]
pub struct Circle {
    pub radius: f32,
    pub offset: Vec2,
    world_center: Vec2,
    world_radius: f32,
}

impl Circle {
    pub fn new(radius: f32, offset: Vec2) -> Self {
        Self {
            radius,
            offset,
            world_center: offset,
            world_radius: radius,
        }
    }

    pub fn world_center(&self) -> Vec2 {
        self.world_center
    }

    /// Radius scaled by the smaller axis scale of the owner.
    pub fn world_radius(&self) -> f32 {
        self.world_radius
    }

    pub(super) fn update(&mut self, transform: &Affine2) -> BoundingBox {
        self.world_center = transform.transform_point2(self.offset);
        let scale = transform
            .matrix2
            .x_axis
            .length()
            .min(transform.matrix2.y_axis.length());
        self.world_radius = self.radius * scale;
        BoundingBox::from_dimensions(
            self.world_radius * 2.0,
            self.world_radius * 2.0,
            self.world_center,
        )
    }

    pub(super) fn local_bounds(&self) -> BoundingBox {
        BoundingBox::from_dimensions(self.radius * 2.0, self.radius * 2.0, self.offset)
    }

    pub(super) fn ray_cast(
        &self,
        ray: &Ray,
        max_distance: f32,
        collider: ColliderHandle,
    ) -> Option<RayCastHit> {
        let to_origin = ray.origin - self.world_center;
        let b = ray.dir.dot(to_origin);
        let discriminant = b * b - to_origin.length_squared() + self.world_radius * self.world_radius;
        if discriminant < 0.0 {
            return None;
        }
        let root = discriminant.sqrt();
        let distance = [-b - root, -b + root]
            .into_iter()
            .filter(|t| *t >= 0.0)
            .reduce(f32::min)?;
        if distance > max_distance {
            return None;
        }
        let point = ray.point_at(distance);
        Some(RayCastHit {
            distance,
            point,
            normal: (point - self.world_center).normalize_or_zero(),
            collider,
        })
    }
}
