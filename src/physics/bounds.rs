//! Axis-aligned bounding boxes (y-up).

use glam::Vec2;

use super::ray::Ray;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl BoundingBox {
    pub const fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
        }
    }

    /// Empty box that acts as the identity for [`combine`](Self::combine).
    pub const EMPTY: Self = Self::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);

    pub fn from_min_max(min: Vec2, max: Vec2) -> Self {
        Self::new(min.x, min.y, max.x, max.y)
    }

    pub fn from_points(points: &[Vec2]) -> Self {
        points.iter().fold(Self::EMPTY, |b, p| b.expand_to(*p))
    }

    /// Box of the given size centred at `center`.
    pub fn from_dimensions(width: f32, height: f32, center: Vec2) -> Self {
        let half = Vec2::new(width, height) * 0.5;
        Self::from_min_max(center - half, center + half)
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.left, self.bottom)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.right, self.top)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    pub fn center(&self) -> Vec2 {
        (self.min() + self.max()) * 0.5
    }

    pub fn perimeter(&self) -> f32 {
        2.0 * (self.width() + self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.left > self.right || self.bottom > self.top
    }

    /// True if the box collapses to a line or a point.
    pub fn has_zero_dimensions(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }

    pub fn expand_to(&self, point: Vec2) -> Self {
        Self::new(
            self.left.min(point.x),
            self.bottom.min(point.y),
            self.right.max(point.x),
            self.top.max(point.y),
        )
    }

    pub fn combine(&self, other: &BoundingBox) -> Self {
        Self::new(
            self.left.min(other.left),
            self.bottom.min(other.bottom),
            self.right.max(other.right),
            self.top.max(other.top),
        )
    }

    /// Inclusive overlap test, shrunk by `epsilon` on every side.
    pub fn overlaps(&self, other: &BoundingBox, epsilon: f32) -> bool {
        self.left + epsilon <= other.right
            && other.left + epsilon <= self.right
            && self.bottom + epsilon <= other.top
            && other.bottom + epsilon <= self.top
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.bottom && point.y <= self.top
    }

    /// True if `other` lies entirely inside this box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.left >= self.left
            && other.right <= self.right
            && other.bottom >= self.bottom
            && other.top <= self.top
    }

    pub fn translate(&self, offset: Vec2) -> Self {
        Self::from_min_max(self.min() + offset, self.max() + offset)
    }

    pub fn pad(&self, margin: f32) -> Self {
        Self::from_min_max(self.min() - Vec2::splat(margin), self.max() + Vec2::splat(margin))
    }

    /// Grow only on the sides the displacement points towards.
    pub fn extend_by(&self, displacement: Vec2) -> Self {
        let mut b = *self;
        if displacement.x < 0.0 {
            b.left += displacement.x;
        } else {
            b.right += displacement.x;
        }
        if displacement.y < 0.0 {
            b.bottom += displacement.y;
        } else {
            b.top += displacement.y;
        }
        b
    }

    /// Slab test. Returns the entry time along the ray when hit within `far`.
    pub fn ray_cast_time(&self, ray: &Ray, far: f32) -> Option<f32> {
        let inv = Vec2::new(
            if ray.dir.x == 0.0 { f32::MAX } else { 1.0 / ray.dir.x },
            if ray.dir.y == 0.0 { f32::MAX } else { 1.0 / ray.dir.y },
        );
        let tx1 = (self.left - ray.origin.x) * inv.x;
        let tx2 = (self.right - ray.origin.x) * inv.x;
        let ty1 = (self.bottom - ray.origin.y) * inv.y;
        let ty2 = (self.top - ray.origin.y) * inv.y;

        let tmin = tx1.min(tx2).max(ty1.min(ty2));
        let tmax = tx1.max(tx2).min(ty1.max(ty2));

        (tmax >= tmin.max(0.0) && tmin < far).then_some(tmin.max(0.0))
    }

    pub fn ray_cast(&self, ray: &Ray, far: f32) -> bool {
        self.ray_cast_time(ray, far).is_some()
    }
}
