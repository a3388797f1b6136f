//! Rays, line segments and ray cast hits.

use glam::Vec2;

use super::collider::ColliderHandle;

/// Half line with a normalized direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec2,
    pub dir: Vec2,
}

impl Ray {
    pub fn new(origin: Vec2, dir: Vec2) -> Self {
        Self {
            origin,
            dir: dir.normalize_or_zero(),
        }
    }

    pub fn point_at(&self, t: f32) -> Vec2 {
        self.origin + self.dir * t
    }

    /// Time of intersection with a segment, or `None` when parallel or missed.
    pub fn intersect(&self, segment: &Segment) -> Option<f32> {
        let delta = segment.end - segment.begin;
        let length = delta.length();
        if length == 0.0 {
            return None;
        }
        let slope = delta / length;
        let divisor = self.dir.perp_dot(slope);
        if divisor == 0.0 {
            return None;
        }
        let numerator = segment.begin - self.origin;
        let t = numerator.perp_dot(slope) / divisor;
        if t < 0.0 {
            return None;
        }
        let u = numerator.perp_dot(self.dir) / divisor / length;
        (0.0..=1.0).contains(&u).then_some(t)
    }
}

/// Line segment from `begin` to `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub begin: Vec2,
    pub end: Vec2,
}

impl Segment {
    pub fn new(begin: Vec2, end: Vec2) -> Self {
        Self { begin, end }
    }

    pub fn dir(&self) -> Vec2 {
        self.end - self.begin
    }

    pub fn length(&self) -> f32 {
        self.dir().length()
    }

    pub fn midpoint(&self) -> Vec2 {
        (self.begin + self.end) * 0.5
    }

    /// Outward normal for a counter-clockwise polygon side (right-hand side).
    pub fn normal(&self) -> Vec2 {
        let d = self.dir();
        Vec2::new(d.y, -d.x).normalize_or_zero()
    }

    /// Signed distance from the line through this segment; positive on the
    /// [`normal`](Self::normal) side.
    pub fn distance_to_point(&self, point: Vec2) -> f32 {
        let length = self.length();
        if length == 0.0 {
            return (point - self.begin).length();
        }
        (point - self.begin).dot(Vec2::new(self.dir().y, -self.dir().x)) / length
    }

    /// True when `point` lies behind or on the line.
    pub fn below(&self, point: Vec2) -> bool {
        self.distance_to_point(point) <= 1e-4
    }

    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        let d = self.dir();
        let len_sq = d.length_squared();
        if len_sq == 0.0 {
            return self.begin;
        }
        let t = ((point - self.begin).dot(d) / len_sq).clamp(0.0, 1.0);
        self.begin + d * t
    }

    /// Keep the part of the segment with `dot(direction, p) <= offset`.
    /// Returns `None` when fewer than two points survive.
    pub fn clip(&self, direction: Vec2, offset: f32) -> Option<Segment> {
        let dir = direction.normalize_or_zero();
        let near = dir.dot(self.begin) - offset;
        let far = dir.dot(self.end) - offset;

        let mut points = [Vec2::ZERO; 2];
        let mut count = 0;
        if near <= 0.0 {
            points[count] = self.begin;
            count += 1;
        }
        if far <= 0.0 {
            points[count] = self.end;
            count += 1;
        }
        if near * far < 0.0 && count < 2 {
            let t = near / (near - far);
            points[count] = self.begin + (self.end - self.begin) * t;
            count += 1;
        }
        (count == 2).then(|| Segment::new(points[0], points[1]))
    }

    pub fn transform(&self, affine: &glam::Affine2) -> Segment {
        Segment::new(
            affine.transform_point2(self.begin),
            affine.transform_point2(self.end),
        )
    }
}

/// Result of a ray cast against a collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastHit {
    pub distance: f32,
    pub point: Vec2,
    pub normal: Vec2,
    pub collider: ColliderHandle,
}
