use glam::{Affine2, Vec2};

use super::ColliderHandle;
use crate::physics::bounds::BoundingBox;
use crate::physics::ray::{Ray, RayCastHit, Segment};

/// Polygon in the owner's local frame, stored counter-clockwise.
#[derive(Debug, Clone)]
pub struct Polygon {
    local: Vec<Vec2>,
    world: Vec<Vec2>,
    convex: bool,
    mirrored: bool,
}

impl Polygon {
    /// Points may arrive in either winding; they are reordered counter-clockwise.
    pub fn new(points: Vec<Vec2>, offset: Vec2) -> Self {
        let mut local: Vec<Vec2> = points.into_iter().map(|p| p + offset).collect();
        if signed_area(&local) < 0.0 {
            local.reverse();
        }
        let convex = is_convex(&local);
        Self {
            world: local.clone(),
            local,
            convex,
            mirrored: false,
        }
    }

    pub fn local_points(&self) -> &[Vec2] {
        &self.local
    }

    pub fn world_points(&self) -> &[Vec2] {
        &self.world
    }

    pub fn is_convex(&self) -> bool {
        self.convex
    }

    pub fn signed_area(&self) -> f32 {
        signed_area(&self.local)
    }

    /// Average of the world vertices.
    pub fn center(&self) -> Vec2 {
        if self.world.is_empty() {
            return Vec2::ZERO;
        }
        self.world.iter().copied().sum::<Vec2>() / self.world.len() as f32
    }

    pub fn side_count(&self) -> usize {
        if self.local.len() < 2 {
            0
        } else {
            self.local.len()
        }
    }

    /// Side `index` in the local frame, oriented so that its normal maps to
    /// the outward world normal even under a mirroring transform.
    pub fn local_side(&self, index: usize) -> Segment {
        let next = (index + 1) % self.local.len();
        if self.mirrored {
            Segment::new(self.local[next], self.local[index])
        } else {
            Segment::new(self.local[index], self.local[next])
        }
    }

    pub fn world_side(&self, index: usize) -> Segment {
        let next = (index + 1) % self.world.len();
        if self.mirrored {
            Segment::new(self.world[next], self.world[index])
        } else {
            Segment::new(self.world[index], self.world[next])
        }
    }

    pub fn world_sides(&self) -> impl Iterator<Item = Segment> + '_ {
        (0..self.side_count()).map(|i| self.world_side(i))
    }

    /// Index and world side whose outward normal best matches `direction`.
    pub fn find_side(&self, direction: Vec2) -> Option<(usize, Segment)> {
        self.world_sides()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.normal().dot(direction).total_cmp(&b.normal().dot(direction)))
    }

    /// Crossing-number test, valid for non-convex outlines too.
    pub fn contains(&self, point: Vec2) -> bool {
        let n = self.world.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (self.world[i], self.world[j]);
            if (a.y > point.y) != (b.y > point.y)
                && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Moment of inertia about the local origin.
    pub fn inertia(&self, mass: f32) -> f32 {
        let n = self.local.len();
        let (mut numerator, mut denominator) = (0.0, 0.0);
        for i in 0..n {
            let a = self.local[i];
            let b = self.local[(i + 1) % n];
            let cross = a.perp_dot(b);
            numerator += cross * (a.dot(a) + a.dot(b) + b.dot(b));
            denominator += cross;
        }
        if denominator == 0.0 {
            return 0.0;
        }
        mass / 6.0 * (numerator / denominator)
    }

    /// Ear clipping over the local outline.
    pub fn triangulate(&self) -> Vec<[Vec2; 3]> {
        let points = &self.local;
        let mut remaining: Vec<usize> = (0..points.len()).collect();
        let mut triangles = Vec::with_capacity(points.len().saturating_sub(2));

        while remaining.len() > 3 {
            let m = remaining.len();
            let ear = (0..m).find(|&i| {
                let a = points[remaining[(i + m - 1) % m]];
                let b = points[remaining[i]];
                let c = points[remaining[(i + 1) % m]];
                if (b - a).perp_dot(c - b) <= 0.0 {
                    return false;
                }
                !remaining.iter().any(|&j| {
                    let p = points[j];
                    p != a && p != b && p != c && point_in_triangle(p, a, b, c)
                })
            });
            let Some(i) = ear else {
                tracing::warn!("triangulation stalled with {} vertices left", m);
                break;
            };
            triangles.push([
                points[remaining[(i + m - 1) % m]],
                points[remaining[i]],
                points[remaining[(i + 1) % m]],
            ]);
            remaining.remove(i);
        }
        if remaining.len() == 3 {
            triangles.push([points[remaining[0]], points[remaining[1]], points[remaining[2]]]);
        }
        triangles
    }

    pub(crate) fn update(&mut self, transform: &Affine2) -> BoundingBox {
        self.world.clear();
        self.world
            .extend(self.local.iter().map(|p| transform.transform_point2(*p)));
        self.mirrored = transform.matrix2.determinant() < 0.0;
        BoundingBox::from_points(&self.world)
    }

    pub(super) fn local_bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&self.local)
    }
}

pub(super) fn ray_cast_sides(
    sides: impl Iterator<Item = Segment>,
    ray: &Ray,
    max_distance: f32,
    collider: ColliderHandle,
) -> Option<RayCastHit> {
    sides
        .filter_map(|side| {
            let t = ray.intersect(&side)?;
            (t <= max_distance).then_some((t, side))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(distance, side)| RayCastHit {
            distance,
            point: ray.point_at(distance),
            normal: side.normal(),
            collider,
        })
}

fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].perp_dot(points[(i + 1) % n]))
        .sum::<f32>()
        * 0.5
}

fn is_convex(points: &[Vec2]) -> bool {
    let n = points.len();
    if n < 3 {
        return true;
    }
    (0..n).all(|i| {
        let a = points[i];
        let b = points[(i + 1) % n];
        let c = points[(i + 2) % n];
        (b - a).perp_dot(c - b) >= 0.0
    })
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
}
