//! Separating axis queries shared by the narrowphase routines.

use glam::{Affine2, Vec2};

use super::collider::{Collider, Polygon, Projection};
use super::ray::Segment;

/// Determinant magnitude below which a transform is treated as singular.
const SINGULAR_EPSILON: f32 = 1e-6;

/// Least penetrating side of a reference polygon against another shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonSeparation {
    /// Signed distance of the deepest point, negative when overlapping.
    pub separation: f32,
    /// Outward world normal of `side`.
    pub axis: Vec2,
    pub side: Segment,
    pub local_side: Segment,
    pub side_index: usize,
    /// Deepest world point of the other polygon along `axis`.
    pub point: Vec2,
}

/// Finds the side of `reference` whose deepest penetrating point from
/// `other_points` is shallowest. Returns `None` when `reference` has no usable
/// sides.
///
/// The search runs in the reference's local frame so that the normals are
/// exact for any invertible transform. A singular transform falls back to the
/// world space vertex distance search.
pub fn polygon_separation(
    reference: &Polygon,
    transform: &Affine2,
    other_points: &[Vec2],
) -> Option<PolygonSeparation> {
    if reference.side_count() == 0 || other_points.is_empty() {
        return None;
    }
    if transform.matrix2.determinant().abs() <= SINGULAR_EPSILON {
        return world_separation(reference, other_points);
    }

    let inverse = transform.inverse();
    let normal_matrix = transform.matrix2.inverse().transpose();
    let local_points: Vec<Vec2> = other_points
        .iter()
        .map(|p| inverse.transform_point2(*p))
        .collect();
    let outline = reference.local_points();

    let mut best: Option<PolygonSeparation> = None;
    for i in 0..reference.side_count() {
        let begin = outline[i];
        let end = outline[(i + 1) % outline.len()];
        let d = end - begin;
        let local_normal = Vec2::new(d.y, -d.x);
        let world_normal = normal_matrix * local_normal;
        let scale = world_normal.length();
        if scale <= f32::EPSILON {
            continue;
        }

        let (deepest, index) = local_points
            .iter()
            .enumerate()
            .map(|(j, p)| ((*p - begin).dot(local_normal) / scale, j))
            .fold((f32::MAX, 0), |acc, cur| if cur.0 < acc.0 { cur } else { acc });

        if best.map_or(true, |b| deepest > b.separation) {
            best = Some(PolygonSeparation {
                separation: deepest,
                axis: world_normal / scale,
                side: reference.world_side(i),
                local_side: reference.local_side(i),
                side_index: i,
                point: other_points[index],
            });
        }
    }
    best
}

fn world_separation(reference: &Polygon, other_points: &[Vec2]) -> Option<PolygonSeparation> {
    let mut best: Option<PolygonSeparation> = None;
    for i in 0..reference.side_count() {
        let side = reference.world_side(i);
        if side.length() <= f32::EPSILON {
            continue;
        }
        let (deepest, point) = other_points
            .iter()
            .map(|p| (side.distance_to_point(*p), *p))
            .fold((f32::MAX, Vec2::ZERO), |acc, cur| if cur.0 < acc.0 { cur } else { acc });

        if best.map_or(true, |b| deepest > b.separation) {
            best = Some(PolygonSeparation {
                separation: deepest,
                axis: side.normal(),
                side,
                local_side: reference.local_side(i),
                side_index: i,
                point,
            });
        }
    }
    best
}

/// Minimum translation for a circle overlapping a polygon, pointing in an
/// arbitrary direction along the best axis. `None` when any axis separates.
///
/// Axes are the polygon's face normals plus the direction from the circle's
/// centre to the nearest polygon vertex.
pub fn circle_polygon_separation(circle: &Collider, polygon: &Collider) -> Option<Vec2> {
    let center = circle.center();
    let poly = polygon.as_polygon()?;

    let mut axes = polygon.axes();
    let closest = poly
        .world_points()
        .iter()
        .copied()
        .min_by(|a, b| a.distance_squared(center).total_cmp(&b.distance_squared(center)))?;
    if let Some(axis) = (center - closest).try_normalize() {
        axes.push(axis);
    }

    let mut min: Option<(f32, Vec2)> = None;
    for axis in axes {
        let overlap = polygon.project(axis).overlap(&circle.project(axis));
        if overlap <= 0.0 {
            return None;
        }
        if min.map_or(true, |(best, _)| overlap < best) {
            min = Some((overlap, axis));
        }
    }
    min.map(|(overlap, axis)| axis.normalize_or_zero() * overlap)
}

/// Overlap of two colliders along `axis`, zero or negative when separated.
pub fn overlap_on(a: &Collider, b: &Collider, axis: Vec2) -> f32 {
    let pa: Projection = a.project(axis);
    pa.overlap(&b.project(axis))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f32) -> Polygon {
        let h = size * 0.5;
        Polygon::new(
            vec![
                Vec2::new(-h, -h),
                Vec2::new(h, -h),
                Vec2::new(h, h),
                Vec2::new(-h, h),
            ],
            Vec2::ZERO,
        )
    }

    #[test]
    fn test_separation_of_overlapping_squares() {
        let reference = square(1.0);
        let other = [
            Vec2::new(0.0, -0.5),
            Vec2::new(1.0, -0.5),
            Vec2::new(1.0, 0.5),
            Vec2::new(0.0, 0.5),
        ];
        let sep = polygon_separation(&reference, &Affine2::IDENTITY, &other).unwrap();
        assert!((sep.separation + 0.5).abs() < 1e-5);
        assert!((sep.axis - Vec2::X).length() < 1e-5);
        assert!((sep.side.normal() - Vec2::X).length() < 1e-5);
    }

    #[test]
    fn test_separation_under_scale_matches_world_distance() {
        let mut reference = square(1.0);
        let transform = Affine2::from_scale(Vec2::new(4.0, 1.0));
        reference.update(&transform);
        // Scaled square spans x in [-2, 2]; a point at x = 3 is 1 unit clear.
        let other = [Vec2::new(3.0, 0.0), Vec2::new(3.5, 0.0), Vec2::new(3.0, 0.2)];
        let sep = polygon_separation(&reference, &transform, &other).unwrap();
        assert!((sep.separation - 1.0).abs() < 1e-5, "got {}", sep.separation);
        assert!((sep.axis - Vec2::X).length() < 1e-5);
    }

    #[test]
    fn test_singular_transform_uses_world_sides() {
        let mut reference = square(1.0);
        let flat = Affine2::from_scale(Vec2::new(1.0, 0.0));
        reference.update(&flat);
        let other = [Vec2::new(0.0, 1.0)];
        // Every world side of the flattened square is either zero length or
        // lies on the x axis.
        let sep = polygon_separation(&reference, &flat, &other).unwrap();
        assert!((sep.separation.abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_circle_polygon_axes() {
        let poly = Collider::rectangle(2.0, 2.0);
        let mut circle = Collider::circle(1.0);
        circle.update(&Affine2::from_translation(Vec2::new(1.5, 0.0)));
        let mtv = circle_polygon_separation(&circle, &poly).unwrap();
        assert!((mtv.length() - 0.5).abs() < 1e-5);
        assert!(mtv.normalize().x.abs() > 0.999);

        // Near a corner the vertex axis separates even though both face axes overlap.
        circle.update(&Affine2::from_translation(Vec2::new(1.8, 1.8)));
        assert!(circle_polygon_separation(&circle, &poly).is_none());
        assert!(overlap_on(&circle, &poly, Vec2::X) > 0.0);
    }
}
