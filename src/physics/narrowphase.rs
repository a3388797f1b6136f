//! Narrowphase collision detection between leaf shapes.
//!
//! Leaf pairs dispatch through a table indexed by [`ShapeKind`]. Mirrored
//! entries run the forward routine and flip the result so that every contact
//! keeps its normal pointing from A to B. Composites are flattened through
//! their internal bounds tree before dispatch.

use glam::{Affine2, Vec2};

use super::collider::{Collider, Polygon, Shape, ShapeKind};
use super::contact::{Contact, Participant, SeparationInfo, SeparationQuery};
use super::sat;

/// Depth of the stand-in quad used when a polygon meets an edge.
pub const EDGE_EXTRUSION: f32 = 100.0;

type CollideFn = fn(&Collider, &Collider) -> Option<Contact>;

const DISPATCH: [[CollideFn; 3]; 3] = [
    [circle_circle, circle_polygon, circle_edge],
    [polygon_circle, polygon_polygon, polygon_edge],
    [edge_circle, edge_polygon, edge_edge],
];

/// All contacts between two colliders, flattening composites.
pub fn collide(a: &Collider, b: &Collider) -> Vec<Contact> {
    let mut contacts = Vec::new();
    collide_into(a, b, &mut contacts);
    contacts
}

fn collide_into(a: &Collider, b: &Collider, contacts: &mut Vec<Contact>) {
    if let Some(composite) = a.as_composite() {
        for leaf in composite.query(&b.bounds()) {
            collide_into(leaf, b, contacts);
        }
        return;
    }
    if let Some(composite) = b.as_composite() {
        for leaf in composite.query(&a.bounds()) {
            collide_into(a, leaf, contacts);
        }
        return;
    }
    contacts.extend(collide_leaves(a, b));
}

/// Contact between two leaf colliders. `None` when separated, touching, or
/// either side is a composite.
pub fn collide_leaves(a: &Collider, b: &Collider) -> Option<Contact> {
    let (kind_a, kind_b): (ShapeKind, ShapeKind) = (a.kind()?, b.kind()?);
    DISPATCH[kind_a as usize][kind_b as usize](a, b)
}

fn circle_circle(a: &Collider, b: &Collider) -> Option<Contact> {
    let (circle_a, circle_b) = (a.as_circle()?, b.as_circle()?);
    let (center_a, center_b) = (circle_a.world_center(), circle_b.world_center());
    let (radius_a, radius_b) = (circle_a.world_radius(), circle_b.world_radius());

    let distance = center_a.distance(center_b);
    let combined = radius_a + radius_b;
    if distance >= combined {
        return None;
    }

    // Coincident centres have no preferred axis.
    let normal = (center_b - center_a).try_normalize().unwrap_or(Vec2::Y);
    let separation = distance - combined;
    let point = center_a + normal * radius_a;
    let local_point = a.furthest_local_point(normal);

    let info = SeparationInfo {
        reference: Participant::A,
        separation,
        axis: normal,
        side: None,
        local_side: None,
        side_index: None,
        point,
        local_point,
        query: SeparationQuery::Circles {
            local_center_a: circle_a.offset,
            local_center_b: circle_b.offset,
            radius_a,
            radius_b,
        },
    };
    Some(Contact::new(
        a,
        b,
        normal * -separation,
        normal,
        vec![point],
        vec![local_point],
        info,
    ))
}

fn circle_polygon(a: &Collider, b: &Collider) -> Option<Contact> {
    let polygon = b.as_polygon()?;
    let mut mtv = sat::circle_polygon_separation(a, b)?;
    if mtv.dot(b.center() - a.center()) < 0.0 {
        mtv = -mtv;
    }
    let normal = mtv.try_normalize()?;

    let point = a.furthest_point(normal);
    let local_point = a.furthest_local_point(normal);
    let (side_index, side) = polygon.find_side(-normal)?;
    let local_side = polygon.local_side(side_index);

    let info = SeparationInfo {
        reference: Participant::B,
        separation: -mtv.length(),
        axis: normal,
        side: Some(side),
        local_side: Some(local_side),
        side_index: Some(side_index),
        point,
        local_point,
        query: SeparationQuery::Face {
            reference: Participant::B,
            local_side,
        },
    };
    Some(Contact::new(a, b, mtv, normal, vec![point], vec![local_point], info))
}

fn circle_edge(a: &Collider, b: &Collider) -> Option<Contact> {
    let (circle, edge) = (a.as_circle()?, b.as_edge()?);
    let center = circle.world_center();
    let radius = circle.world_radius();
    let segment = edge.world_segment();
    let (begin, end) = (segment.begin, segment.end);
    let e = end - begin;

    let u = e.dot(end - center);
    let v = e.dot(center - begin);

    let (point, normal) = if v <= 0.0 {
        (begin, (begin - center).try_normalize().unwrap_or(-segment.normal()))
    } else if u <= 0.0 {
        (end, (end - center).try_normalize().unwrap_or(-segment.normal()))
    } else {
        let p = (begin * u + end * v) / e.dot(e);
        let mut n = e.perp();
        if n.dot(center - begin) < 0.0 {
            n = -n;
        }
        (p, -n.normalize_or_zero())
    };

    let dd = center.distance_squared(point);
    if dd >= radius * radius {
        return None;
    }
    let separation = dd.sqrt() - radius;
    let local_point = a.furthest_local_point(normal);

    let info = SeparationInfo {
        reference: Participant::B,
        separation,
        axis: normal,
        side: Some(segment),
        local_side: Some(edge.local_segment()),
        side_index: Some(0),
        point,
        local_point,
        query: SeparationQuery::CircleSegment {
            circle: Participant::A,
            local_center: circle.offset,
            radius,
            local_segment: edge.local_segment(),
        },
    };
    Some(Contact::new(
        a,
        b,
        normal * -separation,
        normal,
        vec![point],
        vec![local_point],
        info,
    ))
}

fn polygon_polygon(a: &Collider, b: &Collider) -> Option<Contact> {
    let (poly_a, poly_b) = (a.as_polygon()?, b.as_polygon()?);

    let separation_a = sat::polygon_separation(poly_a, a.transform(), poly_b.world_points())?;
    if separation_a.separation > 0.0 {
        return None;
    }
    let separation_b = sat::polygon_separation(poly_b, b.transform(), poly_a.world_points())?;
    if separation_b.separation > 0.0 {
        return None;
    }

    let (reference, separation, incident_collider, incident_polygon) =
        if separation_a.separation > separation_b.separation {
            (Participant::A, separation_a, b, poly_b)
        } else {
            (Participant::B, separation_b, a, poly_a)
        };

    let (_, incident) = incident_polygon.find_side(-separation.axis)?;
    let reference_side = separation.side;
    let ref_dir = reference_side.dir().normalize_or_zero();

    let clipped = incident
        .clip(-ref_dir, -ref_dir.dot(reference_side.begin))?
        .clip(ref_dir, ref_dir.dot(reference_side.end))?;
    let points: Vec<Vec2> = [clipped.begin, clipped.end]
        .into_iter()
        .filter(|p| reference_side.below(*p))
        .collect();
    if points.is_empty() {
        return None;
    }

    let mut normal = separation.axis;
    if (b.center() - a.center()).dot(normal) < 0.0 {
        normal = -normal;
    }
    let local_points: Vec<Vec2> = points
        .iter()
        .map(|p| incident_local(incident_collider, *p, -separation.axis))
        .collect();

    let info = SeparationInfo {
        reference,
        separation: separation.separation,
        axis: separation.axis,
        side: Some(reference_side),
        local_side: Some(separation.local_side),
        side_index: Some(separation.side_index),
        point: separation.point,
        local_point: incident_local(incident_collider, separation.point, -separation.axis),
        query: SeparationQuery::Face {
            reference,
            local_side: separation.local_side,
        },
    };
    Some(Contact::new(
        a,
        b,
        normal * -separation.separation,
        normal,
        points,
        local_points,
        info,
    ))
}

/// World point in the incident collider's frame. A singular transform has no
/// inverse, so the support point along `direction` stands in.
fn incident_local(collider: &Collider, point: Vec2, direction: Vec2) -> Vec2 {
    let transform: &Affine2 = collider.transform();
    if transform.matrix2.determinant().abs() > f32::EPSILON {
        transform.inverse().transform_point2(point)
    } else {
        collider.furthest_local_point(direction)
    }
}

/// Polygon against an edge: the edge is extruded away from the polygon into
/// a quad in its own frame and the pair is solved as two polygons.
fn polygon_edge(a: &Collider, b: &Collider) -> Option<Contact> {
    a.as_polygon()?;
    let edge = b.as_edge()?;
    let transform = b.transform();
    if transform.matrix2.determinant().abs() <= f32::EPSILON {
        return None;
    }

    let local = edge.local_segment();
    let polygon_center = transform.inverse().transform_point2(a.center());
    let mut extrude = local.normal();
    if extrude.dot(local.midpoint() - polygon_center) < 0.0 {
        extrude = -extrude;
    }
    let depth = extrude * EDGE_EXTRUSION;
    let quad = Polygon::new(
        vec![local.begin, local.end, local.end + depth, local.begin + depth],
        Vec2::ZERO,
    );

    let stand_in = b.stand_in(Shape::Polygon(quad));
    let mut contact = polygon_polygon(a, &stand_in)?;
    contact.center_b = b.center();
    contact.bounds_b = b.bounds();
    Some(contact)
}

fn polygon_circle(a: &Collider, b: &Collider) -> Option<Contact> {
    circle_polygon(b, a).map(Contact::flip)
}

fn edge_circle(a: &Collider, b: &Collider) -> Option<Contact> {
    circle_edge(b, a).map(Contact::flip)
}

fn edge_polygon(a: &Collider, b: &Collider) -> Option<Contact> {
    polygon_edge(b, a).map(Contact::flip)
}

fn edge_edge(_a: &Collider, _b: &Collider) -> Option<Contact> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::pair::PairId;

    fn at(mut collider: Collider, x: f32, y: f32) -> Collider {
        collider.update(&Affine2::from_translation(Vec2::new(x, y)));
        collider
    }

    fn unit_square() -> Collider {
        Collider::polygon(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ])
    }

    #[test]
    fn test_overlapping_circles() {
        let a = Collider::circle(5.0);
        let b = at(Collider::circle(5.0), 8.0, 0.0);
        let contacts = collide(&a, &b);
        assert_eq!(contacts.len(), 1);
        let contact = &contacts[0];
        assert!((contact.mtv - Vec2::new(2.0, 0.0)).length() < 1e-5);
        assert!((contact.normal - Vec2::X).length() < 1e-6);
        assert!((contact.info.separation + 2.0).abs() < 1e-5);
        assert_eq!(contact.points, vec![Vec2::new(5.0, 0.0)]);
    }

    #[test]
    fn test_touching_circles_do_not_collide() {
        let a = Collider::circle(5.0);
        let b = at(Collider::circle(5.0), 10.0, 0.0);
        assert!(collide(&a, &b).is_empty());
    }

    #[test]
    fn test_coincident_circles_pick_up_axis() {
        let a = Collider::circle(1.0);
        let b = Collider::circle(1.0);
        let contact = collide_leaves(&a, &b).unwrap();
        assert_eq!(contact.normal, Vec2::Y);
        assert!((contact.mtv.length() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_overlapping_squares() {
        let a = unit_square();
        let b = at(unit_square(), 0.5, 0.0);
        let contact = collide_leaves(&a, &b).unwrap();
        assert!((contact.mtv - Vec2::new(0.5, 0.0)).length() < 1e-5);
        assert!((contact.normal - Vec2::X).length() < 1e-5);
        assert_eq!(contact.points.len(), 2);
        assert_eq!(contact.local_points.len(), 2);
        assert!((contact.info.separation + 0.5).abs() < 1e-5);

        let ta = *a.transform();
        let tb = *b.transform();
        for i in 0..contact.points.len() {
            assert!((contact.separation_at(i, &ta, &tb) + 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_separated_squares() {
        let a = unit_square();
        let b = at(unit_square(), 1.5, 0.0);
        assert!(collide_leaves(&a, &b).is_none());
    }

    #[test]
    fn test_rotated_square_corner_contact() {
        let a = Collider::rectangle(2.0, 2.0);
        let mut b = Collider::rectangle(2.0, 2.0);
        // Diamond whose lower corner dips 0.1 into the top face of `a`.
        let lift = 1.0 + std::f32::consts::SQRT_2 - 0.1;
        b.update(&Affine2::from_angle_translation(
            std::f32::consts::FRAC_PI_4,
            Vec2::new(0.0, lift),
        ));
        let contact = collide_leaves(&a, &b).unwrap();
        assert!((contact.normal - Vec2::Y).length() < 1e-4);
        assert!((contact.mtv.length() - 0.1).abs() < 1e-3);
        assert_eq!(contact.points.len(), 1);
    }

    #[test]
    fn test_circle_polygon_normal_points_to_polygon() {
        let circle = at(Collider::circle(1.0), -1.5, 0.0);
        let square = Collider::rectangle(2.0, 2.0);

        let contact = collide_leaves(&circle, &square).unwrap();
        assert!((contact.normal - Vec2::X).length() < 1e-5);
        assert!((contact.mtv.length() - 0.5).abs() < 1e-5);
        assert_eq!(contact.info.reference, Participant::B);

        let ta = *circle.transform();
        let tb = *square.transform();
        assert!((contact.separation_at(0, &ta, &tb) + 0.5).abs() < 1e-4);

        let mirrored = collide_leaves(&square, &circle).unwrap();
        assert!((mirrored.normal + Vec2::X).length() < 1e-5);
        assert_eq!(mirrored.collider_a.id, square.id());
        assert!((mirrored.separation_at(0, &tb, &ta) + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_circle_edge_regions() {
        let edge = Collider::edge(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0));

        let middle = at(Collider::circle(1.0), 0.0, 0.5);
        let contact = collide_leaves(&middle, &edge).unwrap();
        assert!((contact.normal - Vec2::new(0.0, -1.0)).length() < 1e-5);
        assert!((contact.mtv - Vec2::new(0.0, -0.5)).length() < 1e-5);
        assert!((contact.points[0] - Vec2::ZERO).length() < 1e-5);

        let cap = at(Collider::circle(1.0), -5.5, 0.3);
        let contact = collide_leaves(&cap, &edge).unwrap();
        assert_eq!(contact.points, vec![Vec2::new(-5.0, 0.0)]);
        assert!(contact.normal.x > 0.0 && contact.normal.y < 0.0);

        let end_cap = at(Collider::circle(1.0), 5.5, -0.3);
        let contact = collide_leaves(&end_cap, &edge).unwrap();
        assert_eq!(contact.points, vec![Vec2::new(5.0, 0.0)]);

        let clear = at(Collider::circle(1.0), 0.0, 2.0);
        assert!(collide_leaves(&clear, &edge).is_none());

        let flipped = collide_leaves(&edge, &middle).unwrap();
        assert!((flipped.normal - Vec2::Y).length() < 1e-5);
    }

    #[test]
    fn test_polygon_resting_on_edge() {
        let ground = Collider::edge(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0));
        let square = at(Collider::rectangle(1.0, 1.0), 0.0, 0.4);

        let contact = collide_leaves(&square, &ground).unwrap();
        assert!((contact.mtv - Vec2::new(0.0, -0.1)).length() < 1e-4);
        assert_eq!(contact.points.len(), 2);
        assert_eq!(contact.collider_b.id, ground.id());
        assert_eq!(contact.center_b, Vec2::ZERO);
        assert_eq!(contact.bounds_b, ground.bounds());

        let flipped = collide_leaves(&ground, &square).unwrap();
        assert!((flipped.mtv - Vec2::new(0.0, 0.1)).length() < 1e-4);
    }

    #[test]
    fn test_edges_never_collide() {
        let a = Collider::edge(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let b = Collider::edge(Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));
        assert!(collide(&a, &b).is_empty());
    }

    #[test]
    fn test_composite_is_flattened() {
        let capsule = Collider::capsule(4.0, 2.0);
        let ball = at(Collider::circle(1.0), 2.5, 0.0);

        let contacts = collide(&capsule, &ball);
        assert_eq!(contacts.len(), 1);
        let contact = &contacts[0];
        assert_eq!(contact.collider_a.composite, Some(capsule.id()));
        assert_eq!(contact.logical_id, PairId::new(capsule.id(), ball.id()));
        assert_ne!(contact.id, contact.logical_id);
        assert!((contact.mtv.length() - 0.5).abs() < 1e-5);

        assert_eq!(collide(&ball, &capsule).len(), 1);
    }
}
