//! Contact tests between circles and wall segments.

use glam::Vec2;

use crate::field::Segment;

/// A penetrating contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Unit vector along which the first body must move to separate.
    pub normal: Vec2,
    /// Overlap depth.
    pub depth: f32,
}

/// Contact between a circle and a segment, if they overlap.
#[must_use]
pub fn circle_segment(center: Vec2, radius: f32, segment: &Segment) -> Option<Contact> {
    let closest = segment.closest_point(center);
    let offset = center - closest;
    let distance = offset.length();
    if distance >= radius {
        return None;
    }
    let normal = if distance > f32::EPSILON {
        offset / distance
    } else {
        // Centre exactly on the wall: push along the wall's normal.
        (segment.b - segment.a).perp().normalize_or_zero()
    };
    Some(Contact {
        normal,
        depth: radius - distance,
    })
}

/// Contact between two circles, if they overlap. The normal points from `b`
/// towards `a`.
#[must_use]
pub fn circle_circle(a: Vec2, ra: f32, b: Vec2, rb: f32) -> Option<Contact> {
    let offset = a - b;
    let distance = offset.length();
    let reach = ra + rb;
    if distance >= reach {
        return None;
    }
    let normal = if distance > f32::EPSILON {
        offset / distance
    } else {
        Vec2::Y
    };
    Some(Contact {
        normal,
        depth: reach - distance,
    })
}

/// Reflects the normal component of `velocity` with restitution `e` if it
/// points into the surface.
#[must_use]
pub fn reflect(velocity: Vec2, normal: Vec2, e: f32) -> Vec2 {
    let vn = velocity.dot(normal);
    if vn < 0.0 {
        velocity - (1.0 + e) * vn * normal
    } else {
        velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_touching_wall() {
        let wall = Segment::new(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0));
        let contact = circle_segment(Vec2::new(0.0, 1.0), 2.0, &wall).unwrap();
        assert!((contact.normal - Vec2::Y).length() < 1e-6);
        assert!((contact.depth - 1.0).abs() < 1e-6);
        assert!(circle_segment(Vec2::new(0.0, 3.0), 2.0, &wall).is_none());
    }

    #[test]
    fn overlapping_circles() {
        let contact = circle_circle(Vec2::new(3.0, 0.0), 2.0, Vec2::ZERO, 2.0).unwrap();
        assert!((contact.normal - Vec2::X).length() < 1e-6);
        assert!((contact.depth - 1.0).abs() < 1e-6);
        assert!(circle_circle(Vec2::new(5.0, 0.0), 2.0, Vec2::ZERO, 2.0).is_none());
    }

    #[test]
    fn reflection_only_when_approaching() {
        let v = reflect(Vec2::new(1.0, -2.0), Vec2::Y, 0.5);
        assert!((v - Vec2::new(1.0, 1.0)).length() < 1e-6);
        let away = Vec2::new(1.0, 2.0);
        assert_eq!(reflect(away, Vec2::Y, 0.5), away);
    }
}
