//! Field geometry and 2D geometry helpers.
//!
//! Coordinates are centimetres with the origin at the centre spot. `x` runs
//! across the field, `y` along it. The blue goal sits at negative `y` and the
//! yellow goal at positive `y`.
//!
//! ```text
//!            yellow goal (+y)
//!        ┌──────┬────┬──────┐  y = +91.5
//!        │      └────┘      │  goal area 80 × 25
//!        │    •        •    │  neutral spots (±31, +45.5)
//!        │        ◯         │  centre circle r = 30
//!        │    •        •    │  neutral spots (±31, -45.5)
//!        │      ┌────┐      │
//!        └──────┴────┴──────┘  y = -91.5
//!             blue goal (-y)
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::entity::Team;

// ============================================================================
// Dimensions
// ============================================================================

/// Half the distance between the side lines.
pub const FIELD_HALF_WIDTH: f32 = 61.0;
/// Half the distance between the goal lines.
pub const FIELD_HALF_LENGTH: f32 = 91.5;
/// Half the distance between the outer side walls.
pub const OUTER_HALF_WIDTH: f32 = 73.0;
/// Half the distance between the outer end walls.
pub const OUTER_HALF_LENGTH: f32 = 103.5;
/// Half the goal mouth width.
pub const GOAL_HALF_WIDTH: f32 = 30.0;
/// Depth of the goal behind the goal line.
pub const GOAL_DEPTH: f32 = 7.4;
/// Half the width of the goal (penalty) area.
pub const GOAL_AREA_HALF_WIDTH: f32 = 40.0;
/// Depth of the goal area in front of the goal line.
pub const GOAL_AREA_DEPTH: f32 = 25.0;
/// Centre circle radius.
pub const CENTER_CIRCLE_RADIUS: f32 = 30.0;
/// Ball radius.
pub const BALL_RADIUS: f32 = 2.1;
/// Robot body radius.
pub const ROBOT_RADIUS: f32 = 9.0;

/// Diagonal of the walled area. Everything on the pitch is within this
/// distance of everything else.
#[must_use]
pub fn field_diagonal() -> f32 {
    Vec2::new(2.0 * OUTER_HALF_WIDTH, 2.0 * OUTER_HALF_LENGTH).length()
}

/// Centre of the goal mouth defended by `team`.
#[must_use]
pub fn goal_center(team: Team) -> Vec2 {
    match team {
        Team::Blue => Vec2::new(0.0, -FIELD_HALF_LENGTH),
        Team::Yellow => Vec2::new(0.0, FIELD_HALF_LENGTH),
    }
}

/// The team whose goal contains `p`, if any. A point is in a goal when it is
/// past the goal line, inside the mouth and not behind the back wall.
#[must_use]
pub fn goal_containing(p: Vec2) -> Option<Team> {
    if p.x.abs() >= GOAL_HALF_WIDTH {
        return None;
    }
    let depth = p.y.abs() - FIELD_HALF_LENGTH;
    if depth <= 0.0 || depth > GOAL_DEPTH {
        return None;
    }
    Some(if p.y < 0.0 { Team::Blue } else { Team::Yellow })
}

/// True if `p` lies inside the goal area defended by `team`.
#[must_use]
pub fn in_goal_area(p: Vec2, team: Team) -> bool {
    let depth_into_field = match team {
        Team::Blue => p.y + FIELD_HALF_LENGTH,
        Team::Yellow => FIELD_HALF_LENGTH - p.y,
    };
    p.x.abs() < GOAL_AREA_HALF_WIDTH && (0.0..GOAL_AREA_DEPTH).contains(&depth_into_field)
}

/// True if `p` is within the field lines, shrunk by `margin`.
#[must_use]
pub fn inside_lines(p: Vec2, margin: f32) -> bool {
    p.x.abs() <= FIELD_HALF_WIDTH - margin && p.y.abs() <= FIELD_HALF_LENGTH - margin
}

/// True if `p` is within the outer walls, shrunk by `margin`.
#[must_use]
pub fn inside_walls(p: Vec2, margin: f32) -> bool {
    p.x.abs() <= OUTER_HALF_WIDTH - margin && p.y.abs() <= OUTER_HALF_LENGTH - margin
}

/// Clamps `p` into the walled area, shrunk by `margin`.
#[must_use]
pub fn clamp_to_walls(p: Vec2, margin: f32) -> Vec2 {
    Vec2::new(
        p.x.clamp(-(OUTER_HALF_WIDTH - margin), OUTER_HALF_WIDTH - margin),
        p.y.clamp(-(OUTER_HALF_LENGTH - margin), OUTER_HALF_LENGTH - margin),
    )
}

// ============================================================================
// Boundary sides
// ============================================================================

/// Which boundary a point has crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Negative x.
    Left,
    /// Positive x.
    Right,
    /// Negative y (the blue end).
    Top,
    /// Positive y (the yellow end).
    Bottom,
}

impl Side {
    /// True if `p` lies on this side's half of the field. Points exactly on
    /// the dividing axis belong to neither half.
    #[must_use]
    pub fn contains(self, p: Vec2) -> bool {
        match self {
            Self::Left => p.x < 0.0,
            Self::Right => p.x > 0.0,
            Self::Top => p.y < 0.0,
            Self::Bottom => p.y > 0.0,
        }
    }
}

/// The side whose line `p` is furthest beyond. `None` when `p` is on or
/// inside every line.
#[must_use]
pub fn boundary_side(p: Vec2) -> Option<Side> {
    let over_x = p.x.abs() - FIELD_HALF_WIDTH;
    let over_y = p.y.abs() - FIELD_HALF_LENGTH;
    if over_x <= 0.0 && over_y <= 0.0 {
        return None;
    }
    Some(if over_x >= over_y {
        if p.x < 0.0 {
            Side::Left
        } else {
            Side::Right
        }
    } else if p.y < 0.0 {
        Side::Top
    } else {
        Side::Bottom
    })
}

// ============================================================================
// Neutral spots
// ============================================================================

/// A named ball-placement location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NeutralSpot {
    /// Stable name.
    pub name: &'static str,
    /// Location in field coordinates.
    pub position: Vec2,
}

/// The neutral spot table, in its fixed order.
pub const NEUTRAL_SPOTS: [NeutralSpot; 5] = [
    NeutralSpot {
        name: "center",
        position: Vec2::new(0.0, 0.0),
    },
    NeutralSpot {
        name: "blue_left",
        position: Vec2::new(-31.0, -45.5),
    },
    NeutralSpot {
        name: "blue_right",
        position: Vec2::new(31.0, -45.5),
    },
    NeutralSpot {
        name: "yellow_left",
        position: Vec2::new(-31.0, 45.5),
    },
    NeutralSpot {
        name: "yellow_right",
        position: Vec2::new(31.0, 45.5),
    },
];

// ============================================================================
// Segments
// ============================================================================

/// A line segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start point.
    pub a: Vec2,
    /// End point.
    pub b: Vec2,
}

impl Segment {
    /// Creates a segment.
    #[must_use]
    pub const fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    /// Closest point on the segment to `p`.
    #[must_use]
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        let ab = self.b - self.a;
        let len_sq = ab.length_squared();
        if len_sq <= f32::EPSILON {
            return self.a;
        }
        let t = ((p - self.a).dot(ab) / len_sq).clamp(0.0, 1.0);
        self.a + ab * t
    }

    /// Distance from `p` to the segment.
    #[must_use]
    pub fn distance_to(&self, p: Vec2) -> f32 {
        p.distance(self.closest_point(p))
    }

    /// True if this segment and `other` share at least one point.
    #[must_use]
    pub fn intersects(&self, other: &Segment) -> bool {
        segments_intersect(self.a, self.b, other.a, other.b)
    }
}

/// True if segment `p1`–`p2` and segment `q1`–`q2` intersect, including
/// touching and collinear overlap.
#[must_use]
pub fn segments_intersect(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    fn orient(a: Vec2, b: Vec2, c: Vec2) -> f32 {
        (b - a).perp_dot(c - a)
    }
    fn on_segment(a: Vec2, b: Vec2, p: Vec2) -> bool {
        p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
    }

    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// White lines a line sensor can see: the field boundary and the three
/// painted edges of each goal area.
#[must_use]
pub fn field_lines() -> Vec<Segment> {
    let (w, l) = (FIELD_HALF_WIDTH, FIELD_HALF_LENGTH);
    let mut lines = vec![
        Segment::new(Vec2::new(-w, -l), Vec2::new(w, -l)),
        Segment::new(Vec2::new(w, -l), Vec2::new(w, l)),
        Segment::new(Vec2::new(w, l), Vec2::new(-w, l)),
        Segment::new(Vec2::new(-w, l), Vec2::new(-w, -l)),
    ];
    let (gw, front) = (GOAL_AREA_HALF_WIDTH, l - GOAL_AREA_DEPTH);
    for sign in [-1.0, 1.0] {
        lines.push(Segment::new(
            Vec2::new(-gw, sign * l),
            Vec2::new(-gw, sign * front),
        ));
        lines.push(Segment::new(
            Vec2::new(-gw, sign * front),
            Vec2::new(gw, sign * front),
        ));
        lines.push(Segment::new(
            Vec2::new(gw, sign * front),
            Vec2::new(gw, sign * l),
        ));
    }
    lines
}

/// Static walls: outer walls with goal mouths, goal side walls and goal
/// back walls.
#[must_use]
pub fn walls() -> Vec<Segment> {
    let (ow, ol) = (OUTER_HALF_WIDTH, OUTER_HALF_LENGTH);
    let (gw, back) = (GOAL_HALF_WIDTH, FIELD_HALF_LENGTH + GOAL_DEPTH);
    let mut walls = vec![
        Segment::new(Vec2::new(-ow, -ol), Vec2::new(-ow, ol)),
        Segment::new(Vec2::new(ow, -ol), Vec2::new(ow, ol)),
    ];
    for sign in [-1.0, 1.0] {
        let (gl, y_outer) = (sign * FIELD_HALF_LENGTH, sign * ol);
        // End wall either side of the goal.
        walls.push(Segment::new(Vec2::new(-ow, y_outer), Vec2::new(-gw, y_outer)));
        walls.push(Segment::new(Vec2::new(gw, y_outer), Vec2::new(ow, y_outer)));
        // Goal side walls run from the goal line to the end wall.
        walls.push(Segment::new(Vec2::new(-gw, gl), Vec2::new(-gw, y_outer)));
        walls.push(Segment::new(Vec2::new(gw, gl), Vec2::new(gw, y_outer)));
        walls.push(Segment::new(
            Vec2::new(-gw, sign * back),
            Vec2::new(gw, sign * back),
        ));
    }
    walls
}
