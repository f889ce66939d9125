//! Egocentric sensor synthesis.
//!
//! [`ObservationSystem::observe`] maps ground truth (one robot and the ball)
//! to the [`WorldState`] that robot's strategy sees. Observation is a pure
//! read: calling it any number of times changes nothing. The only state the
//! system keeps is the previous-tick line-sensor positions, held in a small
//! arena keyed by robot id and committed with [`ObservationSystem::record`]
//! once every robot has been observed for the tick.
//!
//! # Line sensors
//!
//! A line sensor fires when its current position is within tolerance of a
//! field line, or when the path from its previous position to the current one
//! crosses a line. The path test catches a sensor that jumps clean over a
//! line between two ticks.

use std::collections::BTreeMap;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::SensorConfig;
use crate::entity::{BallState, RobotId, RobotState, Team};
use crate::field::{self, Segment, BALL_RADIUS, GOAL_HALF_WIDTH, ROBOT_RADIUS};

// ============================================================================
// Contact sets
// ============================================================================

bitflags! {
    /// Line sensors currently seeing a line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct LineSensors: u8 {
        /// Front sensor.
        const FRONT = 1 << 0;
        /// Left sensor.
        const LEFT = 1 << 1;
        /// Right sensor.
        const RIGHT = 1 << 2;
        /// Rear sensor.
        const REAR = 1 << 3;
    }
}

bitflags! {
    /// Bumpers currently pressed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Bumpers: u8 {
        /// Front bumper.
        const FRONT = 1 << 0;
        /// Left bumper.
        const LEFT = 1 << 1;
        /// Right bumper.
        const RIGHT = 1 << 2;
    }
}

/// Line sensors in arena order, with their direction relative to the heading
/// expressed as a rotation in radians.
const LINE_SENSOR_LAYOUT: [(LineSensors, f32); 4] = [
    (LineSensors::FRONT, 0.0),
    (LineSensors::LEFT, std::f32::consts::FRAC_PI_2),
    (LineSensors::RIGHT, -std::f32::consts::FRAC_PI_2),
    (LineSensors::REAR, std::f32::consts::PI),
];

const BUMPER_LAYOUT: [(Bumpers, f32); 3] = [
    (Bumpers::FRONT, 0.0),
    (Bumpers::LEFT, std::f32::consts::FRAC_PI_2),
    (Bumpers::RIGHT, -std::f32::consts::FRAC_PI_2),
];

// ============================================================================
// Observation types
// ============================================================================

/// One sensed target (the ball or a goal) as seen from a robot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Within sensing range.
    pub visible: bool,
    /// Bearing in degrees relative to the heading, counter-clockwise
    /// positive, in (-180, 180].
    pub angle_deg: f32,
    /// Centre-to-centre distance in cm.
    pub distance: f32,
    /// 1 at zero distance falling linearly to 0 at max range.
    pub confidence: f32,
    /// Synthetic bounding box centre x in pixels.
    pub x: f32,
    /// Synthetic bounding box centre y in pixels.
    pub y: f32,
    /// Synthetic bounding box width in pixels.
    pub width: f32,
    /// Synthetic bounding box height in pixels.
    pub height: f32,
}

/// Everything a strategy sees for one tick.
///
/// Built fresh for each robot every tick and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldState {
    /// Simulated match time in ms.
    pub time_ms: f64,
    /// Length of this tick in ms.
    pub dt_ms: f32,
    /// Field heading in degrees, (-180, 180].
    pub heading_deg: f32,
    /// Yaw rate in deg/s. Not measured; always 0.
    pub yaw_rate_dps: f32,
    /// Speed estimate in cm/s.
    pub speed: f32,
    /// The ball.
    pub ball: Observation,
    /// The blue goal.
    pub goal_blue: Observation,
    /// The yellow goal.
    pub goal_yellow: Observation,
    /// Front bumper pressed.
    pub bumper_front: bool,
    /// Left bumper pressed.
    pub bumper_left: bool,
    /// Right bumper pressed.
    pub bumper_right: bool,
    /// Front line sensor.
    pub line_front: bool,
    /// Left line sensor.
    pub line_left: bool,
    /// Right line sensor.
    pub line_right: bool,
    /// Rear line sensor.
    pub line_rear: bool,
    /// Robot appears stuck.
    pub stuck: bool,
    /// Confidence of the stuck flag.
    pub stuck_confidence: f32,
    /// This robot plays for blue.
    pub we_are_blue: bool,
    /// This robot's team has the kickoff and the ball is still untouched.
    pub kickoff_us: bool,
    /// Debug state label set by the strategy on the previous tick.
    pub state: Option<String>,
    /// Debug target label set by the strategy on the previous tick.
    pub target: Option<String>,
}

impl WorldState {
    /// Observation of the goal `team` defends.
    #[must_use]
    pub fn goal(&self, team: Team) -> &Observation {
        match team {
            Team::Blue => &self.goal_blue,
            Team::Yellow => &self.goal_yellow,
        }
    }

    /// Line sensors as a flag set.
    #[must_use]
    pub fn line_sensors(&self) -> LineSensors {
        let mut set = LineSensors::empty();
        set.set(LineSensors::FRONT, self.line_front);
        set.set(LineSensors::LEFT, self.line_left);
        set.set(LineSensors::RIGHT, self.line_right);
        set.set(LineSensors::REAR, self.line_rear);
        set
    }

    /// Bumpers as a flag set.
    #[must_use]
    pub fn bumpers(&self) -> Bumpers {
        let mut set = Bumpers::empty();
        set.set(Bumpers::FRONT, self.bumper_front);
        set.set(Bumpers::LEFT, self.bumper_left);
        set.set(Bumpers::RIGHT, self.bumper_right);
        set
    }
}

/// Per-tick inputs that do not come from the physics bodies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationContext {
    /// Simulated match time in ms.
    pub time_ms: f64,
    /// Tick length in ms.
    pub dt_ms: f32,
    /// Whether this robot's team has an untouched kickoff.
    pub kickoff_us: bool,
    /// Labels the strategy set on its previous call.
    pub state: Option<String>,
    /// See `state`.
    pub target: Option<String>,
}

// ============================================================================
// ObservationSystem
// ============================================================================

/// Sensor synthesis plus the previous-position arena for path-based line
/// detection.
#[derive(Debug, Clone)]
pub struct ObservationSystem {
    config: SensorConfig,
    lines: Vec<Segment>,
    previous: BTreeMap<RobotId, [Vec2; 4]>,
}

impl ObservationSystem {
    /// Creates a system with an empty arena.
    #[must_use]
    pub fn new(config: SensorConfig) -> Self {
        Self {
            config,
            lines: field::field_lines(),
            previous: BTreeMap::new(),
        }
    }

    /// Sensor configuration in force.
    #[must_use]
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Starts tracking a robot, seeding its previous sensor positions from
    /// its current pose so the first tick has no phantom path.
    pub fn register(&mut self, robot: &RobotState) {
        let positions = self.line_sensor_positions(robot);
        self.previous.insert(robot.id, positions);
    }

    /// Stops tracking a robot.
    pub fn forget(&mut self, id: RobotId) {
        self.previous.remove(&id);
    }

    /// Drops every tracked robot.
    pub fn clear(&mut self) {
        self.previous.clear();
    }

    /// Whether a robot is being tracked.
    #[must_use]
    pub fn is_registered(&self, id: RobotId) -> bool {
        self.previous.contains_key(&id)
    }

    /// Commits this tick's sensor positions as the previous positions for
    /// the next tick. Call after every robot has been observed.
    pub fn record(&mut self, robot: &RobotState) {
        if let Some(slot) = self.previous.get_mut(&robot.id) {
            *slot = line_sensor_positions(robot, self.config.line_sensor_offset);
        }
    }

    /// Builds the world state for `robot`.
    #[must_use]
    pub fn observe(
        &self,
        robot: &RobotState,
        ball: &BallState,
        context: ObservationContext,
    ) -> WorldState {
        let heading_deg = normalize_bearing(robot.heading.to_degrees());
        let lines = self.line_contacts(robot);
        let bumpers = self.bumper_contacts(robot);
        let speed = robot.velocity.length();
        let stuck = context.dt_ms >= self.config.stuck_min_dt_ms && speed < self.config.stuck_speed;

        WorldState {
            time_ms: context.time_ms,
            dt_ms: context.dt_ms,
            heading_deg,
            yaw_rate_dps: 0.0,
            speed,
            ball: self.observe_target(robot, ball.position, 2.0 * BALL_RADIUS, 2.0 * BALL_RADIUS),
            goal_blue: self.observe_target(
                robot,
                field::goal_center(Team::Blue),
                2.0 * GOAL_HALF_WIDTH,
                field::GOAL_DEPTH,
            ),
            goal_yellow: self.observe_target(
                robot,
                field::goal_center(Team::Yellow),
                2.0 * GOAL_HALF_WIDTH,
                field::GOAL_DEPTH,
            ),
            bumper_front: bumpers.contains(Bumpers::FRONT),
            bumper_left: bumpers.contains(Bumpers::LEFT),
            bumper_right: bumpers.contains(Bumpers::RIGHT),
            line_front: lines.contains(LineSensors::FRONT),
            line_left: lines.contains(LineSensors::LEFT),
            line_right: lines.contains(LineSensors::RIGHT),
            line_rear: lines.contains(LineSensors::REAR),
            stuck,
            stuck_confidence: if stuck { self.config.stuck_confidence } else { 0.0 },
            we_are_blue: robot.team() == Team::Blue,
            kickoff_us: context.kickoff_us,
            state: context.state,
            target: context.target,
        }
    }

    /// Line sensors that see a line, by point tolerance or path crossing.
    #[must_use]
    pub fn line_contacts(&self, robot: &RobotState) -> LineSensors {
        let current = self.line_sensor_positions(robot);
        let previous = self.previous.get(&robot.id);
        let mut hits = LineSensors::empty();
        for (i, (flag, _)) in LINE_SENSOR_LAYOUT.iter().enumerate() {
            let p = current[i];
            let near = self
                .lines
                .iter()
                .any(|line| line.distance_to(p) <= self.config.line_tolerance);
            let crossed = previous.is_some_and(|prev| {
                let path = Segment::new(prev[i], p);
                self.lines.iter().any(|line| line.intersects(&path))
            });
            if near || crossed {
                hits |= *flag;
            }
        }
        hits
    }

    /// Bumpers whose ray leaves the walled area.
    #[must_use]
    pub fn bumper_contacts(&self, robot: &RobotState) -> Bumpers {
        let reach = ROBOT_RADIUS + self.config.bumper_reach;
        let mut hits = Bumpers::empty();
        for (flag, offset) in BUMPER_LAYOUT {
            let tip = robot.position + Vec2::from_angle(robot.heading + offset) * reach;
            if !field::inside_walls(tip, 0.0) {
                hits |= flag;
            }
        }
        hits
    }

    fn line_sensor_positions(&self, robot: &RobotState) -> [Vec2; 4] {
        line_sensor_positions(robot, self.config.line_sensor_offset)
    }

    fn observe_target(&self, robot: &RobotState, target: Vec2, width_cm: f32, height_cm: f32) -> Observation {
        let offset = target - robot.position;
        let distance = offset.length();
        let bearing = if distance > f32::EPSILON {
            normalize_bearing(offset.y.atan2(offset.x).to_degrees() - robot.heading.to_degrees())
        } else {
            0.0
        };
        let max_range = self.config.max_range;
        if distance > max_range {
            return Observation {
                visible: false,
                angle_deg: bearing,
                distance,
                ..Observation::default()
            };
        }

        let confidence = (1.0 - distance / max_range).clamp(0.0, 1.0);
        let image_w = self.config.image_width;
        let image_h = self.config.image_height;
        // Pinhole with a 180° horizontal field: focal length of half the width.
        let focal = image_w / 2.0;
        let range = distance.max(1.0);
        Observation {
            visible: true,
            angle_deg: bearing,
            distance,
            confidence,
            x: (image_w / 2.0) * (1.0 - bearing / 180.0),
            y: (image_h / 2.0) * (1.0 + confidence),
            width: (width_cm * focal / range).min(image_w),
            height: (height_cm * focal / range).min(image_h),
        }
    }
}

fn line_sensor_positions(robot: &RobotState, offset: f32) -> [Vec2; 4] {
    LINE_SENSOR_LAYOUT.map(|(_, angle)| robot.position + Vec2::from_angle(robot.heading + angle) * offset)
}

/// Normalises an angle in degrees to (-180, 180]. Non-finite input gives 0.
#[must_use]
pub fn normalize_bearing(degrees: f32) -> f32 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let mut a = degrees % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Role;
    use std::f32::consts::FRAC_PI_2;

    fn system() -> ObservationSystem {
        ObservationSystem::new(SensorConfig::default())
    }

    fn robot_at(position: Vec2, heading: f32) -> RobotState {
        RobotState::new(RobotId::new(Team::Blue, Role::Attacker), position, heading)
    }

    fn context() -> ObservationContext {
        ObservationContext {
            time_ms: 0.0,
            dt_ms: 16.0,
            ..ObservationContext::default()
        }
    }

    mod target_tests {
        use super::*;

        #[test]
        fn ball_straight_ahead_has_zero_bearing() {
            let robot = robot_at(Vec2::new(0.0, -30.0), FRAC_PI_2);
            let ws = system().observe(&robot, &BallState::at_rest(Vec2::ZERO), context());
            assert!(ws.ball.visible);
            assert!(ws.ball.angle_deg.abs() < 1e-3);
            assert!((ws.ball.distance - 30.0).abs() < 1e-3);
            assert!((ws.heading_deg - 90.0).abs() < 1e-3);
        }

        #[test]
        fn ball_to_the_left_has_positive_bearing() {
            let robot = robot_at(Vec2::ZERO, FRAC_PI_2);
            let ws = system().observe(&robot, &BallState::at_rest(Vec2::new(-20.0, 0.0)), context());
            assert!((ws.ball.angle_deg - 90.0).abs() < 1e-3);
        }

        #[test]
        fn ball_behind_is_180() {
            let robot = robot_at(Vec2::ZERO, 0.0);
            let ws = system().observe(&robot, &BallState::at_rest(Vec2::new(-20.0, 0.0)), context());
            assert!((ws.ball.angle_deg - 180.0).abs() < 1e-3);
        }

        #[test]
        fn confidence_falls_with_distance() {
            let sys = system();
            let robot = robot_at(Vec2::ZERO, 0.0);
            let near = sys.observe(&robot, &BallState::at_rest(Vec2::new(10.0, 0.0)), context());
            let far = sys.observe(&robot, &BallState::at_rest(Vec2::new(60.0, 80.0)), context());
            assert!(near.ball.confidence > far.ball.confidence);
            assert!(far.ball.confidence > 0.0 && near.ball.confidence <= 1.0);
            assert!(near.ball.width > far.ball.width);
        }

        #[test]
        fn out_of_range_is_invisible_with_zero_box() {
            let config = SensorConfig {
                max_range: 50.0,
                ..SensorConfig::default()
            };
            let sys = ObservationSystem::new(config);
            let robot = robot_at(Vec2::ZERO, 0.0);
            let ws = sys.observe(&robot, &BallState::at_rest(Vec2::new(0.0, 80.0)), context());
            assert!(!ws.ball.visible);
            assert_eq!(ws.ball.confidence, 0.0);
            assert_eq!(ws.ball.width, 0.0);
        }

        #[test]
        fn goals_are_visible_everywhere_on_the_field() {
            let sys = system();
            let robot = robot_at(Vec2::new(-60.0, -90.0), 0.0);
            let ws = sys.observe(&robot, &BallState::default(), context());
            assert!(ws.goal_blue.visible && ws.goal_yellow.visible);
        }

        #[test]
        fn normalize_bearing_range() {
            assert_eq!(normalize_bearing(-180.0), 180.0);
            assert_eq!(normalize_bearing(540.0), 180.0);
            assert!((normalize_bearing(-190.0) - 170.0).abs() < 1e-4);
            assert_eq!(normalize_bearing(f32::NAN), 0.0);
        }
    }

    mod line_tests {
        use super::*;

        #[test]
        fn centre_of_field_sees_no_lines() {
            let mut sys = system();
            let robot = robot_at(Vec2::new(0.0, 10.0), 0.0);
            sys.register(&robot);
            assert_eq!(sys.line_contacts(&robot), LineSensors::empty());
        }

        #[test]
        fn sensor_on_line_fires() {
            let sys = system();
            // Front sensor 7 cm ahead lands on x = 61.
            let robot = robot_at(Vec2::new(54.0, 0.0), 0.0);
            assert!(sys.line_contacts(&robot).contains(LineSensors::FRONT));
        }

        #[test]
        fn fast_crossing_is_detected_by_path() {
            let mut sys = system();
            let before = robot_at(Vec2::new(45.0, 0.0), 0.0);
            sys.register(&before);
            // Front sensor jumps from x = 52 to x = 67 in one tick, neither end
            // within tolerance of the x = 61 line.
            let after = robot_at(Vec2::new(60.0, 0.0), 0.0);
            let point_only = system();
            assert!(!point_only.line_contacts(&after).contains(LineSensors::FRONT));
            assert!(sys.line_contacts(&after).contains(LineSensors::FRONT));
        }

        #[test]
        fn record_commits_positions() {
            let mut sys = system();
            let before = robot_at(Vec2::new(45.0, 0.0), 0.0);
            sys.register(&before);
            let after = robot_at(Vec2::new(60.0, 0.0), 0.0);
            sys.record(&after);
            assert!(!sys.line_contacts(&after).contains(LineSensors::FRONT));
        }

        #[test]
        fn arena_lifecycle() {
            let mut sys = system();
            let robot = robot_at(Vec2::ZERO, 0.0);
            sys.record(&robot);
            assert!(!sys.is_registered(robot.id));
            sys.register(&robot);
            assert!(sys.is_registered(robot.id));
            sys.forget(robot.id);
            assert!(!sys.is_registered(robot.id));
            sys.register(&robot);
            sys.clear();
            assert!(!sys.is_registered(robot.id));
        }
    }

    mod body_sensor_tests {
        use super::*;

        #[test]
        fn bumper_against_wall() {
            let sys = system();
            let robot = robot_at(Vec2::new(63.5, 0.0), 0.0);
            assert_eq!(sys.bumper_contacts(&robot), Bumpers::FRONT);
            let robot = robot_at(Vec2::new(63.5, 0.0), FRAC_PI_2);
            assert_eq!(sys.bumper_contacts(&robot), Bumpers::RIGHT);
        }

        #[test]
        fn stationary_robot_is_stuck() {
            let sys = system();
            let robot = robot_at(Vec2::ZERO, 0.0);
            let ws = sys.observe(&robot, &BallState::default(), context());
            assert!(ws.stuck);
            assert!((ws.stuck_confidence - 0.6).abs() < 1e-6);
        }

        #[test]
        fn moving_robot_is_not_stuck() {
            let sys = system();
            let mut robot = robot_at(Vec2::ZERO, 0.0);
            robot.velocity = Vec2::new(50.0, 0.0);
            let ws = sys.observe(&robot, &BallState::default(), context());
            assert!(!ws.stuck);
            assert_eq!(ws.stuck_confidence, 0.0);
            assert!((ws.speed - 50.0).abs() < 1e-4);
        }

        #[test]
        fn tiny_dt_never_reports_stuck() {
            let sys = system();
            let robot = robot_at(Vec2::ZERO, 0.0);
            let ctx = ObservationContext {
                dt_ms: 1.0,
                ..ObservationContext::default()
            };
            assert!(!sys.observe(&robot, &BallState::default(), ctx).stuck);
        }

        #[test]
        fn flags_and_labels_pass_through() {
            let sys = system();
            let robot = robot_at(Vec2::ZERO, 0.0);
            let ctx = ObservationContext {
                kickoff_us: true,
                state: Some("chase".into()),
                ..context()
            };
            let ws = sys.observe(&robot, &BallState::default(), ctx);
            assert!(ws.we_are_blue && ws.kickoff_us);
            assert_eq!(ws.state.as_deref(), Some("chase"));
            assert_eq!(ws.yaw_rate_dps, 0.0);
        }
    }
}
