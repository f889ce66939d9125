//! Physics engine: kinematic robots, a rolling ball and static walls.
//!
//! Robots are driven kinematically. [`PhysicsWorld::apply_action`] turns a
//! motor command into a velocity, and [`PhysicsWorld::step`] integrates
//! `position += velocity * dt` before pushing bodies out of walls and each
//! other. The ball is a dynamic body: it rolls with damping, bounces off walls
//! and robots with restitution, and is integrated in substeps short enough
//! that it never moves further than its own radius at once.
//!
//! The engine does not interpret rules. It reports what happened through
//! [`PhysicsEvent`]s, queued until drained with [`PhysicsWorld::take_events`]:
//!
//! - a goal event when the ball fully enters a goal (once per entry)
//! - a collision event when two robots come into contact
//! - a touch event when a robot starts touching the ball, and on every kick
//!
//! # Numerical safety
//!
//! After every step the ball speed is capped, positions are clamped inside
//! the walls, and any NaN is replaced with a safe value. No consumer ever
//! reads a non-finite position.

pub mod collision;
pub mod drivetrain;

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::{PhysicsConfig, RulesConfig};
use crate::entity::{BallState, RobotId, RobotState, Team};
use crate::error::{KernelError, KernelResult};
use crate::field::{self, Segment, Side, BALL_RADIUS, ROBOT_RADIUS};
use crate::strategy::Action;

use collision::{circle_circle, circle_segment, reflect};
use drivetrain::{inverse_kinematics, BodyCommand, MotionPattern};

/// Upper bound on ball substeps within one physics step.
const MAX_BALL_SUBSTEPS: u32 = 16;

/// Ball speed, cm/s, below which damping snaps the ball to rest.
const BALL_REST_SPEED: f32 = 0.5;

// ============================================================================
// Events
// ============================================================================

/// Something that happened during a physics step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhysicsEvent {
    /// The ball entered `goal`; `scoring_team` is the other team.
    GoalScored {
        /// Team credited with the goal.
        scoring_team: Team,
        /// Team whose goal the ball entered.
        goal: Team,
    },
    /// Two robots started touching.
    Collision {
        /// Lower id of the pair.
        a: RobotId,
        /// Higher id of the pair.
        b: RobotId,
    },
    /// A robot started touching the ball.
    BallTouched {
        /// The robot.
        robot: RobotId,
    },
    /// A robot kicked the ball.
    Kick {
        /// The kicker.
        robot: RobotId,
    },
}

// ============================================================================
// Bodies
// ============================================================================

#[derive(Debug, Clone)]
struct RobotBody {
    state: RobotState,
    command: BodyCommand,
    enabled: bool,
}

// ============================================================================
// PhysicsWorld
// ============================================================================

/// The physics engine.
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    config: PhysicsConfig,
    oob_margin: f32,
    oob_debounce_ms: f32,
    walls: Vec<Segment>,
    ball: BallState,
    robots: BTreeMap<RobotId, RobotBody>,
    events: Vec<PhysicsEvent>,
    robot_contacts: BTreeSet<(RobotId, RobotId)>,
    ball_contacts: BTreeSet<RobotId>,
    ball_in_goal: Option<Team>,
    oob_enabled: bool,
    since_oob_ms: f32,
    last_touch: Option<RobotId>,
}

impl PhysicsWorld {
    /// Creates an engine with static geometry and a ball at the centre spot.
    #[must_use]
    pub fn new(config: PhysicsConfig, rules: &RulesConfig) -> Self {
        let mut world = Self {
            config,
            oob_margin: rules.out_of_bounds_margin,
            oob_debounce_ms: rules.out_of_bounds_debounce_ms,
            walls: Vec::new(),
            ball: BallState::default(),
            robots: BTreeMap::new(),
            events: Vec::new(),
            robot_contacts: BTreeSet::new(),
            ball_contacts: BTreeSet::new(),
            ball_in_goal: None,
            oob_enabled: false,
            since_oob_ms: 0.0,
            last_touch: None,
        };
        world.initialize();
        world
    }

    /// Clears every body and rebuilds the static geometry.
    pub fn initialize(&mut self) {
        self.walls = field::walls();
        self.ball = BallState::at_rest(Vec2::ZERO);
        self.robots.clear();
        self.events.clear();
        self.robot_contacts.clear();
        self.ball_contacts.clear();
        self.ball_in_goal = None;
        self.oob_enabled = false;
        self.since_oob_ms = 0.0;
        self.last_touch = None;
    }

    /// Physics tunables in force.
    #[must_use]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Robots
    // ------------------------------------------------------------------------

    /// Adds a robot.
    ///
    /// # Errors
    ///
    /// [`KernelError::DuplicateRobot`] if `id` already exists,
    /// [`KernelError::NonFinitePosition`] for a NaN or infinite position.
    pub fn create_robot(&mut self, id: RobotId, position: Vec2, heading: f32) -> KernelResult<()> {
        if self.robots.contains_key(&id) {
            return Err(KernelError::DuplicateRobot(id));
        }
        ensure_finite(position)?;
        self.robots.insert(
            id,
            RobotBody {
                state: RobotState::new(id, position, wrap_angle(heading)),
                command: BodyCommand::IDLE,
                enabled: true,
            },
        );
        Ok(())
    }

    /// Removes a robot. Returns false if it did not exist.
    pub fn remove_robot(&mut self, id: RobotId) -> bool {
        self.robot_contacts.retain(|(a, b)| *a != id && *b != id);
        self.ball_contacts.remove(&id);
        self.robots.remove(&id).is_some()
    }

    /// Current state of one robot.
    #[must_use]
    pub fn robot(&self, id: RobotId) -> Option<&RobotState> {
        self.robots.get(&id).map(|body| &body.state)
    }

    /// All robots, in id order.
    pub fn robots(&self) -> impl Iterator<Item = &RobotState> {
        self.robots.values().map(|body| &body.state)
    }

    /// Ids of all robots, in order.
    #[must_use]
    pub fn robot_ids(&self) -> Vec<RobotId> {
        self.robots.keys().copied().collect()
    }

    /// Enables or disables a robot. Disabled robots stop immediately and do
    /// not move, collide or kick.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnknownRobot`].
    pub fn set_robot_enabled(&mut self, id: RobotId, enabled: bool) -> KernelResult<()> {
        let body = self.robots.get_mut(&id).ok_or(KernelError::UnknownRobot(id))?;
        body.enabled = enabled;
        if !enabled {
            body.command = BodyCommand::IDLE;
            body.state.velocity = Vec2::ZERO;
            body.state.angular_velocity = 0.0;
            self.robot_contacts.retain(|(a, b)| *a != id && *b != id);
            self.ball_contacts.remove(&id);
        }
        Ok(())
    }

    /// Whether a robot is enabled.
    #[must_use]
    pub fn is_robot_enabled(&self, id: RobotId) -> bool {
        self.robots.get(&id).is_some_and(|body| body.enabled)
    }

    /// Writes the penalty bookkeeping fields of a robot's state.
    pub(crate) fn set_penalty(&mut self, id: RobotId, penalized: bool, remaining_ms: f32) {
        if let Some(body) = self.robots.get_mut(&id) {
            body.state.penalized = penalized;
            body.state.penalty_remaining_ms = remaining_ms.max(0.0);
        }
    }

    /// Teleports a robot and stops it.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnknownRobot`] or [`KernelError::NonFinitePosition`].
    pub fn set_robot_pose(&mut self, id: RobotId, position: Vec2, heading: f32) -> KernelResult<()> {
        ensure_finite(position)?;
        let body = self.robots.get_mut(&id).ok_or(KernelError::UnknownRobot(id))?;
        body.state.position = field::clamp_to_walls(position, ROBOT_RADIUS);
        if heading.is_finite() {
            body.state.heading = wrap_angle(heading);
        }
        body.state.velocity = Vec2::ZERO;
        body.state.angular_velocity = 0.0;
        body.command = BodyCommand::IDLE;
        Ok(())
    }

    /// Converts an action into a body velocity for the next steps and, if
    /// the ball is in range and in front, kicks it.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnknownRobot`].
    pub fn apply_action(&mut self, id: RobotId, action: &Action) -> KernelResult<MotionPattern> {
        let body = self.robots.get_mut(&id).ok_or(KernelError::UnknownRobot(id))?;
        if !body.enabled {
            return Ok(MotionPattern::Idle);
        }

        let action = action.sanitize();
        let command = inverse_kinematics(action.motors());
        body.command = command;

        let heading = body.state.heading;
        let forward = Vec2::from_angle(heading);
        let right = Vec2::new(heading.sin(), -heading.cos());
        let velocity = (forward * command.forward + right * command.strafe) * self.config.max_robot_speed;
        body.state.velocity = velocity.clamp_length_max(self.config.max_robot_speed);
        body.state.angular_velocity = (command.rotation * self.config.max_robot_angular_speed)
            .clamp(-self.config.max_robot_angular_speed, self.config.max_robot_angular_speed);

        if action.kick {
            let position = body.state.position;
            self.try_kick(id, position, forward);
        }
        Ok(command.pattern)
    }

    fn try_kick(&mut self, id: RobotId, position: Vec2, forward: Vec2) {
        let to_ball = self.ball.position - position;
        let distance = to_ball.length();
        let reach = ROBOT_RADIUS + BALL_RADIUS + self.config.kick_range;
        if distance > reach || distance <= f32::EPSILON {
            return;
        }
        let angle = forward.angle_between(to_ball).abs().to_degrees();
        if angle > self.config.kick_cone_deg {
            return;
        }
        let speed = self.config.kick_speed.min(self.config.max_ball_speed);
        self.ball.velocity = forward * speed;
        self.last_touch = Some(id);
        self.events.push(PhysicsEvent::Kick { robot: id });
        debug!(robot = %id, speed, "kick");
    }

    // ------------------------------------------------------------------------
    // Ball
    // ------------------------------------------------------------------------

    /// Current ball state.
    #[must_use]
    pub fn ball(&self) -> BallState {
        self.ball
    }

    /// Teleports the ball and stops it.
    ///
    /// # Errors
    ///
    /// [`KernelError::NonFinitePosition`].
    pub fn set_ball_position(&mut self, position: Vec2) -> KernelResult<()> {
        ensure_finite(position)?;
        self.ball = BallState::at_rest(field::clamp_to_walls(position, BALL_RADIUS));
        self.ball_in_goal = field::goal_containing(self.ball.position);
        self.ball_contacts.clear();
        Ok(())
    }

    /// The robot that last touched or kicked the ball.
    #[must_use]
    pub fn last_touch(&self) -> Option<RobotId> {
        self.last_touch
    }

    /// Forgets the last touch (after a restart).
    pub fn clear_last_touch(&mut self) {
        self.last_touch = None;
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Drains queued events in the order they happened.
    pub fn take_events(&mut self) -> Vec<PhysicsEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------------

    /// Advances the world by `dt_ms`, clamped to the configured ceiling.
    /// Returns the step actually taken in ms.
    pub fn step(&mut self, dt_ms: f32) -> f32 {
        let dt_ms = if dt_ms.is_finite() {
            dt_ms.clamp(0.0, self.config.max_step_ms)
        } else {
            0.0
        };
        if dt_ms <= 0.0 {
            return 0.0;
        }
        let dt = dt_ms / 1000.0;
        self.since_oob_ms += dt_ms;

        let before: Vec<(RobotId, Vec2)> = self
            .robots
            .iter()
            .map(|(id, body)| (*id, body.state.position))
            .collect();

        self.integrate_robots(dt);
        self.resolve_robot_walls();
        self.resolve_robot_pairs();
        self.integrate_ball(dt);
        self.sanitize_bodies();

        // Report the velocity that actually happened, after collisions.
        for (id, previous) in before {
            if let Some(body) = self.robots.get_mut(&id) {
                if body.enabled {
                    body.state.velocity = (body.state.position - previous) / dt;
                }
            }
        }

        trace!(dt_ms, ball_x = self.ball.position.x, ball_y = self.ball.position.y, "physics step");
        dt_ms
    }

    fn integrate_robots(&mut self, dt: f32) {
        for body in self.robots.values_mut().filter(|b| b.enabled) {
            let heading = body.state.heading;
            let forward = Vec2::from_angle(heading);
            let right = Vec2::new(heading.sin(), -heading.cos());
            let velocity = (forward * body.command.forward + right * body.command.strafe)
                * self.config.max_robot_speed;
            let velocity = velocity.clamp_length_max(self.config.max_robot_speed);
            body.state.position += velocity * dt;
            body.state.heading = wrap_angle(heading + body.state.angular_velocity * dt);
        }
    }

    fn resolve_robot_walls(&mut self) {
        for body in self.robots.values_mut().filter(|b| b.enabled) {
            for wall in &self.walls {
                if let Some(contact) = circle_segment(body.state.position, ROBOT_RADIUS, wall) {
                    body.state.position += contact.normal * contact.depth;
                }
            }
        }
    }

    fn resolve_robot_pairs(&mut self) {
        let ids: Vec<RobotId> = self
            .robots
            .iter()
            .filter(|(_, b)| b.enabled)
            .map(|(id, _)| *id)
            .collect();

        let mut touching = BTreeSet::new();
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let (pa, pb) = match (self.robots.get(&a), self.robots.get(&b)) {
                    (Some(ra), Some(rb)) => (ra.state.position, rb.state.position),
                    _ => continue,
                };
                let Some(contact) = circle_circle(pa, ROBOT_RADIUS, pb, ROBOT_RADIUS) else {
                    continue;
                };
                let push = contact.normal * (contact.depth / 2.0);
                if let Some(body) = self.robots.get_mut(&a) {
                    body.state.position += push;
                }
                if let Some(body) = self.robots.get_mut(&b) {
                    body.state.position -= push;
                }
                touching.insert((a, b));
                if !self.robot_contacts.contains(&(a, b)) {
                    debug!(a = %a, b = %b, "robot collision");
                    self.events.push(PhysicsEvent::Collision { a, b });
                }
            }
        }
        self.robot_contacts = touching;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn integrate_ball(&mut self, dt: f32) {
        let travel = self.ball.velocity.length() * dt;
        let substeps = ((travel / BALL_RADIUS).ceil() as u32).clamp(1, MAX_BALL_SUBSTEPS);
        let sub_dt = dt / substeps as f32;

        let mut touching = BTreeSet::new();
        for _ in 0..substeps {
            self.ball.position += self.ball.velocity * sub_dt;

            for wall in &self.walls {
                if let Some(contact) = circle_segment(self.ball.position, BALL_RADIUS, wall) {
                    self.ball.position += contact.normal * contact.depth;
                    self.ball.velocity =
                        reflect(self.ball.velocity, contact.normal, self.config.wall_restitution);
                }
            }

            for (id, body) in self.robots.iter().filter(|(_, b)| b.enabled) {
                let Some(contact) =
                    circle_circle(self.ball.position, BALL_RADIUS, body.state.position, ROBOT_RADIUS)
                else {
                    continue;
                };
                self.ball.position += contact.normal * contact.depth;
                let relative = self.ball.velocity - body.state.velocity;
                let bounced = reflect(relative, contact.normal, self.config.robot_ball_restitution);
                self.ball.velocity = bounced + body.state.velocity;
                touching.insert(*id);
            }

            self.check_goal();
        }

        for id in &touching {
            if !self.ball_contacts.contains(id) {
                trace!(robot = %id, "ball touched");
                self.events.push(PhysicsEvent::BallTouched { robot: *id });
            }
            self.last_touch = Some(*id);
        }
        self.ball_contacts = touching;

        let damping = (-self.config.ball_damping * dt).exp();
        self.ball.velocity *= damping;
        if self.ball.velocity.length() < BALL_REST_SPEED {
            self.ball.velocity = Vec2::ZERO;
        }
    }

    fn check_goal(&mut self) {
        let p = self.ball.position;
        let inside = field::goal_containing(p)
            .filter(|_| p.y.abs() - field::FIELD_HALF_LENGTH >= BALL_RADIUS);
        if let Some(goal) = inside {
            if self.ball_in_goal.is_none() {
                let scoring_team = goal.opponent();
                debug!(%goal, %scoring_team, "ball entered goal");
                self.events.push(PhysicsEvent::GoalScored { scoring_team, goal });
            }
            self.ball_in_goal = Some(goal);
        } else if field::goal_containing(p).is_none() {
            self.ball_in_goal = None;
        }
    }

    fn sanitize_bodies(&mut self) {
        if !self.ball.position.is_finite() {
            warn!("ball position became non-finite; resetting to centre");
            self.ball = BallState::at_rest(Vec2::ZERO);
        }
        if !self.ball.velocity.is_finite() {
            warn!("ball velocity became non-finite; stopping ball");
            self.ball.velocity = Vec2::ZERO;
        }
        self.ball.velocity = self.ball.velocity.clamp_length_max(self.config.max_ball_speed);
        self.ball.position = field::clamp_to_walls(self.ball.position, BALL_RADIUS);

        for body in self.robots.values_mut() {
            let state = &mut body.state;
            if !state.position.is_finite() {
                warn!(robot = %state.id, "robot position became non-finite; resetting");
                state.position = Vec2::ZERO;
            }
            if !state.heading.is_finite() {
                state.heading = 0.0;
            }
            state.position = field::clamp_to_walls(state.position, ROBOT_RADIUS);
        }
    }

    // ------------------------------------------------------------------------
    // Rule helpers
    // ------------------------------------------------------------------------

    /// Turns out-of-bounds detection on or off.
    pub fn set_out_of_bounds_enabled(&mut self, enabled: bool) {
        self.oob_enabled = enabled;
    }

    /// Whether out-of-bounds detection is on.
    #[must_use]
    pub fn out_of_bounds_enabled(&self) -> bool {
        self.oob_enabled
    }

    /// Simulated time since the debounce interval last restarted, ms.
    #[must_use]
    pub fn out_of_bounds_timer_ms(&self) -> f32 {
        self.since_oob_ms
    }

    /// Restarts the out-of-bounds debounce interval.
    pub fn reset_out_of_bounds_timer(&mut self) {
        self.since_oob_ms = 0.0;
    }

    /// Reports the side the ball left through, at most once per debounce
    /// interval. The goal mouth is not out of bounds.
    pub fn check_out_of_bounds(&mut self) -> Option<Side> {
        if !self.oob_enabled || self.since_oob_ms < self.oob_debounce_ms {
            return None;
        }
        let p = self.ball.position;
        let in_mouth = p.x.abs() < field::GOAL_HALF_WIDTH && p.y.abs() > field::FIELD_HALF_LENGTH;
        if in_mouth {
            return None;
        }
        let beyond_x = p.x.abs() > field::FIELD_HALF_WIDTH + self.oob_margin;
        let beyond_y = p.y.abs() > field::FIELD_HALF_LENGTH + self.oob_margin;
        if !(beyond_x || beyond_y) {
            return None;
        }
        self.since_oob_ms = 0.0;
        field::boundary_side(p)
    }

    /// Robots whose centre is inside a goal area, with the goal area's team.
    #[must_use]
    pub fn robots_in_goal_area(&self) -> Vec<(RobotId, Team)> {
        let mut found = Vec::new();
        for body in self.robots.values().filter(|b| b.enabled) {
            for team in Team::ALL {
                if field::in_goal_area(body.state.position, team) {
                    found.push((body.state.id, team));
                }
            }
        }
        found
    }

    /// Moves every robot inside a goal area to just outside its front edge.
    /// Returns the robots that were moved.
    pub fn push_out_of_goal_areas(&mut self) -> Vec<RobotId> {
        let mut moved = Vec::new();
        for body in self.robots.values_mut() {
            for team in Team::ALL {
                if field::in_goal_area(body.state.position, team) {
                    let front = field::FIELD_HALF_LENGTH - field::GOAL_AREA_DEPTH - ROBOT_RADIUS;
                    body.state.position.y = match team {
                        Team::Blue => -front,
                        Team::Yellow => front,
                    };
                    body.state.velocity = Vec2::ZERO;
                    moved.push(body.state.id);
                }
            }
        }
        moved
    }

    /// Moves robots closer than `clearance` to `spot` radially outward until
    /// they are `clearance` away.
    pub fn push_robots_away_from(&mut self, spot: Vec2, clearance: f32) {
        for body in self.robots.values_mut() {
            let offset = body.state.position - spot;
            let distance = offset.length();
            if distance >= clearance {
                continue;
            }
            let direction = if distance > f32::EPSILON {
                offset / distance
            } else {
                // Stacked on the spot: retreat towards the robot's own goal.
                Vec2::new(0.0, -body.state.id.team.attack_sign())
            };
            body.state.position = field::clamp_to_walls(spot + direction * clearance, ROBOT_RADIUS);
            body.state.velocity = Vec2::ZERO;
        }
    }
}

fn ensure_finite(position: Vec2) -> KernelResult<()> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(KernelError::NonFinitePosition {
            x: position.x,
            y: position.y,
        })
    }
}

/// Wraps an angle in radians into (-π, π].
#[must_use]
pub fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}
