//! Motor-to-body inverse kinematics for the four-wheel omni drive.
//!
//! Wheel layout (X configuration, viewed from above):
//!
//! ```text
//!        front
//!   m1 ◢       ◣ m2
//!
//!   m4 ◥       ◤ m3
//!        back
//! ```
//!
//! The mapping is the heuristic one strategies were written against rather
//! than a full least-squares solve:
//!
//! - forward = (m1 − m2) / 2
//! - front pair combined = (m1 + m2) / 2, back pair combined = (m3 + m4) / 2
//! - front and back combined with the same sign turn the robot, opposite
//!   signs strafe it
//! - all four motors nearly equal is a pure rotation
//! - one diagonal pair idle is diagonal travel, where the front combined
//!   value is the strafe component
//!
//! Positive strafe is to the robot's right; positive rotation is
//! counter-clockwise.

use serde::{Deserialize, Serialize};

/// Motor magnitude treated as zero.
pub const MOTOR_DEADBAND: f32 = 0.05;

/// Largest spread between motors still classed as a pure rotation.
pub const PATTERN_TOLERANCE: f32 = 0.15;

/// Motion pattern recognised from a motor command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPattern {
    /// Every motor inside the deadband.
    Idle,
    /// All motors equal: spin on the spot.
    PureRotation,
    /// Front and back pairs opposed: sideways travel, possibly with forward.
    Strafe,
    /// One diagonal pair idle: travel at 45°.
    Diagonal,
    /// Forward travel with optional turning.
    ForwardTurn,
}

/// Body-frame command in normalised units (each component in [-1, 1]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyCommand {
    /// Along the heading.
    pub forward: f32,
    /// To the right of the heading.
    pub strafe: f32,
    /// Counter-clockwise turn rate.
    pub rotation: f32,
    /// How the command was classified.
    pub pattern: MotionPattern,
}

impl BodyCommand {
    /// No motion.
    pub const IDLE: BodyCommand = BodyCommand {
        forward: 0.0,
        strafe: 0.0,
        rotation: 0.0,
        pattern: MotionPattern::Idle,
    };
}

/// Converts four motor duty cycles (already clamped to [-1, 1]) into a body
/// command.
///
/// # Example
///
/// ```
/// use pitch_core::physics::drivetrain::{inverse_kinematics, MotionPattern};
///
/// let cmd = inverse_kinematics([0.8, -0.8, -0.8, 0.8]);
/// assert_eq!(cmd.pattern, MotionPattern::ForwardTurn);
/// assert!((cmd.forward - 0.8).abs() < 1e-6);
/// assert_eq!(cmd.rotation, 0.0);
/// ```
#[must_use]
pub fn inverse_kinematics(motors: [f32; 4]) -> BodyCommand {
    let [m1, m2, m3, m4] = motors;
    let idle = |m: f32| m.abs() < MOTOR_DEADBAND;

    if motors.iter().all(|m| idle(*m)) {
        return BodyCommand::IDLE;
    }

    let forward = (m1 - m2) / 2.0;
    let front = (m1 + m2) / 2.0;
    let back = (m3 + m4) / 2.0;

    // Pure rotation: same sign, all close to the mean.
    let mean = (m1 + m2 + m3 + m4) / 4.0;
    let same_sign = motors.iter().all(|m| *m > 0.0) || motors.iter().all(|m| *m < 0.0);
    if same_sign && motors.iter().all(|m| (m - mean).abs() <= PATTERN_TOLERANCE) {
        return BodyCommand {
            forward: 0.0,
            strafe: 0.0,
            rotation: mean,
            pattern: MotionPattern::PureRotation,
        };
    }

    // Diagonal: exactly one diagonal pair idle.
    let main_idle = idle(m1) && idle(m3);
    let anti_idle = idle(m2) && idle(m4);
    if main_idle != anti_idle {
        return BodyCommand {
            forward,
            strafe: front,
            rotation: 0.0,
            pattern: MotionPattern::Diagonal,
        };
    }

    if !idle(front) && !idle(back) && front.signum() != back.signum() {
        return BodyCommand {
            forward,
            strafe: (front - back) / 2.0,
            rotation: 0.0,
            pattern: MotionPattern::Strafe,
        };
    }

    BodyCommand {
        forward,
        strafe: 0.0,
        rotation: (front + back) / 2.0,
        pattern: MotionPattern::ForwardTurn,
    }
}
