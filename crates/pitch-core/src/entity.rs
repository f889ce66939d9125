//! Robot and ball state.
//!
//! A match has at most four robots, one per (team, role) pair, so a
//! [`RobotId`] is simply that pair. It orders deterministically (blue before
//! yellow, attacker before defender), which keeps every per-robot loop in the
//! kernel in a stable order.

use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

// ============================================================================
// Team / Role
// ============================================================================

/// Team colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// Defends the goal at negative y.
    Blue,
    /// Defends the goal at positive y.
    Yellow,
}

impl Team {
    /// Both teams, blue first.
    pub const ALL: [Team; 2] = [Team::Blue, Team::Yellow];

    /// The other team.
    #[must_use]
    pub fn opponent(self) -> Self {
        match self {
            Self::Blue => Self::Yellow,
            Self::Yellow => Self::Blue,
        }
    }

    /// Lower-case name used in ids and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Yellow => "yellow",
        }
    }

    /// +1 if this team attacks towards positive y, -1 otherwise.
    #[must_use]
    pub fn attack_sign(self) -> f32 {
        match self {
            Self::Blue => 1.0,
            Self::Yellow => -1.0,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playing role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Plays forward and takes kickoffs.
    Attacker,
    /// Stays near its own goal.
    Defender,
}

impl Role {
    /// Lower-case name used in ids and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attacker => "attacker",
            Self::Defender => "defender",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RobotId
// ============================================================================

/// Stable robot identity, e.g. `blue_attacker`.
///
/// Serialises as its string form so it can be used as a JSON map key.
///
/// # Example
///
/// ```
/// use pitch_core::entity::{RobotId, Role, Team};
///
/// let id: RobotId = "yellow_defender".parse().unwrap();
/// assert_eq!(id, RobotId::new(Team::Yellow, Role::Defender));
/// assert_eq!(id.to_string(), "yellow_defender");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct RobotId {
    /// Team the robot plays for.
    pub team: Team,
    /// Role within the team.
    pub role: Role,
}

impl RobotId {
    /// Every possible robot, in canonical order.
    pub const ALL: [RobotId; 4] = [
        RobotId::new(Team::Blue, Role::Attacker),
        RobotId::new(Team::Blue, Role::Defender),
        RobotId::new(Team::Yellow, Role::Attacker),
        RobotId::new(Team::Yellow, Role::Defender),
    ];

    /// Creates an id.
    #[must_use]
    pub const fn new(team: Team, role: Role) -> Self {
        Self { team, role }
    }

    /// Index into [`RobotId::ALL`]. Used to derive per-robot seeds.
    #[must_use]
    pub fn index(self) -> usize {
        let team = match self.team {
            Team::Blue => 0,
            Team::Yellow => 2,
        };
        let role = match self.role {
            Role::Attacker => 0,
            Role::Defender => 1,
        };
        team + role
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.team, self.role)
    }
}

impl FromStr for RobotId {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RobotId::ALL
            .into_iter()
            .find(|id| id.to_string() == s)
            .ok_or_else(|| KernelError::InvalidRobotId(s.to_string()))
    }
}

impl TryFrom<String> for RobotId {
    type Error = KernelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RobotId> for String {
    fn from(id: RobotId) -> Self {
        id.to_string()
    }
}

// ============================================================================
// Body state
// ============================================================================

/// Ground-truth state of one robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    /// Identity.
    pub id: RobotId,
    /// Centre position in cm.
    pub position: Vec2,
    /// Field heading in radians; 0 faces +x, counter-clockwise positive.
    pub heading: f32,
    /// Velocity in cm/s, as last integrated.
    pub velocity: Vec2,
    /// Angular velocity in rad/s.
    pub angular_velocity: f32,
    /// True while the robot is out of play.
    pub penalized: bool,
    /// Remaining penalty in ms; zero when not penalized.
    pub penalty_remaining_ms: f32,
}

impl RobotState {
    /// Creates a stationary, unpenalized robot.
    #[must_use]
    pub fn new(id: RobotId, position: Vec2, heading: f32) -> Self {
        Self {
            id,
            position,
            heading,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            penalized: false,
            penalty_remaining_ms: 0.0,
        }
    }

    /// Team shortcut.
    #[must_use]
    pub fn team(&self) -> Team {
        self.id.team
    }

    /// Role shortcut.
    #[must_use]
    pub fn role(&self) -> Role {
        self.id.role
    }

    /// Unit vector the robot faces.
    #[must_use]
    pub fn forward(&self) -> Vec2 {
        Vec2::from_angle(self.heading)
    }
}

/// Ground-truth state of the ball.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BallState {
    /// Centre position in cm.
    pub position: Vec2,
    /// Velocity in cm/s.
    pub velocity: Vec2,
}

impl BallState {
    /// A ball at rest at `position`.
    #[must_use]
    pub fn at_rest(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_and_display() {
        for id in RobotId::ALL {
            let parsed: RobotId = id.to_string().parse().unwrap();
            assert_eq!(parsed, id);
        }
        assert!("green_attacker".parse::<RobotId>().is_err());
    }

    #[test]
    fn ids_order_blue_first() {
        let mut ids = vec![
            RobotId::new(Team::Yellow, Role::Defender),
            RobotId::new(Team::Blue, Role::Defender),
            RobotId::new(Team::Blue, Role::Attacker),
        ];
        ids.sort();
        assert_eq!(ids[0], RobotId::new(Team::Blue, Role::Attacker));
        assert_eq!(ids[2].team, Team::Yellow);
    }

    #[test]
    fn index_matches_canonical_order() {
        for (i, id) in RobotId::ALL.into_iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn id_serialises_as_string() {
        let json = serde_json::to_string(&RobotId::new(Team::Blue, Role::Attacker)).unwrap();
        assert_eq!(json, "\"blue_attacker\"");
        let back: RobotId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::Attacker);
    }

    #[test]
    fn forward_follows_heading() {
        let robot = RobotState::new(
            RobotId::new(Team::Blue, Role::Attacker),
            Vec2::ZERO,
            std::f32::consts::FRAC_PI_2,
        );
        assert!((robot.forward() - Vec2::Y).length() < 1e-6);
        assert_eq!(Team::Blue.opponent(), Team::Yellow);
    }
}
