//! Simulation and match configuration.
//!
//! [`SimConfig`] holds every tunable of the kernel, grouped by subsystem.
//! All groups implement `Default` with the competition values, and every
//! field is optional in JSON (`#[serde(default)]`), so a config file only
//! needs to mention what it changes.
//!
//! ```
//! use pitch_core::config::SimConfig;
//!
//! let config = SimConfig::from_json_str(r#"{ "rules": { "half_duration_ms": 60000 } }"#)?;
//! assert_eq!(config.rules.half_duration_ms, 60_000.0);
//! assert_eq!(config.rules.kickoff_countdown_ms, 3000.0);
//! # Ok::<(), pitch_core::error::ConfigError>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entity::{Role, RobotId, Team};
use crate::error::ConfigError;
use crate::field;

/// Script execution budgets, shared with the script crate.
pub type ScriptConfig = pitch_script::Limits;

// ============================================================================
// Physics
// ============================================================================

/// Physics engine tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Maximum robot linear speed, cm/s.
    pub max_robot_speed: f32,
    /// Maximum robot angular speed, rad/s.
    pub max_robot_angular_speed: f32,
    /// Maximum ball speed, cm/s.
    pub max_ball_speed: f32,
    /// Rolling damping, fraction of speed lost per second.
    pub ball_damping: f32,
    /// Ball speed set by a kick, cm/s.
    pub kick_speed: f32,
    /// Kicker reach beyond body contact, cm.
    pub kick_range: f32,
    /// Half-angle of the cone in front of the robot where kicks connect, degrees.
    pub kick_cone_deg: f32,
    /// Fraction of normal speed kept when the ball bounces off a wall.
    pub wall_restitution: f32,
    /// Fraction of relative normal speed kept when the ball bounces off a robot.
    pub robot_ball_restitution: f32,
    /// Longest single physics step, ms.
    pub max_step_ms: f32,
    /// Most physics substeps per tick; longer ticks are truncated.
    pub max_substeps: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            max_robot_speed: 150.0,
            max_robot_angular_speed: 6.0,
            max_ball_speed: 400.0,
            ball_damping: 0.6,
            kick_speed: 300.0,
            kick_range: 3.0,
            kick_cone_deg: 35.0,
            wall_restitution: 0.6,
            robot_ball_restitution: 0.4,
            max_step_ms: 32.0,
            max_substeps: 8,
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Match rule timings and thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Length of each half, ms.
    pub half_duration_ms: f32,
    /// Kickoff countdown, ms.
    pub kickoff_countdown_ms: f32,
    /// Pause after a goal before the next kickoff, ms.
    pub goal_delay_ms: f32,
    /// Pause after the ball leaves the field, ms.
    pub out_of_bounds_delay_ms: f32,
    /// Half-time break, ms.
    pub half_time_ms: f32,
    /// Minimum time between two out-of-bounds triggers, ms.
    pub out_of_bounds_debounce_ms: f32,
    /// How far past the line the ball centre must be to count as out, cm.
    pub out_of_bounds_margin: f32,
    /// Stall time before a lack-of-progress call, ms.
    pub lack_of_progress_ms: f32,
    /// Ball movement that counts as progress, cm.
    pub lack_of_progress_threshold: f32,
    /// Minimum robot distance from a neutral spot the ball is placed on, cm.
    pub neutral_spot_clearance: f32,
    /// Penalty for a robot that leaves the field, ms. Zero disables it.
    pub robot_out_penalty_ms: f32,
    /// Lower bound of the speed multiplier.
    pub min_speed_multiplier: f32,
    /// Upper bound of the speed multiplier.
    pub max_speed_multiplier: f32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            half_duration_ms: 300_000.0,
            kickoff_countdown_ms: 3000.0,
            goal_delay_ms: 2000.0,
            out_of_bounds_delay_ms: 1500.0,
            half_time_ms: 5000.0,
            out_of_bounds_debounce_ms: 2000.0,
            out_of_bounds_margin: 2.0,
            lack_of_progress_ms: 10_000.0,
            lack_of_progress_threshold: 3.0,
            neutral_spot_clearance: 25.0,
            robot_out_penalty_ms: 5000.0,
            min_speed_multiplier: 0.1,
            max_speed_multiplier: 4.0,
        }
    }
}

// ============================================================================
// Sensors
// ============================================================================

/// Observation system tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Maximum sensing distance, cm.
    pub max_range: f32,
    /// Distance from a line at which a line sensor fires, cm.
    pub line_tolerance: f32,
    /// Line sensor offset from the robot centre, cm.
    pub line_sensor_offset: f32,
    /// Bumper ray length beyond the robot body, cm.
    pub bumper_reach: f32,
    /// Speed below which the robot may be stuck, cm/s.
    pub stuck_speed: f32,
    /// Minimum tick length for the stuck test, ms.
    pub stuck_min_dt_ms: f32,
    /// Confidence reported with a stuck flag.
    pub stuck_confidence: f32,
    /// Synthetic camera image width, px.
    pub image_width: f32,
    /// Synthetic camera image height, px.
    pub image_height: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            max_range: field::field_diagonal(),
            line_tolerance: 1.5,
            line_sensor_offset: 7.0,
            bumper_reach: 2.0,
            stuck_speed: 2.0,
            stuck_min_dt_ms: 5.0,
            stuck_confidence: 0.6,
            image_width: 160.0,
            image_height: 120.0,
        }
    }
}

// ============================================================================
// SimConfig
// ============================================================================

/// Complete kernel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SimConfig {
    /// Physics engine settings.
    pub physics: PhysicsConfig,
    /// Rule timings.
    pub rules: RulesConfig,
    /// Sensor model.
    pub sensors: SensorConfig,
    /// Strategy execution budgets.
    pub script: ScriptConfig,
    /// Master seed for strategy randomness.
    pub seed: u64,
}

impl SimConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed JSON, [`ConfigError::Invalid`] for
    /// out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value is in range.
    ///
    /// # Errors
    ///
    /// The first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.physics;
        positive("physics.max_robot_speed", p.max_robot_speed)?;
        positive("physics.max_robot_angular_speed", p.max_robot_angular_speed)?;
        positive("physics.max_ball_speed", p.max_ball_speed)?;
        non_negative("physics.ball_damping", p.ball_damping)?;
        non_negative("physics.kick_speed", p.kick_speed)?;
        non_negative("physics.kick_range", p.kick_range)?;
        unit("physics.wall_restitution", p.wall_restitution)?;
        unit("physics.robot_ball_restitution", p.robot_ball_restitution)?;
        if !(0.0..=180.0).contains(&p.kick_cone_deg) {
            return Err(ConfigError::invalid(
                "physics.kick_cone_deg",
                "must be within 0..=180",
            ));
        }
        if !(1.0..=100.0).contains(&p.max_step_ms) {
            return Err(ConfigError::invalid(
                "physics.max_step_ms",
                "must be within 1..=100",
            ));
        }
        if p.max_substeps == 0 {
            return Err(ConfigError::invalid("physics.max_substeps", "must be at least 1"));
        }

        let r = &self.rules;
        positive("rules.half_duration_ms", r.half_duration_ms)?;
        non_negative("rules.kickoff_countdown_ms", r.kickoff_countdown_ms)?;
        non_negative("rules.goal_delay_ms", r.goal_delay_ms)?;
        non_negative("rules.out_of_bounds_delay_ms", r.out_of_bounds_delay_ms)?;
        non_negative("rules.half_time_ms", r.half_time_ms)?;
        non_negative("rules.out_of_bounds_debounce_ms", r.out_of_bounds_debounce_ms)?;
        non_negative("rules.out_of_bounds_margin", r.out_of_bounds_margin)?;
        positive("rules.lack_of_progress_ms", r.lack_of_progress_ms)?;
        non_negative("rules.lack_of_progress_threshold", r.lack_of_progress_threshold)?;
        non_negative("rules.neutral_spot_clearance", r.neutral_spot_clearance)?;
        non_negative("rules.robot_out_penalty_ms", r.robot_out_penalty_ms)?;
        positive("rules.min_speed_multiplier", r.min_speed_multiplier)?;
        if r.max_speed_multiplier < r.min_speed_multiplier {
            return Err(ConfigError::invalid(
                "rules.max_speed_multiplier",
                "must not be below min_speed_multiplier",
            ));
        }

        let s = &self.sensors;
        positive("sensors.max_range", s.max_range)?;
        non_negative("sensors.line_tolerance", s.line_tolerance)?;
        non_negative("sensors.line_sensor_offset", s.line_sensor_offset)?;
        non_negative("sensors.bumper_reach", s.bumper_reach)?;
        non_negative("sensors.stuck_speed", s.stuck_speed)?;
        non_negative("sensors.stuck_min_dt_ms", s.stuck_min_dt_ms)?;
        unit("sensors.stuck_confidence", s.stuck_confidence)?;
        positive("sensors.image_width", s.image_width)?;
        positive("sensors.image_height", s.image_height)?;

        if self.script.max_steps == 0 {
            return Err(ConfigError::invalid("script.max_steps", "must be at least 1"));
        }
        if self.script.time_budget.is_zero() {
            return Err(ConfigError::invalid("script.time_budget", "must be non-zero"));
        }
        if self.script.max_call_depth == 0 {
            return Err(ConfigError::invalid("script.max_call_depth", "must be at least 1"));
        }
        Ok(())
    }

    /// Parses `json`, falling back to defaults (with a warning) if it is
    /// malformed or invalid.
    #[must_use]
    pub fn from_json_or_default(json: &str) -> Self {
        match Self::from_json_str(json) {
            Ok(config) => config,
            Err(err) => {
                warn!("Invalid configuration ({err}), using defaults");
                Self::default()
            }
        }
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be positive, got {value}")))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be non-negative, got {value}")))
    }
}

fn unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be within 0..=1, got {value}")))
    }
}

// ============================================================================
// Match setup
// ============================================================================

/// Which robots take part and who controls them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Blue attacker against a yellow defender.
    SingleBotAttacker,
    /// Blue defender against a yellow attacker.
    SingleBotDefender,
    /// Full blue team against a full yellow team running default strategies.
    SingleTeam,
    /// Two full teams, every robot user-programmable.
    #[default]
    TwoTeam,
}

impl MatchMode {
    /// Robots present in this mode, in canonical order.
    #[must_use]
    pub fn robots(self) -> Vec<RobotId> {
        let pair = |blue: Role, yellow: Role| {
            vec![RobotId::new(Team::Blue, blue), RobotId::new(Team::Yellow, yellow)]
        };
        match self {
            Self::SingleBotAttacker => pair(Role::Attacker, Role::Defender),
            Self::SingleBotDefender => pair(Role::Defender, Role::Attacker),
            Self::SingleTeam | Self::TwoTeam => RobotId::ALL.to_vec(),
        }
    }

    /// True if `id` runs user-supplied code in this mode. Opponents in the
    /// single-sided modes always run the bundled strategy for their role.
    #[must_use]
    pub fn is_user_controlled(self, id: RobotId) -> bool {
        match self {
            Self::TwoTeam => true,
            _ => id.team == Team::Blue,
        }
    }
}

/// Match initialisation parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Which robots exist.
    pub mode: MatchMode,
    /// Strategy sources keyed by robot id. Missing entries use the default
    /// strategy for the robot's role.
    pub strategies: BTreeMap<RobotId, String>,
}

impl MatchConfig {
    /// A match in `mode` with default strategies everywhere.
    #[must_use]
    pub fn new(mode: MatchMode) -> Self {
        Self {
            mode,
            strategies: BTreeMap::new(),
        }
    }

    /// Adds a strategy source for `id`.
    #[must_use]
    pub fn with_strategy(mut self, id: RobotId, source: impl Into<String>) -> Self {
        self.strategies.insert(id, source.into());
        self
    }

    /// The user source for `id`, if `id` is user-controlled and one was given.
    #[must_use]
    pub fn user_source(&self, id: RobotId) -> Option<&str> {
        if self.mode.is_user_controlled(id) {
            self.strategies.get(&id).map(String::as_str)
        } else {
            None
        }
    }
}
