//! Error types for the simulation kernel.
//!
//! Only host-facing operations return these. Faults inside a tick (strategy
//! failures, numerical trouble) are recovered in place and never surface as
//! errors.

use pitch_script::ScriptError;

use crate::entity::RobotId;

/// Errors from kernel setup and host commands.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A robot with this id already exists.
    #[error("robot `{0}` already exists")]
    DuplicateRobot(RobotId),

    /// No robot with this id exists in the current match.
    #[error("robot `{0}` is not in this match")]
    UnknownRobot(RobotId),

    /// A string did not name a robot.
    #[error("`{0}` is not a robot id (expected e.g. `blue_attacker`)")]
    InvalidRobotId(String),

    /// A coordinate passed by the host was NaN or infinite.
    #[error("non-finite position ({x}, {y})")]
    NonFinitePosition {
        /// Requested x.
        x: f32,
        /// Requested y.
        y: f32,
    },

    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document was not valid JSON for the config schema.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field held a value outside its allowed range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Why a strategy produced no decision this tick.
///
/// Always recovered by the executor: the robot gets the zero action and the
/// message is recorded for the host.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyFault {
    /// The source failed to compile or its top level failed to run.
    #[error("compile error: {0}")]
    Compile(ScriptError),

    /// A call into the script failed or ran out of budget.
    #[error("{0}")]
    Runtime(ScriptError),

    /// A native strategy reported a failure.
    #[error("{0}")]
    Native(String),
}

/// Convenience alias for kernel results.
pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Role, Team};

    #[test]
    fn display_names_the_robot() {
        let err = KernelError::DuplicateRobot(RobotId::new(Team::Yellow, Role::Attacker));
        assert_eq!(err.to_string(), "robot `yellow_attacker` already exists");
    }

    #[test]
    fn strategy_fault_messages() {
        let fault = StrategyFault::Runtime(ScriptError::StepBudgetExhausted(10));
        assert_eq!(fault.to_string(), "step budget of 10 exhausted");
        let fault = StrategyFault::Compile(ScriptError::MissingFunction("strategy".into()));
        assert!(fault.to_string().starts_with("compile error"));
    }

    #[test]
    fn config_errors_convert() {
        let err: KernelError = ConfigError::invalid("physics.kick_speed", "must be positive").into();
        assert!(err.to_string().contains("physics.kick_speed"));
    }
}
