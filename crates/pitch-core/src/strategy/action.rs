//! The command a strategy returns each tick.

use pitch_script::Value;
use serde::{Deserialize, Serialize};

/// Four motor duty cycles plus a kick request.
///
/// Every `Action` that reaches the physics engine has passed through
/// [`Action::sanitize`], so motors are finite and within [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    /// Front-left motor.
    pub motor1: f32,
    /// Front-right motor.
    pub motor2: f32,
    /// Back-right motor.
    pub motor3: f32,
    /// Back-left motor.
    pub motor4: f32,
    /// Fire the kicker this tick.
    pub kick: bool,
}

/// The zero action: all motors stopped, no kick.
#[must_use]
pub fn create_default_action() -> Action {
    Action::default()
}

impl Action {
    /// Creates an action from motor values, sanitising them.
    #[must_use]
    pub fn new(motors: [f32; 4], kick: bool) -> Self {
        Self {
            motor1: motors[0],
            motor2: motors[1],
            motor3: motors[2],
            motor4: motors[3],
            kick,
        }
        .sanitize()
    }

    /// Motor values as an array, in motor order.
    #[must_use]
    pub fn motors(&self) -> [f32; 4] {
        [self.motor1, self.motor2, self.motor3, self.motor4]
    }

    /// Replaces NaN motors with 0 and clamps the rest, infinities included,
    /// to [-1, 1]. Idempotent.
    #[must_use]
    pub fn sanitize(self) -> Self {
        Self {
            motor1: sanitize_motor(self.motor1),
            motor2: sanitize_motor(self.motor2),
            motor3: sanitize_motor(self.motor3),
            motor4: sanitize_motor(self.motor4),
            kick: self.kick,
        }
    }

    /// Builds an action from whatever a script returned.
    ///
    /// Motor fields that are missing, not numbers or NaN become 0. Numbers are
    /// clamped before narrowing, so `1e39` is full speed. `kick` uses
    /// script truthiness. A non-object return value yields the zero action.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_script_value(value: &Value) -> Self {
        let motor = |name: &str| match value.get_field(name) {
            Some(Value::Number(n)) => n.clamp(-1.0, 1.0) as f32,
            _ => 0.0,
        };
        Self {
            motor1: motor("motor1"),
            motor2: motor("motor2"),
            motor3: motor("motor3"),
            motor4: motor("motor4"),
            kick: value.get_field("kick").is_some_and(|k| k.truthy()),
        }
        .sanitize()
    }
}

fn sanitize_motor(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}
