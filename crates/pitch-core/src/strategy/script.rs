//! Strategies backed by a sandboxed script.

use pitch_script::{Limits, Script, ScriptError, Value};

use super::{Decision, Strategy};
use crate::error::StrategyFault;
use crate::observation::WorldState;
use crate::strategy::Action;

/// Function every strategy script must define.
pub const ENTRY_POINT: &str = "strategy";

/// Global the script may set to report its state label.
pub const STATE_GLOBAL: &str = "currentState";

/// Global the script may set to report its target label.
pub const TARGET_GLOBAL: &str = "currentTarget";

/// Longest debug label harvested from a script, in bytes.
pub const MAX_LABEL_LEN: usize = 64;

/// A compiled strategy script with its own globals and random generator.
///
/// The script sees the [`WorldState`] as a plain value and returns a plain
/// value; nothing else crosses the boundary.
pub struct ScriptStrategy {
    script: Script,
}

impl ScriptStrategy {
    /// Compiles `source` and runs its top level.
    ///
    /// `currentState` and `currentTarget` are predeclared as `null` so the
    /// script can assign them without declaring them.
    ///
    /// # Errors
    ///
    /// [`StrategyFault::Compile`] for syntax errors, top-level faults, or a
    /// missing `strategy` function.
    pub fn compile(source: &str, limits: Limits, seed: u64) -> Result<Self, StrategyFault> {
        let mut script = Script::new(limits, seed);
        script.define_global(STATE_GLOBAL, Value::Null);
        script.define_global(TARGET_GLOBAL, Value::Null);
        script.load(source).map_err(StrategyFault::Compile)?;
        if !script.has_function(ENTRY_POINT) {
            return Err(StrategyFault::Compile(ScriptError::MissingFunction(
                ENTRY_POINT.to_string(),
            )));
        }
        Ok(Self { script })
    }

    /// Interpreter steps used by the last decision.
    #[must_use]
    pub fn steps_used(&self) -> u64 {
        self.script.steps_used()
    }

    /// Renders a label global, cut off at [`MAX_LABEL_LEN`].
    fn label(&self, name: &str) -> Option<String> {
        let value = self.script.global(name)?;
        if matches!(value, Value::Null | Value::Undefined) {
            return None;
        }
        let mut label = String::new();
        // A label that hits the limit is kept truncated.
        let _ = value.render_into(&mut label, MAX_LABEL_LEN);
        Some(label)
    }
}

impl Strategy for ScriptStrategy {
    fn name(&self) -> &str {
        "script"
    }

    fn decide(&mut self, world: &WorldState) -> Result<Decision, StrategyFault> {
        let input = Value::from_serialize(world).map_err(StrategyFault::Runtime)?;
        let output = self
            .script
            .call(ENTRY_POINT, &[input])
            .map_err(StrategyFault::Runtime)?;
        Ok(Decision {
            action: Action::from_script_value(&output),
            state: self.label(STATE_GLOBAL),
            target: self.label(TARGET_GLOBAL),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Result<ScriptStrategy, StrategyFault> {
        ScriptStrategy::compile(source, Limits::default(), 1)
    }

    #[test]
    fn reads_world_state_fields() {
        let mut strategy = compile(
            "function strategy(ws) {
                 return { motor1: ws.ball.angle_deg / 100, motor2: ws.we_are_blue ? 1 : -1, kick: ws.kickoff_us };
             }",
        )
        .unwrap();
        let mut world = WorldState::default();
        world.ball.angle_deg = 50.0;
        world.we_are_blue = true;
        world.kickoff_us = true;
        let decision = strategy.decide(&world).unwrap();
        assert_eq!(decision.action.motors(), [0.5, 1.0, 0.0, 0.0]);
        assert!(decision.action.kick);
    }

    #[test]
    fn harvests_labels() {
        let mut strategy = compile(
            "function strategy(ws) { currentState = 'chase'; currentTarget = 3; return {}; }",
        )
        .unwrap();
        let decision = strategy.decide(&WorldState::default()).unwrap();
        assert_eq!(decision.state.as_deref(), Some("chase"));
        assert_eq!(decision.target.as_deref(), Some("3"));
    }

    #[test]
    fn labels_are_truncated() {
        let mut strategy = compile(
            "var wide = [];
             for (var i = 0; i < 20; i++) { wide.push(wide); }
             function strategy(ws) {
                 currentState = wide;
                 currentTarget = 'abcdefghij' + 'abcdefghij' + 'abcdefghij' + 'abcdefghij' + 'abcdefghij' + 'abcdefghij' + 'abcdefghij';
                 return {};
             }",
        )
        .unwrap();
        let started = std::time::Instant::now();
        let decision = strategy.decide(&WorldState::default()).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert!(decision.state.unwrap().len() <= MAX_LABEL_LEN);
        assert_eq!(decision.target.unwrap().len(), MAX_LABEL_LEN);
    }

    #[test]
    fn globals_persist_between_calls() {
        let mut strategy = compile(
            "var ticks = 0;
             function strategy(ws) { ticks++; return { motor1: ticks / 10 }; }",
        )
        .unwrap();
        strategy.decide(&WorldState::default()).unwrap();
        let decision = strategy.decide(&WorldState::default()).unwrap();
        assert!((decision.action.motor1 - 0.2).abs() < 1e-6);
    }

    #[test]
    fn missing_entry_point_is_a_compile_fault() {
        let err = compile("function other() {}").err().unwrap();
        assert!(matches!(
            err,
            StrategyFault::Compile(ScriptError::MissingFunction(_))
        ));
    }

    #[test]
    fn runtime_fault_is_reported() {
        let mut strategy = compile("function strategy(ws) { throw 'boom'; }").unwrap();
        let err = strategy.decide(&WorldState::default()).unwrap_err();
        assert!(matches!(err, StrategyFault::Runtime(ScriptError::Thrown { .. })));
    }
}
