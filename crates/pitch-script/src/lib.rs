//! # Pitch Script
//!
//! A small, capability-restricted scripting language for robot strategies.
//!
//! Strategies are written in a JavaScript-flavoured subset: `var`/`let`/`const`,
//! top-level `function` declarations, the usual control flow, arrays and object
//! literals. A script can see only what the host hands it as arguments plus a
//! fixed set of helpers (`clamp`, `normalizeAngle`, `isFinite`, `isNaN` and
//! `Math`). There is no I/O, no clock and no access to other scripts.
//!
//! ## Budgets
//!
//! Each host call runs under [`Limits`]: a step budget, a soft wall-clock
//! budget, a maximum call depth and bounds on string and array growth. When a
//! budget runs out the call is aborted with a [`ScriptError`] and the script's
//! globals are left as they were at the moment of the abort. A heap budget
//! bounds what the script keeps alive between calls. Dropping a [`Script`]
//! empties every array and object it still reaches, including any the host
//! holds, so that reference cycles are freed.
//!
//! ## Usage
//!
//! ```rust
//! use pitch_script::{Limits, Script, Value};
//!
//! let mut script = Script::compile(
//!     "function strategy(ws) { return { speed: clamp(ws.distance / 10, 0, 1) }; }",
//!     Limits::default(),
//!     42,
//! )?;
//!
//! let input = Value::from_json(&serde_json::json!({ "distance": 5.0 }));
//! let out = script.call("strategy", &[input])?;
//! assert_eq!(out.get_field("speed").and_then(|v| v.as_number()), Some(0.5));
//! # Ok::<(), pitch_script::ScriptError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod ast;
pub mod builtins;
pub mod error;
mod heap;
pub mod interpreter;
mod lexer;
mod parser;
pub mod value;

pub use builtins::{clamp, normalize_angle};
pub use error::{ScriptError, ScriptResult};
pub use interpreter::Interpreter;
pub use value::Value;

// ============================================================================
// Limits
// ============================================================================

/// Execution budgets applied to every top-level run and host call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Statements plus expressions evaluated per call.
    pub max_steps: u64,
    /// Soft wall-clock budget per call.
    #[serde(with = "duration_ms")]
    pub time_budget: Duration,
    /// Maximum nesting of script function calls.
    pub max_call_depth: usize,
    /// Maximum length of any string the script builds, in bytes.
    pub max_string_len: usize,
    /// Maximum length of any array the script builds, and the most
    /// properties any object may hold.
    pub max_array_len: usize,
    /// Live bytes of arrays and objects the script may keep across calls.
    pub max_heap_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 200_000,
            time_budget: Duration::from_millis(10),
            max_call_depth: 64,
            max_string_len: 65_536,
            max_array_len: 10_000,
            max_heap_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Serialises a [`Duration`] as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

// ============================================================================
// Script
// ============================================================================

/// A compiled script together with its persistent global state.
///
/// Globals survive between calls, so a strategy can keep a state machine in
/// top-level variables. Each script owns its own random generator, seeded at
/// construction, which makes `Math.random()` reproducible.
pub struct Script {
    interpreter: Interpreter,
}

impl Script {
    /// Creates an empty script environment. Use [`Script::define_global`]
    /// to predeclare host variables, then [`Script::load`] the source.
    #[must_use]
    pub fn new(limits: Limits, seed: u64) -> Self {
        Self {
            interpreter: Interpreter::new(limits, seed),
        }
    }

    /// Parses `source` and runs its top level in a fresh environment.
    ///
    /// # Errors
    ///
    /// Syntax errors, or any fault raised while running the top level.
    pub fn compile(source: &str, limits: Limits, seed: u64) -> ScriptResult<Self> {
        let mut script = Self::new(limits, seed);
        script.load(source)?;
        Ok(script)
    }

    /// Parses `source` and runs its top level in this environment.
    ///
    /// # Errors
    ///
    /// Syntax errors, or any fault raised while running the top level.
    pub fn load(&mut self, source: &str) -> ScriptResult<()> {
        let program = parser::parse(source)?;
        self.interpreter.run_program(&program)
    }

    /// Defines (or overwrites) a mutable global visible to the script.
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.interpreter.set_global(name, value);
    }

    /// Reads a global variable.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Value> {
        self.interpreter.global(name)
    }

    /// Returns true if `name` is a callable global.
    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        matches!(
            self.interpreter.global(name),
            Some(Value::Function(_) | Value::Native(_))
        )
    }

    /// Calls the global function `name`.
    ///
    /// # Errors
    ///
    /// [`ScriptError::MissingFunction`] if `name` is not a function, or any
    /// runtime fault or exhausted budget.
    pub fn call(&mut self, name: &str, args: &[Value]) -> ScriptResult<Value> {
        self.interpreter.call_global(name, args)
    }

    /// Steps consumed by the most recent call.
    #[must_use]
    pub fn steps_used(&self) -> u64 {
        self.interpreter.steps_used()
    }
}

/// Parses `source` without running it. Used to validate strategy files.
///
/// # Errors
///
/// The first syntax error found.
pub fn check_syntax(source: &str) -> ScriptResult<()> {
    parser::parse(source).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_round_trip_through_json() {
        let json = r#"{"max_steps": 1000, "time_budget": 3}"#;
        let limits: Limits = serde_json::from_str(json).unwrap();
        assert_eq!(limits.max_steps, 1000);
        assert_eq!(limits.time_budget, Duration::from_millis(3));
        assert_eq!(limits.max_call_depth, 64);
    }

    #[test]
    fn compile_runs_top_level() {
        let script = Script::compile("var ready = true;", Limits::default(), 0).unwrap();
        assert!(script.global("ready").unwrap().truthy());
        assert!(!script.has_function("strategy"));
    }

    #[test]
    fn predeclared_globals_survive_load() {
        let mut script = Script::new(Limits::default(), 0);
        script.define_global("currentState", Value::Null);
        script
            .load("currentState = 'init'; function strategy() { currentState = 'run'; }")
            .unwrap();
        assert_eq!(script.global("currentState").unwrap().as_str(), Some("init"));
        script.call("strategy", &[]).unwrap();
        assert_eq!(script.global("currentState").unwrap().as_str(), Some("run"));
    }

    #[test]
    fn dropping_a_script_frees_its_cycles() {
        let script = Script::compile("var a = []; a.push(a); var o = {}; o.me = o;", Limits::default(), 0)
            .unwrap();
        let array = match script.global("a") {
            Some(Value::Array(items)) => std::rc::Rc::downgrade(&items),
            other => panic!("expected an array, got {other:?}"),
        };
        let object = match script.global("o") {
            Some(Value::Object(fields)) => std::rc::Rc::downgrade(&fields),
            other => panic!("expected an object, got {other:?}"),
        };
        drop(script);
        assert!(array.upgrade().is_none());
        assert!(object.upgrade().is_none());
    }

    #[test]
    fn deep_nesting_drops_without_recursion() {
        let limits = Limits {
            time_budget: Duration::from_secs(60),
            ..Limits::default()
        };
        let mut script = Script::compile(
            "var chain = null; function grow() { for (var i = 0; i < 1500; i++) { chain = { next: chain }; } }",
            limits,
            0,
        )
        .unwrap();
        for _ in 0..100 {
            script.call("grow", &[]).unwrap();
        }
        drop(script);
    }

    #[test]
    fn check_syntax_does_not_execute() {
        assert!(check_syntax("while (true) {}").is_ok());
        assert!(check_syntax("function (").is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn parser_never_panics(source in "\\PC{0,200}") {
                let _ = check_syntax(&source);
            }

            #[test]
            fn parser_never_panics_on_near_code(
                source in "(var|function|if|while|return|\\{|\\}|\\(|\\)|;|=|\\+|x|1|'a'| ){0,60}"
            ) {
                let _ = check_syntax(&source);
            }

            #[test]
            fn integer_arithmetic_is_exact(a in -1_000_000i32..1_000_000, b in -1_000i32..1_000) {
                let mut script = Script::compile(
                    "function f(a, b) { return a + b * 2 - (a - b); }",
                    Limits::default(),
                    0,
                )
                .unwrap();
                let out = script
                    .call("f", &[Value::Number(f64::from(a)), Value::Number(f64::from(b))])
                    .unwrap();
                prop_assert_eq!(out.as_number(), Some(f64::from(b) * 3.0));
            }

            #[test]
            fn clamp_stays_in_range(v in -1e6f64..1e6, lo in -10.0f64..0.0, hi in 0.0f64..10.0) {
                let mut script =
                    Script::compile("function f(v, lo, hi) { return clamp(v, lo, hi); }", Limits::default(), 0)
                        .unwrap();
                let out = script
                    .call("f", &[Value::Number(v), Value::Number(lo), Value::Number(hi)])
                    .unwrap()
                    .as_number()
                    .unwrap();
                prop_assert!(out >= lo && out <= hi);
            }

            #[test]
            fn step_budget_always_stops_loops(max_steps in 10u64..5_000) {
                let limits = Limits { max_steps, ..Limits::default() };
                let mut script =
                    Script::compile("function spin() { var i = 0; while (true) { i++; } }", limits, 0)
                        .unwrap();
                let err = script.call("spin", &[]).unwrap_err();
                prop_assert!(err.is_budget());
                prop_assert!(script.steps_used() <= max_steps + 1);
            }
        }
    }
}
