//! Strategy execution.
//!
//! Every robot is driven by one [`Strategy`]: a function from the robot's
//! [`WorldState`] to a [`Decision`]. The [`StrategyExecutor`] owns one slot per
//! robot and is the fault boundary between untrusted strategy code and the
//! rest of the kernel.
//!
//! # Fault isolation
//!
//! - Compile failures are recorded against the robot and never returned to
//!   the caller. The robot keeps whatever strategy it had before.
//! - Runtime failures (exceptions, exhausted step or time budgets, runaway
//!   recursion) turn into the zero action for that tick. The message is
//!   recorded and logged once per distinct message.
//! - Whatever a strategy returns is sanitised into a valid [`Action`].
//!
//! A strategy only ever sees its own `WorldState`, passed by value, and can
//! only answer with an `Action` plus two debug labels. Scripts run in their
//! own interpreter with their own globals and random generator, so two
//! robots can never observe each other.
//!
//! # Example
//!
//! ```
//! use pitch_core::entity::{RobotId, Role, Team};
//! use pitch_core::observation::WorldState;
//! use pitch_core::strategy::StrategyExecutor;
//! use pitch_script::Limits;
//!
//! let id = RobotId::new(Team::Blue, Role::Attacker);
//! let mut executor = StrategyExecutor::new(Limits::default(), 42);
//! assert!(executor.load_strategy(id, "function strategy(ws) { return { motor1: 2 }; }"));
//!
//! let outcome = executor.execute_strategy(id, &WorldState::default());
//! assert_eq!(outcome.action.motor1, 1.0);
//! assert!(outcome.error.is_none());
//! ```

pub mod action;
pub mod defaults;
pub mod native;
pub mod script;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use pitch_script::Limits;
use tracing::{debug, warn};

use crate::entity::RobotId;
use crate::error::StrategyFault;
use crate::observation::WorldState;

pub use action::{create_default_action, Action};
pub use script::ScriptStrategy;

/// Distinct runtime messages remembered per robot for log deduplication.
const MAX_LOGGED_MESSAGES: usize = 32;

// ============================================================================
// Strategy trait
// ============================================================================

/// What a strategy decided for one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decision {
    /// Motor command.
    pub action: Action,
    /// Optional state label for display.
    pub state: Option<String>,
    /// Optional target label for display.
    pub target: Option<String>,
}

impl From<Action> for Decision {
    fn from(action: Action) -> Self {
        Self {
            action,
            state: None,
            target: None,
        }
    }
}

/// A per-robot controller.
pub trait Strategy {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Decides this tick's action.
    ///
    /// # Errors
    ///
    /// Any fault; the executor substitutes the zero action.
    fn decide(&mut self, world: &WorldState) -> Result<Decision, StrategyFault>;
}

// ============================================================================
// Executor
// ============================================================================

/// Result of running one robot's strategy for one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrategyOutcome {
    /// Sanitised action; the zero action on any fault.
    pub action: Action,
    /// State label reported by the strategy.
    pub state: Option<String>,
    /// Target label reported by the strategy.
    pub target: Option<String>,
    /// The robot's recorded error, if any.
    pub error: Option<String>,
}

#[derive(Default)]
struct Slot {
    source: Option<String>,
    strategy: Option<Box<dyn Strategy>>,
    error: Option<String>,
    logged: BTreeSet<String>,
    state: Option<String>,
    target: Option<String>,
}

/// Owns and runs every robot's strategy.
pub struct StrategyExecutor {
    limits: Limits,
    seed: u64,
    slots: BTreeMap<RobotId, Slot>,
}

impl fmt::Debug for StrategyExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyExecutor")
            .field("limits", &self.limits)
            .field("seed", &self.seed)
            .field("robots", &self.slots.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StrategyExecutor {
    /// Creates an executor with no strategies.
    ///
    /// # Arguments
    ///
    /// * `limits` - Budgets applied to every script call
    /// * `seed` - Master seed; each robot's script random generator is derived
    ///   from it and the robot id
    #[must_use]
    pub fn new(limits: Limits, seed: u64) -> Self {
        Self {
            limits,
            seed,
            slots: BTreeMap::new(),
        }
    }

    /// Script budgets in force.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Seed used for `id`'s script random generator.
    #[must_use]
    pub fn seed_for(&self, id: RobotId) -> u64 {
        let salt = (id.index() as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        self.seed ^ salt
    }

    /// Compiles `source` for `id`.
    ///
    /// On success the new strategy replaces the old one and the robot's error
    /// is cleared. On failure the error is recorded and the previous strategy
    /// (if any) stays in place.
    ///
    /// # Returns
    ///
    /// Whether the source compiled.
    pub fn load_strategy(&mut self, id: RobotId, source: &str) -> bool {
        let compiled = ScriptStrategy::compile(source, self.limits.clone(), self.seed_for(id));
        let slot = self.slots.entry(id).or_default();
        match compiled {
            Ok(strategy) => {
                debug!(robot = %id, "strategy loaded");
                slot.source = Some(source.to_string());
                slot.strategy = Some(Box::new(strategy));
                slot.error = None;
                slot.logged.clear();
                slot.state = None;
                slot.target = None;
                true
            }
            Err(fault) => {
                let message = fault.to_string();
                warn!(robot = %id, error = %message, "strategy failed to compile");
                slot.error = Some(message);
                false
            }
        }
    }

    /// Installs a native strategy for `id`, replacing any existing one.
    pub fn install_strategy(&mut self, id: RobotId, strategy: Box<dyn Strategy>) {
        debug!(robot = %id, name = strategy.name(), "strategy installed");
        let slot = self.slots.entry(id).or_default();
        slot.source = None;
        slot.strategy = Some(strategy);
        slot.error = None;
        slot.logged.clear();
        slot.state = None;
        slot.target = None;
    }

    /// Runs `id`'s strategy against `world`.
    ///
    /// Never fails: a missing strategy or any fault yields the zero action.
    pub fn execute_strategy(&mut self, id: RobotId, world: &WorldState) -> StrategyOutcome {
        let Some(slot) = self.slots.get_mut(&id) else {
            return StrategyOutcome::default();
        };
        let Some(strategy) = slot.strategy.as_mut() else {
            return StrategyOutcome {
                error: slot.error.clone(),
                ..StrategyOutcome::default()
            };
        };

        match strategy.decide(world) {
            Ok(decision) => {
                slot.error = None;
                slot.state.clone_from(&decision.state);
                slot.target.clone_from(&decision.target);
                StrategyOutcome {
                    action: decision.action.sanitize(),
                    state: decision.state,
                    target: decision.target,
                    error: None,
                }
            }
            Err(fault) => {
                let message = fault.to_string();
                if !slot.logged.contains(&message) {
                    warn!(robot = %id, error = %message, "strategy fault, using zero action");
                    if slot.logged.len() < MAX_LOGGED_MESSAGES {
                        slot.logged.insert(message.clone());
                    }
                }
                slot.error = Some(message.clone());
                StrategyOutcome {
                    action: create_default_action(),
                    state: slot.state.clone(),
                    target: slot.target.clone(),
                    error: Some(message),
                }
            }
        }
    }

    /// Whether `id` has a runnable strategy.
    #[must_use]
    pub fn has_strategy(&self, id: RobotId) -> bool {
        self.slots.get(&id).is_some_and(|slot| slot.strategy.is_some())
    }

    /// Removes `id`'s strategy and error. Returns whether a strategy existed.
    pub fn remove_strategy(&mut self, id: RobotId) -> bool {
        self.slots
            .remove(&id)
            .is_some_and(|slot| slot.strategy.is_some())
    }

    /// The last compile or runtime error recorded for `id`.
    #[must_use]
    pub fn get_error(&self, id: RobotId) -> Option<&str> {
        self.slots.get(&id).and_then(|slot| slot.error.as_deref())
    }

    /// Labels the strategy reported on its last successful call.
    #[must_use]
    pub fn labels(&self, id: RobotId) -> (Option<&str>, Option<&str>) {
        self.slots.get(&id).map_or((None, None), |slot| {
            (slot.state.as_deref(), slot.target.as_deref())
        })
    }

    /// Source text of `id`'s script strategy, if it has one.
    #[must_use]
    pub fn source(&self, id: RobotId) -> Option<&str> {
        self.slots.get(&id).and_then(|slot| slot.source.as_deref())
    }

    /// Drops every strategy.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Recompiles every stored script source from scratch, discarding script
    /// globals and restarting random generators. Native strategies are kept
    /// as they are.
    pub fn reload_all(&mut self) {
        let sources: Vec<(RobotId, String)> = self
            .slots
            .iter()
            .filter_map(|(id, slot)| slot.source.clone().map(|s| (*id, s)))
            .collect();
        for (id, source) in sources {
            self.load_strategy(id, &source);
        }
    }
}
