//! # Pitch Core
//!
//! Deterministic simulation kernel for two-versus-two wheeled-robot soccer.
//!
//! The kernel owns a 2D physics world, a per-robot sensor model, a sandboxed
//! strategy runtime and the match rules. Hosts (a browser shell, the
//! `pitch` CLI, tests) drive it one frame at a time and read back snapshots
//! and events; nothing in here renders or blocks.
//!
//! ## Architecture
//!
//! - **[`physics`]**: kinematic robots, a rolling ball, walls and goals
//! - **[`observation`]**: ground truth to the [`WorldState`](observation::WorldState)
//!   a robot's strategy sees
//! - **[`strategy`]**: script and native strategies, isolated per robot
//! - **[`referee`]**: lack of progress and neutral-spot placement
//! - **[`game`]**: phases, score and clocks
//! - **[`simulation`]**: the orchestrator that runs a tick
//! - **[`events`]**: observer channel for events and snapshots
//!
//! ## Usage
//!
//! ```
//! use pitch_core::{MatchConfig, MatchMode, SimConfig, Simulation};
//!
//! let mut sim = Simulation::new(SimConfig::default(), MatchConfig::new(MatchMode::SingleTeam))?;
//! sim.start();
//! sim.run_for(5_000.0, 16.0);
//!
//! let snapshot = sim.snapshot();
//! assert_eq!(snapshot.robots.len(), 4);
//! assert!(snapshot.ball.position.is_finite());
//! # Ok::<(), pitch_core::KernelError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod field;
pub mod game;
pub mod observation;
pub mod physics;
pub mod referee;
pub mod simulation;
pub mod strategy;

// Re-exports for convenience
pub use config::{MatchConfig, MatchMode, PhysicsConfig, RulesConfig, SensorConfig, SimConfig};
pub use entity::{BallState, Role, RobotId, RobotState, Team};
pub use error::{ConfigError, KernelError, KernelResult, StrategyFault};
pub use events::{GameEvent, ObserverId, SimulationObserver, SimulationSnapshot};
pub use game::{GamePhase, GameState, Score};
pub use observation::WorldState;
pub use simulation::Simulation;
pub use strategy::{Action, Decision, Strategy};

pub use pitch_script;

#[cfg(test)]
mod tests;
