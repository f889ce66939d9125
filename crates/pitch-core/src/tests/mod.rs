//! Whole-kernel tests.
//!
//! Everything here drives a full [`Simulation`](crate::Simulation) the way a
//! host would:
//! - **Integration tests**: kickoff, goals, stoppages, penalties, hot reload
//! - **Determinism tests**: the same seed and inputs replay the same match
//! - **Property tests**: bodies stay finite and walled under random play
//!
//! # Test Structure
//!
//! - `integration.rs`: end-to-end match flow
//! - `determinism.rs`: replay checks
//! - `properties.rs`: `proptest` invariants
//! - `helpers.rs`: fixtures and native test strategies

mod determinism;
mod helpers;
mod integration;
