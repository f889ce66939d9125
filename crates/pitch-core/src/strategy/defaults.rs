//! Bundled strategies for robots without user code.

use crate::entity::Role;

/// Default attacker source.
pub const ATTACKER_SOURCE: &str = include_str!("../../strategies/attacker.strat");

/// Default defender source.
pub const DEFENDER_SOURCE: &str = include_str!("../../strategies/defender.strat");

/// The bundled source for `role`.
#[must_use]
pub fn default_source(role: Role) -> &'static str {
    match role {
        Role::Attacker => ATTACKER_SOURCE,
        Role::Defender => DEFENDER_SOURCE,
    }
}
