//! Lack-of-progress rule and ball-placement helpers.
//!
//! The [`Referee`] watches the ball. If it stays within a small radius of
//! where it settled for longer than the configured duration, `update` reports
//! a [`RefereeEvent::LackOfProgress`] and starts counting again. The spot
//! helpers are pure functions over the static [`NEUTRAL_SPOTS`] table.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RulesConfig;
use crate::entity::BallState;
use crate::field::{self, NeutralSpot, Side, NEUTRAL_SPOTS};

/// Something the referee decided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefereeEvent {
    /// The ball has not moved enough for too long.
    LackOfProgress {
        /// Where the ball was.
        position: Vec2,
        /// How long it stalled, ms.
        stalled_ms: f32,
    },
}

/// Lack-of-progress tracker.
#[derive(Debug, Clone)]
pub struct Referee {
    duration_ms: f32,
    threshold: f32,
    stalled_ms: f32,
    anchor: Option<Vec2>,
}

impl Referee {
    /// Creates a referee with the rule timings from `rules`.
    #[must_use]
    pub fn new(rules: &RulesConfig) -> Self {
        Self {
            duration_ms: rules.lack_of_progress_ms,
            threshold: rules.lack_of_progress_threshold,
            stalled_ms: 0.0,
            anchor: None,
        }
    }

    /// Time the ball has currently been stalled, ms.
    #[must_use]
    pub fn stalled_ms(&self) -> f32 {
        self.stalled_ms
    }

    /// Advances the stall timer.
    ///
    /// Movement beyond the threshold since the ball settled restarts the
    /// timer. Once the timer exceeds the rule duration the event fires and the
    /// timer restarts from the current position.
    pub fn update(&mut self, dt_ms: f32, ball: &BallState) -> Option<RefereeEvent> {
        let position = ball.position;
        let Some(anchor) = self.anchor else {
            self.anchor = Some(position);
            self.stalled_ms = 0.0;
            return None;
        };

        if position.distance(anchor) > self.threshold {
            self.anchor = Some(position);
            self.stalled_ms = 0.0;
            return None;
        }

        self.stalled_ms += dt_ms.max(0.0);
        if self.stalled_ms <= self.duration_ms {
            return None;
        }

        let stalled_ms = self.stalled_ms;
        debug!(x = position.x, y = position.y, stalled_ms, "lack of progress");
        self.anchor = Some(position);
        self.stalled_ms = 0.0;
        Some(RefereeEvent::LackOfProgress {
            position,
            stalled_ms,
        })
    }

    /// Clears the stall timer.
    pub fn reset(&mut self) {
        self.stalled_ms = 0.0;
        self.anchor = None;
    }
}

// ============================================================================
// Spot helpers
// ============================================================================

/// Neutral spot used after the ball leaves over `side`.
///
/// Filters the spot table to the half of the field on that side (keeping
/// table order) and picks the element at index `n / 2`. Falls back to the
/// centre spot when nothing matches.
///
/// # Example
///
/// ```
/// use pitch_core::field::Side;
/// use pitch_core::referee::find_nearest_neutral_spot;
///
/// let spot = find_nearest_neutral_spot(Side::Left);
/// assert!(spot.position.x < 0.0);
/// ```
#[must_use]
pub fn find_nearest_neutral_spot(side: Side) -> NeutralSpot {
    let candidates: Vec<NeutralSpot> = NEUTRAL_SPOTS
        .iter()
        .copied()
        .filter(|spot| side.contains(spot.position))
        .collect();
    candidates
        .get(candidates.len() / 2)
        .copied()
        .unwrap_or(NEUTRAL_SPOTS[0])
}

/// Spot closest to `position`. Ties keep table order.
#[must_use]
pub fn find_nearest_neutral_spot_to_position(position: Vec2) -> NeutralSpot {
    let mut best = NEUTRAL_SPOTS[0];
    for spot in &NEUTRAL_SPOTS[1..] {
        if spot.position.distance_squared(position) < best.position.distance_squared(position) {
            best = *spot;
        }
    }
    best
}

/// Spot furthest from `position`. Ties keep table order.
#[must_use]
pub fn find_furthest_neutral_spot_from(position: Vec2) -> NeutralSpot {
    let mut best = NEUTRAL_SPOTS[0];
    for spot in &NEUTRAL_SPOTS[1..] {
        if spot.position.distance_squared(position) > best.position.distance_squared(position) {
            best = *spot;
        }
    }
    best
}

/// True if `position` is finite and within the field lines.
#[must_use]
pub fn is_valid_position(position: Vec2) -> bool {
    position.is_finite() && field::inside_lines(position, 0.0)
}
