//! Authoritative match state and the phase machine.
//!
//! ```text
//! Setup ─▶ Kickoff ─▶ Playing ─┬─▶ OutOfBounds ─▶ Playing
//!             ▲                ├─▶ Goal ──────────▶ Kickoff
//!             │                ├─▶ HalfTime ──────▶ Kickoff (half 2)
//!             └────────────────┴─▶ Finished
//! ```
//!
//! Pausing is a flag, not a phase. Only the orchestrator mutates a
//! [`GameState`]; everyone else reads snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MatchMode;
use crate::entity::Team;

/// Match phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Before the first kickoff.
    #[default]
    Setup,
    /// Countdown before play starts or restarts from the centre.
    Kickoff,
    /// Ball in play.
    Playing,
    /// Ball left the field; countdown before play resumes.
    OutOfBounds,
    /// A goal was scored; countdown before the next kickoff.
    Goal,
    /// Break between halves.
    HalfTime,
    /// Match over.
    Finished,
}

impl GamePhase {
    /// Whether the machine may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: GamePhase) -> bool {
        use GamePhase::{Finished, Goal, HalfTime, Kickoff, OutOfBounds, Playing, Setup};
        matches!(
            (self, next),
            (Setup | Goal | HalfTime, Kickoff)
                | (Kickoff | OutOfBounds, Playing)
                | (Playing, OutOfBounds | Goal | HalfTime | Finished)
        )
    }

    /// Whether a countdown governs this phase.
    #[must_use]
    pub fn has_countdown(self) -> bool {
        matches!(
            self,
            Self::Kickoff | Self::OutOfBounds | Self::Goal | Self::HalfTime
        )
    }

    /// Snake-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Kickoff => "kickoff",
            Self::Playing => "playing",
            Self::OutOfBounds => "out_of_bounds",
            Self::Goal => "goal",
            Self::HalfTime => "half_time",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Goals per team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    /// Blue goals.
    pub blue: u32,
    /// Yellow goals.
    pub yellow: u32,
}

impl Score {
    /// Goals for `team`.
    #[must_use]
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Blue => self.blue,
            Team::Yellow => self.yellow,
        }
    }

    /// Adds a goal for `team`.
    pub fn increment(&mut self, team: Team) {
        match team {
            Team::Blue => self.blue += 1,
            Team::Yellow => self.yellow += 1,
        }
    }

    /// The leading team, `None` on a draw.
    #[must_use]
    pub fn leader(&self) -> Option<Team> {
        match self.blue.cmp(&self.yellow) {
            std::cmp::Ordering::Greater => Some(Team::Blue),
            std::cmp::Ordering::Less => Some(Team::Yellow),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.blue, self.yellow)
    }
}

/// The match state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Match mode.
    pub mode: MatchMode,
    /// Current phase.
    pub phase: GamePhase,
    /// Score.
    pub score: Score,
    /// Playing time elapsed in the current half, ms.
    pub elapsed_ms: f64,
    /// 1 or 2.
    pub half: u8,
    /// Remaining time in the current countdown phase, ms. Never negative.
    pub countdown_ms: f32,
    /// Team that last touched the ball.
    pub last_touch: Option<Team>,
    /// Team taking the current or next kickoff.
    pub kickoff_team: Team,
    /// True from the start of a kickoff until the ball is first touched.
    pub kickoff_pending: bool,
    /// Suspended by the host.
    pub paused: bool,
}

impl GameState {
    /// A fresh match in [`GamePhase::Setup`].
    #[must_use]
    pub fn new(mode: MatchMode) -> Self {
        Self {
            mode,
            phase: GamePhase::Setup,
            score: Score::default(),
            elapsed_ms: 0.0,
            half: 1,
            countdown_ms: 0.0,
            last_touch: None,
            kickoff_team: Team::Blue,
            kickoff_pending: false,
            paused: false,
        }
    }

    /// Moves to `next` if the machine allows it.
    ///
    /// # Returns
    ///
    /// Whether the transition happened.
    pub(crate) fn transition(&mut self, next: GamePhase) -> bool {
        if !self.phase.can_transition_to(next) {
            tracing::warn!(from = %self.phase, to = %next, "rejected phase transition");
            return false;
        }
        tracing::info!(from = %self.phase, to = %next, "phase change");
        self.phase = next;
        true
    }

    /// Runs the countdown down by `dt_ms`, clamping at zero.
    ///
    /// # Returns
    ///
    /// True when the countdown has expired.
    pub(crate) fn count_down(&mut self, dt_ms: f32) -> bool {
        self.countdown_ms = (self.countdown_ms - dt_ms).max(0.0);
        self.countdown_ms <= 0.0
    }
}
