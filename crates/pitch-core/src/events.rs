//! Game events, state snapshots and the observer channel.
//!
//! The orchestrator owns one [`EventBus`]. During a tick it queues
//! [`GameEvent`]s; at the end of the tick the bus delivers them, in order, to
//! every subscribed [`SimulationObserver`], followed by one state update
//! carrying a [`SimulationSnapshot`]. Delivery is synchronous and happens only
//! at that point, so observers never see a half-finished tick.
//!
//! Events are also retained for polling with [`EventBus::take_events`], for
//! hosts that prefer not to register an observer.

use std::collections::VecDeque;

use glam::Vec2;
use serde::Serialize;

use crate::entity::{BallState, RobotId, RobotState, Team};
use crate::field::Side;
use crate::game::{GameState, Score};

/// Retained events kept for polling before the oldest are dropped.
const MAX_RETAINED_EVENTS: usize = 1024;

// ============================================================================
// Events
// ============================================================================

/// Something a host might want to react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// A goal was scored.
    Goal {
        /// Team credited.
        scoring_team: Team,
        /// Score after the goal.
        score: Score,
        /// Robot that last touched the ball, if known.
        last_touch: Option<RobotId>,
    },
    /// The ball left the field and was replaced.
    OutOfBounds {
        /// Side the ball crossed.
        side: Side,
        /// Neutral spot name.
        spot: String,
        /// Where the ball was placed.
        position: Vec2,
    },
    /// A kickoff countdown started.
    KickoffStart {
        /// Team kicking off.
        team: Team,
        /// Current half.
        half: u8,
    },
    /// Play (re)started after a kickoff or stoppage.
    PlayResumed,
    /// The first half ended.
    HalfTime {
        /// Score at the break.
        score: Score,
    },
    /// The match ended.
    GameEnd {
        /// Final score.
        score: Score,
        /// Winner, `None` on a draw.
        winner: Option<Team>,
    },
    /// The ball stalled and was moved to a neutral spot.
    LackOfProgress {
        /// Neutral spot name.
        spot: String,
        /// Where the ball was placed.
        position: Vec2,
    },
    /// A robot was taken out of play.
    RobotPenalized {
        /// The robot.
        robot: RobotId,
        /// Penalty length, ms.
        duration_ms: f32,
    },
    /// A robot came back into play.
    RobotReleased {
        /// The robot.
        robot: RobotId,
    },
}

impl GameEvent {
    /// The event's wire name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Goal { .. } => "goal",
            Self::OutOfBounds { .. } => "out_of_bounds",
            Self::KickoffStart { .. } => "kickoff_start",
            Self::PlayResumed => "play_resumed",
            Self::HalfTime { .. } => "half_time",
            Self::GameEnd { .. } => "game_end",
            Self::LackOfProgress { .. } => "lack_of_progress",
            Self::RobotPenalized { .. } => "robot_penalized",
            Self::RobotReleased { .. } => "robot_released",
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// One robot as seen by hosts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotSnapshot {
    /// Physical state.
    #[serde(flatten)]
    pub state: RobotState,
    /// Whether the robot's centre is inside a goal area.
    pub in_goal_area: bool,
    /// Strategy state label.
    pub strategy_state: Option<String>,
    /// Strategy target label.
    pub strategy_target: Option<String>,
    /// Last strategy error.
    pub error: Option<String>,
}

/// Complete read-only simulation state after a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSnapshot {
    /// Match state.
    pub game: GameState,
    /// Robots in canonical order.
    pub robots: Vec<RobotSnapshot>,
    /// The ball.
    pub ball: BallState,
    /// Total simulated time, ms.
    pub timestamp_ms: f64,
}

impl SimulationSnapshot {
    /// The snapshot of one robot.
    #[must_use]
    pub fn robot(&self, id: RobotId) -> Option<&RobotSnapshot> {
        self.robots.iter().find(|r| r.state.id == id)
    }
}

// ============================================================================
// Observers
// ============================================================================

/// Receives events and state updates from a simulation.
///
/// Both methods default to doing nothing.
pub trait SimulationObserver {
    /// Called once per queued event at the end of a tick.
    fn on_game_event(&mut self, _event: &GameEvent) {}

    /// Called once at the end of every tick, after the events.
    fn on_state_update(&mut self, _snapshot: &SimulationSnapshot) {}
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Queues events during a tick and delivers them at the end.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<(ObserverId, Box<dyn SimulationObserver>)>,
    next_id: u64,
    pending: Vec<GameEvent>,
    retained: VecDeque<GameEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .field("pending", &self.pending)
            .field("retained", &self.retained.len())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer.
    pub fn subscribe(&mut self, observer: Box<dyn SimulationObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Removes an observer. Returns whether it was subscribed.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    /// Whether anyone is listening.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    /// Queues an event for the end of the tick.
    pub fn emit(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    /// Events queued but not yet delivered.
    #[must_use]
    pub fn pending(&self) -> &[GameEvent] {
        &self.pending
    }

    /// Delivers queued events, then a state update with `snapshot` when one
    /// is given.
    pub fn flush(&mut self, snapshot: Option<&SimulationSnapshot>) {
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            for (_, observer) in &mut self.observers {
                observer.on_game_event(event);
            }
        }
        for event in events {
            if self.retained.len() == MAX_RETAINED_EVENTS {
                self.retained.pop_front();
            }
            self.retained.push_back(event);
        }
        if let Some(snapshot) = snapshot {
            for (_, observer) in &mut self.observers {
                observer.on_state_update(snapshot);
            }
        }
    }

    /// Drains delivered events for polling hosts.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        self.retained.drain(..).collect()
    }

    /// Drops queued and retained events. Observers stay subscribed.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.retained.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log(Rc<RefCell<Vec<String>>>);

    impl SimulationObserver for Log {
        fn on_game_event(&mut self, event: &GameEvent) {
            self.0.borrow_mut().push(event.name().to_string());
        }

        fn on_state_update(&mut self, snapshot: &SimulationSnapshot) {
            self.0
                .borrow_mut()
                .push(format!("state@{}", snapshot.timestamp_ms));
        }
    }

    fn snapshot() -> SimulationSnapshot {
        SimulationSnapshot {
            game: GameState::new(MatchMode::TwoTeam),
            robots: Vec::new(),
            ball: BallState::default(),
            timestamp_ms: 16.0,
        }
    }

    #[test]
    fn events_then_state_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(Log(Rc::clone(&log))));
        bus.emit(GameEvent::PlayResumed);
        bus.emit(GameEvent::HalfTime {
            score: Score::default(),
        });
        assert!(log.borrow().is_empty(), "nothing delivered before flush");
        bus.flush(Some(&snapshot()));
        assert_eq!(*log.borrow(), vec!["play_resumed", "half_time", "state@16"]);
    }

    #[test]
    fn events_are_retained_for_polling() {
        let mut bus = EventBus::new();
        bus.emit(GameEvent::PlayResumed);
        bus.flush(None);
        assert_eq!(bus.take_events(), vec![GameEvent::PlayResumed]);
        assert!(bus.take_events().is_empty());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let id = bus.subscribe(Box::new(Log(Rc::clone(&log))));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(GameEvent::PlayResumed);
        bus.flush(Some(&snapshot()));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn retained_queue_is_bounded() {
        let mut bus = EventBus::new();
        for _ in 0..(MAX_RETAINED_EVENTS + 10) {
            bus.emit(GameEvent::PlayResumed);
        }
        bus.flush(Some(&snapshot()));
        assert_eq!(bus.take_events().len(), MAX_RETAINED_EVENTS);
    }

    #[test]
    fn events_serialize_with_their_name() {
        let event = GameEvent::Goal {
            scoring_team: Team::Yellow,
            score: Score { blue: 0, yellow: 1 },
            last_touch: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "goal");
        assert_eq!(json["scoring_team"], "yellow");
        assert_eq!(json["score"]["yellow"], 1);
    }
}
