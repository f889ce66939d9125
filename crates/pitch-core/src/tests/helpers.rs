//! Shared fixtures for the whole-kernel tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::{MatchConfig, MatchMode, SimConfig};
use crate::entity::{Role, RobotId, Team};
use crate::events::{GameEvent, SimulationObserver, SimulationSnapshot};
use crate::game::GamePhase;
use crate::observation::WorldState;
use crate::simulation::Simulation;
use crate::strategy::native::FnStrategy;
use crate::strategy::{create_default_action, Action, Decision};

/// Frame length used by most tests, ms.
pub const FRAME_MS: f32 = 16.0;

pub fn blue_attacker() -> RobotId {
    RobotId::new(Team::Blue, Role::Attacker)
}

pub fn blue_defender() -> RobotId {
    RobotId::new(Team::Blue, Role::Defender)
}

pub fn yellow_attacker() -> RobotId {
    RobotId::new(Team::Yellow, Role::Attacker)
}

pub fn yellow_defender() -> RobotId {
    RobotId::new(Team::Yellow, Role::Defender)
}

/// Motors for straight-ahead travel at `speed`.
pub fn forward(speed: f32) -> [f32; 4] {
    [speed, -speed, -speed, speed]
}

/// A started simulation with the given config and mode.
pub fn started(config: SimConfig, mode: MatchMode) -> Simulation {
    let mut sim = Simulation::new(config, MatchConfig::new(mode)).unwrap();
    sim.start();
    sim
}

/// Replaces every robot's strategy with one that does nothing.
pub fn idle_everyone(sim: &mut Simulation) {
    for id in sim.physics().robot_ids() {
        sim.executor_mut().install_strategy(
            id,
            Box::new(FnStrategy::new("idle", |_ws: &WorldState| {
                Ok(Decision::from(create_default_action()))
            })),
        );
    }
}

/// Drives `id` with a fixed action every tick.
pub fn drive_fixed(sim: &mut Simulation, id: RobotId, action: Action) {
    sim.executor_mut().install_strategy(
        id,
        Box::new(FnStrategy::new("fixed", move |_ws: &WorldState| {
            Ok(Decision::from(action))
        })),
    );
}

/// Steps until `phase` is reached, failing after `max_ticks`.
pub fn step_until(sim: &mut Simulation, phase: GamePhase, max_ticks: u32) {
    for _ in 0..max_ticks {
        if sim.game().phase == phase {
            return;
        }
        sim.step(FRAME_MS);
    }
    assert_eq!(sim.game().phase, phase, "phase not reached in {max_ticks} ticks");
}

/// Runs the kickoff countdown out so the ball is in play.
pub fn into_play(sim: &mut Simulation) {
    step_until(sim, GamePhase::Playing, 1_000);
}

/// Counts events of the given wire name.
pub fn count(events: &[GameEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

/// Records everything an observer is told.
#[derive(Default, Clone)]
pub struct Recorder {
    pub events: Rc<RefCell<Vec<GameEvent>>>,
    pub updates: Rc<RefCell<Vec<SimulationSnapshot>>>,
}

impl SimulationObserver for Recorder {
    fn on_game_event(&mut self, event: &GameEvent) {
        self.events.borrow_mut().push(event.clone());
    }

    fn on_state_update(&mut self, snapshot: &SimulationSnapshot) {
        self.updates.borrow_mut().push(snapshot.clone());
    }
}
