//! Same inputs, same match.

use super::helpers::*;
use crate::config::{MatchConfig, MatchMode, SimConfig};
use crate::simulation::Simulation;
use crate::strategy::native::RandomStrategy;

fn scripted(seed: u64) -> Simulation {
    let config = SimConfig {
        seed,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(config, MatchConfig::new(MatchMode::TwoTeam)).unwrap();
    sim.start();
    sim
}

fn random(seed: u64) -> Simulation {
    let mut sim = scripted(seed);
    for id in sim.physics().robot_ids() {
        let robot_seed = sim.executor_mut().seed_for(id);
        sim.executor_mut()
            .install_strategy(id, Box::new(RandomStrategy::new(robot_seed)));
    }
    sim
}

#[test]
fn default_strategies_replay_identically() {
    let mut a = scripted(42);
    let mut b = scripted(42);
    for _ in 0..1_500 {
        a.step(FRAME_MS);
        b.step(FRAME_MS);
    }
    assert_eq!(a.snapshot(), b.snapshot());
    assert_eq!(a.take_events(), b.take_events());
}

#[test]
fn random_strategies_replay_identically() {
    let mut a = random(7);
    let mut b = random(7);
    for _ in 0..1_000 {
        a.step(FRAME_MS);
        b.step(FRAME_MS);
        assert_eq!(a.ball(), b.ball());
    }
    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn seed_changes_random_play() {
    let mut a = random(1);
    let mut b = random(2);
    a.run_for(8_000.0, FRAME_MS);
    b.run_for(8_000.0, FRAME_MS);
    let moved = a
        .physics()
        .robots()
        .zip(b.physics().robots())
        .any(|(ra, rb)| ra.position != rb.position);
    assert!(moved);
}

#[test]
fn reset_replays_from_the_start() {
    let mut sim = scripted(3);
    sim.run_for(6_000.0, FRAME_MS);
    let first = sim.snapshot();

    sim.run_for(4_000.0, FRAME_MS);
    sim.reset();
    sim.run_for(6_000.0, FRAME_MS);
    let second = sim.snapshot();

    assert_eq!(first.robots, second.robots);
    assert_eq!(first.ball, second.ball);
    assert_eq!(first.game.score, second.game.score);
}
