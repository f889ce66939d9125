use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec2;
use pitch_core::config::{MatchConfig, MatchMode, RulesConfig, SimConfig};
use pitch_core::entity::{RobotId, Team};
use pitch_core::observation::ObservationSystem;
use pitch_core::physics::PhysicsWorld;
use pitch_core::strategy::native::RandomStrategy;
use pitch_core::strategy::Action;
use pitch_core::Simulation;

fn playing(config: SimConfig) -> Simulation {
    let mut sim = Simulation::new(config, MatchConfig::new(MatchMode::TwoTeam))
        .expect("default config is valid");
    sim.start();
    // Out of the kickoff countdown
    sim.run_for(3_100.0, 16.0);
    sim
}

fn bench_scripted_tick(c: &mut Criterion) {
    let mut sim = playing(SimConfig::default());

    c.bench_function("scripted_tick", |b| {
        b.iter(|| {
            if sim.is_finished() {
                sim.reset();
            }
            sim.step(black_box(16.0));
        })
    });
}

fn bench_native_tick(c: &mut Criterion) {
    let mut sim = playing(SimConfig::default());
    for id in sim.physics().robot_ids() {
        let seed = sim.executor_mut().seed_for(id);
        sim.executor_mut()
            .install_strategy(id, Box::new(RandomStrategy::new(seed)));
    }

    c.bench_function("native_tick", |b| {
        b.iter(|| {
            if sim.is_finished() {
                sim.reset();
            }
            sim.step(black_box(16.0));
        })
    });
}

fn bench_physics_step(c: &mut Criterion) {
    let config = SimConfig::default();
    let mut world = PhysicsWorld::new(config.physics.clone(), &RulesConfig::default());
    for (i, id) in RobotId::ALL.into_iter().enumerate() {
        let x = (i as f32 - 1.5) * 25.0;
        world
            .create_robot(id, Vec2::new(x, -id.team.attack_sign() * 40.0), 0.0)
            .expect("fresh world");
        world
            .apply_action(id, &Action::new([0.6, -0.4, -0.6, 0.4], false))
            .expect("robot exists");
    }
    world.set_ball_position(Vec2::new(5.0, 3.0)).expect("finite");

    c.bench_function("physics_step", |b| {
        b.iter(|| {
            world.step(black_box(16.0));
            black_box(world.take_events());
        })
    });
}

fn bench_observe(c: &mut Criterion) {
    let config = SimConfig::default();
    let mut world = PhysicsWorld::new(config.physics.clone(), &config.rules);
    let id = RobotId::new(Team::Blue, pitch_core::Role::Attacker);
    world.create_robot(id, Vec2::new(20.0, -50.0), 1.0).expect("fresh world");
    let mut sensors = ObservationSystem::new(config.sensors.clone());
    let robot = world.robot(id).cloned().expect("robot exists");
    sensors.register(&robot);
    let ball = world.ball();

    c.bench_function("observe", |b| {
        b.iter(|| black_box(sensors.observe(&robot, &ball, Default::default())))
    });
}

criterion_group!(
    benches,
    bench_scripted_tick,
    bench_native_tick,
    bench_physics_step,
    bench_observe
);
criterion_main!(benches);
