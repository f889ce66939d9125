//! End-to-end match flow: kickoff, goals, stoppages and penalties.

use std::f32::consts::FRAC_PI_2;

use glam::Vec2;

use super::helpers::*;
use crate::config::{MatchConfig, MatchMode, SimConfig};
use crate::entity::Team;
use crate::events::GameEvent;
use crate::field;
use crate::game::GamePhase;
use crate::simulation::{start_pose, Simulation};
use crate::strategy::Action;

mod kickoff_tests {
    use super::*;

    #[test]
    fn nothing_moves_during_the_countdown() {
        let mut sim = started(SimConfig::default(), MatchMode::TwoTeam);
        let countdown = sim.config().rules.kickoff_countdown_ms;
        let before = sim.snapshot();

        let mut last = sim.game().countdown_ms;
        let mut elapsed = 0.0;
        while elapsed + FRAME_MS < countdown {
            sim.step(FRAME_MS);
            elapsed += FRAME_MS;
            assert_eq!(sim.game().phase, GamePhase::Kickoff);
            assert!(sim.game().countdown_ms < last);
            last = sim.game().countdown_ms;
        }

        for (now, then) in sim.snapshot().robots.iter().zip(&before.robots) {
            assert_eq!(now.state.position, then.state.position);
        }
        assert_eq!(sim.ball().position, Vec2::ZERO);
        assert_eq!(sim.game().elapsed_ms, 0.0);
    }

    #[test]
    fn countdown_expiry_starts_play() {
        let mut sim = started(SimConfig::default(), MatchMode::TwoTeam);
        let events = sim.take_events();
        assert_eq!(
            events,
            vec![GameEvent::KickoffStart {
                team: Team::Blue,
                half: 1
            }]
        );

        into_play(&mut sim);
        assert!(sim.game().countdown_ms.abs() < f32::EPSILON);
        assert_eq!(count(&sim.take_events(), "play_resumed"), 1);
    }

    #[test]
    fn robots_start_on_their_own_halves() {
        let sim = started(SimConfig::default(), MatchMode::TwoTeam);
        for robot in sim.physics().robots() {
            let own_half = -robot.team().attack_sign() * robot.position.y;
            assert!(own_half > 0.0, "{} starts in the wrong half", robot.id);
            let (pose, _) = start_pose(robot.id, Team::Blue);
            assert_eq!(robot.position, pose);
        }
    }
}

mod goal_tests {
    use super::*;

    /// Lines the blue attacker up in front of the yellow goal with the ball
    /// at its feet and everyone else out of the way.
    fn shot_on_goal() -> Simulation {
        let mut sim = started(SimConfig::default(), MatchMode::SingleBotAttacker);
        idle_everyone(&mut sim);
        into_play(&mut sim);
        sim.set_robot_position(yellow_defender(), Vec2::new(50.0, 0.0), None)
            .unwrap();
        sim.set_robot_position(blue_attacker(), Vec2::new(0.0, 62.0), Some(FRAC_PI_2))
            .unwrap();
        sim.set_ball_position(Vec2::new(0.0, 75.0)).unwrap();
        drive_fixed(&mut sim, blue_attacker(), Action::new(forward(0.5), true));
        sim.take_events();
        sim
    }

    #[test]
    fn goal_scores_exactly_once() {
        let mut sim = shot_on_goal();
        step_until(&mut sim, GamePhase::Goal, 100);

        // Ball sits in the net through the whole celebration.
        for _ in 0..50 {
            sim.step(FRAME_MS);
        }
        assert_eq!(sim.game().phase, GamePhase::Goal);
        assert_eq!(sim.game().score.blue, 1);
        assert_eq!(sim.game().score.yellow, 0);

        let events = sim.take_events();
        assert_eq!(count(&events, "goal"), 1);
        let Some(GameEvent::Goal {
            scoring_team,
            last_touch,
            ..
        }) = events.iter().find(|e| e.name() == "goal")
        else {
            panic!("no goal event");
        };
        assert_eq!(*scoring_team, Team::Blue);
        assert_eq!(*last_touch, Some(blue_attacker()));
    }

    #[test]
    fn conceding_team_kicks_off_next() {
        let mut sim = shot_on_goal();
        step_until(&mut sim, GamePhase::Goal, 100);
        step_until(&mut sim, GamePhase::Kickoff, 1_000);

        assert_eq!(sim.game().kickoff_team, Team::Yellow);
        assert!(sim.game().kickoff_pending);
        assert_eq!(sim.ball().position, Vec2::ZERO);
        let (pose, _) = start_pose(blue_attacker(), Team::Yellow);
        assert_eq!(sim.robot(blue_attacker()).unwrap().position, pose);
    }
}

mod stoppage_tests {
    use super::*;

    #[test]
    fn ball_out_goes_to_a_neutral_spot_on_that_side() {
        let mut sim = started(SimConfig::default(), MatchMode::TwoTeam);
        idle_everyone(&mut sim);
        into_play(&mut sim);
        sim.take_events();

        sim.set_ball_position(Vec2::new(70.0, 0.0)).unwrap();
        step_until(&mut sim, GamePhase::OutOfBounds, 500);

        let events = sim.take_events();
        let Some(GameEvent::OutOfBounds { side, position, .. }) =
            events.iter().find(|e| e.name() == "out_of_bounds")
        else {
            panic!("no out-of-bounds event");
        };
        assert_eq!(*side, field::Side::Right);
        assert!(position.x > 0.0);
        assert_eq!(sim.ball().position, *position);
        assert!(sim.physics().robots_in_goal_area().is_empty());
        let clearance = sim.config().rules.neutral_spot_clearance;
        for robot in sim.physics().robots() {
            assert!(
                robot.position.distance(*position) >= clearance - 1e-3,
                "{} too close to the spot",
                robot.id
            );
        }
        assert!(!sim.physics().out_of_bounds_enabled());

        step_until(&mut sim, GamePhase::Playing, 500);
        assert!(sim.physics().out_of_bounds_enabled());
        assert!(sim.physics().out_of_bounds_timer_ms() <= FRAME_MS);
        assert_eq!(count(&sim.take_events(), "play_resumed"), 1);

        // Detection is live again once the debounce interval has passed.
        sim.set_ball_position(Vec2::new(-70.0, 0.0)).unwrap();
        step_until(&mut sim, GamePhase::OutOfBounds, 500);
        let Some(GameEvent::OutOfBounds { side, .. }) = sim
            .take_events()
            .into_iter()
            .find(|e| e.name() == "out_of_bounds")
        else {
            panic!("no second out-of-bounds event");
        };
        assert_eq!(side, field::Side::Left);
    }

    #[test]
    fn ball_in_the_goal_mouth_is_not_out() {
        let mut config = SimConfig::default();
        config.rules.out_of_bounds_debounce_ms = 0.0;
        let mut sim = started(config, MatchMode::TwoTeam);
        idle_everyone(&mut sim);
        into_play(&mut sim);

        // Past the line but not deep enough to count as a goal.
        sim.set_ball_position(Vec2::new(0.0, 92.5)).unwrap();
        for _ in 0..20 {
            sim.step(FRAME_MS);
        }
        assert_eq!(sim.game().phase, GamePhase::Playing);
    }

    #[test]
    fn stalled_ball_is_moved() {
        let mut config = SimConfig::default();
        config.rules.lack_of_progress_ms = 1_000.0;
        let mut sim = started(config, MatchMode::TwoTeam);
        idle_everyone(&mut sim);
        into_play(&mut sim);
        sim.take_events();

        sim.set_ball_position(Vec2::new(10.0, -40.0)).unwrap();
        for _ in 0..100 {
            sim.step(FRAME_MS);
        }

        let events = sim.take_events();
        assert_eq!(
            events.first(),
            Some(&GameEvent::LackOfProgress {
                spot: "blue_right".into(),
                position: Vec2::new(31.0, -45.5),
            })
        );
        assert_eq!(sim.ball().position, Vec2::new(31.0, -45.5));
        for robot in sim.physics().robots() {
            let clearance = robot.position.distance(sim.ball().position);
            assert!(clearance >= sim.config().rules.neutral_spot_clearance - 1e-3);
        }
    }
}

mod penalty_tests {
    use super::*;

    #[test]
    fn robot_leaving_the_field_sits_out() {
        let mut config = SimConfig::default();
        config.rules.robot_out_penalty_ms = 500.0;
        let mut sim = started(config, MatchMode::TwoTeam);
        idle_everyone(&mut sim);
        into_play(&mut sim);
        sim.take_events();

        sim.set_robot_position(blue_defender(), Vec2::new(66.0, 0.0), None)
            .unwrap();
        sim.step(FRAME_MS);
        let robot = sim.robot(blue_defender()).unwrap();
        assert!(robot.penalized);
        assert!(!sim.physics().is_robot_enabled(blue_defender()));
        assert_eq!(count(&sim.take_events(), "robot_penalized"), 1);

        for _ in 0..40 {
            sim.step(FRAME_MS);
        }
        let robot = sim.robot(blue_defender()).unwrap();
        assert!(!robot.penalized);
        assert!(field::inside_lines(robot.position, 0.0));
        assert!(field::NEUTRAL_SPOTS
            .iter()
            .any(|spot| spot.position == robot.position));
        assert_eq!(count(&sim.take_events(), "robot_released"), 1);
    }

    #[test]
    fn manual_penalty_and_release() {
        let mut sim = started(SimConfig::default(), MatchMode::TwoTeam);
        sim.penalize_robot(yellow_attacker(), 60_000.0).unwrap();
        assert!(sim.robot(yellow_attacker()).unwrap().penalized);

        sim.release_robot(yellow_attacker()).unwrap();
        assert!(!sim.robot(yellow_attacker()).unwrap().penalized);
        assert!(sim.physics().is_robot_enabled(yellow_attacker()));

        let events = sim.take_events();
        assert_eq!(count(&events, "robot_penalized"), 1);
        assert_eq!(count(&events, "robot_released"), 1);
    }

    #[test]
    fn kickoff_clears_penalties() {
        let mut sim = started(SimConfig::default(), MatchMode::TwoTeam);
        sim.penalize_robot(blue_attacker(), 60_000.0).unwrap();
        sim.reset();
        assert!(!sim.robot(blue_attacker()).unwrap().penalized);
        assert!(sim.physics().is_robot_enabled(blue_attacker()));
    }
}

mod strategy_tests {
    use super::*;

    #[test]
    fn throwing_strategy_never_stops_the_match() {
        let match_config = MatchConfig::new(MatchMode::TwoTeam)
            .with_strategy(blue_attacker(), "function strategy(ws) { throw new_error; }");
        let mut sim = Simulation::new(SimConfig::default(), match_config).unwrap();
        sim.start();

        let ticks = sim.run_for(8_000.0, FRAME_MS);
        assert!(ticks >= 490);
        assert!(sim.is_running());
        assert!(sim.strategy_error(blue_attacker()).unwrap().contains("not defined"));
        assert!(sim.strategy_error(yellow_attacker()).is_none());
        assert!(sim.snapshot().robot(yellow_attacker()).unwrap().strategy_state.is_some());
    }

    #[test]
    fn compile_error_leaves_robot_idle() {
        let match_config = MatchConfig::new(MatchMode::SingleBotAttacker)
            .with_strategy(blue_attacker(), "function strategy( {");
        let mut sim = Simulation::new(SimConfig::default(), match_config).unwrap();
        assert!(sim.strategy_error(blue_attacker()).unwrap().contains("syntax"));

        sim.start();
        into_play(&mut sim);
        sim.step(FRAME_MS);
        assert_eq!(sim.robot(blue_attacker()).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn hot_reload_keeps_the_old_strategy_on_failure() {
        let mut sim = started(SimConfig::default(), MatchMode::TwoTeam);
        let good = "function strategy(ws) { currentState = 'hold'; return {}; }";
        assert!(sim.update_strategy(blue_attacker(), good).unwrap());
        assert!(!sim.update_strategy(blue_attacker(), "function (").unwrap());
        assert_eq!(sim.match_config().user_source(blue_attacker()), Some(good));

        into_play(&mut sim);
        sim.step(FRAME_MS);
        let snapshot = sim.snapshot();
        let robot = snapshot.robot(blue_attacker()).unwrap();
        assert_eq!(robot.strategy_state.as_deref(), Some("hold"));
        assert!(robot.error.is_none());
    }

    #[test]
    fn opponents_in_single_modes_ignore_user_code() {
        let match_config = MatchConfig::new(MatchMode::SingleBotAttacker).with_strategy(
            yellow_defender(),
            "function strategy(ws) { currentState = 'user'; return {}; }",
        );
        let mut sim = Simulation::new(SimConfig::default(), match_config).unwrap();
        sim.start();
        into_play(&mut sim);
        sim.step(FRAME_MS);
        let snapshot = sim.snapshot();
        assert_ne!(
            snapshot.robot(yellow_defender()).unwrap().strategy_state.as_deref(),
            Some("user")
        );
    }
}

mod match_tests {
    use super::*;

    fn short_match() -> SimConfig {
        let mut config = SimConfig::default();
        config.rules.half_duration_ms = 2_000.0;
        config.rules.kickoff_countdown_ms = 100.0;
        config.rules.goal_delay_ms = 100.0;
        config.rules.half_time_ms = 200.0;
        config
    }

    #[test]
    fn two_halves_then_finished() {
        let mut sim = Simulation::new(short_match(), MatchConfig::new(MatchMode::SingleTeam)).unwrap();
        let recorder = Recorder::default();
        sim.subscribe(Box::new(recorder.clone()));
        sim.start();

        sim.run_for(120_000.0, FRAME_MS);
        assert!(sim.is_finished());
        assert!(!sim.step(FRAME_MS));
        assert_eq!(sim.game().half, 2);

        let events = recorder.events.borrow();
        assert_eq!(count(&events, "half_time"), 1);
        assert_eq!(count(&events, "game_end"), 1);
        assert!(count(&events, "kickoff_start") >= 2);
        assert_eq!(events.last().map(GameEvent::name), Some("game_end"));

        let Some(GameEvent::GameEnd { score, winner }) = events.last() else {
            panic!("match did not end");
        };
        assert_eq!(*score, sim.game().score);
        assert_eq!(*winner, score.leader());
    }

    #[test]
    fn observers_get_one_update_per_tick() {
        let mut sim = Simulation::new(SimConfig::default(), MatchConfig::default()).unwrap();
        let recorder = Recorder::default();
        let id = sim.subscribe(Box::new(recorder.clone()));
        sim.start();
        let after_start = recorder.updates.borrow().len();

        for _ in 0..10 {
            sim.step(FRAME_MS);
        }
        assert_eq!(recorder.updates.borrow().len(), after_start + 10);
        let last = recorder.updates.borrow().last().cloned().unwrap();
        assert_eq!(last.timestamp_ms, sim.time_ms());

        assert!(sim.unsubscribe(id));
        sim.step(FRAME_MS);
        assert_eq!(recorder.updates.borrow().len(), after_start + 10);
    }

    #[test]
    fn pause_freezes_everything() {
        let mut sim = started(SimConfig::default(), MatchMode::TwoTeam);
        into_play(&mut sim);
        sim.run_for(1_000.0, FRAME_MS);
        sim.pause();
        let before = sim.snapshot();
        for _ in 0..20 {
            assert!(!sim.step(FRAME_MS));
        }
        assert_eq!(sim.snapshot(), before);
    }

    #[test]
    fn speed_multiplier_scales_game_time() {
        let mut sim = started(SimConfig::default(), MatchMode::TwoTeam);
        into_play(&mut sim);
        let start = sim.game().elapsed_ms;
        sim.set_speed(2.0);
        for _ in 0..10 {
            sim.step(10.0);
        }
        assert!((sim.game().elapsed_ms - start - 200.0).abs() < 1e-6);
    }

    #[test]
    fn reset_restores_kickoff() {
        let mut sim = started(SimConfig::default(), MatchMode::TwoTeam);
        sim.run_for(10_000.0, FRAME_MS);
        sim.reset();
        assert_eq!(sim.game().phase, GamePhase::Kickoff);
        assert_eq!(sim.game().score.blue + sim.game().score.yellow, 0);
        assert_eq!(sim.game().elapsed_ms, 0.0);
        assert_eq!(sim.ball().position, Vec2::ZERO);
        assert!(sim.is_running());
    }

    #[test]
    fn reset_positions_keeps_the_score() {
        let mut sim = started(SimConfig::default(), MatchMode::TwoTeam);
        into_play(&mut sim);
        sim.run_for(500.0, FRAME_MS);
        let game = sim.game().clone();
        sim.reset_positions();
        assert_eq!(sim.game(), &game);
        assert_eq!(sim.ball().position, Vec2::ZERO);
    }
}
