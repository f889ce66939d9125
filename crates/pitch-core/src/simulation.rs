//! The match orchestrator.
//!
//! [`Simulation`] owns every subsystem and is the only writer of the
//! [`GameState`]. The host drives it by calling [`Simulation::step`] once per
//! frame with the frame's wall time; everything inside a step runs to
//! completion before it returns.
//!
//! # Tick order (while playing)
//!
//! 1. **OBSERVE**: every active robot's [`WorldState`](crate::observation::WorldState)
//!    is built from the same pre-tick ground truth
//! 2. **DECIDE**: each robot's strategy runs; faults become the zero action
//! 3. **ACT**: all actions are applied to the physics engine together
//! 4. **STEP**: physics advances in substeps no longer than the step ceiling
//! 5. **RULES**: goals, out-of-bounds, lack of progress, robot penalties and
//!    the half clock are checked
//! 6. **PUBLISH**: queued events and one snapshot go to observers
//!
//! Because actions are collected before the physics step, the order robots
//! are visited in cannot bias the outcome.
//!
//! # Example
//!
//! ```
//! use pitch_core::config::{MatchConfig, MatchMode, SimConfig};
//! use pitch_core::game::GamePhase;
//! use pitch_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(SimConfig::default(), MatchConfig::new(MatchMode::TwoTeam))?;
//! sim.start();
//! assert_eq!(sim.game().phase, GamePhase::Kickoff);
//!
//! // Three seconds of 20 ms frames end the kickoff countdown.
//! for _ in 0..150 {
//!     sim.step(20.0);
//! }
//! assert_eq!(sim.game().phase, GamePhase::Playing);
//! # Ok::<(), pitch_core::error::KernelError>(())
//! ```

use std::f32::consts::FRAC_PI_2;
use std::fmt;

use glam::Vec2;
use tracing::{debug, info, trace, warn};

use crate::config::{MatchConfig, SimConfig};
use crate::entity::{BallState, Role, RobotId, RobotState, Team};
use crate::error::{KernelError, KernelResult};
use crate::events::{
    EventBus, GameEvent, ObserverId, RobotSnapshot, SimulationObserver, SimulationSnapshot,
};
use crate::field::{self, Side};
use crate::game::{GamePhase, GameState};
use crate::observation::{ObservationContext, ObservationSystem};
use crate::physics::{PhysicsEvent, PhysicsWorld};
use crate::referee::{self, Referee, RefereeEvent};
use crate::strategy::{defaults, Action, StrategyExecutor};

/// Distance from the centre spot of the attacker taking the kickoff.
const KICKOFF_ATTACKER_DISTANCE: f32 = 30.0;

/// Distance from the centre spot of the other attacker, clear of the circle.
const WAITING_ATTACKER_DISTANCE: f32 = 45.0;

/// Distance from the centre line of each defender.
const DEFENDER_DISTANCE: f32 = 60.0;

// ============================================================================
// Simulation
// ============================================================================

/// A complete match.
pub struct Simulation {
    config: SimConfig,
    match_config: MatchConfig,
    physics: PhysicsWorld,
    observation: ObservationSystem,
    referee: Referee,
    executor: StrategyExecutor,
    game: GameState,
    bus: EventBus,
    started: bool,
    speed: f32,
    time_ms: f64,
    ticks: u64,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("game", &self.game)
            .field("started", &self.started)
            .field("speed", &self.speed)
            .field("time_ms", &self.time_ms)
            .field("ticks", &self.ticks)
            .field("executor", &self.executor)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Builds a match in [`GamePhase::Setup`] with robots at their starting
    /// positions and every strategy loaded.
    ///
    /// Robots without a user source, and opponents in the single-sided modes,
    /// run the bundled strategy for their role. A user source that fails to
    /// compile leaves its robot without a strategy (it stands still) and the
    /// error is available from [`Simulation::strategy_error`].
    ///
    /// # Arguments
    ///
    /// * `config` - Kernel tunables; validated here
    /// * `match_config` - Mode and strategy sources
    ///
    /// # Errors
    ///
    /// [`KernelError::Config`] if `config` fails validation.
    pub fn new(config: SimConfig, match_config: MatchConfig) -> KernelResult<Self> {
        config.validate()?;
        let mut sim = Self {
            physics: PhysicsWorld::new(config.physics.clone(), &config.rules),
            observation: ObservationSystem::new(config.sensors.clone()),
            referee: Referee::new(&config.rules),
            executor: StrategyExecutor::new(config.script.clone(), config.seed),
            game: GameState::new(match_config.mode),
            bus: EventBus::new(),
            started: false,
            speed: 1.0,
            time_ms: 0.0,
            ticks: 0,
            config,
            match_config,
        };
        sim.load_strategies();
        sim.build_robots();
        info!(mode = ?sim.match_config.mode, robots = sim.physics.robot_ids().len(), "match created");
        Ok(sim)
    }

    fn load_strategies(&mut self) {
        self.executor.clear();
        for id in self.match_config.mode.robots() {
            let source = self
                .match_config
                .user_source(id)
                .unwrap_or_else(|| defaults::default_source(id.role));
            self.executor.load_strategy(id, source);
        }
    }

    fn build_robots(&mut self) {
        self.physics.initialize();
        self.observation.clear();
        for id in self.match_config.mode.robots() {
            let (position, heading) = start_pose(id, self.game.kickoff_team);
            if let Err(err) = self.physics.create_robot(id, position, heading) {
                warn!(robot = %id, error = %err, "could not create robot");
            }
        }
        self.resync_sensors();
    }

    // ------------------------------------------------------------------------
    // Run control
    // ------------------------------------------------------------------------

    /// Starts the match: the first kickoff begins and ticks advance.
    /// Also clears a pause.
    pub fn start(&mut self) {
        if self.game.phase == GamePhase::Setup {
            self.begin_kickoff(Team::Blue);
        }
        self.started = true;
        self.game.paused = false;
        self.flush_events();
    }

    /// Suspends ticking. State is left untouched.
    pub fn pause(&mut self) {
        self.game.paused = true;
    }

    /// Resumes after [`Simulation::pause`].
    pub fn resume(&mut self) {
        self.game.paused = false;
    }

    /// Flips the pause flag and returns the new value.
    pub fn toggle_pause(&mut self) -> bool {
        self.game.paused = !self.game.paused;
        self.game.paused
    }

    /// True when [`Simulation::step`] will advance the match.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started && !self.game.paused && self.game.phase != GamePhase::Finished
    }

    /// True once the second half has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.game.phase == GamePhase::Finished
    }

    /// Sets the speed multiplier, clamped to the configured range. Non-finite
    /// values are ignored. Returns the multiplier in force.
    pub fn set_speed(&mut self, multiplier: f32) -> f32 {
        if multiplier.is_finite() {
            let rules = &self.config.rules;
            self.speed = multiplier.clamp(rules.min_speed_multiplier, rules.max_speed_multiplier);
        }
        self.speed
    }

    /// Current speed multiplier.
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Rebuilds every robot, restarts every script from its source and
    /// returns to a blue kickoff with the score cleared. The running and
    /// paused flags are kept.
    pub fn reset(&mut self) {
        let paused = self.game.paused;
        self.game = GameState::new(self.match_config.mode);
        self.game.paused = paused;
        self.executor.reload_all();
        self.referee.reset();
        self.build_robots();
        self.time_ms = 0.0;
        self.ticks = 0;
        self.begin_kickoff(Team::Blue);
        info!("match reset");
        self.flush_events();
    }

    /// Moves every robot and the ball back to the starting layout without
    /// touching score, phase or penalties.
    pub fn reset_positions(&mut self) {
        self.place_at_start(false);
        debug!("positions reset");
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Advances the match by one frame of `frame_dt_ms` wall time, scaled by
    /// the speed multiplier.
    ///
    /// # Returns
    ///
    /// Whether anything advanced (false while not started, paused or
    /// finished).
    pub fn step(&mut self, frame_dt_ms: f32) -> bool {
        if !self.is_running() {
            return false;
        }
        let dt = if frame_dt_ms.is_finite() {
            frame_dt_ms.max(0.0) * self.speed
        } else {
            0.0
        };
        self.time_ms += f64::from(dt);
        self.ticks += 1;

        match self.game.phase {
            GamePhase::Setup | GamePhase::Finished => {}
            GamePhase::Kickoff | GamePhase::OutOfBounds => {
                if self.game.count_down(dt) {
                    self.resume_play();
                }
            }
            GamePhase::Playing => self.play(dt),
            GamePhase::Goal => {
                if self.game.count_down(dt) {
                    self.begin_kickoff(self.game.kickoff_team);
                }
            }
            GamePhase::HalfTime => {
                if self.game.count_down(dt) {
                    self.game.half = 2;
                    self.game.elapsed_ms = 0.0;
                    self.begin_kickoff(self.game.kickoff_team.opponent());
                }
            }
        }

        if self.game.phase != GamePhase::Finished {
            self.update_penalties(dt);
        }
        self.flush_events();
        true
    }

    /// Steps with `frame_ms` frames until `duration_ms` of scaled time has
    /// passed or the match stops running. Returns the number of ticks run.
    pub fn run_for(&mut self, duration_ms: f64, frame_ms: f32) -> u64 {
        let target = self.time_ms + duration_ms;
        let mut ticks = 0;
        while self.time_ms < target && self.step(frame_ms) {
            ticks += 1;
        }
        ticks
    }

    fn play(&mut self, dt: f32) {
        self.game.elapsed_ms += f64::from(dt);

        let actions = self.run_strategies(dt);
        for (id, action) in &actions {
            if let Err(err) = self.physics.apply_action(*id, action) {
                warn!(robot = %id, error = %err, "action dropped");
            }
        }
        self.step_physics(dt);
        if self.game.phase != GamePhase::Playing {
            return;
        }

        if let Some(side) = self.physics.check_out_of_bounds() {
            self.enter_out_of_bounds(side);
            return;
        }

        let ball = self.physics.ball();
        if let Some(RefereeEvent::LackOfProgress { position, .. }) = self.referee.update(dt, &ball) {
            self.relocate_stalled_ball(position);
        }

        self.check_robots_out();

        if self.game.elapsed_ms >= f64::from(self.config.rules.half_duration_ms) {
            self.end_half();
        }
    }

    /// Observes every active robot against the same ground truth, then runs
    /// the strategies. Physics is not touched.
    fn run_strategies(&mut self, dt: f32) -> Vec<(RobotId, Action)> {
        let ball = self.physics.ball();
        let robots: Vec<RobotState> = self
            .physics
            .robots()
            .filter(|r| !r.penalized)
            .cloned()
            .collect();

        let mut actions = Vec::with_capacity(robots.len());
        for robot in &robots {
            let (state, target) = self.executor.labels(robot.id);
            let context = ObservationContext {
                time_ms: self.time_ms,
                dt_ms: dt,
                kickoff_us: self.game.kickoff_pending && robot.team() == self.game.kickoff_team,
                state: state.map(str::to_string),
                target: target.map(str::to_string),
            };
            let world = self.observation.observe(robot, &ball, context);
            let outcome = self.executor.execute_strategy(robot.id, &world);
            actions.push((robot.id, outcome.action));
        }
        for robot in &robots {
            self.observation.record(robot);
        }
        actions
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn step_physics(&mut self, dt: f32) {
        let ceiling = self.config.physics.max_step_ms;
        let substeps = ((dt / ceiling).ceil() as u32).clamp(1, self.config.physics.max_substeps);
        let sub_dt = (dt / substeps as f32).min(ceiling);
        for _ in 0..substeps {
            self.physics.step(sub_dt);
            self.handle_physics_events();
            if self.game.phase != GamePhase::Playing {
                break;
            }
        }
    }

    fn handle_physics_events(&mut self) {
        for event in self.physics.take_events() {
            match event {
                PhysicsEvent::GoalScored { scoring_team, goal } => {
                    if self.game.phase == GamePhase::Playing {
                        self.score_goal(scoring_team, goal);
                    }
                }
                PhysicsEvent::BallTouched { robot } | PhysicsEvent::Kick { robot } => {
                    self.game.last_touch = Some(robot.team);
                    self.game.kickoff_pending = false;
                }
                PhysicsEvent::Collision { a, b } => {
                    trace!(a = %a, b = %b, "robots collided");
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Phase changes
    // ------------------------------------------------------------------------

    fn begin_kickoff(&mut self, team: Team) {
        if !self.game.transition(GamePhase::Kickoff) {
            return;
        }
        self.game.kickoff_team = team;
        self.game.countdown_ms = self.config.rules.kickoff_countdown_ms;
        self.game.kickoff_pending = true;
        self.game.last_touch = None;
        self.physics.set_out_of_bounds_enabled(false);
        self.place_at_start(true);
        self.referee.reset();
        info!(%team, half = self.game.half, "kickoff");
        self.bus.emit(GameEvent::KickoffStart {
            team,
            half: self.game.half,
        });
    }

    fn resume_play(&mut self) {
        if !self.game.transition(GamePhase::Playing) {
            return;
        }
        self.physics.set_out_of_bounds_enabled(true);
        self.physics.reset_out_of_bounds_timer();
        self.referee.reset();
        self.bus.emit(GameEvent::PlayResumed);
    }

    fn score_goal(&mut self, scoring_team: Team, goal: Team) {
        if !self.game.transition(GamePhase::Goal) {
            return;
        }
        self.game.score.increment(scoring_team);
        self.game.kickoff_team = goal;
        self.game.countdown_ms = self.config.rules.goal_delay_ms;
        self.physics.set_out_of_bounds_enabled(false);
        info!(%scoring_team, score = %self.game.score, "goal");
        self.bus.emit(GameEvent::Goal {
            scoring_team,
            score: self.game.score,
            last_touch: self.physics.last_touch(),
        });
    }

    fn enter_out_of_bounds(&mut self, side: Side) {
        if !self.game.transition(GamePhase::OutOfBounds) {
            return;
        }
        self.physics.set_out_of_bounds_enabled(false);
        let spot = referee::find_nearest_neutral_spot(side);
        self.place_ball_at_spot(spot.position);
        self.physics.push_out_of_goal_areas();
        self.resync_sensors();
        self.game.countdown_ms = self.config.rules.out_of_bounds_delay_ms;
        self.referee.reset();
        info!(?side, spot = spot.name, "ball out of bounds");
        self.bus.emit(GameEvent::OutOfBounds {
            side,
            spot: spot.name.to_string(),
            position: spot.position,
        });
    }

    fn relocate_stalled_ball(&mut self, position: Vec2) {
        let spot = referee::find_nearest_neutral_spot_to_position(position);
        self.place_ball_at_spot(spot.position);
        self.physics.reset_out_of_bounds_timer();
        self.resync_sensors();
        info!(spot = spot.name, "lack of progress");
        self.bus.emit(GameEvent::LackOfProgress {
            spot: spot.name.to_string(),
            position: spot.position,
        });
    }

    fn end_half(&mut self) {
        if self.game.half == 1 {
            if self.game.transition(GamePhase::HalfTime) {
                self.game.countdown_ms = self.config.rules.half_time_ms;
                self.physics.set_out_of_bounds_enabled(false);
                info!(score = %self.game.score, "half time");
                self.bus.emit(GameEvent::HalfTime {
                    score: self.game.score,
                });
            }
        } else if self.game.transition(GamePhase::Finished) {
            self.game.countdown_ms = 0.0;
            self.physics.set_out_of_bounds_enabled(false);
            let winner = self.game.score.leader();
            info!(score = %self.game.score, ?winner, "match finished");
            self.bus.emit(GameEvent::GameEnd {
                score: self.game.score,
                winner,
            });
        }
    }

    // ------------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------------

    fn place_at_start(&mut self, clear_penalties: bool) {
        for id in self.physics.robot_ids() {
            let (position, heading) = start_pose(id, self.game.kickoff_team);
            if let Err(err) = self.physics.set_robot_pose(id, position, heading) {
                warn!(robot = %id, error = %err, "could not place robot");
            }
            if clear_penalties && self.physics.robot(id).is_some_and(|r| r.penalized) {
                self.lift_penalty(id);
            }
        }
        self.place_ball_at_spot(Vec2::ZERO);
        self.physics.clear_last_touch();
        self.physics.reset_out_of_bounds_timer();
        self.referee.reset();
        self.resync_sensors();
    }

    fn place_ball_at_spot(&mut self, spot: Vec2) {
        if let Err(err) = self.physics.set_ball_position(spot) {
            warn!(error = %err, "could not place ball");
        }
        self.physics
            .push_robots_away_from(spot, self.config.rules.neutral_spot_clearance);
    }

    /// Re-seeds the line-sensor arena after robots were teleported, so a jump
    /// is not mistaken for a line crossing.
    fn resync_sensors(&mut self) {
        for robot in self.physics.robots() {
            self.observation.register(robot);
        }
    }

    // ------------------------------------------------------------------------
    // Penalties
    // ------------------------------------------------------------------------

    fn check_robots_out(&mut self) {
        let penalty_ms = self.config.rules.robot_out_penalty_ms;
        if penalty_ms <= 0.0 {
            return;
        }
        let out: Vec<RobotId> = self
            .physics
            .robots()
            .filter(|r| !r.penalized && !field::inside_lines(r.position, 0.0))
            .map(|r| r.id)
            .collect();
        for id in out {
            if let Err(err) = self.apply_penalty(id, penalty_ms) {
                warn!(robot = %id, error = %err, "could not penalize robot");
            }
        }
    }

    fn apply_penalty(&mut self, id: RobotId, duration_ms: f32) -> KernelResult<()> {
        self.physics.set_robot_enabled(id, false)?;
        self.physics.set_penalty(id, true, duration_ms);
        info!(robot = %id, duration_ms, "robot penalized");
        self.bus.emit(GameEvent::RobotPenalized {
            robot: id,
            duration_ms,
        });
        Ok(())
    }

    fn update_penalties(&mut self, dt: f32) {
        let penalized: Vec<(RobotId, f32)> = self
            .physics
            .robots()
            .filter(|r| r.penalized)
            .map(|r| (r.id, r.penalty_remaining_ms))
            .collect();
        for (id, remaining) in penalized {
            let remaining = (remaining - dt).max(0.0);
            if remaining > 0.0 {
                self.physics.set_penalty(id, true, remaining);
            } else if let Err(err) = self.return_to_play(id) {
                warn!(robot = %id, error = %err, "could not release robot");
            }
        }
    }

    /// Puts a penalized robot back at the neutral spot furthest from the
    /// ball.
    fn return_to_play(&mut self, id: RobotId) -> KernelResult<()> {
        let spot = referee::find_furthest_neutral_spot_from(self.physics.ball().position);
        let heading = id.team.attack_sign() * FRAC_PI_2;
        self.physics.set_robot_pose(id, spot.position, heading)?;
        self.lift_penalty(id);
        if let Some(robot) = self.physics.robot(id) {
            self.observation.register(robot);
        }
        Ok(())
    }

    fn lift_penalty(&mut self, id: RobotId) {
        if self.physics.set_robot_enabled(id, true).is_ok() {
            self.physics.set_penalty(id, false, 0.0);
            info!(robot = %id, "robot released");
            self.bus.emit(GameEvent::RobotReleased { robot: id });
        }
    }

    // ------------------------------------------------------------------------
    // Host commands
    // ------------------------------------------------------------------------

    /// Drops the ball at `position` (drag and drop). Restarts the
    /// out-of-bounds debounce interval.
    ///
    /// # Errors
    ///
    /// [`KernelError::NonFinitePosition`].
    pub fn set_ball_position(&mut self, position: Vec2) -> KernelResult<()> {
        self.physics.set_ball_position(position)?;
        self.physics.reset_out_of_bounds_timer();
        self.referee.reset();
        Ok(())
    }

    /// Moves a robot (drag and drop), keeping its heading unless one is
    /// given. Restarts the out-of-bounds debounce interval.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnknownRobot`] or [`KernelError::NonFinitePosition`].
    pub fn set_robot_position(
        &mut self,
        id: RobotId,
        position: Vec2,
        heading: Option<f32>,
    ) -> KernelResult<()> {
        let current = self
            .physics
            .robot(id)
            .ok_or(KernelError::UnknownRobot(id))?
            .heading;
        self.physics
            .set_robot_pose(id, position, heading.unwrap_or(current))?;
        self.physics.reset_out_of_bounds_timer();
        if let Some(robot) = self.physics.robot(id) {
            self.observation.register(robot);
        }
        Ok(())
    }

    /// Hot-reloads `id`'s strategy. A source that fails to compile leaves the
    /// previous strategy running.
    ///
    /// # Returns
    ///
    /// Whether the new source compiled.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnknownRobot`] if `id` is not in this match.
    pub fn update_strategy(&mut self, id: RobotId, source: &str) -> KernelResult<bool> {
        if self.physics.robot(id).is_none() {
            return Err(KernelError::UnknownRobot(id));
        }
        let loaded = self.executor.load_strategy(id, source);
        if loaded {
            self.match_config.strategies.insert(id, source.to_string());
        }
        Ok(loaded)
    }

    /// Takes a robot out of play for `duration_ms`.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnknownRobot`].
    pub fn penalize_robot(&mut self, id: RobotId, duration_ms: f32) -> KernelResult<()> {
        let duration_ms = if duration_ms.is_finite() {
            duration_ms.max(0.0)
        } else {
            0.0
        };
        self.apply_penalty(id, duration_ms)?;
        self.flush_events();
        Ok(())
    }

    /// Returns a penalized robot to play immediately. No-op for a robot that
    /// is not penalized.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnknownRobot`].
    pub fn release_robot(&mut self, id: RobotId) -> KernelResult<()> {
        let robot = self.physics.robot(id).ok_or(KernelError::UnknownRobot(id))?;
        if robot.penalized {
            self.return_to_play(id)?;
            self.flush_events();
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Observers and accessors
    // ------------------------------------------------------------------------

    /// Registers an observer for events and per-tick snapshots.
    pub fn subscribe(&mut self, observer: Box<dyn SimulationObserver>) -> ObserverId {
        self.bus.subscribe(observer)
    }

    /// Removes an observer.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Drains delivered events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        self.bus.take_events()
    }

    fn flush_events(&mut self) {
        let snapshot = self.bus.has_observers().then(|| self.snapshot());
        self.bus.flush(snapshot.as_ref());
    }

    /// Builds a snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SimulationSnapshot {
        let robots = self
            .physics
            .robots()
            .map(|robot| {
                let (state, target) = self.executor.labels(robot.id);
                RobotSnapshot {
                    state: robot.clone(),
                    in_goal_area: Team::ALL
                        .iter()
                        .any(|team| field::in_goal_area(robot.position, *team)),
                    strategy_state: state.map(str::to_string),
                    strategy_target: target.map(str::to_string),
                    error: self.executor.get_error(robot.id).map(str::to_string),
                }
            })
            .collect();
        SimulationSnapshot {
            game: self.game.clone(),
            robots,
            ball: self.physics.ball(),
            timestamp_ms: self.time_ms,
        }
    }

    /// Match state.
    #[must_use]
    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Kernel configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Match setup, including hot-reloaded sources.
    #[must_use]
    pub fn match_config(&self) -> &MatchConfig {
        &self.match_config
    }

    /// Read access to the physics engine.
    #[must_use]
    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// Ball state.
    #[must_use]
    pub fn ball(&self) -> BallState {
        self.physics.ball()
    }

    /// One robot's state.
    #[must_use]
    pub fn robot(&self, id: RobotId) -> Option<&RobotState> {
        self.physics.robot(id)
    }

    /// Last strategy error recorded for `id`.
    #[must_use]
    pub fn strategy_error(&self, id: RobotId) -> Option<&str> {
        self.executor.get_error(id)
    }

    /// Total simulated time since creation or reset, ms.
    #[must_use]
    pub fn time_ms(&self) -> f64 {
        self.time_ms
    }

    /// Ticks advanced since creation or reset.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Mutable access to the executor, for installing native strategies.
    pub fn executor_mut(&mut self) -> &mut StrategyExecutor {
        &mut self.executor
    }
}

/// Starting position and heading of `id` for a kickoff by `kickoff_team`.
///
/// Blue defends negative y and faces +y; yellow mirrors it.
#[must_use]
pub fn start_pose(id: RobotId, kickoff_team: Team) -> (Vec2, f32) {
    let forward = id.team.attack_sign();
    let distance = match id.role {
        Role::Attacker if id.team == kickoff_team => KICKOFF_ATTACKER_DISTANCE,
        Role::Attacker => WAITING_ATTACKER_DISTANCE,
        Role::Defender => DEFENDER_DISTANCE,
    };
    (Vec2::new(0.0, -forward * distance), forward * FRAC_PI_2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchMode;

    fn blue_attacker() -> RobotId {
        RobotId::new(Team::Blue, Role::Attacker)
    }

    #[test]
    fn start_poses_mirror() {
        let (blue, blue_heading) = start_pose(blue_attacker(), Team::Blue);
        assert_eq!(blue, Vec2::new(0.0, -30.0));
        assert!((blue_heading - FRAC_PI_2).abs() < 1e-6);

        let yellow = RobotId::new(Team::Yellow, Role::Attacker);
        let (pos, heading) = start_pose(yellow, Team::Blue);
        assert_eq!(pos, Vec2::new(0.0, 45.0));
        assert!((heading + FRAC_PI_2).abs() < 1e-6);

        let (pos, _) = start_pose(RobotId::new(Team::Yellow, Role::Defender), Team::Blue);
        assert_eq!(pos, Vec2::new(0.0, 60.0));
        assert!(!field::in_goal_area(pos, Team::Yellow));
    }

    #[test]
    fn new_is_in_setup_and_not_running() {
        let mut sim =
            Simulation::new(SimConfig::default(), MatchConfig::new(MatchMode::SingleTeam)).unwrap();
        assert_eq!(sim.game().phase, GamePhase::Setup);
        assert!(!sim.is_running());
        assert!(!sim.step(16.0));
        assert_eq!(sim.physics().robot_ids().len(), 4);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = SimConfig::default();
        config.physics.max_substeps = 0;
        assert!(matches!(
            Simulation::new(config, MatchConfig::default()),
            Err(KernelError::Config(_))
        ));
    }

    #[test]
    fn kickoff_countdown_expires_into_play() {
        let mut sim = Simulation::new(SimConfig::default(), MatchConfig::default()).unwrap();
        sim.start();
        assert_eq!(sim.game().countdown_ms, 3000.0);

        for _ in 0..2 {
            sim.step(1000.0);
            assert_eq!(sim.game().phase, GamePhase::Kickoff);
            assert!(!sim.physics().out_of_bounds_enabled());
        }
        sim.step(1000.0);
        assert_eq!(sim.game().phase, GamePhase::Playing);
        assert_eq!(sim.game().countdown_ms, 0.0);
        assert!(sim.physics().out_of_bounds_enabled());
    }

    #[test]
    fn speed_is_clamped() {
        let mut sim = Simulation::new(SimConfig::default(), MatchConfig::default()).unwrap();
        assert_eq!(sim.set_speed(10.0), 4.0);
        assert_eq!(sim.set_speed(0.0), 0.1);
        assert_eq!(sim.set_speed(f32::NAN), 0.1);
        assert_eq!(sim.set_speed(2.0), 2.0);
    }

    #[test]
    fn pause_controls() {
        let mut sim = Simulation::new(SimConfig::default(), MatchConfig::default()).unwrap();
        sim.start();
        assert!(sim.is_running());
        assert!(sim.toggle_pause());
        assert!(!sim.is_running());
        assert!(!sim.step(16.0));
        sim.resume();
        assert!(sim.step(16.0));
        sim.pause();
        assert!(!sim.is_running());
    }

    #[test]
    fn unknown_robot_commands_error() {
        let mut sim =
            Simulation::new(SimConfig::default(), MatchConfig::new(MatchMode::SingleBotAttacker))
                .unwrap();
        let absent = RobotId::new(Team::Blue, Role::Defender);
        assert!(matches!(
            sim.update_strategy(absent, "function strategy() {}"),
            Err(KernelError::UnknownRobot(_))
        ));
        assert!(sim.set_robot_position(absent, Vec2::ZERO, None).is_err());
        assert!(sim.penalize_robot(absent, 100.0).is_err());
    }
}
