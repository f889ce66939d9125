//! Headless match runner.
//!
//! Runs a match without a display, logging events through `tracing` and
//! printing a JSON summary when it ends. Strategy files can be checked for
//! errors without running anything.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pitch_core::config::{MatchConfig, MatchMode, SimConfig};
use pitch_core::strategy::ScriptStrategy;
use pitch_core::{GameEvent, RobotId, Score, SimulationObserver, Simulation, Team};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Pitch - headless robot soccer matches
#[derive(Parser, Debug)]
#[command(name = "pitch", version)]
#[command(about = "Run robot soccer matches without a display")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a match and print a JSON summary
    Run(RunArgs),
    /// Compile a strategy file and report errors
    Check {
        /// Strategy source file
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Kernel configuration (JSON); missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Which robots take part
    #[arg(long, value_enum, default_value_t = ModeArg::TwoTeam)]
    mode: ModeArg,

    /// Strategy for one robot, e.g. `blue_attacker=attacker.strat`
    #[arg(long = "strategy", value_name = "ID=FILE", value_parser = parse_assignment)]
    strategies: Vec<(RobotId, PathBuf)>,

    /// Stop after this many simulated seconds instead of at full time
    #[arg(long)]
    seconds: Option<f64>,

    /// Speed multiplier
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Wall time per frame, ms
    #[arg(long, default_value_t = 16.0)]
    frame_ms: f32,

    /// Write one JSON snapshot per tick to this file
    #[arg(long)]
    snapshots: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    SingleBotAttacker,
    SingleBotDefender,
    SingleTeam,
    TwoTeam,
}

impl From<ModeArg> for MatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::SingleBotAttacker => MatchMode::SingleBotAttacker,
            ModeArg::SingleBotDefender => MatchMode::SingleBotDefender,
            ModeArg::SingleTeam => MatchMode::SingleTeam,
            ModeArg::TwoTeam => MatchMode::TwoTeam,
        }
    }
}

fn parse_assignment(arg: &str) -> Result<(RobotId, PathBuf), String> {
    let (id, file) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ID=FILE, got `{arg}`"))?;
    let id = id.trim().parse::<RobotId>().map_err(|e| e.to_string())?;
    Ok((id, PathBuf::from(file.trim())))
}

/// Logs every game event.
struct EventLog;

impl SimulationObserver for EventLog {
    fn on_game_event(&mut self, event: &GameEvent) {
        match serde_json::to_string(event) {
            Ok(json) => info!(event = event.name(), %json, "game event"),
            Err(err) => warn!(error = %err, "could not serialize event"),
        }
    }
}

#[derive(Serialize)]
struct Summary {
    phase: String,
    half: u8,
    score: Score,
    winner: Option<Team>,
    simulated_ms: f64,
    ticks: u64,
    events: BTreeMap<&'static str, usize>,
    errors: BTreeMap<RobotId, String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pitch=info,pitch_core=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(&args),
        Command::Check { file } => check(&file),
    }
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    SimConfig::from_json_str(&json).with_context(|| format!("invalid config {}", path.display()))
}

fn run(args: &RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    if !(args.frame_ms.is_finite() && args.frame_ms > 0.0) {
        bail!("--frame-ms must be positive");
    }

    let mode = MatchMode::from(args.mode);
    let mut match_config = MatchConfig::new(mode);
    for (id, path) in &args.strategies {
        if !mode.is_user_controlled(*id) {
            warn!(robot = %id, "robot runs the default strategy in this mode; ignoring file");
            continue;
        }
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read strategy {}", path.display()))?;
        match_config = match_config.with_strategy(*id, source);
    }

    let mut sim = Simulation::new(config, match_config).context("failed to create match")?;
    for id in mode.robots() {
        if let Some(error) = sim.strategy_error(id) {
            warn!(robot = %id, %error, "strategy did not load; robot will stand still");
        }
    }
    let speed = sim.set_speed(args.speed);
    sim.subscribe(Box::new(EventLog));

    let mut snapshots = match &args.snapshots {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => None,
    };

    let limit_ms = args.seconds.map(|s| s * 1000.0);
    info!(?mode, speed, "kickoff");
    sim.start();

    let mut event_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    while !sim.is_finished() && limit_ms.map_or(true, |limit| sim.time_ms() < limit) {
        if !sim.step(args.frame_ms) {
            break;
        }
        for event in sim.take_events() {
            *event_counts.entry(event.name()).or_default() += 1;
        }
        if let Some(out) = snapshots.as_mut() {
            serde_json::to_writer(&mut *out, &sim.snapshot())?;
            out.write_all(b"\n")?;
        }
    }
    if let Some(mut out) = snapshots {
        out.flush().context("failed to write snapshots")?;
    }

    let game = sim.game();
    debug!(ticks = sim.ticks(), "match loop done");
    let summary = Summary {
        phase: game.phase.to_string(),
        half: game.half,
        score: game.score,
        winner: game.score.leader(),
        simulated_ms: sim.time_ms(),
        ticks: sim.ticks(),
        events: event_counts,
        errors: mode
            .robots()
            .into_iter()
            .filter_map(|id| sim.strategy_error(id).map(|e| (id, e.to_string())))
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn check(path: &Path) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    match ScriptStrategy::compile(&source, pitch_core::pitch_script::Limits::default(), 0) {
        Ok(_) => {
            println!("{}: ok", path.display());
            Ok(())
        }
        Err(fault) => bail!("{}: {fault}", path.display()),
    }
}
