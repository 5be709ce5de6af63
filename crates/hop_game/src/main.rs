//! Headless runner: loads a level directory, plays it against an in-memory
//! two-screen host and logs every gameplay event.
//!
//! ```text
//! hop_game [levels_dir] [--ticks N] [--replay file] [--config file] [--unpaced]
//! ```
//!
//! Without `--replay` no keys are pressed; without `--ticks` the run lasts
//! until the engine stops on its own (or the replay runs out).

use std::path::PathBuf;
use std::process::ExitCode;

use hop_core::time::TickPacer;
use hop_game::replay::{load_replay_from_path, ReplayCursor};
use hop_game::{load_config_from_path, Engine, EngineConfig, LevelSet, SimulatedHost};

const DEFAULT_LEVELS_DIR: &str = "assets/levels";
const SCREEN_WIDTH: f64 = 1920.0;
const SCREEN_HEIGHT: f64 = 1080.0;

#[derive(Debug)]
struct Args {
    levels_dir: PathBuf,
    ticks: Option<u64>,
    replay: Option<PathBuf>,
    config: Option<PathBuf>,
    unpaced: bool,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args {
        levels_dir: PathBuf::from(DEFAULT_LEVELS_DIR),
        ticks: None,
        replay: None,
        config: None,
        unpaced: false,
    };
    let mut positional = false;
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--ticks" => {
                let value = raw.next().ok_or("--ticks needs a value")?;
                args.ticks = Some(
                    value
                        .parse()
                        .map_err(|e| format!("invalid --ticks '{value}': {e}"))?,
                );
            }
            "--replay" => {
                args.replay = Some(PathBuf::from(raw.next().ok_or("--replay needs a file")?));
            }
            "--config" => {
                args.config = Some(PathBuf::from(raw.next().ok_or("--config needs a file")?));
            }
            "--unpaced" => args.unpaced = true,
            flag if flag.starts_with("--") => return Err(format!("unknown flag '{flag}'")),
            path if !positional => {
                args.levels_dir = PathBuf::from(path);
                positional = true;
            }
            extra => return Err(format!("unexpected argument '{extra}'")),
        }
    }
    Ok(args)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None => EngineConfig::default(),
    };
    let levels = LevelSet::load(&args.levels_dir)?;
    let mut replay = match &args.replay {
        Some(path) => Some(ReplayCursor::new(&load_replay_from_path(path)?)),
        None => None,
    };
    let mut pacer = (!args.unpaced).then(|| TickPacer::new(config.tick_hz));

    let host = SimulatedHost::dual_screen(SCREEN_WIDTH, SCREEN_HEIGHT);
    let mut engine = Engine::new(host, levels, config);
    engine.start(0)?;

    let limit = args.ticks;
    let stopped = engine.run(pacer.as_mut(), |engine| {
        for event in engine.drain_events() {
            match event.pan {
                Some(pan) => log::info!("tick {}: {} (pan {pan:+.2})", event.tick, event.kind),
                None => log::info!("tick {}: {}", event.tick, event.kind),
            }
        }
        if limit.is_some_and(|limit| engine.tick() >= limit) {
            return false;
        }
        match replay.as_mut() {
            Some(cursor) if cursor.is_finished() => false,
            Some(cursor) => {
                cursor.apply_next(engine.input_mut());
                true
            }
            None => true,
        }
    })?;

    match stopped {
        Some(reason) => log::info!("engine stopped after {} ticks: {reason:?}", engine.tick()),
        None => {
            let resume = engine.stop()?;
            log::info!(
                "run ended after {} ticks; resume at level {:?}",
                engine.tick(),
                resume
            );
        }
    }
    if let Some(pacer) = &pacer {
        log::info!(
            "average tick {:.3}ms, {} overruns",
            pacer.smoothed_tick_ms,
            pacer.overrun_count
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            log::error!("{err}");
            eprintln!(
                "usage: hop_game [levels_dir] [--ticks N] [--replay file] [--config file] [--unpaced]"
            );
            return ExitCode::FAILURE;
        }
    };
    log::info!("hop_game starting with levels from {}", args.levels_dir.display());

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
