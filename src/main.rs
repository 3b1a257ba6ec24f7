#![forbid(unsafe_code)]

//! `procflow`: procedure automation CLI.
//!
//! The same binary serves as runner and controller: `--start` executes a
//! sketch in the foreground, while `--pause`, `--resume`, `--stop`, and
//! `--purge` act on a run owned by another invocation through the shared
//! state files.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use procflow::engine::FlowEngine;
use procflow::model::progress::RunStatus;
use procflow::{FlowConfig, FlowError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "procflow", about = "Procedure automation engine", version, long_about = None)]
struct Cli {
    /// Path to the JSON sketch file describing the procedure.
    #[arg(long, short = 'f')]
    sketch_file: Option<PathBuf>,

    /// Path to the TOML configuration file.
    #[arg(long, short = 'c')]
    config_file: Option<PathBuf>,

    /// Start executing the sketch (runner mode).
    #[arg(long, short = 'S')]
    start: bool,

    /// Stop the currently running procedure.
    #[arg(long, short = 's')]
    stop: bool,

    /// Pause the currently running procedure at the next action boundary.
    #[arg(long, short = 'p')]
    pause: bool,

    /// Resume a paused procedure; with `--sketch-file`, re-enter an
    /// interrupted run from its checkpoint instead.
    #[arg(long, short = 'R')]
    resume: bool,

    /// Delete checkpoint and report data.
    #[arg(long, short = 'P')]
    purge: bool,

    /// Print the persisted procedure state.
    #[arg(long)]
    status: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Suppress all output except errors.
    #[arg(long)]
    silence: bool,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| FlowError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config_file {
        Some(path) => FlowConfig::load_from_path(path)?,
        None => FlowConfig::default(),
    };

    let engine = FlowEngine::new(config);

    if args.purge {
        engine.purge()?;
        println!("state and report data purged");
    }

    if args.start {
        let sketch = require_sketch(&args)?;
        info!(sketch = %sketch.display(), "starting procedure");
        return finish(engine.start(&sketch).await?);
    }

    if args.resume {
        // With a sketch file this is a crash-resume runner; without one it
        // is a controller command for a live paused run.
        if let Some(sketch) = args.sketch_file.clone() {
            info!(sketch = %sketch.display(), "resuming procedure from checkpoint");
            return finish(engine.resume_run(&sketch).await?);
        }
        engine.resume()?;
        println!("resume command sent");
        return Ok(());
    }

    if args.pause {
        engine.pause()?;
        println!("pause command sent");
        return Ok(());
    }

    if args.stop {
        engine.stop()?;
        println!("stop command sent");
        return Ok(());
    }

    if args.status {
        match engine.get_full_state()? {
            Some(snapshot) => {
                println!(
                    "state: {} | sketch: {} | stage: {} | action: {} | at: {}",
                    snapshot.action_label,
                    snapshot.sketch_file,
                    snapshot.current_stage,
                    snapshot.current_action,
                    snapshot.timestamp
                );
            }
            None => println!("no procedure state"),
        }
        return Ok(());
    }

    if args.purge {
        return Ok(());
    }

    Err(FlowError::Config(
        "no action specified; use --start, --pause, --resume, --stop, --purge, or --status".into(),
    ))
}

/// Map a terminal run status onto the process outcome.
fn finish(status: RunStatus) -> Result<()> {
    println!("procedure {status}");
    match status {
        RunStatus::Completed | RunStatus::Stopped => Ok(()),
        RunStatus::Failed => Err(FlowError::Execution("procedure failed".into())),
    }
}

fn require_sketch(args: &Cli) -> Result<PathBuf> {
    args.sketch_file
        .clone()
        .ok_or_else(|| FlowError::Config("--sketch-file is required for this action".into()))
}

fn init_tracing(args: &Cli) -> Result<()> {
    let default_filter = if args.silence {
        "error"
    } else if args.debug {
        "debug"
    } else {
        "info"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = fmt().with_env_filter(env_filter);

    match args.log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| FlowError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| FlowError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
