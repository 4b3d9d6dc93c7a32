//! fast_guard - ROI motion watcher
//!
//! This daemon:
//! 1. Opens the configured capture source and discards warm-up frames
//! 2. Bootstraps a background estimate of the scene
//! 3. Scores motion inside the region of interest on every frame
//! 4. Runs the configured action once per confirmed, rate-limited event
//!
//! Type `q` + Enter (or Ctrl-C) to quit, `r` + Enter to re-learn the background.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;

use fast_guard::input::{command_channel, install_ctrlc, spawn_stdin_reader};
use fast_guard::{
    open_source, warm_up, ActionSpec, DispatchMode, EndReason, GuardConfig, Monitor,
    MotionPipeline, TriggerDispatcher, Ui,
};

#[derive(Parser, Debug)]
#[command(
    name = "fast_guard",
    about = "Watch a camera region for motion and react once per event"
)]
struct Args {
    /// Config file (.toml or .json)
    #[arg(long, value_name = "PATH", env = "FAST_GUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Capture source: stub://..., a device path, or a camera index
    #[arg(long, value_name = "URL")]
    source: Option<String>,

    /// UI mode for stderr status (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,

    /// Log triggers without running the configured action
    #[arg(long)]
    dry_run: bool,

    /// Run the action on the capture thread instead of a worker
    #[arg(long)]
    inline_dispatch: bool,

    /// Do not read commands from stdin
    #[arg(long)]
    no_stdin: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = GuardConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if args.dry_run {
        cfg.action = ActionSpec::Log;
    }
    if args.inline_dispatch {
        cfg.dispatch = DispatchMode::Inline;
    }

    let (tx, rx) = command_channel();
    install_ctrlc(tx.clone())?;
    if !args.no_stdin {
        spawn_stdin_reader(tx)?;
    }

    let mut source = {
        let _stage = ui.stage("Open capture source");
        let mut source = open_source(&cfg.source)?;
        source.connect()?;
        source
    };
    {
        let _stage = ui.stage("Warm up capture");
        warm_up(source.as_mut(), cfg.warmup_frames)?;
    }

    let action = cfg.action.build()?;
    log::info!(
        "action: {} ({:?} dispatch)",
        action.name(),
        cfg.dispatch
    );
    let dispatcher = TriggerDispatcher::new(action, cfg.dispatch)?;
    let pipeline = MotionPipeline::new(cfg.pipeline, cfg.roi.clone(), Instant::now())?;

    eprintln!("commands: q = quit, r = reset background");
    let mut monitor = Monitor::new(source, pipeline, dispatcher, Box::new(ui.display()), rx);
    let summary = monitor.run()?;
    monitor.shutdown()?;

    println!("fast_guard stopped");
    println!(
        "  reason: {}",
        match summary.end {
            EndReason::Quit => "quit",
            EndReason::EndOfStream => "end of stream",
        }
    );
    println!("  frames: {}", summary.frames);
    println!("  triggers: {}", summary.triggers);
    println!("  resets: {}", summary.resets);
    Ok(())
}
