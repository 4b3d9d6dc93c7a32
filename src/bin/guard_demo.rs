//! guard_demo - synthetic end-to-end run
//!
//! Feeds a synthetic scene with a periodic intruder through the full pipeline
//! as fast as the CPU allows (scene time, not wall time) and reports what
//! happened. No camera and no window manager needed.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::time::Instant;

use fast_guard::input::command_channel;
use fast_guard::{
    open_source, Display, Monitor, MotionPipeline, NullDisplay, PipelineSettings,
    RecordingAction, RoiPolygon, SourceConfig, TriggerDispatcher, Ui,
};

#[derive(Parser, Debug)]
#[command(name = "guard_demo", about = "Run the motion guard against a synthetic scene")]
struct Args {
    /// Seconds of scene time to simulate
    #[arg(long, default_value_t = 20)]
    seconds: u32,

    /// Synthetic frame rate
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Frame width
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Frame height
    #[arg(long, default_value_t = 180)]
    height: u32,

    /// Noise seed
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// UI mode for stderr status (auto|plain|pretty|none)
    #[arg(long, default_value = "none", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let frames = u64::from(args.seconds) * u64::from(args.fps);
    let config = SourceConfig {
        url: format!(
            "stub://intruder?frames={}&seed={}&realtime=false",
            frames, args.seed
        ),
        width: args.width,
        height: args.height,
        target_fps: args.fps,
    };

    stage("open synthetic scene");
    let mut source = open_source(&config)?;
    source.connect()?;

    let recorder = RecordingAction::new();
    let dispatcher = TriggerDispatcher::inline(Box::new(recorder.clone()));
    let pipeline =
        MotionPipeline::new(PipelineSettings::default(), RoiPolygon::default(), Instant::now())?;
    let display: Box<dyn Display> = if args.ui == "none" {
        Box::new(NullDisplay)
    } else {
        let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal(), false);
        Box::new(ui.display())
    };

    stage(&format!("run {} frames ({}s of scene time)", frames, args.seconds));
    let started = Instant::now();
    let (_tx, rx) = command_channel();
    let mut monitor = Monitor::new(source, pipeline, dispatcher, display, rx);
    let summary = monitor.run()?;
    monitor.shutdown()?;
    let elapsed = started.elapsed();

    println!("guard_demo summary");
    println!("  frames processed: {}", summary.frames);
    println!("  stabilizing frames: {}", summary.stabilizing_frames);
    println!("  triggers: {}", summary.triggers);
    println!("  actions recorded: {}", recorder.calls());
    println!(
        "  throughput: {:.1} fps",
        summary.frames as f64 / elapsed.as_secs_f64().max(1e-6)
    );
    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}
