//! Console presentation.
//!
//! `Ui` picks between an indicatif spinner (TTY) and plain stderr lines, for
//! startup stages and for the per-frame status display. Displays only observe;
//! nothing they do feeds back into detection.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::detect::{FrameOutcome, RoiPolygon, Verdict};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = spinner();
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Status display for the run loop.
    pub fn display(&self) -> ConsoleDisplay {
        ConsoleDisplay::new(self.use_pretty())
    }
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

// ----------------------------------------------------------------------------
// Per-frame display
// ----------------------------------------------------------------------------

/// What a display gets to see for one processed frame.
#[derive(Clone, Copy, Debug)]
pub struct Overlay<'a> {
    pub frame_index: u64,
    pub dimensions: (u32, u32),
    pub roi: &'a RoiPolygon,
    pub outcome: FrameOutcome,
}

pub trait Display {
    fn render(&mut self, overlay: &Overlay<'_>);

    /// Called once when the run loop ends.
    fn finish(&mut self) {}
}

/// Discards everything. Used by tests and headless runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn render(&mut self, _overlay: &Overlay<'_>) {}
}

/// Coarse phase shown to the operator; plain mode prints on every change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Stabilizing,
    Grace,
    Watching,
    Motion,
    Cooldown,
    Triggered,
}

fn phase_of(outcome: &FrameOutcome) -> Phase {
    match outcome {
        FrameOutcome::Stabilizing { .. } => Phase::Stabilizing,
        FrameOutcome::Scored { verdict, .. } => match verdict {
            Verdict::Grace => Phase::Grace,
            Verdict::Quiet => Phase::Watching,
            Verdict::Building { .. } => Phase::Motion,
            Verdict::CoolingDown { .. } => Phase::Cooldown,
            Verdict::Trigger { .. } => Phase::Triggered,
        },
    }
}

pub fn status_line(overlay: &Overlay<'_>) -> String {
    let (width, height) = overlay.dimensions;
    let detail = match overlay.outcome {
        FrameOutcome::Stabilizing { progress, total } => {
            format!("stabilizing background {}/{}", progress, total)
        }
        FrameOutcome::Scored { signal, verdict } => {
            let state = match verdict {
                Verdict::Grace => "grace".to_string(),
                Verdict::Quiet => "watching".to_string(),
                Verdict::Building { streak } => format!("motion x{}", streak),
                Verdict::CoolingDown { streak } => format!("cooldown x{}", streak),
                Verdict::Trigger { .. } => "TRIGGERED".to_string(),
            };
            format!("{} | motion={}", state, signal.magnitude)
        }
    };
    format!(
        "frame {} {}x{} | {}",
        overlay.frame_index, width, height, detail
    )
}

fn describe_roi(roi: &RoiPolygon) -> String {
    roi.points()
        .iter()
        .map(|p| format!("({:.2},{:.2})", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct ConsoleDisplay {
    spinner: Option<ProgressBar>,
    pretty: bool,
    last_phase: Option<Phase>,
}

impl ConsoleDisplay {
    pub fn new(pretty: bool) -> Self {
        Self {
            spinner: None,
            pretty,
            last_phase: None,
        }
    }
}

impl Display for ConsoleDisplay {
    fn render(&mut self, overlay: &Overlay<'_>) {
        let phase = phase_of(&overlay.outcome);
        if self.last_phase.is_none() {
            eprintln!("watching region {}", describe_roi(overlay.roi));
        }
        let changed = self.last_phase != Some(phase);
        self.last_phase = Some(phase);

        if self.pretty {
            let spinner = self.spinner.get_or_insert_with(spinner);
            spinner.set_message(status_line(overlay));
            if phase == Phase::Triggered {
                spinner.println(format!("⚠ {}", status_line(overlay)));
            }
        } else if changed {
            eprintln!("{}", status_line(overlay));
        }
    }

    fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}
