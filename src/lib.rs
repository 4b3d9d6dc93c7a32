//! Fast Guard
//!
//! Watches a camera feed for motion inside a polygonal region of interest and
//! fires a single rate-limited action per confirmed event.
//!
//! # Architecture
//!
//! The per-frame path is fixed:
//!
//! 1. **Preprocess**: luma extraction and Gaussian blur.
//! 2. **Bootstrap**: the first frames are averaged into a background estimate.
//! 3. **Score**: pixels inside the ROI that differ from the background are counted.
//! 4. **Debounce**: grace period, confirmation streak and cooldown gate triggers.
//! 5. **Adapt**: the background follows slow lighting drift.
//!
//! The detector never performs side effects itself. Triggers go to a
//! `TriggerDispatcher`, frames come from a `FrameSource`, and status goes to a
//! `Display`, so the core runs unchanged under tests.
//!
//! # Module Structure
//!
//! - `frame`: captured frames and luma fields
//! - `ingest`: capture sources (synthetic, V4L2)
//! - `detect`: ROI mask, preprocessing, background model, scoring, debounce
//! - `action`: trigger actions and the dispatcher
//! - `input`: operator commands (quit, reset)
//! - `ui`: console status display
//! - `monitor`: the run loop tying everything together
//! - `config`: file + environment configuration

pub mod action;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod input;
pub mod monitor;
pub mod ui;

pub use action::{
    ActionSpec, Actionable, CommandAction, DispatchMode, LogOnly, MinimizeWindows,
    RecordingAction, TriggerDispatcher, TriggerEvent,
};
pub use config::GuardConfig;
pub use detect::{
    FrameOutcome, MotionPipeline, PipelineSettings, RoiPoint, RoiPolygon, ScoringPolicy, Verdict,
};
pub use frame::{Frame, LumaFrame, PixelFormat};
pub use ingest::{open_source, warm_up, FrameSource, SourceConfig, SourceStats, SyntheticSource};
pub use input::Command;
pub use monitor::{EndReason, Monitor, RunSummary};
pub use ui::{ConsoleDisplay, Display, NullDisplay, Overlay, Ui};
