//! Per-frame motion pipeline.
//!
//! preprocess -> background bootstrap check -> masked scoring -> debounce ->
//! (reseed on trigger) -> background adaptation.
//!
//! All cross-frame state lives in one owned `DetectorState`. The pipeline never
//! dispatches actions itself; a `Trigger` verdict is returned to the caller,
//! which hands it to the dispatcher.

use anyhow::Result;
use std::time::Instant;

use crate::detect::background::{
    BackgroundModel, BackgroundPhase, DEFAULT_ADAPTATION_RATE, DEFAULT_BOOTSTRAP_FRAMES,
};
use crate::detect::debounce::{DebounceSettings, Debouncer, Verdict};
use crate::detect::preprocess::{Preprocessor, DEFAULT_BLUR_KERNEL};
use crate::detect::roi::{RoiMaskCache, RoiPolygon};
use crate::detect::scorer::{MotionScorer, MotionSignal, ScoringPolicy, DEFAULT_DIFF_THRESHOLD};
use crate::frame::Frame;

/// Tunables for the detection pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineSettings {
    pub blur_kernel: u32,
    pub diff_threshold: u8,
    pub scoring: ScoringPolicy,
    pub bootstrap_frames: u32,
    pub adaptation_rate: f32,
    pub debounce: DebounceSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            blur_kernel: DEFAULT_BLUR_KERNEL,
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            scoring: ScoringPolicy::default(),
            bootstrap_frames: DEFAULT_BOOTSTRAP_FRAMES,
            adaptation_rate: DEFAULT_ADAPTATION_RATE,
            debounce: DebounceSettings::default(),
        }
    }
}

/// What the pipeline concluded about one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Background still bootstrapping; no score was computed.
    Stabilizing { progress: u32, total: u32 },
    /// Frame was scored against a steady background.
    Scored { signal: MotionSignal, verdict: Verdict },
}

impl FrameOutcome {
    pub fn is_trigger(&self) -> bool {
        matches!(self, FrameOutcome::Scored { verdict, .. } if verdict.is_trigger())
    }

    pub fn magnitude(&self) -> Option<u64> {
        match self {
            FrameOutcome::Scored { signal, .. } => Some(signal.magnitude),
            FrameOutcome::Stabilizing { .. } => None,
        }
    }
}

/// Cross-frame detector state: background estimate plus debounce bookkeeping.
#[derive(Clone, Debug)]
pub struct DetectorState {
    background: BackgroundModel,
    debouncer: Debouncer,
}

impl DetectorState {
    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }
}

pub struct MotionPipeline {
    roi: RoiMaskCache,
    preprocessor: Preprocessor,
    scorer: MotionScorer,
    state: DetectorState,
}

impl MotionPipeline {
    /// Build a pipeline whose grace period starts at `started_at`.
    pub fn new(settings: PipelineSettings, roi: RoiPolygon, started_at: Instant) -> Result<Self> {
        settings.debounce.validate()?;
        Ok(Self {
            roi: RoiMaskCache::new(roi),
            preprocessor: Preprocessor::new(settings.blur_kernel)?,
            scorer: MotionScorer::new(settings.diff_threshold, settings.scoring),
            state: DetectorState {
                background: BackgroundModel::new(
                    settings.bootstrap_frames,
                    settings.adaptation_rate,
                )?,
                debouncer: Debouncer::new(settings.debounce, started_at),
            },
        })
    }

    pub fn process(&mut self, frame: &Frame) -> FrameOutcome {
        let luma = self.preprocessor.process(frame);

        // Frames at a new size start over; a streak from the old size must not
        // carry into the new bootstrap.
        let resized = matches!(
            self.state.background.dimensions(),
            Some(dims) if dims != luma.dimensions()
        );
        if resized {
            self.state.debouncer.clear_streak();
        }

        if let BackgroundPhase::Stabilizing { progress, total } =
            self.state.background.submit(&luma)
        {
            return FrameOutcome::Stabilizing { progress, total };
        }
        let Some(background) = self.state.background.snapshot() else {
            return FrameOutcome::Stabilizing {
                progress: self.state.background.frames_averaged(),
                total: self.state.background.bootstrap_frames(),
            };
        };

        let mask = self.roi.mask_for(luma.width, luma.height);
        let signal = MotionSignal {
            magnitude: self.scorer.score(&luma, &background, mask),
            captured_at: frame.captured_at(),
        };
        let verdict = self.state.debouncer.observe(signal);

        if verdict.is_trigger() {
            // Start over from the current scene so the finished motion is not
            // averaged into a stale estimate.
            self.state.background.reseed(&luma);
        }
        self.state.background.adapt(&luma);

        FrameOutcome::Scored { signal, verdict }
    }

    /// Manual reset: clear the background, drop the streak, restart grace at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.state.background.clear();
        self.state.debouncer.reset(now);
        log::info!("detector reset: background cleared, grace period restarted");
    }

    pub fn roi(&self) -> &RoiPolygon {
        self.roi.polygon()
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }
}
