//! Adaptive background model.
//!
//! The model walks `Uninitialized -> Bootstrapping -> Steady`:
//! - the first frame seeds the estimate directly;
//! - the next `bootstrap_frames - 1` frames are folded in as a running mean;
//! - afterwards every frame is blended in with a small fixed rate, which follows
//!   slow lighting drift but not momentary motion.
//!
//! The estimate never leaves this module except as a read-only 8-bit snapshot.

use anyhow::{anyhow, Result};

use crate::frame::LumaFrame;
use crate::ingest::normalize::clamp_to_u8;

pub const DEFAULT_BOOTSTRAP_FRAMES: u32 = 20;
pub const DEFAULT_ADAPTATION_RATE: f32 = 0.02;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackgroundPhase {
    /// Still averaging startup frames. `progress` frames out of `total` are in.
    Stabilizing { progress: u32, total: u32 },
    /// Estimate is trusted; the submitted frame may be scored.
    Steady,
}

impl BackgroundPhase {
    pub fn is_steady(self) -> bool {
        matches!(self, BackgroundPhase::Steady)
    }
}

#[derive(Clone, Debug)]
struct Estimate {
    values: Vec<f32>,
    width: u32,
    height: u32,
}

impl Estimate {
    fn seed(frame: &LumaFrame) -> Self {
        Self {
            values: frame.as_slice().iter().map(|&p| p as f32).collect(),
            width: frame.width,
            height: frame.height,
        }
    }

    fn blend(&mut self, frame: &LumaFrame, alpha: f32) {
        for (bg, &px) in self.values.iter_mut().zip(frame.as_slice()) {
            *bg = (1.0 - alpha) * *bg + alpha * px as f32;
        }
    }
}

#[derive(Clone, Debug)]
pub struct BackgroundModel {
    estimate: Option<Estimate>,
    frames_averaged: u32,
    bootstrap_frames: u32,
    adaptation_rate: f32,
}

impl BackgroundModel {
    pub fn new(bootstrap_frames: u32, adaptation_rate: f32) -> Result<Self> {
        if bootstrap_frames == 0 {
            return Err(anyhow!("bootstrap frame count must be at least 1"));
        }
        if !adaptation_rate.is_finite() || adaptation_rate <= 0.0 || adaptation_rate > 1.0 {
            return Err(anyhow!(
                "background adaptation rate must be in (0, 1], got {}",
                adaptation_rate
            ));
        }
        Ok(Self {
            estimate: None,
            frames_averaged: 0,
            bootstrap_frames,
            adaptation_rate,
        })
    }

    /// Feed a frame into the bootstrap phase.
    ///
    /// Returns `Steady` without touching the estimate once bootstrapping is done;
    /// the caller scores the frame against `snapshot()` and then calls `adapt()`.
    /// A frame whose size differs from the estimate restarts the bootstrap.
    pub fn submit(&mut self, frame: &LumaFrame) -> BackgroundPhase {
        let current = self
            .estimate
            .as_ref()
            .map(|estimate| (estimate.width, estimate.height));
        match current {
            Some(dims) if dims == frame.dimensions() => {
                if self.frames_averaged >= self.bootstrap_frames {
                    return BackgroundPhase::Steady;
                }
                let alpha = 1.0 / (self.frames_averaged as f32 + 1.0);
                if let Some(estimate) = self.estimate.as_mut() {
                    estimate.blend(frame, alpha);
                }
                self.frames_averaged += 1;
                if self.frames_averaged == self.bootstrap_frames {
                    log::info!(
                        "background stabilized after {} frames",
                        self.bootstrap_frames
                    );
                }
                self.stabilizing()
            }
            Some((width, height)) => {
                log::info!(
                    "frame size changed {}x{} -> {}x{}; re-bootstrapping background",
                    width,
                    height,
                    frame.width,
                    frame.height
                );
                self.reseed(frame);
                self.stabilizing()
            }
            None => {
                self.reseed(frame);
                self.stabilizing()
            }
        }
    }

    /// Blend a scored frame into a steady estimate with the fixed adaptation rate.
    pub fn adapt(&mut self, frame: &LumaFrame) {
        if !self.is_steady() {
            return;
        }
        if let Some(estimate) = self.estimate.as_mut() {
            if (estimate.width, estimate.height) == frame.dimensions() {
                estimate.blend(frame, self.adaptation_rate);
            }
        }
    }

    /// Replace the estimate with `frame` and restart bootstrapping from one frame.
    pub fn reseed(&mut self, frame: &LumaFrame) {
        self.estimate = Some(Estimate::seed(frame));
        self.frames_averaged = 1;
    }

    /// Drop the estimate entirely.
    pub fn clear(&mut self) {
        self.estimate = None;
        self.frames_averaged = 0;
    }

    pub fn is_initialized(&self) -> bool {
        self.estimate.is_some()
    }

    pub fn is_steady(&self) -> bool {
        self.estimate.is_some() && self.frames_averaged >= self.bootstrap_frames
    }

    /// Size of the current estimate, if any.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.estimate
            .as_ref()
            .map(|estimate| (estimate.width, estimate.height))
    }

    pub fn frames_averaged(&self) -> u32 {
        self.frames_averaged
    }

    pub fn bootstrap_frames(&self) -> u32 {
        self.bootstrap_frames
    }

    /// Read-only 8-bit view of a steady estimate, rounded and saturated.
    pub fn snapshot(&self) -> Option<LumaFrame> {
        if !self.is_steady() {
            return None;
        }
        self.estimate.as_ref().map(|estimate| {
            LumaFrame::from_parts(
                estimate.values.iter().map(|&v| clamp_to_u8(v.abs())).collect(),
                estimate.width,
                estimate.height,
            )
        })
    }

    fn stabilizing(&self) -> BackgroundPhase {
        BackgroundPhase::Stabilizing {
            progress: self.frames_averaged.min(self.bootstrap_frames),
            total: self.bootstrap_frames,
        }
    }
}

impl Default for BackgroundModel {
    fn default() -> Self {
        Self {
            estimate: None,
            frames_averaged: 0,
            bootstrap_frames: DEFAULT_BOOTSTRAP_FRAMES,
            adaptation_rate: DEFAULT_ADAPTATION_RATE,
        }
    }
}
