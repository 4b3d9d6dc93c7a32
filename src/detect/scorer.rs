use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::detect::roi::{RoiMask, MASK_ACTIVE};
use crate::frame::LumaFrame;

pub const DEFAULT_DIFF_THRESHOLD: u8 = 35;

/// How a frame's masked difference is reduced to a single number.
///
/// The two policies produce values on very different scales, so the motion
/// threshold has to be tuned for whichever one is configured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Count ROI pixels whose difference exceeds the difference threshold.
    #[default]
    ChangedPixels,
    /// Sum the absolute differences of all ROI pixels.
    IntensitySum,
}

/// One frame's motion measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionSignal {
    pub magnitude: u64,
    pub captured_at: Instant,
}

#[derive(Clone, Copy, Debug)]
pub struct MotionScorer {
    diff_threshold: u8,
    policy: ScoringPolicy,
}

impl MotionScorer {
    pub fn new(diff_threshold: u8, policy: ScoringPolicy) -> Self {
        Self {
            diff_threshold,
            policy,
        }
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    /// Masked difference between `frame` and `background`.
    ///
    /// All three inputs must share dimensions; the pipeline rebuilds the mask and
    /// background whenever the capture size changes.
    pub fn score(&self, frame: &LumaFrame, background: &LumaFrame, mask: &RoiMask) -> u64 {
        debug_assert_eq!(frame.dimensions(), background.dimensions());
        debug_assert_eq!(frame.dimensions(), mask.dimensions());

        let masked_diffs = frame
            .as_slice()
            .iter()
            .zip(background.as_slice())
            .zip(mask.as_slice())
            .filter(|(_, m)| **m == MASK_ACTIVE)
            .map(|((&cur, &bg), _)| cur.abs_diff(bg));

        match self.policy {
            ScoringPolicy::ChangedPixels => masked_diffs
                .filter(|&d| d > self.diff_threshold)
                .count() as u64,
            ScoringPolicy::IntensitySum => masked_diffs.map(u64::from).sum(),
        }
    }
}

impl Default for MotionScorer {
    fn default() -> Self {
        Self::new(DEFAULT_DIFF_THRESHOLD, ScoringPolicy::default())
    }
}
