mod background;
mod debounce;
mod pipeline;
mod preprocess;
mod roi;
mod scorer;

pub use background::{
    BackgroundModel, BackgroundPhase, DEFAULT_ADAPTATION_RATE, DEFAULT_BOOTSTRAP_FRAMES,
};
pub use debounce::{
    DebounceSettings, DebounceState, Debouncer, Verdict, DEFAULT_CONFIRM_FRAMES, DEFAULT_COOLDOWN,
    DEFAULT_GRACE, DEFAULT_MOTION_THRESHOLD,
};
pub use pipeline::{DetectorState, FrameOutcome, MotionPipeline, PipelineSettings};
pub use preprocess::{Preprocessor, DEFAULT_BLUR_KERNEL};
pub use roi::{RoiMask, RoiMaskCache, RoiPoint, RoiPolygon, DEFAULT_ROI_POINTS, MASK_ACTIVE};
pub use scorer::{MotionScorer, MotionSignal, ScoringPolicy, DEFAULT_DIFF_THRESHOLD};
