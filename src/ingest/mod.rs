//! Frame capture sources.
//!
//! - Synthetic scenes (`stub://` URLs), used by tests, the demo binary and dry runs
//! - USB/V4L2 cameras (feature: ingest-v4l2)
//!
//! Every source yields `Frame`s stamped with their capture instant. `Ok(None)`
//! means the stream ended; an error is terminal for the run loop.
//!
//! Sources MUST NOT write frames to disk or forward them anywhere. A frame lives
//! only until the pipeline has scored it.

pub(crate) mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub use synthetic::{SyntheticScene, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

pub const DEFAULT_WARMUP_FRAMES: u32 = 5;

/// Capture settings shared by all sources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// `stub://...`, a device path such as `/dev/video0`, or a bare camera index.
    pub url: String,
    /// Requested frame width. Devices may pick something else.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
    /// Requested frame rate.
    pub target_fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            target_fps: 30,
        }
    }
}

/// Counters reported by a source for health logging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

pub trait FrameSource {
    /// Open the underlying device. Failures here are fatal for the caller.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats;
}

/// Pick a source implementation for `config.url`.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    let url = config.url.trim();
    if url.is_empty() {
        return Err(anyhow!("capture source must not be empty"));
    }
    if url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config.clone())?));
    }
    if url.contains("://") {
        return Err(anyhow!(
            "unsupported capture source '{}' (expected stub://, a device path or a camera index)",
            url
        ));
    }
    let device = device_path(url);
    #[cfg(feature = "ingest-v4l2")]
    {
        Ok(Box::new(V4l2Source::new(SourceConfig {
            url: device,
            ..config.clone()
        })))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        Err(anyhow!(
            "camera capture from {} requires the ingest-v4l2 feature",
            device
        ))
    }
}

/// Bare camera indices map onto `/dev/videoN`.
pub fn device_path(url: &str) -> String {
    if !url.is_empty() && url.bytes().all(|b| b.is_ascii_digit()) {
        format!("/dev/video{}", url)
    } else {
        url.to_string()
    }
}

/// Read and discard up to `frames` frames so auto-exposure can settle.
///
/// Returns how many frames were discarded; fewer than requested means the
/// stream ended early.
pub fn warm_up(source: &mut dyn FrameSource, frames: u32) -> Result<u32> {
    let mut discarded = 0;
    while discarded < frames {
        if source.next_frame()?.is_none() {
            log::warn!(
                "capture ended during warm-up after {} of {} frames",
                discarded,
                frames
            );
            break;
        }
        discarded += 1;
    }
    if discarded > 0 {
        log::debug!("warm-up discarded {} frames", discarded);
    }
    Ok(discarded)
}
