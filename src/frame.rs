//! Frame containers.
//!
//! - `Frame`: one captured image in its native pixel layout, stamped at capture.
//! - `LumaFrame`: single-channel 8-bit intensity field the detector works on.
//!
//! Frames are ephemeral. A source hands one to the monitor, the pipeline reads it,
//! and it is dropped before the next capture. Nothing in the crate keeps a history
//! of frames; the background model keeps its own float estimate instead.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::ingest::normalize::expected_len;

/// Pixel layout of a captured frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Interleaved 8-bit R, G, B.
    Rgb24,
    /// Full-resolution Y plane followed by interleaved half-resolution UV.
    Nv12,
    /// Single 8-bit intensity channel.
    Gray8,
}

// ----------------------------------------------------------------------------
// Frame: raw capture
// ----------------------------------------------------------------------------

/// Captured frame. The byte length always matches `width`, `height` and `format`.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    captured_at: Instant,
}

impl Frame {
    /// Wrap a capture buffer, validating its length against the declared layout.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero ({width}x{height})"));
        }
        let expected = expected_len(width, height, format)?;
        if data.len() != expected {
            return Err(anyhow!(
                "{:?} frame length mismatch: expected {}, got {}",
                format,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            captured_at: Instant::now(),
        })
    }

    /// Uniform grayscale frame.
    pub fn filled_gray(width: u32, height: u32, value: u8) -> Result<Self> {
        let len = expected_len(width, height, PixelFormat::Gray8)?;
        Self::new(vec![value; len], width, height, PixelFormat::Gray8)
    }

    /// Replace the capture instant. Sources replaying recorded or synthetic time use this.
    pub fn with_timestamp(mut self, captured_at: Instant) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

// ----------------------------------------------------------------------------
// LumaFrame: preprocessed intensity field
// ----------------------------------------------------------------------------

/// Row-major 8-bit intensity field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LumaFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl LumaFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = expected_len(width, height, PixelFormat::Gray8)?;
        if data.len() != expected {
            return Err(anyhow!(
                "luma frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Internal constructor for buffers whose length is already known to match.
    pub(crate) fn from_parts(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            data,
            width,
            height,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
