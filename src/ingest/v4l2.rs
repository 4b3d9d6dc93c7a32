//! V4L2 camera source.
//!
//! Opens a local device node (e.g. /dev/video0), asks for RGB3 at the
//! configured resolution and frame rate, and accepts whatever the driver settles
//! on as long as it is RGB3 or NV12. Frames are copied out of the mmap ring and
//! stamped at dequeue time.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::expected_len;
use super::{FrameSource, SourceConfig, SourceStats};
use crate::frame::{Frame, PixelFormat};

const MMAP_BUFFERS: u32 = 4;

pub struct V4l2Source {
    config: SourceConfig,
    state: Option<DeviceState>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
    active_format: PixelFormat,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            active_format: PixelFormat::Rgb24,
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

fn pixel_format_for(fourcc: v4l::FourCC) -> Option<PixelFormat> {
    match &fourcc.repr {
        b"RGB3" => Some(PixelFormat::Rgb24),
        b"NV12" => Some(PixelFormat::Nv12),
        _ => None,
    }
}

impl FrameSource for V4l2Source {
    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.url)
            .with_context(|| format!("open v4l2 device {}", self.config.url))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.url,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let pixel_format = pixel_format_for(format.fourcc).ok_or_else(|| {
            anyhow!(
                "v4l2 device {} delivers unsupported pixel format {}",
                self.config.url,
                format.fourcc
            )
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.url,
                    err
                );
            }
        }

        if (format.width, format.height) != (self.config.width, self.config.height) {
            log::warn!(
                "V4l2Source: requested {}x{}, device chose {}x{}",
                self.config.width,
                self.config.height,
                format.width,
                format.height
            );
        }
        self.active_width = format.width;
        self.active_height = format.height;
        self.active_format = pixel_format;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, MMAP_BUFFERS)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.config.url,
            self.active_width,
            self.active_height,
            self.active_format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let len = expected_len(self.active_width, self.active_height, self.active_format)?;
        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let data = state
            .with_mut(|fields| {
                fields
                    .stream
                    .next()
                    .map(|(buf, _meta)| buf.get(..len).map(<[u8]>::to_vec))
            })
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?
            .ok_or_else(|| anyhow!("v4l2 buffer shorter than {} bytes", len))?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Frame::new(data, self.active_width, self.active_height, self.active_format).map(Some)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}
