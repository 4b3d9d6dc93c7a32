//! Synthetic frame source.
//!
//! `stub://` URLs produce a static, slightly noisy RGB scene. Unless the scene is
//! `stub://static`, a bright block periodically "walks in" over the upper bar of
//! the default region of interest, which is enough to exercise the whole
//! detection path without a camera.
//!
//! Options go in the query string, e.g. `stub://intruder?frames=900&period=150`:
//! - `frames`: end the stream after this many frames (default: endless)
//! - `period`: frames between intruder appearances, 0 disables (default 150)
//! - `duration`: frames each appearance lasts (default 20)
//! - `noise`: per-pixel noise amplitude (default 4)
//! - `seed`: noise seed (default 7)
//! - `realtime`: pace frames at the target fps (default true)
//!
//! Timestamps are virtual: frame `n` is stamped `n / fps` after connect whether
//! or not the source is paced.

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

use super::{FrameSource, SourceConfig, SourceStats};
use crate::frame::{Frame, PixelFormat};

const INTRUDER_LEVEL: u8 = 230;
/// Intruder rectangle in normalized coordinates: x0, y0, x1, y1.
const INTRUDER_RECT: [f32; 4] = [0.35, 0.15, 0.75, 0.38];

/// Scene parameters parsed from a `stub://` URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticScene {
    pub frame_limit: Option<u64>,
    pub intruder_period: u64,
    pub intruder_frames: u64,
    pub noise: u8,
    pub seed: u64,
    pub realtime: bool,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            frame_limit: None,
            intruder_period: 150,
            intruder_frames: 20,
            noise: 4,
            seed: 7,
            realtime: true,
        }
    }
}

impl SyntheticScene {
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic source url must start with stub:// ({})", url))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut scene = SyntheticScene::default();
        if name == "static" {
            scene.intruder_period = 0;
        }
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("stub option '{}' must be key=value", pair))?;
            match key {
                "frames" => scene.frame_limit = Some(parse_option(key, value)?),
                "period" => scene.intruder_period = parse_option(key, value)?,
                "duration" => scene.intruder_frames = parse_option(key, value)?,
                "noise" => scene.noise = parse_option(key, value)?,
                "seed" => scene.seed = parse_option(key, value)?,
                "realtime" => scene.realtime = parse_bool(value)?,
                other => return Err(anyhow!("unknown stub option '{}'", other)),
            }
        }
        Ok(scene)
    }

    /// Whether frame `index` (0-based) shows the intruder.
    pub fn intruder_visible(&self, index: u64) -> bool {
        if self.intruder_period == 0 {
            return false;
        }
        // Appearances sit at the end of each period so the first one lands after
        // background bootstrap and the grace period.
        let phase = index % self.intruder_period;
        phase >= self.intruder_period.saturating_sub(self.intruder_frames)
    }
}

fn parse_option<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value '{}' for stub option {}", value, key))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(anyhow!("invalid boolean '{}' for stub option realtime", other)),
    }
}

pub struct SyntheticSource {
    config: SourceConfig,
    scene: SyntheticScene,
    rng: StdRng,
    background: Vec<u8>,
    origin: Option<Instant>,
    frame_interval: Duration,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "synthetic source needs non-zero dimensions ({}x{})",
                config.width,
                config.height
            ));
        }
        let scene = SyntheticScene::parse(&config.url)?;
        let fps = config.target_fps.max(1);
        Ok(Self {
            rng: StdRng::seed_from_u64(scene.seed),
            background: Vec::new(),
            origin: None,
            frame_interval: Duration::from_secs(1) / fps,
            frame_count: 0,
            config,
            scene,
        })
    }

    pub fn scene(&self) -> &SyntheticScene {
        &self.scene
    }

    fn render(&mut self, index: u64) -> Vec<u8> {
        let (width, height) = (self.config.width as usize, self.config.height as usize);
        let mut pixels = self.background.clone();
        let noise = self.scene.noise as i16;
        if noise > 0 {
            for rgb in pixels.chunks_exact_mut(3) {
                let delta = self.rng.gen_range(-noise..=noise);
                for channel in rgb.iter_mut() {
                    *channel = (*channel as i16 + delta).clamp(0, 255) as u8;
                }
            }
        }

        if self.scene.intruder_visible(index) {
            let [x0, y0, x1, y1] = INTRUDER_RECT;
            let cols = (x0 * width as f32) as usize..(x1 * width as f32) as usize;
            let rows = (y0 * height as f32) as usize..(y1 * height as f32) as usize;
            for y in rows {
                let row = y * width * 3;
                for x in cols.clone() {
                    pixels[row + x * 3..row + x * 3 + 3].fill(INTRUDER_LEVEL);
                }
            }
        }
        pixels
    }
}

/// Soft gradient so blur and thresholding see some structure.
fn background_scene(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let base = 60 + (x * 40 / width) as u8 + (y * 30 / height) as u8;
            pixels.extend_from_slice(&[base, base.saturating_add(8), base.saturating_sub(6)]);
        }
    }
    pixels
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.background = background_scene(self.config.width, self.config.height);
        self.origin = Some(Instant::now());
        log::info!(
            "SyntheticSource: connected to {} ({}x{} @ {} fps)",
            self.config.url,
            self.config.width,
            self.config.height,
            self.config.target_fps
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let origin = self
            .origin
            .ok_or_else(|| anyhow!("synthetic source not connected"))?;
        if self
            .scene
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }

        let index = self.frame_count;
        let due = origin + self.frame_interval * index as u32;
        if self.scene.realtime {
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }

        let pixels = self.render(index);
        self.frame_count += 1;
        let frame = Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            PixelFormat::Rgb24,
        )?;
        Ok(Some(frame.with_timestamp(due)))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> SourceConfig {
        SourceConfig {
            url: url.to_string(),
            width: 64,
            height: 48,
            target_fps: 10,
        }
    }

    #[test]
    fn parses_scene_options() -> Result<()> {
        let scene = SyntheticScene::parse("stub://intruder?frames=30&period=10&duration=2&realtime=0")?;
        assert_eq!(scene.frame_limit, Some(30));
        assert_eq!(scene.intruder_period, 10);
        assert_eq!(scene.intruder_frames, 2);
        assert!(!scene.realtime);

        let scene = SyntheticScene::parse("stub://static")?;
        assert_eq!(scene.intruder_period, 0);
        assert!(SyntheticScene::parse("stub://x?frames=lots").is_err());
        assert!(SyntheticScene::parse("stub://x?colour=red").is_err());
        Ok(())
    }

    #[test]
    fn intruder_sits_at_end_of_period() {
        let scene = SyntheticScene {
            intruder_period: 10,
            intruder_frames: 3,
            ..SyntheticScene::default()
        };
        let visible: Vec<u64> = (0..20).filter(|&i| scene.intruder_visible(i)).collect();
        assert_eq!(visible, vec![7, 8, 9, 17, 18, 19]);
    }

    #[test]
    fn produces_stamped_frames_until_limit() -> Result<()> {
        let mut source = SyntheticSource::new(config("stub://static?frames=3&realtime=false"))?;
        source.connect()?;
        let first = source.next_frame()?.expect("frame");
        let second = source.next_frame()?.expect("frame");
        assert_eq!(first.dimensions(), (64, 48));
        assert_eq!(first.format, PixelFormat::Rgb24);
        assert_eq!(
            second.captured_at() - first.captured_at(),
            Duration::from_millis(100)
        );
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 3);
        Ok(())
    }

    #[test]
    fn intruder_brightens_region() -> Result<()> {
        let mut source = SyntheticSource::new(config(
            "stub://intruder?period=2&duration=1&noise=0&realtime=false",
        ))?;
        source.connect()?;
        let quiet = source.next_frame()?.expect("frame");
        let busy = source.next_frame()?.expect("frame");
        // Pixel (32, 12) lies inside the intruder rectangle.
        let offset = (12 * 64 + 32) * 3;
        assert!(quiet.pixels()[offset] < 150);
        assert_eq!(busy.pixels()[offset], INTRUDER_LEVEL);
        Ok(())
    }

    #[test]
    fn requires_connect() -> Result<()> {
        let mut source = SyntheticSource::new(config("stub://static"))?;
        assert!(source.next_frame().is_err());
        Ok(())
    }
}
