use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::action::{ActionSpec, DispatchMode};
use crate::detect::{
    BackgroundModel, DebounceSettings, PipelineSettings, Preprocessor, RoiPoint, RoiPolygon,
    ScoringPolicy,
};
use crate::ingest::{SourceConfig, DEFAULT_WARMUP_FRAMES};

pub const CONFIG_ENV: &str = "FAST_GUARD_CONFIG";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct GuardConfigFile {
    capture: Option<CaptureConfigFile>,
    roi: Option<Vec<[f64; 2]>>,
    detection: Option<DetectionConfigFile>,
    timing: Option<TimingConfigFile>,
    action: Option<ActionSpec>,
    dispatch: Option<DispatchMode>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CaptureConfigFile {
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    warmup_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionConfigFile {
    blur_kernel: Option<u32>,
    diff_threshold: Option<u8>,
    scoring: Option<ScoringPolicy>,
    motion_threshold: Option<u64>,
    confirm_frames: Option<u32>,
    bootstrap_frames: Option<u32>,
    adaptation_rate: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TimingConfigFile {
    cooldown_secs: Option<f64>,
    grace_secs: Option<f64>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub source: SourceConfig,
    pub warmup_frames: u32,
    pub roi: RoiPolygon,
    pub pipeline: PipelineSettings,
    pub action: ActionSpec,
    pub dispatch: DispatchMode,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            warmup_frames: DEFAULT_WARMUP_FRAMES,
            roi: RoiPolygon::default(),
            pipeline: PipelineSettings::default(),
            action: ActionSpec::default(),
            dispatch: DispatchMode::default(),
        }
    }
}

impl GuardConfig {
    /// File named by `FAST_GUARD_CONFIG` (if any), then env overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Same as `load`, with an explicit config file instead of `FAST_GUARD_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GuardConfigFile) -> Result<Self> {
        let defaults = GuardConfig::default();
        let capture = file.capture.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let timing = file.timing.unwrap_or_default();

        let source = SourceConfig {
            url: capture.source.unwrap_or(defaults.source.url),
            width: capture.width.unwrap_or(defaults.source.width),
            height: capture.height.unwrap_or(defaults.source.height),
            target_fps: capture.target_fps.unwrap_or(defaults.source.target_fps),
        };
        let roi = match file.roi {
            Some(pairs) => RoiPolygon::from_pairs(&pairs)?,
            None => defaults.roi,
        };

        let base = defaults.pipeline;
        let debounce = DebounceSettings {
            motion_threshold: detection
                .motion_threshold
                .unwrap_or(base.debounce.motion_threshold),
            confirm_frames: detection
                .confirm_frames
                .unwrap_or(base.debounce.confirm_frames),
            cooldown: match timing.cooldown_secs {
                Some(secs) => parse_secs("cooldown_secs", secs)?,
                None => base.debounce.cooldown,
            },
            grace: match timing.grace_secs {
                Some(secs) => parse_secs("grace_secs", secs)?,
                None => base.debounce.grace,
            },
        };
        let pipeline = PipelineSettings {
            blur_kernel: detection.blur_kernel.unwrap_or(base.blur_kernel),
            diff_threshold: detection.diff_threshold.unwrap_or(base.diff_threshold),
            scoring: detection.scoring.unwrap_or(base.scoring),
            bootstrap_frames: detection.bootstrap_frames.unwrap_or(base.bootstrap_frames),
            adaptation_rate: detection.adaptation_rate.unwrap_or(base.adaptation_rate),
            debounce,
        };

        Ok(Self {
            source,
            warmup_frames: capture.warmup_frames.unwrap_or(defaults.warmup_frames),
            roi,
            pipeline,
            action: file.action.unwrap_or(defaults.action),
            dispatch: file.dispatch.unwrap_or(defaults.dispatch),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("FAST_GUARD_SOURCE") {
            if !source.trim().is_empty() {
                self.source.url = source.trim().to_string();
            }
        }
        if let Ok(roi) = std::env::var("FAST_GUARD_ROI") {
            if !roi.trim().is_empty() {
                self.roi = parse_roi(&roi)?;
            }
        }
        if let Ok(threshold) = std::env::var("FAST_GUARD_MOTION_THRESHOLD") {
            self.pipeline.debounce.motion_threshold = threshold.trim().parse().map_err(|_| {
                anyhow!("FAST_GUARD_MOTION_THRESHOLD must be a non-negative integer pixel count")
            })?;
        }
        if let Ok(cooldown) = std::env::var("FAST_GUARD_COOLDOWN_SECS") {
            self.pipeline.debounce.cooldown =
                parse_secs_env("FAST_GUARD_COOLDOWN_SECS", &cooldown)?;
        }
        if let Ok(grace) = std::env::var("FAST_GUARD_GRACE_SECS") {
            self.pipeline.debounce.grace = parse_secs_env("FAST_GUARD_GRACE_SECS", &grace)?;
        }
        if let Ok(action) = std::env::var("FAST_GUARD_ACTION") {
            if !action.trim().is_empty() {
                self.action = ActionSpec::parse(&action)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("capture source must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!(
                "capture resolution must be non-zero ({}x{})",
                self.source.width,
                self.source.height
            ));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("capture target_fps must be greater than zero"));
        }
        Preprocessor::new(self.pipeline.blur_kernel)?;
        BackgroundModel::new(self.pipeline.bootstrap_frames, self.pipeline.adaptation_rate)?;
        self.pipeline.debounce.validate()?;
        if let ActionSpec::Command { program, .. } = &self.action {
            if program.trim().is_empty() {
                return Err(anyhow!("command action program must not be empty"));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<GuardConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_secs(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("{} must be a non-negative number of seconds, got {}", field, secs))
}

fn parse_secs_env(key: &str, value: &str) -> Result<Duration> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be a number of seconds", key))?;
    parse_secs(key, secs)
}

/// `x:y` pairs separated by commas, e.g. `0.1:0.1,0.9:0.1,0.5:0.9`.
fn parse_roi(value: &str) -> Result<RoiPolygon> {
    let points = split_csv(value)
        .iter()
        .map(|entry| {
            let (x, y) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("FAST_GUARD_ROI entry '{}' must be x:y", entry))?;
            let parse = |v: &str| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| anyhow!("FAST_GUARD_ROI entry '{}' is not numeric", entry))
            };
            Ok(RoiPoint::new(parse(x)?, parse(y)?))
        })
        .collect::<Result<Vec<_>>>()?;
    RoiPolygon::new(points)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
