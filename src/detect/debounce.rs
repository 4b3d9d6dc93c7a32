//! Debounce state machine.
//!
//! Turns the noisy per-frame motion signal into rate-limited trigger decisions:
//! - `Grace`: after start or reset, every signal is ignored until the grace
//!   period has elapsed.
//! - `Armed`: consecutive frames above the motion threshold grow a streak; any
//!   frame at or below it resets the streak.
//!
//! A streak that reaches `confirm_frames` fires only when the cooldown since the
//! previous trigger has elapsed. A confirmed streak blocked by cooldown is kept
//! and keeps growing, so it fires on the first qualifying frame after the
//! cooldown without building a fresh streak.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use crate::detect::scorer::MotionSignal;

pub const DEFAULT_MOTION_THRESHOLD: u64 = 2200;
pub const DEFAULT_CONFIRM_FRAMES: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);
pub const DEFAULT_GRACE: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebounceSettings {
    pub motion_threshold: u64,
    pub confirm_frames: u32,
    pub cooldown: Duration,
    pub grace: Duration,
}

impl DebounceSettings {
    pub fn validate(&self) -> Result<()> {
        if self.confirm_frames == 0 {
            return Err(anyhow!("confirm frame count must be at least 1"));
        }
        Ok(())
    }
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
            confirm_frames: DEFAULT_CONFIRM_FRAMES,
            cooldown: DEFAULT_COOLDOWN,
            grace: DEFAULT_GRACE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceState {
    /// Signals are ignored until `grace` has passed since `since`.
    Grace { since: Instant },
    /// Counting consecutive qualifying frames.
    Armed { streak: u32 },
}

/// Decision for one scored frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Grace period active, signal ignored.
    Grace,
    /// Signal at or below the motion threshold.
    Quiet,
    /// Qualifying frame, streak not long enough yet.
    Building { streak: u32 },
    /// Streak confirmed but the previous trigger is too recent.
    CoolingDown { streak: u32 },
    /// Confirmed event. Dispatch exactly once.
    Trigger { magnitude: u64 },
}

impl Verdict {
    pub fn is_trigger(&self) -> bool {
        matches!(self, Verdict::Trigger { .. })
    }
}

#[derive(Clone, Debug)]
pub struct Debouncer {
    settings: DebounceSettings,
    state: DebounceState,
    last_trigger: Option<Instant>,
    trigger_count: u64,
}

impl Debouncer {
    /// New debouncer whose grace period starts at `now`.
    pub fn new(settings: DebounceSettings, now: Instant) -> Self {
        Self {
            settings,
            state: DebounceState::Grace { since: now },
            last_trigger: None,
            trigger_count: 0,
        }
    }

    pub fn observe(&mut self, signal: MotionSignal) -> Verdict {
        let now = signal.captured_at;
        let streak = match self.state {
            DebounceState::Grace { since }
                if now.saturating_duration_since(since) < self.settings.grace =>
            {
                return Verdict::Grace;
            }
            DebounceState::Grace { .. } => {
                log::info!("grace period over; motion triggers armed");
                0
            }
            DebounceState::Armed { streak } => streak,
        };

        if signal.magnitude <= self.settings.motion_threshold {
            self.state = DebounceState::Armed { streak: 0 };
            return Verdict::Quiet;
        }

        let streak = streak.saturating_add(1);
        if streak < self.settings.confirm_frames {
            self.state = DebounceState::Armed { streak };
            return Verdict::Building { streak };
        }
        if !self.cooldown_elapsed(now) {
            self.state = DebounceState::Armed { streak };
            return Verdict::CoolingDown { streak };
        }

        self.state = DebounceState::Armed { streak: 0 };
        self.last_trigger = Some(now);
        self.trigger_count += 1;
        Verdict::Trigger {
            magnitude: signal.magnitude,
        }
    }

    /// Drop any streak and restart the grace period at `now`.
    ///
    /// The cooldown clock is left alone; a reset does not license an early trigger.
    pub fn reset(&mut self, now: Instant) {
        self.state = DebounceState::Grace { since: now };
    }

    /// Drop any streak without touching grace or the cooldown clock.
    pub fn clear_streak(&mut self) {
        if let DebounceState::Armed { streak } = self.state {
            if streak > 0 {
                log::debug!("motion streak of {} discarded", streak);
            }
            self.state = DebounceState::Armed { streak: 0 };
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn streak(&self) -> u32 {
        match self.state {
            DebounceState::Grace { .. } => 0,
            DebounceState::Armed { streak } => streak,
        }
    }

    pub fn in_grace(&self, now: Instant) -> bool {
        match self.state {
            DebounceState::Grace { since } => {
                now.saturating_duration_since(since) < self.settings.grace
            }
            DebounceState::Armed { .. } => false,
        }
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }

    pub fn trigger_count(&self) -> u64 {
        self.trigger_count
    }

    pub fn settings(&self) -> &DebounceSettings {
        &self.settings
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.last_trigger
            .map_or(true, |last| now.saturating_duration_since(last) > self.settings.cooldown)
    }
}
