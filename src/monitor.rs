//! Run loop.
//!
//! One thread drives capture -> pipeline -> dispatch -> display. Operator
//! commands are drained between frames only, so a frame is always processed
//! against a consistent detector state. A `Reset` takes effect at the capture
//! timestamp of the next frame.

use anyhow::{Context, Result};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use crate::action::TriggerDispatcher;
use crate::detect::{FrameOutcome, MotionPipeline, Verdict};
use crate::ingest::FrameSource;
use crate::input::Command;
use crate::ui::{Display, Overlay};

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    Quit,
    EndOfStream,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub stabilizing_frames: u64,
    pub triggers: u64,
    /// Resets applied to the pipeline.
    pub resets: u64,
    pub end: EndReason,
}

#[derive(Default)]
struct Counters {
    frames: u64,
    stabilizing_frames: u64,
    triggers: u64,
    resets: u64,
}

impl Counters {
    fn finish(self, end: EndReason) -> RunSummary {
        RunSummary {
            frames: self.frames,
            stabilizing_frames: self.stabilizing_frames,
            triggers: self.triggers,
            resets: self.resets,
            end,
        }
    }
}

pub struct Monitor {
    source: Box<dyn FrameSource>,
    pipeline: MotionPipeline,
    dispatcher: TriggerDispatcher,
    display: Box<dyn Display>,
    commands: Receiver<Command>,
    health_interval: Duration,
}

impl Monitor {
    /// `source` must already be connected.
    pub fn new(
        source: Box<dyn FrameSource>,
        pipeline: MotionPipeline,
        dispatcher: TriggerDispatcher,
        display: Box<dyn Display>,
        commands: Receiver<Command>,
    ) -> Self {
        Self {
            source,
            pipeline,
            dispatcher,
            display,
            commands,
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    pub fn pipeline(&self) -> &MotionPipeline {
        &self.pipeline
    }

    pub fn dispatcher(&self) -> &TriggerDispatcher {
        &self.dispatcher
    }

    /// Run until `Quit` or end of stream. A capture error ends the run and is returned.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut counters = Counters::default();
        let result = self.run_loop(&mut counters);
        self.display.finish();

        let end = result?;
        let summary = counters.finish(end);
        log::info!(
            "monitor stopped ({:?}): frames={} stabilizing={} triggers={} resets={}",
            summary.end,
            summary.frames,
            summary.stabilizing_frames,
            summary.triggers,
            summary.resets
        );
        Ok(summary)
    }

    /// Stop the dispatcher, waiting for queued actions.
    pub fn shutdown(self) -> Result<()> {
        self.dispatcher.stop()
    }

    fn run_loop(&mut self, counters: &mut Counters) -> Result<EndReason> {
        let mut pending_reset = false;
        let mut last_health: Option<Instant> = None;

        loop {
            if self.drain_commands(&mut pending_reset) {
                return Ok(EndReason::Quit);
            }

            let Some(frame) = self.source.next_frame().context("frame capture failed")? else {
                return Ok(EndReason::EndOfStream);
            };
            let now = frame.captured_at();

            if pending_reset {
                pending_reset = false;
                self.pipeline.reset(now);
                counters.resets += 1;
            }

            let outcome = self.pipeline.process(&frame);
            counters.frames += 1;
            if let FrameOutcome::Stabilizing { .. } = outcome {
                counters.stabilizing_frames += 1;
            }
            if let FrameOutcome::Scored {
                verdict: Verdict::Trigger { magnitude },
                ..
            } = outcome
            {
                counters.triggers += 1;
                self.dispatcher.dispatch(magnitude);
            }

            self.display.render(&Overlay {
                frame_index: counters.frames,
                dimensions: frame.dimensions(),
                roi: self.pipeline.roi(),
                outcome,
            });

            let since = *last_health.get_or_insert(now);
            if now.saturating_duration_since(since) >= self.health_interval {
                last_health = Some(now);
                self.log_health(counters);
            }
        }
    }

    /// Returns true when a `Quit` was received.
    fn drain_commands(&mut self, pending_reset: &mut bool) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(Command::Quit) => {
                    log::info!("quit requested");
                    return true;
                }
                Ok(Command::Reset) => {
                    log::info!("reset requested");
                    *pending_reset = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn log_health(&self, counters: &Counters) {
        let stats = self.source.stats();
        let healthy = self.source.is_healthy();
        let message = format!(
            "health: source={} healthy={} captured={} processed={} triggers={} dropped_actions={}",
            stats.source,
            healthy,
            stats.frames_captured,
            counters.frames,
            counters.triggers,
            self.dispatcher.dropped()
        );
        if healthy {
            log::info!("{}", message);
        } else {
            log::warn!("{}", message);
        }
    }
}
