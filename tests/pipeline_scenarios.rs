use std::time::{Duration, Instant};

use fast_guard::detect::RoiMask;
use fast_guard::{
    Frame, FrameOutcome, MotionPipeline, PipelineSettings, PixelFormat, RecordingAction,
    RoiPolygon, TriggerDispatcher, TriggerEvent, Verdict,
};

const SIZE: u32 = 100;
const BACKGROUND: u8 = 50;
const INTRUDER: u8 = 200;
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Drives a pipeline with virtual time and an inline recording action.
struct Scenario {
    start: Instant,
    elapsed: Duration,
    mask: RoiMask,
    pipeline: MotionPipeline,
    dispatcher: TriggerDispatcher,
    recorder: RecordingAction,
    events: Vec<TriggerEvent>,
}

impl Scenario {
    fn new() -> Self {
        let start = Instant::now();
        let recorder = RecordingAction::new();
        Self {
            start,
            elapsed: Duration::ZERO,
            mask: RoiMask::build(&RoiPolygon::default(), SIZE, SIZE),
            pipeline: MotionPipeline::new(
                PipelineSettings::default(),
                RoiPolygon::default(),
                start,
            )
            .expect("pipeline"),
            dispatcher: TriggerDispatcher::inline(Box::new(recorder.clone())),
            recorder,
            events: Vec::new(),
        }
    }

    fn now(&self) -> Instant {
        self.start + self.elapsed
    }

    /// Jump the virtual clock to `secs` after start.
    fn at(&mut self, secs: f64) -> &mut Self {
        self.elapsed = Duration::from_secs_f64(secs);
        self
    }

    fn frame(&self, mask: &RoiMask, roi_value: u8) -> Frame {
        let pixels = mask
            .as_slice()
            .iter()
            .map(|&m| if m == 0 { BACKGROUND } else { roi_value })
            .collect();
        Frame::new(pixels, mask.width, mask.height, PixelFormat::Gray8)
            .expect("frame")
            .with_timestamp(self.now())
    }

    fn feed(&mut self, roi_value: u8, count: usize) -> Vec<FrameOutcome> {
        let mask = self.mask.clone();
        self.feed_masked(&mask, roi_value, count)
    }

    /// Like `feed`, but frames take the size of `mask`.
    fn feed_masked(&mut self, mask: &RoiMask, roi_value: u8, count: usize) -> Vec<FrameOutcome> {
        let mut outcomes = Vec::with_capacity(count);
        for _ in 0..count {
            let frame = self.frame(mask, roi_value);
            let outcome = self.pipeline.process(&frame);
            if let FrameOutcome::Scored {
                verdict: Verdict::Trigger { magnitude },
                ..
            } = outcome
            {
                self.events.push(self.dispatcher.dispatch(magnitude));
            }
            outcomes.push(outcome);
            self.elapsed += FRAME_INTERVAL;
        }
        outcomes
    }

    fn reset(&mut self) {
        self.pipeline.reset(self.now());
    }
}

#[test]
fn intruder_after_grace_triggers_exactly_once() {
    let mut scenario = Scenario::new();
    let bootstrap = scenario.feed(BACKGROUND, 20);
    assert!(bootstrap
        .iter()
        .all(|o| matches!(o, FrameOutcome::Stabilizing { .. })));
    assert!(scenario.pipeline.state().background().is_steady());

    scenario.at(3.5);
    let outcomes = scenario.feed(INTRUDER, 3);
    assert!(outcomes[2].is_trigger());

    assert_eq!(scenario.recorder.calls(), 1);
    assert_eq!(scenario.events.len(), 1);
    let event = scenario.events[0];
    assert_eq!(Some(event.magnitude), outcomes[2].magnitude());
    // Every ROI pixel changed by far more than the difference threshold.
    assert_eq!(event.magnitude, scenario.mask.active_pixels() as u64);
    assert!(event.magnitude > 2200);

    // The intruder stays: the background restarted from it, so no second trigger.
    scenario.feed(INTRUDER, 30);
    assert_eq!(scenario.recorder.calls(), 1);
}

#[test]
fn grace_period_suppresses_everything() {
    let mut scenario = Scenario::new();
    scenario.feed(BACKGROUND, 20);
    let outcomes = scenario.feed(INTRUDER, 60);
    assert!(scenario.elapsed < Duration::from_secs(3));
    assert!(outcomes.iter().all(|o| !o.is_trigger()));
    assert!(outcomes.iter().all(|o| matches!(
        o,
        FrameOutcome::Scored {
            verdict: Verdict::Grace,
            ..
        }
    )));
    assert_eq!(scenario.recorder.calls(), 0);
}

#[test]
fn short_bursts_never_trigger() {
    let mut scenario = Scenario::new();
    scenario.feed(BACKGROUND, 20);
    scenario.at(4.0);
    for _ in 0..5 {
        scenario.feed(INTRUDER, 2);
        scenario.feed(BACKGROUND, 1);
    }
    assert_eq!(scenario.recorder.calls(), 0);
}

#[test]
fn bursts_inside_cooldown_trigger_once() {
    let mut scenario = Scenario::new();
    scenario.feed(BACKGROUND, 20);
    scenario.at(4.0);
    scenario.feed(INTRUDER, 3);
    // Re-bootstrap on the emptied scene, then a second burst 1.2 s after the first.
    scenario.feed(BACKGROUND, 25);
    scenario.at(5.2);
    let second = scenario.feed(INTRUDER, 3);
    assert!(matches!(
        second[2],
        FrameOutcome::Scored {
            verdict: Verdict::CoolingDown { .. },
            ..
        }
    ));
    scenario.feed(BACKGROUND, 1);
    assert_eq!(scenario.recorder.calls(), 1);
}

#[test]
fn bursts_beyond_cooldown_trigger_twice() {
    let mut scenario = Scenario::new();
    scenario.feed(BACKGROUND, 20);
    scenario.at(4.0);
    scenario.feed(INTRUDER, 3);
    scenario.feed(BACKGROUND, 25);
    scenario.at(6.5);
    scenario.feed(INTRUDER, 3);
    assert_eq!(scenario.recorder.calls(), 2);
    assert_eq!(scenario.events[1].sequence, 2);
}

#[test]
fn reset_mid_streak_restarts_bootstrap_and_grace() {
    let mut scenario = Scenario::new();
    scenario.feed(BACKGROUND, 20);
    scenario.at(4.0);
    scenario.feed(INTRUDER, 2);
    assert_eq!(scenario.pipeline.state().debouncer().streak(), 2);

    scenario.reset();
    assert_eq!(scenario.pipeline.state().debouncer().streak(), 0);
    assert!(!scenario.pipeline.state().background().is_initialized());

    let first = scenario.feed(BACKGROUND, 1);
    assert_eq!(
        first[0],
        FrameOutcome::Stabilizing {
            progress: 1,
            total: 20
        }
    );
    scenario.feed(BACKGROUND, 19);
    assert!(scenario.pipeline.state().background().is_steady());

    // Still inside the grace period restarted at 4.066 s.
    scenario.at(6.5);
    scenario.feed(INTRUDER, 5);
    assert_eq!(scenario.recorder.calls(), 0);

    scenario.feed(BACKGROUND, 1);
    scenario.at(7.2);
    scenario.feed(INTRUDER, 3);
    assert_eq!(scenario.recorder.calls(), 1);
}

#[test]
fn lighting_drift_is_absorbed() {
    let mut scenario = Scenario::new();
    scenario.feed(BACKGROUND, 20);
    scenario.at(4.0);
    // Whole-scene brightening by one level every few frames never looks like motion.
    let mut level = BACKGROUND;
    for i in 0..300 {
        if i % 4 == 0 {
            level = level.saturating_add(1);
        }
        let pixels = vec![level; (SIZE * SIZE) as usize];
        let frame = Frame::new(pixels, SIZE, SIZE, PixelFormat::Gray8)
            .expect("frame")
            .with_timestamp(scenario.now());
        let outcome = scenario.pipeline.process(&frame);
        assert!(!outcome.is_trigger());
        scenario.elapsed += FRAME_INTERVAL;
    }
    assert_eq!(scenario.recorder.calls(), 0);
}

#[test]
fn resolution_change_restarts_bootstrap_and_streak() {
    let mut scenario = Scenario::new();
    scenario.feed(BACKGROUND, 20);
    scenario.at(4.0);
    scenario.feed(INTRUDER, 2);
    assert_eq!(scenario.pipeline.state().debouncer().streak(), 2);

    let wide = RoiMask::build(&RoiPolygon::default(), 160, 120);
    let rebootstrap = scenario.feed_masked(&wide, BACKGROUND, 20);
    assert_eq!(
        rebootstrap[0],
        FrameOutcome::Stabilizing {
            progress: 1,
            total: 20
        }
    );
    assert!(rebootstrap
        .iter()
        .all(|o| matches!(o, FrameOutcome::Stabilizing { .. })));
    assert_eq!(scenario.pipeline.state().debouncer().streak(), 0);
    assert!(scenario.pipeline.state().background().is_steady());

    // The old streak is gone: a full new one is needed.
    let outcomes = scenario.feed_masked(&wide, INTRUDER, 3);
    assert!(!outcomes[0].is_trigger());
    assert!(!outcomes[1].is_trigger());
    assert!(outcomes[2].is_trigger());
    assert_eq!(scenario.recorder.calls(), 1);
    assert_eq!(
        scenario.events[0].magnitude,
        wide.active_pixels() as u64
    );
}
