use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::action::Actionable;

/// Pending triggers allowed to queue behind a stalled action before new ones
/// are dropped. Cooldown keeps the real rate far below this.
const MAX_PENDING_TRIGGERS: usize = 8;

/// Where the action runs relative to the frame loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Run the action on the calling thread. Deterministic; used by tests.
    Inline,
    /// Hand the trigger to a worker thread and return immediately.
    #[default]
    Background,
}

/// One confirmed motion event as seen by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerEvent {
    pub sequence: u64,
    pub magnitude: u64,
    pub at: SystemTime,
}

impl TriggerEvent {
    /// Wall-clock time as fractional epoch seconds, for log lines.
    pub fn epoch_secs(&self) -> f64 {
        self.at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

enum Worker {
    Inline(Box<dyn Actionable>),
    Background {
        action_name: &'static str,
        tx: Option<SyncSender<TriggerEvent>>,
        join: Option<JoinHandle<()>>,
    },
}

/// Runs the configured action once per trigger.
///
/// In background mode a stalled action never blocks the caller: events queue up
/// to a small bound and further events are logged and dropped.
pub struct TriggerDispatcher {
    worker: Worker,
    dispatched: u64,
    dropped: u64,
}

impl TriggerDispatcher {
    pub fn new(action: Box<dyn Actionable>, mode: DispatchMode) -> Result<Self> {
        match mode {
            DispatchMode::Inline => Ok(Self::inline(action)),
            DispatchMode::Background => Self::spawn(action),
        }
    }

    pub fn inline(action: Box<dyn Actionable>) -> Self {
        Self {
            worker: Worker::Inline(action),
            dispatched: 0,
            dropped: 0,
        }
    }

    pub fn spawn(action: Box<dyn Actionable>) -> Result<Self> {
        let action_name = action.name();
        let (tx, rx) = mpsc::sync_channel(MAX_PENDING_TRIGGERS);
        let join = std::thread::Builder::new()
            .name("fast-guard-action".to_string())
            .spawn(move || run_worker(action, rx))?;
        Ok(Self {
            worker: Worker::Background {
                action_name,
                tx: Some(tx),
                join: Some(join),
            },
            dispatched: 0,
            dropped: 0,
        })
    }

    pub fn mode(&self) -> DispatchMode {
        match self.worker {
            Worker::Inline(_) => DispatchMode::Inline,
            Worker::Background { .. } => DispatchMode::Background,
        }
    }

    /// Record a trigger and run (or enqueue) the action exactly once.
    pub fn dispatch(&mut self, magnitude: u64) -> TriggerEvent {
        self.dispatched += 1;
        let event = TriggerEvent {
            sequence: self.dispatched,
            magnitude,
            at: SystemTime::now(),
        };
        log::warn!(
            "motion trigger #{} at epoch_s={:.3} pixels={}",
            event.sequence,
            event.epoch_secs(),
            event.magnitude
        );

        match &mut self.worker {
            Worker::Inline(action) => run_action(action.as_mut(), &event),
            Worker::Background {
                action_name, tx, ..
            } => {
                let Some(sender) = tx.as_ref() else {
                    log::error!("action worker already stopped; trigger #{} lost", event.sequence);
                    self.dropped += 1;
                    return event;
                };
                match sender.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        self.dropped += 1;
                        log::warn!(
                            "action {} still busy; dropping trigger #{}",
                            action_name,
                            event.sequence
                        );
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        self.dropped += 1;
                        log::error!(
                            "action worker exited; trigger #{} lost",
                            event.sequence
                        );
                    }
                }
            }
        }
        event
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Close the queue and wait for queued actions to finish.
    pub fn stop(mut self) -> Result<()> {
        self.join_worker()
    }

    fn join_worker(&mut self) -> Result<()> {
        if let Worker::Background { tx, join, .. } = &mut self.worker {
            drop(tx.take());
            if let Some(join) = join.take() {
                join.join()
                    .map_err(|_| anyhow!("action worker thread panicked"))?;
            }
        }
        Ok(())
    }
}

impl Drop for TriggerDispatcher {
    fn drop(&mut self) {
        if let Err(err) = self.join_worker() {
            log::error!("{}", err);
        }
    }
}

fn run_worker(mut action: Box<dyn Actionable>, rx: Receiver<TriggerEvent>) {
    for event in rx {
        run_action(action.as_mut(), &event);
    }
    log::debug!("action worker for {} stopped", action.name());
}

fn run_action(action: &mut dyn Actionable, event: &TriggerEvent) {
    match action.perform() {
        Ok(()) => log::debug!("action {} completed for trigger #{}", action.name(), event.sequence),
        Err(err) => log::warn!(
            "action {} failed for trigger #{}: {:#}",
            action.name(),
            event.sequence,
            err
        ),
    }
}
