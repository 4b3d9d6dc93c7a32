//! Trigger actions.
//!
//! An `Actionable` is what runs once per confirmed motion event. The core never
//! inspects the outcome beyond logging it. Implementations:
//! - `MinimizeWindows`: hides every window through the platform's own tooling
//! - `CommandAction`: runs a user-configured program
//! - `LogOnly`: records the trigger in the log and nothing else
//! - `RecordingAction`: counts invocations, for tests and demos

mod dispatch;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use dispatch::{DispatchMode, TriggerDispatcher, TriggerEvent};

/// Capability invoked once per confirmed trigger.
///
/// Implementations run on the dispatcher's worker thread in background mode, so
/// they may block, but they should not hold on to resources across calls.
pub trait Actionable: Send {
    /// Action identifier for logs.
    fn name(&self) -> &'static str;

    /// Perform the action.
    fn perform(&mut self) -> Result<()>;
}

/// Which action a configuration asks for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpec {
    #[default]
    Minimize,
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Log,
}

impl ActionSpec {
    /// Parse the short form used by env overrides and the CLI.
    ///
    /// `minimize`, `log`, or `command:<program> [args...]`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        match value {
            "minimize" => return Ok(ActionSpec::Minimize),
            "log" => return Ok(ActionSpec::Log),
            _ => {}
        }
        if let Some(command) = value.strip_prefix("command:") {
            let mut parts = command.split_whitespace().map(str::to_string);
            let program = parts
                .next()
                .ok_or_else(|| anyhow!("command action needs a program"))?;
            return Ok(ActionSpec::Command {
                program,
                args: parts.collect(),
            });
        }
        Err(anyhow!(
            "unknown action '{}' (expected minimize, log or command:<program>)",
            value
        ))
    }

    pub fn build(&self) -> Result<Box<dyn Actionable>> {
        match self {
            ActionSpec::Minimize => Ok(Box::new(MinimizeWindows::new()?)),
            ActionSpec::Command { program, args } => {
                Ok(Box::new(CommandAction::new(program.clone(), args.clone())?))
            }
            ActionSpec::Log => Ok(Box::new(LogOnly)),
        }
    }
}

// ----------------------------------------------------------------------------
// CommandAction
// ----------------------------------------------------------------------------

/// Runs an external program and waits for it to exit.
#[derive(Clone, Debug)]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
}

impl CommandAction {
    pub fn new(program: String, args: Vec<String>) -> Result<Self> {
        if program.trim().is_empty() {
            return Err(anyhow!("command action program must not be empty"));
        }
        Ok(Self { program, args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Actionable for CommandAction {
    fn name(&self) -> &'static str {
        "command"
    }

    fn perform(&mut self) -> Result<()> {
        // The operator command reader owns our stdin.
        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("failed to launch {}", self.program))?;
        if !status.success() {
            return Err(anyhow!("{} exited with {}", self.program, status));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// MinimizeWindows
// ----------------------------------------------------------------------------

/// Minimizes every window without toggling them back on a second trigger.
#[derive(Clone, Debug)]
pub struct MinimizeWindows {
    command: CommandAction,
}

impl MinimizeWindows {
    pub fn new() -> Result<Self> {
        let (program, args) = platform_minimize_command()
            .ok_or_else(|| anyhow!("window minimizing is not supported on this platform"))?;
        Ok(Self {
            command: CommandAction::new(
                program.to_string(),
                args.iter().map(|a| a.to_string()).collect(),
            )?,
        })
    }

    pub fn command(&self) -> &CommandAction {
        &self.command
    }
}

impl Actionable for MinimizeWindows {
    fn name(&self) -> &'static str {
        "minimize"
    }

    fn perform(&mut self) -> Result<()> {
        self.command.perform()
    }
}

#[cfg(target_os = "windows")]
fn platform_minimize_command() -> Option<(&'static str, &'static [&'static str])> {
    Some((
        "powershell",
        &[
            "-NoProfile",
            "-NonInteractive",
            "-Command",
            "(New-Object -ComObject Shell.Application).MinimizeAll()",
        ],
    ))
}

#[cfg(target_os = "macos")]
fn platform_minimize_command() -> Option<(&'static str, &'static [&'static str])> {
    Some((
        "osascript",
        &[
            "-e",
            "tell application \"System Events\" to set visible of every process whose visible is true to false",
        ],
    ))
}

// `wmctrl -k on` enters show-desktop mode; unlike a key toggle it stays on when repeated.
#[cfg(target_os = "linux")]
fn platform_minimize_command() -> Option<(&'static str, &'static [&'static str])> {
    Some(("wmctrl", &["-k", "on"]))
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn platform_minimize_command() -> Option<(&'static str, &'static [&'static str])> {
    None
}

// ----------------------------------------------------------------------------
// LogOnly / RecordingAction
// ----------------------------------------------------------------------------

/// Dry-run action: the dispatcher's own log line is the only effect.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogOnly;

impl Actionable for LogOnly {
    fn name(&self) -> &'static str {
        "log"
    }

    fn perform(&mut self) -> Result<()> {
        log::info!("dry run: action skipped");
        Ok(())
    }
}

/// Counts invocations. Clones share the counter, so a test can keep one handle
/// and give the other to a dispatcher.
#[derive(Clone, Debug, Default)]
pub struct RecordingAction {
    calls: Arc<AtomicU64>,
    delay: Option<Duration>,
}

impl RecordingAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every call, simulating a stalling action.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Actionable for RecordingAction {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn perform(&mut self) -> Result<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
