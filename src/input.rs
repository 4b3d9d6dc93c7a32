//! Operator commands.
//!
//! Commands reach the run loop over an `mpsc` channel and are drained between
//! frames. Producers are a stdin reader thread (`q`/`quit`, `r`/`reset`) and the
//! Ctrl-C handler, which sends `Quit`.

use anyhow::{Context, Result};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Reset,
}

pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "q" | "quit" | "exit" => Some(Command::Quit),
        "r" | "reset" => Some(Command::Reset),
        _ => None,
    }
}

pub fn command_channel() -> (Sender<Command>, Receiver<Command>) {
    mpsc::channel()
}

/// Forward parsed commands from `reader` until EOF, a `Quit`, or a closed channel.
///
/// Returns the number of commands forwarded.
pub fn forward_commands<R: BufRead>(reader: R, tx: &Sender<Command>) -> Result<u64> {
    let mut forwarded = 0;
    for line in reader.lines() {
        let line = line.context("read command input")?;
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = parse_command(&line) else {
            log::warn!("unknown command '{}' (q = quit, r = reset)", line.trim());
            continue;
        };
        if tx.send(command).is_err() {
            break;
        }
        forwarded += 1;
        if command == Command::Quit {
            break;
        }
    }
    Ok(forwarded)
}

/// Read commands from stdin on a background thread.
///
/// EOF on stdin only stops the reader; the monitor keeps running.
pub fn spawn_stdin_reader(tx: Sender<Command>) -> Result<JoinHandle<()>> {
    let join = std::thread::Builder::new()
        .name("fast-guard-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            if let Err(err) = forward_commands(stdin.lock(), &tx) {
                log::warn!("command input stopped: {:#}", err);
            }
        })?;
    Ok(join)
}

/// Ctrl-C sends `Quit`.
pub fn install_ctrlc(tx: Sender<Command>) -> Result<()> {
    ctrlc::set_handler(move || {
        let _ = tx.send(Command::Quit);
    })
    .context("error setting Ctrl-C handler")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("q"), Some(Command::Quit));
        assert_eq!(parse_command(" QUIT \n"), Some(Command::Quit));
        assert_eq!(parse_command("r"), Some(Command::Reset));
        assert_eq!(parse_command("reset"), Some(Command::Reset));
        assert_eq!(parse_command("minimize"), None);
    }

    #[test]
    fn forwards_until_quit() -> Result<()> {
        let (tx, rx) = command_channel();
        let input = Cursor::new("r\n\nbogus\nq\nr\n");
        assert_eq!(forward_commands(input, &tx)?, 2);
        let received: Vec<Command> = rx.try_iter().collect();
        assert_eq!(received, vec![Command::Reset, Command::Quit]);
        Ok(())
    }

    #[test]
    fn stops_when_receiver_is_gone() -> Result<()> {
        let (tx, rx) = command_channel();
        drop(rx);
        assert_eq!(forward_commands(Cursor::new("r\nr\n"), &tx)?, 0);
        Ok(())
    }
}
