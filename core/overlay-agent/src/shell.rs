//! Line-oriented control surface on stdin.
//!
//! Stands in for a tray menu: each line is one command, posted to the
//! executor like any other producer.

use std::io::{self, BufRead};
use std::thread;

use overlay_core::{OverlayCommand, OverlayDispatcher};

pub const HELP: &str = "commands: show | hide | pause | resume | force-show | exit | help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    Show,
    Hide,
    Pause,
    Resume,
    ForceShow,
    Exit,
    Help,
}

impl ShellCommand {
    /// Blank lines parse to `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let word = line.trim().to_ascii_lowercase();
        let command = match word.as_str() {
            "" => return Ok(None),
            "show" => Self::Show,
            "hide" => Self::Hide,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "force-show" | "forceshow" => Self::ForceShow,
            "exit" | "quit" => Self::Exit,
            "help" | "?" => Self::Help,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(Some(command))
    }

    pub fn overlay_command(self) -> Option<OverlayCommand> {
        match self {
            Self::Show => Some(OverlayCommand::Show),
            Self::Hide => Some(OverlayCommand::Hide),
            Self::Pause => Some(OverlayCommand::Pause(true)),
            Self::Resume => Some(OverlayCommand::Pause(false)),
            Self::ForceShow => Some(OverlayCommand::ForceShow),
            Self::Exit => Some(OverlayCommand::Exit),
            Self::Help => None,
        }
    }
}

/// Reads commands until `exit`, end of input, or the executor goes away.
/// Returns `true` if `exit` was read.
pub fn run(input: impl BufRead, mut post: impl FnMut(OverlayCommand) -> bool) -> bool {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::debug!(error = %err, "Control shell input closed");
                return false;
            }
        };
        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}; {HELP}");
                continue;
            }
        };
        let Some(overlay_command) = command.overlay_command() else {
            println!("{HELP}");
            continue;
        };
        tracing::info!(command = ?command, "Control shell command");
        if !post(overlay_command) {
            return false;
        }
        if command == ShellCommand::Exit {
            return true;
        }
    }
    false
}

pub fn spawn(dispatcher: OverlayDispatcher) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("control-shell".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            run(stdin.lock(), |command| dispatcher.post(command));
        })
}
