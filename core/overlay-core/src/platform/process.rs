//! Companion process spawning and tree termination.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};

use super::ProcessHandle;
use crate::error::PlatformError;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    pub fn child(&self) -> &Child {
        &self.child
    }

    pub fn has_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = self.child.id(), status = %status, "Companion process exited");
                true
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(pid = self.child.id(), error = %err, "Failed to poll companion process");
                false
            }
        }
    }
}

impl ProcessHandle for ChildProcess {
    fn pid(&self) -> u32 {
        self.child.id()
    }
}

/// Spawns the companion with its own directory as the working directory,
/// which is where engine-built players look for their data folder.
pub fn spawn_companion(path: &Path) -> Result<ChildProcess, PlatformError> {
    let mut command = Command::new(path);
    if let Some(dir) = path.parent() {
        command.current_dir(dir);
    }
    command
        .spawn()
        .map(|child| ChildProcess { child })
        .map_err(|err| PlatformError::call("spawn", format!("{}: {}", path.display(), err)))
}

/// Kills every descendant of the companion, then the companion itself, and
/// waits up to `wait` for it to exit.
pub fn kill_tree(mut process: ChildProcess, wait: Duration) -> Result<(), PlatformError> {
    let root = process.pid();
    let mut sys = System::new();
    sys.refresh_processes();
    let parents: Vec<(u32, Option<u32>)> = sys
        .processes()
        .iter()
        .map(|(pid, proc_)| (pid.as_u32(), proc_.parent().map(|p| p.as_u32())))
        .collect();

    for pid in collect_descendants(root, &parents) {
        if let Some(descendant) = sys.process(Pid::from_u32(pid)) {
            if !descendant.kill() {
                tracing::debug!(pid, root, "Descendant did not accept kill");
            }
        }
    }

    if let Err(err) = process.child.kill() {
        // Already exited between our checks.
        if process.has_exited() {
            return Ok(());
        }
        return Err(PlatformError::call("kill", format!("pid {}: {}", root, err)));
    }

    let deadline = Instant::now() + wait;
    loop {
        match process.child.try_wait() {
            Ok(Some(_)) => return Ok(()),
            Ok(None) if Instant::now() >= deadline => {
                return Err(PlatformError::call(
                    "wait_for_exit",
                    format!("pid {} still running after {} ms", root, wait.as_millis()),
                ));
            }
            Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
            Err(err) => {
                return Err(PlatformError::call("wait_for_exit", format!("pid {}: {}", root, err)));
            }
        }
    }
}

/// Descendants of `root`, deepest first so children die before parents can
/// respawn them.
pub fn collect_descendants(root: u32, parents: &[(u32, Option<u32>)]) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(pid, parent) in parents {
        if let Some(parent) = parent {
            if parent != pid {
                children.entry(parent).or_default().push(pid);
            }
        }
    }

    let mut ordered = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(pid) = queue.pop_front() {
        if let Some(kids) = children.get(&pid) {
            for &kid in kids {
                if kid != root && !ordered.contains(&kid) {
                    ordered.push(kid);
                    queue.push_back(kid);
                }
            }
        }
    }
    ordered.reverse();
    ordered
}
