//! Companion window lifecycle.
//!
//! Owns at most one companion process and reflects the requested visibility
//! onto its top-level window. Window creation is asynchronous to process
//! creation and the handle can change (splash screen hand-off), so the handle
//! is always rediscovered when the cached one stops naming a window.
//!
//! ## States
//!
//! ```text
//! NoProcess --show--> Launching --spawned--> HandlePending --found--> Visible
//!                                                 ^                     |  ^
//!                                                 |              hide(false) show
//!                                                 |                     v  |
//!                                                 +---------------- Hidden
//! any --hide(true) / unexpected exit--> NoProcess
//! ```

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{OverlayError, Result};
use crate::platform::{CompanionPlatform, ProcessHandle, WindowToken};

pub const COMPANION_DIR: &str = "Unity";
pub const COMPANION_EXE: &str = "Disclosure.exe";

pub const INPUT_IDLE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const HANDLE_POLL_ATTEMPTS: u32 = 20;
pub const HANDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const KILL_WAIT: Duration = Duration::from_millis(2000);
pub const FOREGROUND_RETRY_DELAY: Duration = Duration::from_millis(100);
pub const ENFORCE_INTERVAL: Duration = Duration::from_secs(1);

/// `<base>\Unity\Disclosure.exe`.
pub fn companion_executable(base: &Path) -> PathBuf {
    base.join(COMPANION_DIR).join(COMPANION_EXE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionState {
    NoProcess,
    Launching,
    HandlePending,
    Visible,
    Hidden,
}

struct CompanionProcess<H> {
    process: H,
    window: Option<WindowToken>,
}

pub struct CompanionManager<P: CompanionPlatform> {
    platform: P,
    executable: PathBuf,
    process: Option<CompanionProcess<P::Process>>,
    state: CompanionState,
    enforcing: bool,
    unavailable: bool,
    launches: u32,
}

impl<P: CompanionPlatform> CompanionManager<P> {
    pub fn new(platform: P, executable: PathBuf) -> Self {
        Self {
            platform,
            executable,
            process: None,
            state: CompanionState::NoProcess,
            enforcing: false,
            unavailable: false,
            launches: 0,
        }
    }

    pub fn state(&self) -> CompanionState {
        self.state
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.process.pid())
    }

    pub fn window(&self) -> Option<WindowToken> {
        self.process.as_ref().and_then(|p| p.window)
    }

    /// Set while the foreground enforcement tick should act.
    pub fn is_enforcing(&self) -> bool {
        self.enforcing
    }

    /// Set after a launch found no executable; the next show retries.
    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    pub fn launch_count(&self) -> u32 {
        self.launches
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Starts the companion unless a live one exists, then waits (bounded)
    /// for its primary window.
    pub fn launch(&mut self) -> Result<()> {
        self.reap_if_exited();
        if let Some(pid) = self.pid() {
            tracing::debug!(pid, "Companion already running");
            return Ok(());
        }

        if !self.platform.executable_exists(&self.executable) {
            self.unavailable = true;
            return Err(OverlayError::CompanionUnavailable {
                path: self.executable.clone(),
            });
        }
        self.unavailable = false;

        self.state = CompanionState::Launching;
        let process = match self.platform.spawn(&self.executable) {
            Ok(process) => process,
            Err(err) => {
                self.state = CompanionState::NoProcess;
                return Err(err.into());
            }
        };
        let pid = process.pid();
        self.launches += 1;
        tracing::info!(pid, path = %self.executable.display(), "Companion launched");

        if let Err(err) = self.platform.wait_for_input_idle(&process, INPUT_IDLE_TIMEOUT) {
            tracing::debug!(pid, error = %err, "Companion input-idle wait did not complete");
        }

        let mut window = self.platform.main_window(&process);
        let mut attempts = 0;
        while window.is_none() && attempts < HANDLE_POLL_ATTEMPTS {
            self.platform.pause(HANDLE_POLL_INTERVAL);
            window = self.platform.main_window(&process);
            attempts += 1;
        }
        tracing::info!(pid, window = ?window.map(WindowToken::raw), attempts, "Initial companion window");

        self.process = Some(CompanionProcess { process, window });
        self.state = CompanionState::HandlePending;
        Ok(())
    }

    /// Raises the companion, launching it first if needed, and returns the
    /// instant the raise finished. Starts foreground enforcement even when
    /// the handle is still pending so the tick can pick it up once it
    /// appears.
    pub fn show(&mut self) -> Result<DateTime<Utc>> {
        self.launch()?;
        self.enforcing = true;

        let window = self.resolve_window()?;
        let raised_at = self.raise(window);
        self.state = CompanionState::Visible;
        tracing::info!(pid = ?self.pid(), window = window.raw(), "Companion shown");
        Ok(raised_at)
    }

    /// Hides the companion. `kill` also terminates the process tree and
    /// forgets every handle; otherwise the process stays alive for a cheap
    /// re-show.
    pub fn hide(&mut self, kill: bool) -> Result<()> {
        self.enforcing = false;

        if let Some(window) = self.window() {
            if self.platform.is_window(window) {
                if let Err(err) = self.platform.hide_window(window) {
                    tracing::warn!(window = window.raw(), error = %err, "Failed to hide companion window");
                }
            }
        }

        if kill {
            self.state = CompanionState::NoProcess;
            let Some(companion) = self.process.take() else {
                return Ok(());
            };
            let pid = companion.process.pid();
            self.platform.kill_tree(companion.process, KILL_WAIT)?;
            tracing::info!(pid, "Companion terminated");
            return Ok(());
        }

        if self.state == CompanionState::Visible {
            self.state = CompanionState::Hidden;
        }
        Ok(())
    }

    /// One foreground-enforcement pass; idempotent and a no-op once `hide`
    /// has run. Returns the raise instant when this pass found the window
    /// and raised it.
    pub fn enforce_tick(&mut self) -> Option<DateTime<Utc>> {
        if !self.enforcing {
            return None;
        }
        if self.reap_if_exited() {
            self.enforcing = false;
            return None;
        }

        let window = match self.window().filter(|w| self.platform.is_window(*w)) {
            Some(window) => window,
            None => {
                let window = self.discover_once()?;
                tracing::info!(window = window.raw(), "Companion window appeared");
                let raised_at = self.raise(window);
                self.state = CompanionState::Visible;
                return Some(raised_at);
            }
        };

        if self.platform.is_visible(window) && self.platform.foreground_window() != Some(window) {
            tracing::debug!(window = window.raw(), "Re-asserting companion foreground");
            if let Err(err) = self.platform.set_foreground(window) {
                tracing::debug!(window = window.raw(), error = %err, "Foreground re-assert refused");
            }
        }
        None
    }

    fn reap_if_exited(&mut self) -> bool {
        let exited = match self.process.as_mut() {
            Some(companion) => self.platform.has_exited(&mut companion.process),
            None => false,
        };
        if exited {
            tracing::warn!(pid = ?self.pid(), "Companion exited unexpectedly");
            self.process = None;
            self.state = CompanionState::NoProcess;
        }
        exited
    }

    fn resolve_window(&mut self) -> Result<WindowToken> {
        if let Some(window) = self.window() {
            if self.platform.is_window(window) {
                return Ok(window);
            }
            tracing::debug!(window = window.raw(), "Cached companion handle is stale");
        }

        match self.discover_once() {
            Some(window) => Ok(window),
            None => {
                self.state = CompanionState::HandlePending;
                Err(OverlayError::HandleNotFound {
                    pid: self.pid().unwrap_or_default(),
                })
            }
        }
    }

    /// Primary window first, then any visible top-level window owned by the
    /// process. Caches whatever it finds.
    fn discover_once(&mut self) -> Option<WindowToken> {
        let companion = self.process.as_mut()?;
        companion.window = None;

        let found = self.platform.main_window(&companion.process).or_else(|| {
            let pid = companion.process.pid();
            match self.platform.top_level_windows(pid) {
                Ok(windows) => windows.into_iter().find(|w| w.visible).map(|w| w.token),
                Err(err) => {
                    tracing::warn!(pid, error = %err, "Failed to enumerate companion windows");
                    None
                }
            }
        });
        companion.window = found;
        found
    }

    fn raise(&mut self, window: WindowToken) -> DateTime<Utc> {
        if !self.platform.is_visible(window) {
            if let Err(err) = self.platform.show_window(window) {
                tracing::warn!(window = window.raw(), error = %err, "Failed to show companion window");
            }
        }
        if self.platform.is_minimized(window) {
            if let Err(err) = self.platform.restore_window(window) {
                tracing::warn!(window = window.raw(), error = %err, "Failed to restore companion window");
            }
        }
        if let Err(err) = self.platform.set_topmost(window) {
            tracing::warn!(window = window.raw(), error = %err, "Failed to set companion topmost");
        }
        if let Err(first) = self.platform.set_foreground(window) {
            tracing::debug!(window = window.raw(), error = %first, "Foreground refused; retrying once");
            self.platform.pause(FOREGROUND_RETRY_DELAY);
            if let Err(err) = self.platform.set_foreground(window) {
                tracing::warn!(window = window.raw(), error = %err, "Failed to bring companion to foreground");
            }
        }
        self.platform.now()
    }
}
