//! OS surface consumed by the companion lifecycle and idle monitor.
//!
//! Every call is fallible and best-effort. Window and process handles are
//! opaque tokens; the lifecycle manager is the only owner and re-checks
//! liveness before trusting one.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use crate::error::PlatformError;

pub mod process;

#[cfg(windows)]
pub mod windows;

#[cfg(not(windows))]
pub mod headless;

#[cfg(windows)]
pub use self::windows::{Win32IdleSource as NativeIdleSource, Win32Platform as NativePlatform};

#[cfg(not(windows))]
pub use headless::{HeadlessIdleSource as NativeIdleSource, HeadlessPlatform as NativePlatform};

/// Opaque top-level window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowToken(isize);

impl WindowToken {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> isize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopLevelWindow {
    pub token: WindowToken,
    pub visible: bool,
    /// Has an owner window (tool windows, dialogs, some splash screens).
    pub owned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

const FULLSCREEN_TOLERANCE_PX: i32 = 2;

/// True when `window` matches `monitor` in size within a couple of pixels.
pub fn covers_monitor(window: Rect, monitor: Rect) -> bool {
    (window.width() - monitor.width()).abs() <= FULLSCREEN_TOLERANCE_PX
        && (window.height() - monitor.height()).abs() <= FULLSCREEN_TOLERANCE_PX
}

pub trait ProcessHandle {
    fn pid(&self) -> u32;
}

pub trait CompanionPlatform {
    type Process: ProcessHandle;

    fn executable_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn spawn(&mut self, path: &Path) -> Result<Self::Process, PlatformError>;

    fn has_exited(&mut self, process: &mut Self::Process) -> bool;

    fn wait_for_input_idle(
        &mut self,
        process: &Self::Process,
        timeout: Duration,
    ) -> Result<(), PlatformError>;

    /// The process's primary window: visible and unowned.
    fn main_window(&self, process: &Self::Process) -> Option<WindowToken>;

    fn top_level_windows(&self, pid: u32) -> Result<Vec<TopLevelWindow>, PlatformError>;

    fn is_window(&self, window: WindowToken) -> bool;

    fn is_visible(&self, window: WindowToken) -> bool;

    fn is_minimized(&self, window: WindowToken) -> bool;

    fn show_window(&mut self, window: WindowToken) -> Result<(), PlatformError>;

    fn hide_window(&mut self, window: WindowToken) -> Result<(), PlatformError>;

    fn restore_window(&mut self, window: WindowToken) -> Result<(), PlatformError>;

    fn set_topmost(&mut self, window: WindowToken) -> Result<(), PlatformError>;

    /// Fails when the OS refuses the foreground change.
    fn set_foreground(&mut self, window: WindowToken) -> Result<(), PlatformError>;

    fn foreground_window(&self) -> Option<WindowToken>;

    fn is_foreground_fullscreen(&self) -> Result<bool, PlatformError>;

    /// Terminates the process and its descendants, waiting up to `wait`.
    fn kill_tree(&mut self, process: Self::Process, wait: Duration) -> Result<(), PlatformError>;

    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Wall clock used to stamp the moment a window was raised.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
