//! Fallback for platforms without a window API we drive.
//!
//! Processes are real so launch/kill can be exercised; every window call is
//! `Unsupported` and the system idle source fails (the idle monitor then
//! fails open).

use std::path::Path;
use std::time::Duration;

use super::process::{self, ChildProcess};
use super::{CompanionPlatform, TopLevelWindow, WindowToken};
use crate::error::PlatformError;
use crate::idle::SystemIdleSource;

#[derive(Debug, Default)]
pub struct HeadlessPlatform;

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl CompanionPlatform for HeadlessPlatform {
    type Process = ChildProcess;

    fn spawn(&mut self, path: &Path) -> Result<ChildProcess, PlatformError> {
        process::spawn_companion(path)
    }

    fn has_exited(&mut self, process: &mut ChildProcess) -> bool {
        process.has_exited()
    }

    fn wait_for_input_idle(&mut self, _process: &ChildProcess, _timeout: Duration) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("WaitForInputIdle"))
    }

    fn main_window(&self, _process: &ChildProcess) -> Option<WindowToken> {
        None
    }

    fn top_level_windows(&self, _pid: u32) -> Result<Vec<TopLevelWindow>, PlatformError> {
        Err(PlatformError::Unsupported("EnumWindows"))
    }

    fn is_window(&self, _window: WindowToken) -> bool {
        false
    }

    fn is_visible(&self, _window: WindowToken) -> bool {
        false
    }

    fn is_minimized(&self, _window: WindowToken) -> bool {
        false
    }

    fn show_window(&mut self, _window: WindowToken) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("ShowWindow"))
    }

    fn hide_window(&mut self, _window: WindowToken) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("ShowWindow"))
    }

    fn restore_window(&mut self, _window: WindowToken) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("ShowWindow"))
    }

    fn set_topmost(&mut self, _window: WindowToken) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("SetWindowPos"))
    }

    fn set_foreground(&mut self, _window: WindowToken) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("SetForegroundWindow"))
    }

    fn foreground_window(&self) -> Option<WindowToken> {
        None
    }

    fn is_foreground_fullscreen(&self) -> Result<bool, PlatformError> {
        Ok(false)
    }

    fn kill_tree(&mut self, process: ChildProcess, wait: Duration) -> Result<(), PlatformError> {
        process::kill_tree(process, wait)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessIdleSource;

impl SystemIdleSource for HeadlessIdleSource {
    fn last_input_age(&self) -> Result<Duration, PlatformError> {
        Err(PlatformError::Unsupported("GetLastInputInfo"))
    }
}
