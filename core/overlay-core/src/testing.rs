//! Scripted platform doubles for unit tests.

use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::path::Path;
use std::time::Duration;

use crate::error::PlatformError;
use crate::idle::SystemIdleSource;
use crate::platform::{CompanionPlatform, ProcessHandle, TopLevelWindow, WindowToken};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Spawn,
    Show(WindowToken),
    Hide(WindowToken),
    Restore(WindowToken),
    Topmost(WindowToken),
    Foreground(WindowToken),
    Kill(u32),
}

#[derive(Debug)]
pub struct FakeProcess {
    pid: u32,
}

impl ProcessHandle for FakeProcess {
    fn pid(&self) -> u32 {
        self.pid
    }
}

#[derive(Debug, Clone)]
struct FakeWindow {
    token: WindowToken,
    visible: bool,
    owned: bool,
    main: bool,
    minimized: bool,
}

#[derive(Debug, Default)]
pub struct FakePlatform {
    pub calls: Vec<FakeCall>,
    pub executable_present: bool,
    pub refuse_foreground: u32,
    pub fail_kill: bool,
    pub fullscreen: bool,
    pub foreground: Option<WindowToken>,
    /// How long the simulated input-idle wait takes on the fake clock.
    pub launch_delay: Duration,
    clock: Cell<DateTime<Utc>>,
    windows: Vec<FakeWindow>,
    window_after: u32,
    main_queries: Cell<u32>,
    pauses: Cell<u32>,
    next_pid: u32,
    exited: bool,
}

impl FakePlatform {
    /// A companion whose main window answers after `queries` failed lookups.
    pub fn with_window_after(queries: u32) -> Self {
        let mut platform = Self::without_windows();
        platform.window_after = queries;
        platform.add_main_window(100);
        platform
    }

    pub fn without_windows() -> Self {
        Self {
            executable_present: true,
            next_pid: 4000,
            ..Self::default()
        }
    }

    pub fn add_main_window(&mut self, raw: isize) {
        self.windows.push(FakeWindow {
            token: WindowToken::from_raw(raw),
            visible: true,
            owned: false,
            main: true,
            minimized: false,
        });
    }

    pub fn add_owned_visible_window(&mut self, raw: isize) {
        self.windows.push(FakeWindow {
            token: WindowToken::from_raw(raw),
            visible: true,
            owned: true,
            main: false,
            minimized: false,
        });
    }

    pub fn destroy_window(&mut self, window: WindowToken) {
        self.windows.retain(|w| w.token != window);
    }

    pub fn minimize(&mut self, window: WindowToken) {
        if let Some(w) = self.windows.iter_mut().find(|w| w.token == window) {
            w.minimized = true;
        }
    }

    pub fn exit_process(&mut self) {
        self.exited = true;
    }

    /// Sets the fake clock. It starts at the Unix epoch, before any test
    /// instant, and only moves when a test sets it or a call takes time.
    pub fn set_clock(&self, at: DateTime<Utc>) {
        self.clock.set(at);
    }

    fn advance(&self, by: Duration) {
        if let Ok(by) = chrono::Duration::from_std(by) {
            self.clock.set(self.clock.get() + by);
        }
    }

    pub fn pauses(&self) -> u32 {
        self.pauses.get()
    }

    pub fn count(&self, pred: impl Fn(&FakeCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(*c)).count()
    }

    fn find(&self, window: WindowToken) -> Option<&FakeWindow> {
        self.windows.iter().find(|w| w.token == window)
    }

    fn find_mut(&mut self, window: WindowToken) -> Option<&mut FakeWindow> {
        self.windows.iter_mut().find(|w| w.token == window)
    }
}

impl CompanionPlatform for FakePlatform {
    type Process = FakeProcess;

    fn executable_exists(&self, _path: &Path) -> bool {
        self.executable_present
    }

    fn spawn(&mut self, _path: &Path) -> Result<FakeProcess, PlatformError> {
        self.calls.push(FakeCall::Spawn);
        self.exited = false;
        self.main_queries.set(0);
        self.next_pid += 1;
        Ok(FakeProcess { pid: self.next_pid })
    }

    fn has_exited(&mut self, _process: &mut FakeProcess) -> bool {
        self.exited
    }

    fn wait_for_input_idle(&mut self, _process: &FakeProcess, timeout: Duration) -> Result<(), PlatformError> {
        self.advance(self.launch_delay.min(timeout));
        Ok(())
    }

    fn main_window(&self, _process: &FakeProcess) -> Option<WindowToken> {
        let queries = self.main_queries.get() + 1;
        self.main_queries.set(queries);
        if queries <= self.window_after {
            return None;
        }
        self.windows
            .iter()
            .find(|w| w.main && w.visible && !w.owned)
            .map(|w| w.token)
    }

    fn top_level_windows(&self, _pid: u32) -> Result<Vec<TopLevelWindow>, PlatformError> {
        Ok(self
            .windows
            .iter()
            .map(|w| TopLevelWindow {
                token: w.token,
                visible: w.visible,
                owned: w.owned,
            })
            .collect())
    }

    fn is_window(&self, window: WindowToken) -> bool {
        self.find(window).is_some()
    }

    fn is_visible(&self, window: WindowToken) -> bool {
        self.find(window).map(|w| w.visible).unwrap_or(false)
    }

    fn is_minimized(&self, window: WindowToken) -> bool {
        self.find(window).map(|w| w.minimized).unwrap_or(false)
    }

    fn show_window(&mut self, window: WindowToken) -> Result<(), PlatformError> {
        self.calls.push(FakeCall::Show(window));
        if let Some(w) = self.find_mut(window) {
            w.visible = true;
        }
        Ok(())
    }

    fn hide_window(&mut self, window: WindowToken) -> Result<(), PlatformError> {
        self.calls.push(FakeCall::Hide(window));
        if let Some(w) = self.find_mut(window) {
            w.visible = false;
        }
        Ok(())
    }

    fn restore_window(&mut self, window: WindowToken) -> Result<(), PlatformError> {
        self.calls.push(FakeCall::Restore(window));
        if let Some(w) = self.find_mut(window) {
            w.minimized = false;
        }
        Ok(())
    }

    fn set_topmost(&mut self, window: WindowToken) -> Result<(), PlatformError> {
        self.calls.push(FakeCall::Topmost(window));
        Ok(())
    }

    fn set_foreground(&mut self, window: WindowToken) -> Result<(), PlatformError> {
        self.calls.push(FakeCall::Foreground(window));
        if self.refuse_foreground > 0 {
            self.refuse_foreground -= 1;
            return Err(PlatformError::call("SetForegroundWindow", "refused"));
        }
        self.foreground = Some(window);
        Ok(())
    }

    fn foreground_window(&self) -> Option<WindowToken> {
        self.foreground
    }

    fn is_foreground_fullscreen(&self) -> Result<bool, PlatformError> {
        Ok(self.fullscreen)
    }

    fn kill_tree(&mut self, process: FakeProcess, _wait: Duration) -> Result<(), PlatformError> {
        self.calls.push(FakeCall::Kill(process.pid));
        if self.fail_kill {
            return Err(PlatformError::call("kill", "access denied"));
        }
        Ok(())
    }

    fn pause(&self, duration: Duration) {
        self.pauses.set(self.pauses.get() + 1);
        self.advance(duration);
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.get()
    }
}

/// System idle source with a settable age.
#[derive(Debug, Clone, Default)]
pub struct FakeIdleSource {
    pub age: Option<Duration>,
}

impl FakeIdleSource {
    pub fn idle_for(age: Duration) -> Self {
        Self { age: Some(age) }
    }

    pub fn failing() -> Self {
        Self { age: None }
    }
}

impl SystemIdleSource for FakeIdleSource {
    fn last_input_age(&self) -> Result<Duration, PlatformError> {
        self.age
            .ok_or_else(|| PlatformError::call("GetLastInputInfo", "scripted failure"))
    }
}
