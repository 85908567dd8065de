//! Win32 implementation of the companion platform and system idle source.

use std::mem::size_of;
use std::os::windows::io::AsRawHandle;
use std::path::Path;
use std::time::Duration;

use windows::Win32::Foundation::{BOOL, HANDLE, HWND, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{GetMonitorInfoW, MonitorFromWindow, MONITORINFO, MONITOR_DEFAULTTONEAREST};
use windows::Win32::System::SystemInformation::GetTickCount;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetForegroundWindow, GetWindow, GetWindowRect, GetWindowThreadProcessId, IsIconic, IsWindow,
    IsWindowVisible, SetForegroundWindow, SetWindowPos, ShowWindow, WaitForInputIdle, GW_OWNER, HWND_TOPMOST,
    SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SW_HIDE, SW_RESTORE, SW_SHOW,
};

use super::process::{self, ChildProcess};
use super::{covers_monitor, CompanionPlatform, ProcessHandle, Rect, TopLevelWindow, WindowToken};
use crate::error::PlatformError;
use crate::idle::SystemIdleSource;

const WAIT_TIMEOUT: u32 = 258;

fn hwnd(window: WindowToken) -> HWND {
    HWND(window.raw())
}

struct EnumState {
    pid: u32,
    windows: Vec<TopLevelWindow>,
}

unsafe extern "system" fn collect_windows(window: HWND, lparam: LPARAM) -> BOOL {
    let state = &mut *(lparam.0 as *mut EnumState);
    let mut owner_pid = 0u32;
    GetWindowThreadProcessId(window, Some(&mut owner_pid));
    if owner_pid == state.pid {
        state.windows.push(TopLevelWindow {
            token: WindowToken::from_raw(window.0),
            visible: IsWindowVisible(window).as_bool(),
            owned: GetWindow(window, GW_OWNER).0 != 0,
        });
    }
    BOOL(1)
}

#[derive(Debug, Default)]
pub struct Win32Platform;

impl Win32Platform {
    pub fn new() -> Self {
        Self
    }
}

impl CompanionPlatform for Win32Platform {
    type Process = ChildProcess;

    fn spawn(&mut self, path: &Path) -> Result<ChildProcess, PlatformError> {
        process::spawn_companion(path)
    }

    fn has_exited(&mut self, process: &mut ChildProcess) -> bool {
        process.has_exited()
    }

    fn wait_for_input_idle(&mut self, process: &ChildProcess, timeout: Duration) -> Result<(), PlatformError> {
        let handle = HANDLE(process.child().as_raw_handle() as isize);
        let rc = unsafe { WaitForInputIdle(handle, timeout.as_millis() as u32) };
        match rc {
            0 => Ok(()),
            WAIT_TIMEOUT => Err(PlatformError::call(
                "WaitForInputIdle",
                format!("timed out after {} ms", timeout.as_millis()),
            )),
            other => Err(PlatformError::call("WaitForInputIdle", format!("returned {:#x}", other))),
        }
    }

    fn main_window(&self, process: &ChildProcess) -> Option<WindowToken> {
        self.top_level_windows(process.pid())
            .ok()?
            .into_iter()
            .find(|window| window.visible && !window.owned)
            .map(|window| window.token)
    }

    fn top_level_windows(&self, pid: u32) -> Result<Vec<TopLevelWindow>, PlatformError> {
        let mut state = EnumState {
            pid,
            windows: Vec::new(),
        };
        unsafe { EnumWindows(Some(collect_windows), LPARAM(&mut state as *mut EnumState as isize)) }
            .map_err(|err| PlatformError::call("EnumWindows", err.to_string()))?;
        Ok(state.windows)
    }

    fn is_window(&self, window: WindowToken) -> bool {
        unsafe { IsWindow(hwnd(window)).as_bool() }
    }

    fn is_visible(&self, window: WindowToken) -> bool {
        unsafe { IsWindowVisible(hwnd(window)).as_bool() }
    }

    fn is_minimized(&self, window: WindowToken) -> bool {
        unsafe { IsIconic(hwnd(window)).as_bool() }
    }

    // ShowWindow returns the previous visibility, not success.
    fn show_window(&mut self, window: WindowToken) -> Result<(), PlatformError> {
        unsafe { ShowWindow(hwnd(window), SW_SHOW) };
        Ok(())
    }

    fn hide_window(&mut self, window: WindowToken) -> Result<(), PlatformError> {
        unsafe { ShowWindow(hwnd(window), SW_HIDE) };
        Ok(())
    }

    fn restore_window(&mut self, window: WindowToken) -> Result<(), PlatformError> {
        unsafe { ShowWindow(hwnd(window), SW_RESTORE) };
        Ok(())
    }

    fn set_topmost(&mut self, window: WindowToken) -> Result<(), PlatformError> {
        unsafe {
            SetWindowPos(
                hwnd(window),
                HWND_TOPMOST,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            )
        }
        .map_err(|err| PlatformError::call("SetWindowPos", err.to_string()))
    }

    fn set_foreground(&mut self, window: WindowToken) -> Result<(), PlatformError> {
        if unsafe { SetForegroundWindow(hwnd(window)) }.as_bool() {
            Ok(())
        } else {
            Err(PlatformError::call("SetForegroundWindow", "refused"))
        }
    }

    fn foreground_window(&self) -> Option<WindowToken> {
        let window = unsafe { GetForegroundWindow() };
        (window.0 != 0).then(|| WindowToken::from_raw(window.0))
    }

    fn is_foreground_fullscreen(&self) -> Result<bool, PlatformError> {
        unsafe {
            let foreground = GetForegroundWindow();
            if foreground.0 == 0 {
                return Ok(false);
            }
            let mut rect = RECT::default();
            GetWindowRect(foreground, &mut rect)
                .map_err(|err| PlatformError::call("GetWindowRect", err.to_string()))?;
            let monitor = MonitorFromWindow(foreground, MONITOR_DEFAULTTONEAREST);
            if monitor.0 == 0 {
                return Ok(false);
            }
            let mut info = MONITORINFO {
                cbSize: size_of::<MONITORINFO>() as u32,
                ..Default::default()
            };
            if !GetMonitorInfoW(monitor, &mut info).as_bool() {
                return Err(PlatformError::call("GetMonitorInfoW", "failed"));
            }
            let window = Rect {
                left: rect.left,
                top: rect.top,
                right: rect.right,
                bottom: rect.bottom,
            };
            let monitor = Rect {
                left: info.rcMonitor.left,
                top: info.rcMonitor.top,
                right: info.rcMonitor.right,
                bottom: info.rcMonitor.bottom,
            };
            Ok(covers_monitor(window, monitor))
        }
    }

    fn kill_tree(&mut self, process: ChildProcess, wait: Duration) -> Result<(), PlatformError> {
        process::kill_tree(process, wait)
    }
}

/// `GetLastInputInfo` against the tick counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32IdleSource;

impl SystemIdleSource for Win32IdleSource {
    fn last_input_age(&self) -> Result<Duration, PlatformError> {
        let mut info = LASTINPUTINFO {
            cbSize: size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };
        if !unsafe { GetLastInputInfo(&mut info) }.as_bool() {
            return Err(PlatformError::call("GetLastInputInfo", "failed"));
        }
        // Both counters wrap every ~49.7 days.
        let now = unsafe { GetTickCount() };
        Ok(Duration::from_millis(now.wrapping_sub(info.dwTime) as u64))
    }
}
