//! System-wide low-level keyboard and mouse hooks.
//!
//! The hook procedures run on the thread that installed them, inside its
//! message loop, and must return quickly. They stamp the event, post it to
//! the executor and always pass it down the chain unmodified.

#[cfg(windows)]
pub use self::win32::{run, HookThread};

#[cfg(not(windows))]
pub use self::unsupported::{run, HookThread};

#[cfg(windows)]
mod win32 {
    use chrono::Utc;
    use once_cell::sync::OnceCell;
    use std::panic::{self, AssertUnwindSafe};
    use windows::Win32::Foundation::{HMODULE, HWND, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW, SetWindowsHookExW,
        TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT, PM_NOREMOVE,
        WH_KEYBOARD_LL, WH_MOUSE_LL, WM_QUIT,
    };

    use overlay_core::executor::panic_message;
    use overlay_core::{OverlayCommand, OverlayDispatcher, PlatformError, RawInputEvent};

    const HC_ACTION: i32 = 0;

    static DISPATCHER: OnceCell<OverlayDispatcher> = OnceCell::new();

    /// The thread that will run the hook message loop.
    #[derive(Debug, Clone, Copy)]
    pub struct HookThread {
        thread_id: u32,
    }

    impl HookThread {
        /// Must be called on the thread that later calls `run`. Creates the
        /// thread's message queue so a quit posted before the loop starts is
        /// not lost.
        pub fn current() -> Self {
            unsafe {
                let mut msg = MSG::default();
                let _ = PeekMessageW(&mut msg, HWND(0), 0, 0, PM_NOREMOVE);
                Self {
                    thread_id: GetCurrentThreadId(),
                }
            }
        }

        pub fn request_quit(self) {
            if let Err(err) = unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
                tracing::warn!(thread_id = self.thread_id, error = %err, "Failed to stop hook message loop");
            }
        }
    }

    /// Installs both hooks and pumps messages until `WM_QUIT`.
    pub fn run(dispatcher: OverlayDispatcher) -> Result<(), PlatformError> {
        if DISPATCHER.set(dispatcher).is_err() {
            tracing::warn!("Input hook dispatcher already set");
        }

        let (mouse_hook, keyboard_hook) = install_hooks()?;
        tracing::info!("Input hooks installed");

        unsafe {
            let mut msg = MSG::default();
            loop {
                let rc = GetMessageW(&mut msg, HWND(0), 0, 0);
                if rc.0 == 0 {
                    break;
                }
                if rc.0 < 0 {
                    tracing::error!("GetMessageW failed; leaving hook loop");
                    break;
                }
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }

            if let Err(err) = UnhookWindowsHookEx(mouse_hook) {
                tracing::warn!(error = %err, "Failed to remove mouse hook");
            }
            if let Err(err) = UnhookWindowsHookEx(keyboard_hook) {
                tracing::warn!(error = %err, "Failed to remove keyboard hook");
            }
        }
        tracing::info!("Input hooks released");
        Ok(())
    }

    fn install_hooks() -> Result<(HHOOK, HHOOK), PlatformError> {
        unsafe {
            let module = GetModuleHandleW(None).unwrap_or(HMODULE::default());
            let mouse_hook = SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), module, 0)
                .map_err(|err| PlatformError::call("SetWindowsHookExW(WH_MOUSE_LL)", err.to_string()))?;
            let keyboard_hook = match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), module, 0) {
                Ok(hook) => hook,
                Err(err) => {
                    let _ = UnhookWindowsHookEx(mouse_hook);
                    return Err(PlatformError::call("SetWindowsHookExW(WH_KEYBOARD_LL)", err.to_string()));
                }
            };
            Ok((mouse_hook, keyboard_hook))
        }
    }

    fn forward(event: RawInputEvent) {
        let posted = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(dispatcher) = DISPATCHER.get() {
                dispatcher.post(OverlayCommand::Input(event));
            }
        }));
        if let Err(payload) = posted {
            let panic_message = panic_message(payload.as_ref());
            tracing::error!(panic_message, "Input hook handler panicked");
        }
    }

    unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        if code == HC_ACTION {
            let data = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            forward(RawInputEvent::keyboard(wparam.0 as u32, data.flags.0, Utc::now()));
        }
        CallNextHookEx(HHOOK(0), code, wparam, lparam)
    }

    unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        if code == HC_ACTION {
            let data = &*(lparam.0 as *const MSLLHOOKSTRUCT);
            forward(RawInputEvent::mouse(wparam.0 as u32, data.flags, Utc::now()));
        }
        CallNextHookEx(HHOOK(0), code, wparam, lparam)
    }
}

#[cfg(not(windows))]
mod unsupported {
    use overlay_core::{OverlayDispatcher, PlatformError};

    #[derive(Debug, Clone, Copy)]
    pub struct HookThread;

    impl HookThread {
        pub fn current() -> Self {
            Self
        }

        pub fn request_quit(self) {}
    }

    pub fn run(_dispatcher: OverlayDispatcher) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("SetWindowsHookExW"))
    }
}
