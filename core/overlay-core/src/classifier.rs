//! Input classification for low-level keyboard and mouse hook events.
//!
//! Stateless: the only time-dependent input is how long ago the overlay was
//! raised, which the caller supplies. The raw message codes and injected bits
//! are the Win32 values so the hook can forward them untouched.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Mouse-move events this soon after a raise are the platform's focus-follow
/// move, not the user.
pub const MOUSE_MOVE_SUPPRESSION: Duration = Duration::from_millis(200);

pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_SYSKEYDOWN: u32 = 0x0104;
pub const WM_SYSKEYUP: u32 = 0x0105;
pub const WM_MOUSEMOVE: u32 = 0x0200;
pub const WM_LBUTTONDOWN: u32 = 0x0201;
pub const WM_LBUTTONUP: u32 = 0x0202;
pub const WM_RBUTTONDOWN: u32 = 0x0204;
pub const WM_RBUTTONUP: u32 = 0x0205;
pub const WM_MBUTTONDOWN: u32 = 0x0207;
pub const WM_MBUTTONUP: u32 = 0x0208;
pub const WM_MOUSEWHEEL: u32 = 0x020A;
pub const WM_XBUTTONDOWN: u32 = 0x020B;
pub const WM_XBUTTONUP: u32 = 0x020C;
pub const WM_MOUSEHWHEEL: u32 = 0x020E;

/// `KBDLLHOOKSTRUCT.flags` injected bit.
pub const LLKHF_INJECTED: u32 = 0x0000_0010;
/// `MSLLHOOKSTRUCT.flags` injected bits.
pub const LLMHF_INJECTED: u32 = 0x0000_0001;
pub const LLMHF_LOWER_IL_INJECTED: u32 = 0x0000_0002;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDevice {
    Keyboard,
    Mouse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMessage {
    KeyDown,
    KeyUp,
    MouseMove,
    ButtonDown,
    ButtonUp,
    Wheel,
    Other(u32),
}

impl InputMessage {
    pub fn from_code(code: u32) -> Self {
        match code {
            WM_KEYDOWN | WM_SYSKEYDOWN => Self::KeyDown,
            WM_KEYUP | WM_SYSKEYUP => Self::KeyUp,
            WM_MOUSEMOVE => Self::MouseMove,
            WM_LBUTTONDOWN | WM_RBUTTONDOWN | WM_MBUTTONDOWN | WM_XBUTTONDOWN => Self::ButtonDown,
            WM_LBUTTONUP | WM_RBUTTONUP | WM_MBUTTONUP | WM_XBUTTONUP => Self::ButtonUp,
            WM_MOUSEWHEEL | WM_MOUSEHWHEEL => Self::Wheel,
            other => Self::Other(other),
        }
    }
}

/// One event as delivered by the global hook, stamped in the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInputEvent {
    pub device: InputDevice,
    pub message_code: u32,
    pub flags: u32,
    pub at: DateTime<Utc>,
}

impl RawInputEvent {
    pub fn keyboard(message_code: u32, flags: u32, at: DateTime<Utc>) -> Self {
        Self {
            device: InputDevice::Keyboard,
            message_code,
            flags,
            at,
        }
    }

    pub fn mouse(message_code: u32, flags: u32, at: DateTime<Utc>) -> Self {
        Self {
            device: InputDevice::Mouse,
            message_code,
            flags,
            at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_synthetic: bool,
    pub is_meaningful: bool,
}

pub fn is_synthetic(device: InputDevice, flags: u32) -> bool {
    match device {
        InputDevice::Keyboard => flags & LLKHF_INJECTED != 0,
        InputDevice::Mouse => flags & (LLMHF_INJECTED | LLMHF_LOWER_IL_INJECTED) != 0,
    }
}

/// `since_overlay_shown` is `None` when no overlay is up, which never
/// suppresses a move.
pub fn is_meaningful(message: InputMessage, since_overlay_shown: Option<Duration>) -> bool {
    match message {
        InputMessage::KeyDown | InputMessage::ButtonDown | InputMessage::Wheel => true,
        InputMessage::MouseMove => since_overlay_shown
            .map(|elapsed| elapsed > MOUSE_MOVE_SUPPRESSION)
            .unwrap_or(true),
        InputMessage::KeyUp | InputMessage::ButtonUp | InputMessage::Other(_) => false,
    }
}

pub fn classify(event: &RawInputEvent, since_overlay_shown: Option<Duration>) -> Classification {
    Classification {
        is_synthetic: is_synthetic(event.device, event.flags),
        is_meaningful: is_meaningful(InputMessage::from_code(event.message_code), since_overlay_shown),
    }
}

/// Elapsed time from the overlay raise to the event. An event stamped before
/// the raise counts as zero elapsed.
pub fn since_overlay_shown(
    overlay_shown: Option<DateTime<Utc>>,
    at: DateTime<Utc>,
) -> Option<Duration> {
    overlay_shown.map(|shown| (at - shown).to_std().unwrap_or(Duration::ZERO))
}
