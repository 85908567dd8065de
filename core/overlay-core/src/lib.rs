//! # overlay-core
//!
//! Core library for the attention overlay: raises a companion window when new
//! mail arrives while the user is away, and dismisses it the moment a human
//! touches the keyboard or mouse.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Background work runs on plain threads.
//! - **Single executor**: `OverlayController` is not thread-safe and is driven
//!   only by `OverlayExecutor`; other threads post `OverlayCommand`s.
//! - **Graceful degradation**: OS call failures are logged, never fatal. A
//!   companion that cannot be shown leaves the overlay armed but invisible.
//! - **Platform seams as traits**: `CompanionPlatform` and `SystemIdleSource`
//!   keep every Win32 call behind an interface tests can script.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chrono::Utc;
//! use std::path::Path;
//!
//! use overlay_core::platform::{NativeIdleSource, NativePlatform};
//! use overlay_core::{
//!     companion_executable, executor, CompanionManager, ControllerOptions, OverlayCommand, OverlayController,
//! };
//!
//! let base = Path::new(r"C:\Program Files\AttentionOverlay");
//! let companion = CompanionManager::new(NativePlatform::new(), companion_executable(base));
//! let mut controller = OverlayController::new(
//!     companion,
//!     NativeIdleSource::default(),
//!     ControllerOptions::default(),
//!     Utc::now(),
//! );
//!
//! let (dispatcher, executor) = executor::channel();
//! dispatcher.post(OverlayCommand::NewNotification);
//! dispatcher.post(OverlayCommand::Exit);
//! executor.run(&mut controller);
//! ```

pub mod arming;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod idle;
pub mod lifecycle;
pub mod mail;
pub mod platform;

#[cfg(test)]
mod testing;

pub use arming::{ActivityRecord, ArmingState, ControllerOptions, NotificationOutcome, OverlayController};
pub use classifier::{classify, Classification, InputDevice, InputMessage, RawInputEvent};
pub use config::{load_config, MailConfig, OverlayConfig};
pub use error::{OverlayError, PlatformError, Result};
pub use executor::{ExitReason, OverlayCommand, OverlayDispatcher, OverlayExecutor};
pub use idle::{IdleMonitor, IdleThreshold, SystemIdleSource};
pub use lifecycle::{companion_executable, CompanionManager, CompanionState};
pub use mail::{DropDirSource, MailSource, MailWatcher, MailWatcherHandle};
