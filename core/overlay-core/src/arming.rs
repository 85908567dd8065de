//! Overlay arming state machine.
//!
//! `OverlayController` is the single owner of the arming state, the idle
//! monitor and the companion manager. Every mutating method must run on the
//! executor thread (see `executor`); other threads post `OverlayCommand`s.
//!
//! Show/hide failures are logged and swallowed here. The arming transition is
//! recorded regardless, so a companion that cannot be displayed degrades the
//! overlay to "not shown" without desynchronising later events.

use chrono::{DateTime, Utc};

use crate::classifier::{self, Classification, RawInputEvent};
use crate::executor::OverlayCommand;
use crate::idle::{IdleMonitor, IdleThreshold, SystemIdleSource};
use crate::lifecycle::CompanionManager;
use crate::platform::CompanionPlatform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmingState {
    Disarmed,
    Armed,
}

/// Snapshot of the timestamps the controller reasons about.
///
/// `overlay_shown` is `Some` exactly while the controller is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityRecord {
    pub last_meaningful_input: DateTime<Utc>,
    pub overlay_shown: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerOptions {
    pub threshold: IdleThreshold,
    pub suppress_when_fullscreen: bool,
    pub start_paused: bool,
}

/// Why a notification (or a gated manual show) did or did not raise the
/// overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Shown,
    Paused,
    AlreadyArmed,
    NotIdle,
    Fullscreen,
}

pub struct OverlayController<P: CompanionPlatform, I: SystemIdleSource> {
    companion: CompanionManager<P>,
    system_idle: I,
    idle: IdleMonitor,
    state: ArmingState,
    overlay_shown: Option<DateTime<Utc>>,
    paused: bool,
    suppress_when_fullscreen: bool,
}

impl<P: CompanionPlatform, I: SystemIdleSource> OverlayController<P, I> {
    pub fn new(
        companion: CompanionManager<P>,
        system_idle: I,
        options: ControllerOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            companion,
            system_idle,
            idle: IdleMonitor::new(options.threshold, now),
            state: ArmingState::Disarmed,
            overlay_shown: None,
            paused: options.start_paused,
            suppress_when_fullscreen: options.suppress_when_fullscreen,
        }
    }

    pub fn state(&self) -> ArmingState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn activity(&self) -> ActivityRecord {
        ActivityRecord {
            last_meaningful_input: self.idle.last_meaningful_input(),
            overlay_shown: self.overlay_shown,
        }
    }

    pub fn companion(&self) -> &CompanionManager<P> {
        &self.companion
    }

    pub fn companion_mut(&mut self) -> &mut CompanionManager<P> {
        &mut self.companion
    }

    /// Runs one command. Returns `false` once the controller has shut down.
    pub fn dispatch(&mut self, command: OverlayCommand, now: DateTime<Utc>) -> bool {
        match command {
            OverlayCommand::NewNotification => {
                self.new_notification(now);
            }
            OverlayCommand::Input(event) => {
                self.handle_input(&event);
            }
            OverlayCommand::Show => {
                self.show(now);
            }
            OverlayCommand::Hide => self.hide(),
            OverlayCommand::ForceShow => self.force_show(now),
            OverlayCommand::Pause(paused) => self.set_paused(paused),
            OverlayCommand::Tick => self.tick(),
            OverlayCommand::Exit => {
                self.exit();
                return false;
            }
        }
        true
    }

    pub fn new_notification(&mut self, now: DateTime<Utc>) -> NotificationOutcome {
        self.try_arm(now, "notification")
    }

    /// Manual trigger from the control surface; same gating as a notification.
    pub fn show(&mut self, now: DateTime<Utc>) -> NotificationOutcome {
        self.try_arm(now, "manual")
    }

    /// Classifies one hook event, feeds the idle monitor and disarms on real
    /// input. Uses the event's own timestamp, not the time it was dequeued.
    pub fn handle_input(&mut self, event: &RawInputEvent) -> Classification {
        let since_shown = classifier::since_overlay_shown(self.overlay_shown, event.at);
        let classification = classifier::classify(event, since_shown);
        tracing::debug!(
            message = event.message_code,
            synthetic = classification.is_synthetic,
            meaningful = classification.is_meaningful,
            "Input classified"
        );

        self.idle.observe(classification, event.at);

        if classification.is_synthetic || !classification.is_meaningful {
            return classification;
        }
        if self.state == ArmingState::Armed {
            self.disarm(true, "input");
        }
        classification
    }

    /// Raises the overlay regardless of pause and idle state.
    pub fn force_show(&mut self, now: DateTime<Utc>) {
        self.arm(now, "force");
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        tracing::info!(paused, "Pause toggled");
        if paused && self.state == ArmingState::Armed {
            self.disarm(false, "pause");
        }
    }

    /// Hides without killing the companion. No-op while disarmed.
    pub fn hide(&mut self) {
        if self.state == ArmingState::Disarmed {
            tracing::debug!("Hide requested while disarmed");
            return;
        }
        self.disarm(false, "manual");
    }

    /// Enforcement pass. A window that only shows up now gets raised here,
    /// so the post-raise suppression window restarts from that raise.
    pub fn tick(&mut self) {
        let Some(raised_at) = self.companion.enforce_tick() else {
            return;
        };
        if self.state == ArmingState::Armed {
            let shown = self.overlay_shown.map_or(raised_at, |shown| shown.max(raised_at));
            self.overlay_shown = Some(shown);
            tracing::debug!(overlay_shown = %shown, "Overlay raise restamped by tick");
        }
    }

    /// Unconditional teardown: hides and kills the companion even when a
    /// paused hide left it running.
    pub fn exit(&mut self) {
        tracing::info!(state = ?self.state, "Controller exiting");
        self.disarm(true, "exit");
    }

    fn try_arm(&mut self, now: DateTime<Utc>, trigger: &'static str) -> NotificationOutcome {
        let outcome = self.gate(now);
        match outcome {
            NotificationOutcome::Shown => self.arm(now, trigger),
            NotificationOutcome::AlreadyArmed => {
                tracing::debug!(trigger, "Overlay already armed");
            }
            other => {
                tracing::info!(trigger, reason = ?other, "Notification suppressed");
            }
        }
        outcome
    }

    fn gate(&self, now: DateTime<Utc>) -> NotificationOutcome {
        if self.paused {
            return NotificationOutcome::Paused;
        }
        if self.state == ArmingState::Armed {
            return NotificationOutcome::AlreadyArmed;
        }
        if !self.idle.is_idle(now, &self.system_idle) {
            return NotificationOutcome::NotIdle;
        }
        if self.suppress_when_fullscreen && self.foreground_is_fullscreen() {
            return NotificationOutcome::Fullscreen;
        }
        NotificationOutcome::Shown
    }

    fn foreground_is_fullscreen(&self) -> bool {
        match self.companion.platform().is_foreground_fullscreen() {
            Ok(fullscreen) => fullscreen,
            Err(err) => {
                tracing::debug!(error = %err, "Fullscreen check failed");
                false
            }
        }
    }

    /// `now` is when the command was taken off the queue; a cold launch can
    /// take seconds after that, so the stamp is the later of the two.
    fn arm(&mut self, now: DateTime<Utc>, trigger: &'static str) {
        let shown = match self.companion.show() {
            Ok(raised_at) => raised_at.max(now),
            Err(err) => {
                tracing::warn!(trigger, error = %err, "Companion show failed; overlay stays armed");
                now
            }
        };
        self.state = ArmingState::Armed;
        self.overlay_shown = Some(shown);
        tracing::info!(trigger, companion = ?self.companion.state(), "Overlay armed");
    }

    fn disarm(&mut self, kill: bool, trigger: &'static str) {
        if let Err(err) = self.companion.hide(kill) {
            tracing::warn!(trigger, kill, error = %err, "Companion hide failed");
        }
        self.state = ArmingState::Disarmed;
        self.overlay_shown = None;
        tracing::info!(trigger, kill, "Overlay disarmed");
    }
}
