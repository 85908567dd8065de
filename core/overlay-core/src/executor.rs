//! Single-threaded command executor.
//!
//! The hook callback, the mail watcher, the ticker and the control shell all
//! run on their own threads. None of them touch the controller; they post an
//! `OverlayCommand` through a cloned `OverlayDispatcher` and return at once.
//! `OverlayExecutor::run` drains the queue on one thread and is the only
//! place controller methods are called.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::arming::OverlayController;
use crate::classifier::RawInputEvent;
use crate::idle::SystemIdleSource;
use crate::platform::CompanionPlatform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayCommand {
    NewNotification,
    Input(RawInputEvent),
    Show,
    Hide,
    ForceShow,
    Pause(bool),
    Tick,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// An `Exit` command was processed.
    Requested,
    /// Every dispatcher was dropped.
    Disconnected,
}

/// Fire-and-forget handle for posting commands to the executor.
#[derive(Clone)]
pub struct OverlayDispatcher {
    sender: mpsc::Sender<OverlayCommand>,
    closed_logged: Arc<AtomicBool>,
}

impl OverlayDispatcher {
    /// Queues a command without blocking. Returns `false` once the executor
    /// has stopped.
    pub fn post(&self, command: OverlayCommand) -> bool {
        match self.sender.send(command) {
            Ok(()) => true,
            Err(_) => {
                if !self.closed_logged.swap(true, Ordering::Relaxed) {
                    tracing::debug!(command = ?command, "Executor stopped; dropping command");
                }
                false
            }
        }
    }
}

type Clock = Box<dyn FnMut() -> DateTime<Utc> + Send>;
type ExitHook = Box<dyn FnOnce() + Send>;

pub struct OverlayExecutor {
    receiver: mpsc::Receiver<OverlayCommand>,
    clock: Clock,
    on_exit: Option<ExitHook>,
}

/// Creates a connected dispatcher/executor pair.
pub fn channel() -> (OverlayDispatcher, OverlayExecutor) {
    let (sender, receiver) = mpsc::channel();
    let dispatcher = OverlayDispatcher {
        sender,
        closed_logged: Arc::new(AtomicBool::new(false)),
    };
    let executor = OverlayExecutor {
        receiver,
        clock: Box::new(Utc::now),
        on_exit: None,
    };
    (dispatcher, executor)
}

impl OverlayExecutor {
    /// Runs after the loop ends, whatever the reason.
    pub fn on_exit(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_exit = Some(Box::new(hook));
        self
    }

    /// Replaces the wall clock used for `now` arguments.
    pub fn with_clock(mut self, clock: impl FnMut() -> DateTime<Utc> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Processes commands serially until `Exit` or until every dispatcher is
    /// gone. A disconnect is treated like `Exit` so the companion never
    /// outlives the agent.
    pub fn run<P, I>(mut self, controller: &mut OverlayController<P, I>) -> ExitReason
    where
        P: CompanionPlatform,
        I: SystemIdleSource,
    {
        tracing::info!("Overlay executor started");
        let reason = loop {
            let command = match self.receiver.recv() {
                Ok(command) => command,
                Err(_) => {
                    tracing::info!("All dispatchers dropped; shutting down");
                    guarded(OverlayCommand::Exit, || {
                        controller.exit();
                    });
                    break ExitReason::Disconnected;
                }
            };

            let now = (self.clock)();
            match guarded(command, || controller.dispatch(command, now)) {
                Some(false) => break ExitReason::Requested,
                Some(true) | None => {}
            }
        };

        if let Some(hook) = self.on_exit.take() {
            hook();
        }
        tracing::info!(reason = ?reason, "Overlay executor stopped");
        reason
    }
}

/// Posts `Tick` every `interval` until the executor stops.
pub fn spawn_ticker(dispatcher: OverlayDispatcher, interval: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        thread::sleep(interval);
        if !dispatcher.post(OverlayCommand::Tick) {
            break;
        }
    })
}

fn guarded<T>(command: OverlayCommand, handler: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(handler)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let panic_message = panic_message(payload.as_ref());
            tracing::error!(command = ?command, panic_message, "Command handler panicked");
            None
        }
    }
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
