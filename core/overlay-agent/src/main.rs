//! attention-overlay: raises the companion window when new mail arrives while
//! the user is away, and dismisses it on the first real keystroke or click.
//!
//! ## Threads
//!
//! - main: Win32 input hooks and their message loop
//! - `overlay-executor`: owns the controller, runs every command serially
//! - ticker, mail watcher and `control-shell`: post commands only

#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

mod hook;
mod logging;
mod shell;

use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::thread;
use tracing::{error, info, warn};

use overlay_core::executor::{self, OverlayCommand, OverlayDispatcher};
use overlay_core::lifecycle::ENFORCE_INTERVAL;
use overlay_core::mail::{self, DropDirSource, MailWatcher, MailWatcherHandle};
use overlay_core::platform::{NativeIdleSource, NativePlatform};
use overlay_core::{
    companion_executable, load_config, CompanionManager, ControllerOptions, IdleThreshold, MailConfig,
    OverlayConfig, OverlayController,
};

#[derive(Parser)]
#[command(name = "attention-overlay")]
#[command(about = "Surfaces a companion window on new mail while you are away")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.attention-overlay/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds without input before the user counts as away (0 = always)
    #[arg(long, value_name = "SECS")]
    idle_threshold: Option<u64>,

    /// Start with notifications paused
    #[arg(long)]
    paused: bool,

    /// Raise the companion once at startup, ignoring idle and pause
    #[arg(long)]
    force_show: bool,

    /// Do not read control commands from stdin
    #[arg(long)]
    no_shell: bool,
}

fn main() {
    let cli = Cli::parse();
    let _logging_guard = logging::init();
    info!(version = env!("CARGO_PKG_VERSION"), "Attention overlay starting");

    let config = match load_config(cli.config.clone()) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load configuration; using defaults");
            OverlayConfig::default()
        }
    };
    let threshold = cli
        .idle_threshold
        .map(IdleThreshold::from_secs)
        .unwrap_or_else(|| config.idle_threshold());

    let executable = companion_path();
    info!(
        path = %executable.display(),
        idle_threshold_secs = threshold.as_duration().as_secs(),
        suppress_when_fullscreen = config.suppress_when_fullscreen,
        "Configuration resolved"
    );

    let hook_thread = hook::HookThread::current();
    let (dispatcher, executor) = executor::channel();
    let executor = executor.on_exit(move || hook_thread.request_quit());

    let options = ControllerOptions {
        threshold,
        suppress_when_fullscreen: config.suppress_when_fullscreen,
        start_paused: cli.paused,
    };
    let companion = CompanionManager::new(NativePlatform::new(), executable);
    let mut controller = OverlayController::new(companion, NativeIdleSource::default(), options, Utc::now());

    let executor_thread = match thread::Builder::new()
        .name("overlay-executor".to_string())
        .spawn(move || executor.run(&mut controller))
    {
        Ok(handle) => handle,
        Err(err) => {
            error!(error = %err, "Failed to start executor thread");
            std::process::exit(1);
        }
    };

    executor::spawn_ticker(dispatcher.clone(), ENFORCE_INTERVAL);
    let mail_watcher = start_mail_watcher(&config.mail, &dispatcher);

    if !cli.no_shell {
        if let Err(err) = shell::spawn(dispatcher.clone()) {
            warn!(error = %err, "Failed to start control shell");
        }
    }
    if cli.force_show {
        dispatcher.post(OverlayCommand::ForceShow);
    }

    match hook::run(dispatcher.clone()) {
        // The loop only ends once the executor asked it to, or on a message
        // loop failure; either way make sure the controller tears down.
        Ok(()) => {
            dispatcher.post(OverlayCommand::Exit);
        }
        Err(err) => {
            warn!(error = %err, "Input hooks unavailable; overlay will not dismiss on input");
        }
    }
    drop(dispatcher);

    match executor_thread.join() {
        Ok(reason) => info!(reason = ?reason, "Attention overlay stopped"),
        Err(_) => error!("Executor thread panicked"),
    }
    if let Some(watcher) = mail_watcher {
        watcher.stop();
    }
}

/// `<agent dir>\Unity\Disclosure.exe`.
fn companion_path() -> PathBuf {
    let base = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| {
            warn!("Could not resolve agent directory; using working directory");
            PathBuf::from(".")
        });
    companion_executable(&base)
}

fn start_mail_watcher(config: &MailConfig, dispatcher: &OverlayDispatcher) -> Option<MailWatcherHandle> {
    let Some(dir) = config.drop_dir.clone() else {
        info!("No mail drop directory configured; mail watcher disabled");
        return None;
    };
    let watcher = MailWatcher::new(DropDirSource::new(dir));
    let dispatcher = dispatcher.clone();
    Some(mail::start(watcher, config.poll_interval(), move || {
        dispatcher.post(OverlayCommand::NewNotification);
    }))
}
