//! End-to-end wiring: mail watcher and input producers on their own threads,
//! one executor owning the controller.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use overlay_core::classifier::{LLKHF_INJECTED, WM_KEYDOWN, WM_MOUSEMOVE};
use overlay_core::executor::{self, ExitReason, OverlayCommand};
use overlay_core::mail::{self, DropDirSource, MailWatcher};
use overlay_core::platform::{CompanionPlatform, ProcessHandle, TopLevelWindow, WindowToken};
use overlay_core::{
    CompanionManager, ControllerOptions, IdleThreshold, OverlayController, PlatformError, RawInputEvent,
    SystemIdleSource,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

const WINDOW: isize = 7;

#[derive(Clone, Default)]
struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
    foregrounded_at: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl Journal {
    fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    fn count(&self, entry: &str) -> usize {
        self.entries.lock().unwrap().iter().filter(|e| e.as_str() == entry).count()
    }

    fn foregrounded_at(&self) -> Option<DateTime<Utc>> {
        *self.foregrounded_at.lock().unwrap()
    }

    fn wait_for(&self, entry: &str, times: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.count(entry) >= times {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

struct Proc(u32);

impl ProcessHandle for Proc {
    fn pid(&self) -> u32 {
        self.0
    }
}

struct RecordingPlatform {
    journal: Journal,
    next_pid: u32,
    visible: bool,
    startup: Duration,
}

impl CompanionPlatform for RecordingPlatform {
    type Process = Proc;

    fn executable_exists(&self, _path: &Path) -> bool {
        true
    }

    fn spawn(&mut self, _path: &Path) -> Result<Proc, PlatformError> {
        self.journal.record("spawn");
        self.next_pid += 1;
        Ok(Proc(self.next_pid))
    }

    fn has_exited(&mut self, _process: &mut Proc) -> bool {
        false
    }

    fn wait_for_input_idle(&mut self, _process: &Proc, _timeout: Duration) -> Result<(), PlatformError> {
        thread::sleep(self.startup);
        Ok(())
    }

    fn main_window(&self, _process: &Proc) -> Option<WindowToken> {
        Some(WindowToken::from_raw(WINDOW))
    }

    fn top_level_windows(&self, _pid: u32) -> Result<Vec<TopLevelWindow>, PlatformError> {
        Ok(Vec::new())
    }

    fn is_window(&self, _window: WindowToken) -> bool {
        true
    }

    fn is_visible(&self, _window: WindowToken) -> bool {
        self.visible
    }

    fn is_minimized(&self, _window: WindowToken) -> bool {
        false
    }

    fn show_window(&mut self, _window: WindowToken) -> Result<(), PlatformError> {
        self.journal.record("show");
        self.visible = true;
        Ok(())
    }

    fn hide_window(&mut self, _window: WindowToken) -> Result<(), PlatformError> {
        self.journal.record("hide");
        self.visible = false;
        Ok(())
    }

    fn restore_window(&mut self, _window: WindowToken) -> Result<(), PlatformError> {
        Ok(())
    }

    fn set_topmost(&mut self, _window: WindowToken) -> Result<(), PlatformError> {
        Ok(())
    }

    fn set_foreground(&mut self, _window: WindowToken) -> Result<(), PlatformError> {
        *self.journal.foregrounded_at.lock().unwrap() = Some(Utc::now());
        self.journal.record("foreground");
        Ok(())
    }

    fn foreground_window(&self) -> Option<WindowToken> {
        Some(WindowToken::from_raw(WINDOW))
    }

    fn is_foreground_fullscreen(&self) -> Result<bool, PlatformError> {
        Ok(false)
    }

    fn kill_tree(&mut self, _process: Proc, _wait: Duration) -> Result<(), PlatformError> {
        self.journal.record("kill");
        Ok(())
    }

    fn pause(&self, _duration: Duration) {}
}

struct AlwaysIdle;

impl SystemIdleSource for AlwaysIdle {
    fn last_input_age(&self) -> Result<Duration, PlatformError> {
        Ok(Duration::from_secs(3600))
    }
}

fn spawn_executor(journal: Journal) -> (executor::OverlayDispatcher, thread::JoinHandle<ExitReason>) {
    spawn_executor_with_startup(journal, Duration::ZERO)
}

fn spawn_executor_with_startup(
    journal: Journal,
    startup: Duration,
) -> (executor::OverlayDispatcher, thread::JoinHandle<ExitReason>) {
    let (dispatcher, executor) = executor::channel();
    let exit_journal = journal.clone();
    let handle = thread::spawn(move || {
        let platform = RecordingPlatform {
            journal,
            next_pid: 9000,
            visible: false,
            startup,
        };
        let companion = CompanionManager::new(platform, "Unity/Disclosure.exe".into());
        let options = ControllerOptions {
            threshold: IdleThreshold::from_secs(60),
            ..ControllerOptions::default()
        };
        let mut controller = OverlayController::new(companion, AlwaysIdle, options, Utc::now());
        executor
            .on_exit(move || exit_journal.record("exit-hook"))
            .run(&mut controller)
    });
    (dispatcher, handle)
}

fn drop_mail(dir: &Path, name: &str, modified: SystemTime) {
    let path = dir.join(name);
    std::fs::write(&path, b"Subject: hello\r\n\r\n").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&path)
        .and_then(|f| f.set_modified(modified))
        .unwrap();
}

#[test]
fn new_mail_raises_overlay_and_real_key_dismisses_it() {
    let journal = Journal::default();
    let (dispatcher, executor_thread) = spawn_executor(journal.clone());

    let inbox = tempfile::tempdir().unwrap();
    drop_mail(inbox.path(), "1.eml", SystemTime::now() - Duration::from_secs(60));
    let watcher = MailWatcher::new(DropDirSource::new(inbox.path()));
    let mail_dispatcher = dispatcher.clone();
    let mail_handle = mail::start(watcher, Duration::from_millis(20), move || {
        mail_dispatcher.post(OverlayCommand::NewNotification);
    });

    thread::sleep(Duration::from_millis(100));
    assert_eq!(journal.count("spawn"), 0, "mail present at start must not fire");

    drop_mail(inbox.path(), "2.eml", SystemTime::now());
    assert!(journal.wait_for("spawn", 1), "new mail should launch the companion");

    let injected = RawInputEvent::keyboard(WM_KEYDOWN, LLKHF_INJECTED, Utc::now() + ChronoDuration::seconds(1));
    dispatcher.post(OverlayCommand::Input(injected));
    let real = RawInputEvent::keyboard(WM_KEYDOWN, 0, Utc::now() + ChronoDuration::seconds(1));
    dispatcher.post(OverlayCommand::Input(real));
    assert!(journal.wait_for("kill", 1), "real key-down should dismiss");

    mail_handle.stop();
    dispatcher.post(OverlayCommand::Exit);
    let reason = executor_thread.join().unwrap();

    assert_eq!(reason, ExitReason::Requested);
    assert_eq!(journal.count("spawn"), 1);
    assert_eq!(journal.count("kill"), 1);
    assert_eq!(journal.count("exit-hook"), 1);
}

#[test]
fn slow_companion_startup_does_not_dismiss_on_focus_follow_move() {
    let journal = Journal::default();
    let (dispatcher, executor_thread) = spawn_executor_with_startup(journal.clone(), Duration::from_millis(600));

    dispatcher.post(OverlayCommand::NewNotification);
    assert!(journal.wait_for("foreground", 1), "notification should raise the companion");
    let raised_at = journal.foregrounded_at().unwrap();

    let focus_follow = RawInputEvent::mouse(WM_MOUSEMOVE, 0, raised_at + ChronoDuration::milliseconds(50));
    dispatcher.post(OverlayCommand::Input(focus_follow));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(journal.count("kill"), 0, "the raise's own mouse move must not dismiss");

    let real = RawInputEvent::mouse(WM_MOUSEMOVE, 0, raised_at + ChronoDuration::seconds(1));
    dispatcher.post(OverlayCommand::Input(real));
    assert!(journal.wait_for("kill", 1), "a later mouse move should dismiss");

    dispatcher.post(OverlayCommand::Exit);
    assert_eq!(executor_thread.join().unwrap(), ExitReason::Requested);
    assert_eq!(journal.count("spawn"), 1);
    assert_eq!(journal.count("kill"), 1);
}

#[test]
fn paused_agent_ignores_mail_until_resumed() {
    let journal = Journal::default();
    let (dispatcher, executor_thread) = spawn_executor(journal.clone());

    dispatcher.post(OverlayCommand::Pause(true));
    dispatcher.post(OverlayCommand::NewNotification);
    dispatcher.post(OverlayCommand::Pause(false));
    dispatcher.post(OverlayCommand::NewNotification);
    dispatcher.post(OverlayCommand::Exit);

    assert_eq!(executor_thread.join().unwrap(), ExitReason::Requested);
    assert_eq!(journal.count("spawn"), 1);
    assert_eq!(journal.count("kill"), 1);
}

#[test]
fn ticker_keeps_running_until_executor_exits() {
    let journal = Journal::default();
    let (dispatcher, executor_thread) = spawn_executor(journal.clone());
    let ticker = executor::spawn_ticker(dispatcher.clone(), Duration::from_millis(10));

    dispatcher.post(OverlayCommand::ForceShow);
    thread::sleep(Duration::from_millis(50));
    dispatcher.post(OverlayCommand::Exit);

    assert_eq!(executor_thread.join().unwrap(), ExitReason::Requested);
    assert!(ticker.join().is_ok());
    assert_eq!(journal.count("spawn"), 1);
}

#[test]
fn dropping_all_producers_shuts_down_and_kills() {
    let journal = Journal::default();
    let (dispatcher, executor_thread) = spawn_executor(journal.clone());

    dispatcher.post(OverlayCommand::ForceShow);
    drop(dispatcher);

    assert_eq!(executor_thread.join().unwrap(), ExitReason::Disconnected);
    assert_eq!(journal.count("kill"), 1);
    assert_eq!(journal.count("exit-hook"), 1);
}
