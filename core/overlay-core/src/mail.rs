//! New-mail edge detection.
//!
//! A `MailSource` answers one question: what is the identifier of the newest
//! message right now. `MailWatcher` turns successive answers into a single
//! edge per distinct new top message. The watcher thread only signals; the
//! caller marshals that signal onto the executor.

use fs_err as fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use crate::error::{OverlayError, Result};

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

const STOP_CHECK_SLICE: Duration = Duration::from_millis(100);

pub trait MailSource: Send {
    /// Identifier of the most recent message, `None` when there is none.
    fn current_top_message_id(&self) -> Result<Option<String>>;
}

pub struct MailWatcher<S: MailSource> {
    source: S,
    last_id: Option<String>,
}

impl<S: MailSource> MailWatcher<S> {
    /// Primes the last-seen id so mail already present never fires.
    pub fn new(source: S) -> Self {
        let last_id = query(&source);
        tracing::info!(top_id = last_id.as_deref().unwrap_or("<none>"), "Mail watcher primed");
        Self { source, last_id }
    }

    pub fn last_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    /// One poll. Returns `true` exactly when a new top message appeared.
    pub fn poll_once(&mut self) -> bool {
        let Some(current) = query(&self.source) else {
            tracing::debug!("Mail poll: no top message");
            return false;
        };

        match self.last_id.as_deref() {
            Some(last) if last != current => {
                tracing::info!(top_id = %current, "New mail detected");
                self.last_id = Some(current);
                true
            }
            Some(_) => false,
            None => {
                tracing::info!(top_id = %current, "Mail watcher primed late");
                self.last_id = Some(current);
                false
            }
        }
    }
}

fn query<S: MailSource>(source: &S) -> Option<String> {
    match source.current_top_message_id() {
        Ok(id) => id.filter(|id| !id.is_empty()),
        Err(err) => {
            tracing::warn!(error = %err, "Mail poll failed");
            None
        }
    }
}

/// Running watcher thread. Dropping the handle stops the thread without
/// waiting for it.
pub struct MailWatcherHandle {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MailWatcherHandle {
    /// Stops polling and waits for the thread to finish its current poll.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Mail watcher thread panicked");
            }
        }
    }
}

impl Drop for MailWatcherHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Polls every `interval` on a background thread and calls `on_new_mail`
/// for each edge.
pub fn start<S, F>(mut watcher: MailWatcher<S>, interval: Duration, mut on_new_mail: F) -> MailWatcherHandle
where
    S: MailSource + 'static,
    F: FnMut() + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let thread = thread::spawn(move || {
        tracing::info!(interval_ms = interval.as_millis() as u64, "Mail watcher started");
        while sleep_unless_stopped(interval, &stop_flag) {
            if watcher.poll_once() {
                on_new_mail();
            }
        }
        tracing::info!("Mail watcher stopped");
    });
    MailWatcherHandle {
        stop,
        thread: Some(thread),
    }
}

/// Returns `false` if a stop was requested during the sleep.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let slice = remaining.min(STOP_CHECK_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
    !stop.load(Ordering::Relaxed)
}

/// Treats a directory as a mailbox: the newest-modified file is the top
/// message and its file name is the identifier. Works with a Maildir `new/`
/// folder or any client rule that saves arriving mail to disk.
#[derive(Debug, Clone)]
pub struct DropDirSource {
    dir: PathBuf,
}

impl DropDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MailSource for DropDirSource {
    fn current_top_message_id(&self) -> Result<Option<String>> {
        if !self.dir.is_dir() {
            return Ok(None);
        }
        let entries = fs::read_dir(&self.dir).map_err(|source| OverlayError::Io {
            context: format!("reading mail drop directory {}", self.dir.display()),
            source,
        })?;

        let mut newest: Option<(SystemTime, String)> = None;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "Skipping unreadable mail entry");
                    continue;
                }
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_newer = match &newest {
                Some((time, existing)) => modified > *time || (modified == *time && name > *existing),
                None => true,
            };
            if is_newer {
                newest = Some((modified, name));
            }
        }
        Ok(newest.map(|(_, name)| name))
    }
}
