//! Tracing bootstrap: stderr plus a daily-rolling file under
//! `~/.attention-overlay/logs/`.

use fs_err as fs;
use std::env;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEBUG_ENV: &str = "ATTENTION_OVERLAY_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "attention-overlay.log";

/// Installs the global subscriber. Keep the returned guard alive for the
/// whole process or buffered file lines are lost.
pub fn init() -> Option<WorkerGuard> {
    let filter = env_filter();

    let Some(dir) = prepare_log_dir() else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    };

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    Some(guard)
}

fn env_filter() -> EnvFilter {
    if debug_requested(env::var(DEBUG_ENV).ok().as_deref()) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn debug_requested(value: Option<&str>) -> bool {
    value
        .map(|value| matches!(value, "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn prepare_log_dir() -> Option<PathBuf> {
    let dir = overlay_core::config::app_dir()?.join("logs");
    match fs::create_dir_all(&dir) {
        Ok(()) => Some(dir),
        Err(err) => {
            // No subscriber yet.
            eprintln!("attention-overlay: file logging disabled: {err}");
            None
        }
    }
}
