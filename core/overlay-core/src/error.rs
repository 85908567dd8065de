//! Error types for overlay-core operations.
//!
//! None of these reach the user. The controller is the boundary that logs them
//! and carries on; see `OverlayController`.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Platform Error (one failed OS call)
// ═══════════════════════════════════════════════════════════════════════════════

/// A single OS call that reported failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("{op} failed: {details}")]
    CallFailed { op: &'static str, details: String },

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

impl PlatformError {
    pub fn call(op: &'static str, details: impl Into<String>) -> Self {
        PlatformError::CallFailed {
            op,
            details: details.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Overlay Error
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors that can occur in overlay-core operations.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    // ─────────────────────────────────────────────────────────────────────
    // Companion Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Companion executable not found at {}", path.display())]
    CompanionUnavailable { path: PathBuf },

    #[error("No companion window found for pid {pid}")]
    HandleNotFound { pid: u32 },

    #[error(transparent)]
    Platform(#[from] PlatformError),

    // ─────────────────────────────────────────────────────────────────────
    // Configuration / I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration malformed: {}: {details}", path.display())]
    Config { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using OverlayError.
pub type Result<T> = std::result::Result<T, OverlayError>;
