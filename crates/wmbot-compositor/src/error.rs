//! Error types for the wmbot-compositor crate.

use thiserror::Error;

/// Failures running the overlay tool. A non-zero exit is not an error here;
/// it is reported through [`crate::OverlayOutcome`] and judged by the caller.
#[derive(Debug, Error)]
pub enum CompositorError {
    /// The binary could not be started (missing, not executable, bad cwd).
    #[error("failed to spawn `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading stderr or waiting for the child failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The child ran past its deadline and was killed.
    #[error("overlay timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CompositorError>;
