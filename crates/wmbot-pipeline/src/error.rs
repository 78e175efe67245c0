use std::fmt;

use thiserror::Error;

use wmbot_compositor::CompositorError;
use wmbot_core::types::{RequestId, SessionId};
use wmbot_storage::StorageError;
use wmbot_usage::LedgerError;

use crate::stage::Stage;

/// Errors raised by a [`crate::TransferAdapter`] or [`crate::Notifier`].
#[derive(Debug, Error)]
pub enum TransferError {
    /// The transport rejected or failed the call.
    #[error("transport request failed: {0}")]
    Request(String),

    /// The transport resolved the file but gave no downloadable path.
    #[error("remote file {file_id} has no download path")]
    MissingPath { file_id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used for logging and for the reply sent to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the user: missing or wrong watermark, empty media.
    Validation,
    /// The overlay tool failed or could not run.
    Compositing,
    /// Download, upload or message delivery failed.
    Transfer,
    /// Workspace or watermark directory manipulation failed.
    Filesystem,
    /// The usage store failed.
    Ledger,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Compositing => "compositing",
            ErrorKind::Transfer => "transfer",
            ErrorKind::Filesystem => "filesystem",
            ErrorKind::Ledger => "ledger",
        };
        f.write_str(s)
    }
}

/// What went wrong, independent of where.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("watermark is not set")]
    WatermarkMissing,

    #[error("message carries no downloadable media")]
    NoMedia,

    #[error("overlay exited with code {exit_code}: {stderr_tail}")]
    OverlayFailed { exit_code: i32, stderr_tail: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Compositor(#[from] CompositorError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The blocking task running the usage update panicked or was cancelled.
    #[error("usage update task failed: {0}")]
    LedgerTask(tokio::task::JoinError),
}

impl FailureCause {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FailureCause::WatermarkMissing | FailureCause::NoMedia => ErrorKind::Validation,
            FailureCause::OverlayFailed { .. } | FailureCause::Compositor(_) => {
                ErrorKind::Compositing
            }
            FailureCause::Storage(StorageError::InvalidWatermark { .. }) => ErrorKind::Validation,
            FailureCause::Storage(StorageError::Io { .. }) => ErrorKind::Filesystem,
            FailureCause::Transfer(_) => ErrorKind::Transfer,
            FailureCause::Ledger(_) | FailureCause::LedgerTask(_) => ErrorKind::Ledger,
        }
    }
}

/// A media request that ended in the `Failed` state.
///
/// `at` is the last state the request reached before failing.
#[derive(Debug, Error)]
#[error("{kind} failure in request {request} for chat {session} after {at}: {cause}", kind = .cause.kind())]
pub struct PipelineError {
    pub session: SessionId,
    pub request: RequestId,
    pub at: Stage,
    #[source]
    pub cause: FailureCause,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }
}

/// A command chain (watermark upload, reset, reply) that failed.
#[derive(Debug, Error)]
#[error("{kind} failure in {command} ({request}) for chat {session}: {cause}", kind = .cause.kind())]
pub struct CommandError {
    pub session: SessionId,
    pub request: RequestId,
    pub command: &'static str,
    #[source]
    pub cause: FailureCause,
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }
}
