use wmbot_pipeline::TransferError;

/// Errors produced by the Telegram adapter.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("teloxide error: {0}")]
    Teloxide(#[from] teloxide::RequestError),

    #[error("download failed: {0}")]
    Download(#[from] teloxide::DownloadError),

    #[error("no bot token configured")]
    NoToken,
}

impl From<TelegramError> for TransferError {
    fn from(e: TelegramError) -> Self {
        TransferError::Request(e.to_string())
    }
}
