use thiserror::Error;

#[derive(Debug, Error)]
pub enum WmbotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WmbotError {
    /// Short error code string used in structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            WmbotError::Config(_) => "CONFIG_ERROR",
            WmbotError::Io(_) => "IO_ERROR",
            WmbotError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, WmbotError>;
