use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A thread panicked while holding the connection lock.
    #[error("usage ledger lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
