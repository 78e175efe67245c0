pub mod db;
pub mod error;
pub mod ledger;
pub mod types;

pub use error::LedgerError;
pub use ledger::UsageLedger;
pub use types::UsageRecord;
