use serde::{Deserialize, Serialize};

use wmbot_core::types::SessionId;

/// How many files a chat has had watermarked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub session_id: SessionId,
    pub count: u64,
    /// RFC 3339 timestamp of the last increment.
    pub updated_at: String,
}
