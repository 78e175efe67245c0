use std::path::{Path, PathBuf};

use wmbot_core::types::{RequestId, SessionId};

/// Maps chats and requests to directories under the storage root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session: SessionId) -> PathBuf {
        self.root.join(session.to_string())
    }

    pub fn watermark_dir(&self, session: SessionId) -> PathBuf {
        self.session_dir(session).join("watermark")
    }

    pub fn source_dir(&self, session: SessionId, request: RequestId) -> PathBuf {
        self.session_dir(session)
            .join("source")
            .join(request.to_string())
    }

    pub fn processed_dir(&self, session: SessionId, request: RequestId) -> PathBuf {
        self.session_dir(session)
            .join("processed")
            .join(request.to_string())
    }
}
