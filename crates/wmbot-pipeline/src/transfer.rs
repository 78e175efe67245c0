//! Boundary traits towards the chat transport.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use wmbot_core::types::{MediaKind, SessionId};

use crate::error::TransferError;

/// A file the transport can serve for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub file_id: String,
    /// Transport-side path, e.g. `photos/file_12.jpg`.
    pub path: String,
    pub size: u32,
}

impl RemoteFile {
    /// Last component of the remote path, `None` when the path is empty.
    pub fn file_name(&self) -> Option<&str> {
        self.path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
    }
}

/// Raw file transfer with the transport.
#[async_trait]
pub trait TransferAdapter: Send + Sync {
    /// Look up a file id and return where to fetch it from.
    async fn resolve(&self, file_id: &str) -> Result<RemoteFile, TransferError>;

    /// Stream the file's bytes into `dst`.
    async fn download(
        &self,
        file: &RemoteFile,
        dst: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<(), TransferError>;

    /// Send a local file back to the chat as a photo or video.
    async fn upload(
        &self,
        session: SessionId,
        kind: MediaKind,
        path: &Path,
    ) -> Result<(), TransferError>;
}

/// Outbound text messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, session: SessionId, text: &str) -> Result<(), TransferError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(path: &str) -> RemoteFile {
        RemoteFile {
            file_id: "id".into(),
            path: path.into(),
            size: 0,
        }
    }

    #[test]
    fn file_name_is_last_component() {
        assert_eq!(remote("photos/file_12.jpg").file_name(), Some("file_12.jpg"));
        assert_eq!(remote("video.mp4").file_name(), Some("video.mp4"));
    }

    #[test]
    fn empty_or_dotted_names_are_rejected() {
        assert_eq!(remote("").file_name(), None);
        assert_eq!(remote("photos/").file_name(), None);
        assert_eq!(remote("photos/..").file_name(), None);
    }
}
