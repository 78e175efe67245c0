//! Per-request workspaces.
//!
//! A [`Workspace`] is a guard over the source and processed directories of one
//! request. The success path calls [`Workspace::release`]; any other exit
//! (early return, error, panic, cancelled task) drops the guard, which removes
//! the directories on the blocking pool.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use wmbot_core::types::{RequestId, SessionId};

use crate::error::Result;
use crate::fs;
use crate::layout::StorageLayout;

/// Allocates and reclaims request workspaces under the storage root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    layout: StorageLayout,
}

impl WorkspaceManager {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Create empty source and processed directories for `request`.
    ///
    /// Anything already at either path is removed first.
    pub async fn allocate(&self, session: SessionId, request: RequestId) -> Result<Workspace> {
        let source_dir = self.layout.source_dir(session, request);
        let processed_dir = self.layout.processed_dir(session, request);

        fs::recreate_dir(&source_dir).await?;
        // The guard owns source_dir from here on, so a failure below still
        // reclaims it.
        let workspace = Workspace {
            session,
            request,
            source_dir,
            processed_dir,
            released: false,
        };
        fs::recreate_dir(&workspace.processed_dir).await?;

        debug!(session = %session, request = %request, "workspace allocated");
        Ok(workspace)
    }

    /// Remove both directories of `request`. Idempotent.
    pub async fn release(&self, session: SessionId, request: RequestId) -> Result<()> {
        fs::remove_tree(&self.layout.source_dir(session, request)).await?;
        fs::remove_tree(&self.layout.processed_dir(session, request)).await?;
        debug!(session = %session, request = %request, "workspace released");
        Ok(())
    }
}

/// Source and processed directories of one request.
#[derive(Debug)]
pub struct Workspace {
    session: SessionId,
    request: RequestId,
    source_dir: PathBuf,
    processed_dir: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn request(&self) -> RequestId {
        self.request
    }

    /// Holds the downloaded original (and the pinned watermark snapshot).
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Holds the compositing output.
    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Remove both directories now. On error the guard is dropped unreleased
    /// and the drop path tries once more in the background.
    pub async fn release(mut self) -> Result<()> {
        fs::remove_tree(&self.source_dir).await?;
        fs::remove_tree(&self.processed_dir).await?;
        self.released = true;
        debug!(session = %self.session, request = %self.request, "workspace released");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let dirs = [self.source_dir.clone(), self.processed_dir.clone()];
        let session = self.session;
        let request = self.request;
        let cleanup = move || {
            for dir in &dirs {
                if let Err(e) = fs::remove_tree_blocking(dir) {
                    warn!(session = %session, request = %request, error = %e, "workspace cleanup failed");
                }
            }
            debug!(session = %session, request = %request, "workspace reclaimed on drop");
        };

        // Drop is not async: hand the removal to the blocking pool when a
        // runtime is around, otherwise do it inline.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(cleanup);
            }
            Err(_) => cleanup(),
        }
    }
}
