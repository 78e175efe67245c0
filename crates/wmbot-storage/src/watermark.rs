//! Per-chat watermark store.
//!
//! Each chat has at most one watermark. The store keeps an in-memory record
//! per chat (file name, path, generation) guarded by a `tokio::sync::RwLock`:
//! uploads and resets take the write lock for the whole wipe-and-write, and
//! pipelines copy the current file into their own workspace under the read
//! lock ([`WatermarkStore::snapshot`]). A replacement therefore never tears a
//! file that a request is about to composite with; requests that already took
//! their snapshot keep using the old image.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use wmbot_core::types::SessionId;

use crate::error::{Result, StorageError};
use crate::fs;
use crate::layout::StorageLayout;

/// Extension every watermark must carry (compared case-insensitively).
pub const WATERMARK_EXTENSION: &str = "png";

/// Suffix of a watermark that is still being written.
const PARTIAL_SUFFIX: &str = ".partial";

/// The current watermark of a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkRecord {
    pub file_name: String,
    pub path: PathBuf,
    /// Bumped on every save or reset made by this process.
    pub generation: u64,
}

/// A request-private copy of the watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkSnapshot {
    pub path: PathBuf,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    loaded: bool,
    generation: u64,
    record: Option<WatermarkRecord>,
}

pub struct WatermarkStore {
    layout: StorageLayout,
    slots: DashMap<SessionId, Arc<RwLock<Slot>>>,
}

impl WatermarkStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            slots: DashMap::new(),
        }
    }

    /// `true` when the chat has a watermark.
    pub async fn has_watermark(&self, session: SessionId) -> Result<bool> {
        Ok(self.record(session).await?.is_some())
    }

    /// Current watermark record, if any.
    pub async fn record(&self, session: SessionId) -> Result<Option<WatermarkRecord>> {
        let slot = self.loaded_slot(session).await?;
        let guard = slot.read().await;
        Ok(guard.record.clone())
    }

    /// Path of the current watermark, if any.
    pub async fn current(&self, session: SessionId) -> Result<Option<PathBuf>> {
        Ok(self.record(session).await?.map(|r| r.path))
    }

    /// Replace the chat's watermark with `content` stored as `file_name`.
    ///
    /// Fails with [`StorageError::InvalidWatermark`] without touching the disk
    /// when the name does not end in `.png`.
    #[instrument(skip(self, content), fields(session = %session, bytes = content.len()))]
    pub async fn save(&self, session: SessionId, file_name: &str, content: &[u8]) -> Result<PathBuf> {
        let file_name = validate_file_name(file_name)?;
        let dir = self.layout.watermark_dir(session);

        let slot = self.loaded_slot(session).await?;
        let mut guard = slot.write().await;

        guard.generation += 1;
        guard.record = None;
        fs::recreate_dir(&dir).await?;

        // Partial names are skipped by the cold-start scan.
        let path = dir.join(&file_name);
        let partial = dir.join(format!(".{file_name}{PARTIAL_SUFFIX}"));
        if let Err(e) = tokio::fs::write(&partial, content).await {
            discard(&partial).await;
            return Err(StorageError::at(&partial)(e));
        }
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            discard(&partial).await;
            return Err(StorageError::at(&path)(e));
        }

        guard.record = Some(WatermarkRecord {
            file_name,
            path: path.clone(),
            generation: guard.generation,
        });
        info!(generation = guard.generation, "watermark saved");
        Ok(path)
    }

    /// Remove the chat's watermark, leaving its directory empty.
    #[instrument(skip(self), fields(session = %session))]
    pub async fn reset(&self, session: SessionId) -> Result<()> {
        let dir = self.layout.watermark_dir(session);
        let slot = self.loaded_slot(session).await?;
        let mut guard = slot.write().await;

        guard.generation += 1;
        guard.record = None;
        fs::recreate_dir(&dir).await?;
        info!(generation = guard.generation, "watermark reset");
        Ok(())
    }

    /// Copy the current watermark into `dest_dir` and return the copy.
    ///
    /// Returns `Ok(None)` when the chat has no watermark.
    #[instrument(skip(self, dest_dir), fields(session = %session))]
    pub async fn snapshot(
        &self,
        session: SessionId,
        dest_dir: &Path,
    ) -> Result<Option<WatermarkSnapshot>> {
        let slot = self.loaded_slot(session).await?;
        let guard = slot.read().await;
        let Some(record) = guard.record.as_ref() else {
            return Ok(None);
        };

        let dest = dest_dir.join(format!(
            ".watermark-{}.{WATERMARK_EXTENSION}",
            record.generation
        ));
        tokio::fs::copy(&record.path, &dest)
            .await
            .map_err(StorageError::at(&record.path))?;

        debug!(generation = record.generation, dest = %dest.display(), "watermark pinned");
        Ok(Some(WatermarkSnapshot {
            path: dest,
            generation: record.generation,
        }))
    }

    /// Slot for `session`, populated from disk on first access so a restart
    /// picks up watermarks uploaded by a previous run.
    async fn loaded_slot(&self, session: SessionId) -> Result<Arc<RwLock<Slot>>> {
        let slot = Arc::clone(self.slots.entry(session).or_default().value());

        if slot.read().await.loaded {
            return Ok(slot);
        }

        let mut guard = slot.write().await;
        if !guard.loaded {
            guard.record = scan_existing(&self.layout.watermark_dir(session), guard.generation).await?;
            guard.loaded = true;
        }
        drop(guard);
        Ok(slot)
    }
}

/// First regular file in `dir`, if the directory exists.
async fn scan_existing(dir: &Path, generation: u64) -> Result<Option<WatermarkRecord>> {
    let mut read = match tokio::fs::read_dir(dir).await {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::at(dir)(e)),
    };

    while let Some(entry) = read.next_entry().await.map_err(StorageError::at(dir))? {
        let file_type = entry.file_type().await.map_err(StorageError::at(dir))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !file_type.is_file() || file_name.ends_with(PARTIAL_SUFFIX) {
            continue;
        }
        return Ok(Some(WatermarkRecord {
            file_name,
            path: entry.path(),
            generation,
        }));
    }
    Ok(None)
}

/// Best-effort removal of a half-written file.
async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "could not remove partial watermark");
        }
    }
}

/// `true` when `file_name` has a `png` extension, in any case.
pub fn is_png(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(WATERMARK_EXTENSION))
}

/// Reduce `file_name` to its last component and check the extension.
fn validate_file_name(file_name: &str) -> Result<String> {
    let invalid = || StorageError::InvalidWatermark {
        file_name: file_name.to_string(),
    };
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;
    if !is_png(base) {
        return Err(invalid());
    }
    Ok(base.to_string())
}
