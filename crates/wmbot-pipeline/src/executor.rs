//! Media request pipeline.
//!
//! [`Pipeline::run`] takes one photo or video from its chat to a delivered,
//! watermarked copy:
//! allocate workspace → pin watermark → resolve → download → overlay →
//! upload → release workspace → count usage.
//!
//! Stages run strictly in sequence inside the caller's task. The workspace
//! is released on every exit path: explicitly on success and on handled
//! failures, by the [`Workspace`] drop guard if the task is cancelled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use wmbot_compositor::Compositor;
use wmbot_core::types::{MediaKind, RequestId, SessionId};
use wmbot_storage::{StorageError, WatermarkStore, Workspace, WorkspaceManager};
use wmbot_usage::UsageLedger;

use crate::error::{FailureCause, PipelineError};
use crate::request::ProcessingRequest;
use crate::stage::Stage;
use crate::transfer::TransferAdapter;

/// Summary of a request that reached `Done`.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub request: RequestId,
    pub session: SessionId,
    pub kind: MediaKind,
    /// The chat's usage count after this request.
    pub count: u64,
    /// Generation of the watermark snapshot the media was composited with.
    pub watermark_generation: u64,
    /// Every state visited, `Start` first.
    pub trail: Vec<Stage>,
}

/// Everything a request chain needs, shared across chains.
pub struct Pipeline {
    workspaces: WorkspaceManager,
    watermarks: Arc<WatermarkStore>,
    compositor: Arc<dyn Compositor>,
    transfer: Arc<dyn TransferAdapter>,
    ledger: Arc<UsageLedger>,
}

/// Result of the stages that run inside the workspace.
struct Delivered {
    watermark_generation: u64,
}

impl Pipeline {
    pub fn new(
        workspaces: WorkspaceManager,
        watermarks: Arc<WatermarkStore>,
        compositor: Arc<dyn Compositor>,
        transfer: Arc<dyn TransferAdapter>,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            workspaces,
            watermarks,
            compositor,
            transfer,
            ledger,
        }
    }

    pub fn watermarks(&self) -> &Arc<WatermarkStore> {
        &self.watermarks
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    /// Run one request to `Done` or `Failed`.
    #[instrument(skip_all, fields(session = %request.session, request = %request.id, kind = %request.media.kind()))]
    pub async fn run(&self, request: ProcessingRequest) -> Result<PipelineReport, PipelineError> {
        let mut progress = Progress::new(&request);

        let workspace = self
            .workspaces
            .allocate(request.session, request.id)
            .await
            .map_err(|e| progress.fail(e))?;

        let delivered = match self.in_workspace(&request, &workspace, &mut progress).await {
            Ok(delivered) => delivered,
            Err(cause) => {
                if let Err(e) = workspace.release().await {
                    warn!(error = %e, "pipeline: workspace release after failure failed");
                }
                return Err(progress.fail(cause));
            }
        };

        workspace.release().await.map_err(|e| progress.fail(e))?;
        progress.advance(Stage::WorkspaceCleaned);

        let ledger = Arc::clone(&self.ledger);
        let session = request.session;
        let count = tokio::task::spawn_blocking(move || ledger.increment(session))
            .await
            .map_err(|e| progress.fail(FailureCause::LedgerTask(e)))?
            .map_err(|e| progress.fail(e))?;
        progress.advance(Stage::Counted);
        progress.advance(Stage::Done);

        info!(count, generation = delivered.watermark_generation, "pipeline: request complete");
        Ok(PipelineReport {
            request: request.id,
            session: request.session,
            kind: request.media.kind(),
            count,
            watermark_generation: delivered.watermark_generation,
            trail: progress.trail,
        })
    }

    /// Stages from watermark pinning up to delivery.
    async fn in_workspace(
        &self,
        request: &ProcessingRequest,
        workspace: &Workspace,
        progress: &mut Progress,
    ) -> Result<Delivered, FailureCause> {
        let snapshot = self
            .watermarks
            .snapshot(request.session, workspace.source_dir())
            .await?
            .ok_or(FailureCause::WatermarkMissing)?;
        progress.advance(Stage::WorkspaceReady);

        let file_id = request.media.file_id().ok_or(FailureCause::NoMedia)?;
        let remote = self.transfer.resolve(file_id).await?;
        progress.advance(Stage::RemoteFileResolved);

        let kind = request.media.kind();
        let file_name = remote
            .file_name()
            .or_else(|| request.media.declared_name())
            .unwrap_or_else(|| kind.fallback_file_name())
            .to_owned();
        let source = workspace.source_dir().join(&file_name);
        let mut file = tokio::fs::File::create(&source)
            .await
            .map_err(io_at(&source))?;
        self.transfer.download(&remote, &mut file).await?;
        file.flush().await.map_err(io_at(&source))?;
        drop(file);
        debug!(path = %source.display(), size = remote.size, "pipeline: media downloaded");
        progress.advance(Stage::Downloaded);

        let dest = workspace.processed_dir().join(&file_name);
        let outcome = self
            .compositor
            .overlay(&source, &snapshot.path, &dest)
            .await?;
        if !outcome.success() {
            return Err(FailureCause::OverlayFailed {
                exit_code: outcome.exit_code,
                stderr_tail: outcome.stderr_tail,
            });
        }
        progress.advance(Stage::Composited);

        self.transfer.upload(request.session, kind, &dest).await?;
        progress.advance(Stage::Delivered);

        Ok(Delivered {
            watermark_generation: snapshot.generation,
        })
    }
}

fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> FailureCause {
    let path: PathBuf = path.to_owned();
    move |source| FailureCause::Storage(StorageError::Io { path, source })
}

/// Current state of one chain and the states it went through.
struct Progress {
    stage: Stage,
    trail: Vec<Stage>,
    session: SessionId,
    request: RequestId,
}

impl Progress {
    fn new(request: &ProcessingRequest) -> Self {
        Self {
            stage: Stage::Start,
            trail: vec![Stage::Start],
            session: request.session,
            request: request.id,
        }
    }

    fn advance(&mut self, to: Stage) {
        debug_assert_eq!(self.stage.next(), Some(to), "out-of-order stage");
        self.stage = to;
        self.trail.push(to);
        debug!(stage = %to, "pipeline: stage reached");
    }

    fn fail(&mut self, cause: impl Into<FailureCause>) -> PipelineError {
        self.trail.push(Stage::Failed);
        PipelineError {
            session: self.session,
            request: self.request,
            at: self.stage,
            cause: cause.into(),
        }
    }
}
