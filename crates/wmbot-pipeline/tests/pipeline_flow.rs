//! End-to-end dispatcher tests with in-process transport and compositor fakes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use wmbot_compositor::{Compositor, OverlayOutcome};
use wmbot_core::types::{InboundEvent, MediaKind, Payload, PhotoVariant, SessionId};
use wmbot_pipeline::{
    messages, Dispatcher, Notifier, Pipeline, RemoteFile, TransferAdapter, TransferError,
    WorkerPool,
};
use wmbot_storage::fs::count_entries;
use wmbot_storage::{StorageLayout, WatermarkStore, WorkspaceManager};
use wmbot_usage::UsageLedger;

const CHAT: i64 = 7;
const BOT_NAME: &str = "wm_bot";
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-watermark";

// ── Fakes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Upload {
    session: SessionId,
    kind: MediaKind,
    path: PathBuf,
    content: Vec<u8>,
}

#[derive(Default)]
struct FakeTransfer {
    /// file_id -> (remote path, bytes)
    files: Mutex<HashMap<String, (String, Vec<u8>)>>,
    resolved: AtomicUsize,
    uploads: Mutex<Vec<Upload>>,
}

impl FakeTransfer {
    fn add(&self, file_id: &str, path: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.into(), (path.into(), content.to_vec()));
    }

    fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferAdapter for FakeTransfer {
    async fn resolve(&self, file_id: &str) -> Result<RemoteFile, TransferError> {
        self.resolved.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock().unwrap();
        let (path, content) = files
            .get(file_id)
            .ok_or_else(|| TransferError::Request(format!("file {file_id} not found")))?;
        Ok(RemoteFile {
            file_id: file_id.into(),
            path: path.clone(),
            size: content.len() as u32,
        })
    }

    async fn download(
        &self,
        file: &RemoteFile,
        dst: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<(), TransferError> {
        let content = self
            .files
            .lock()
            .unwrap()
            .get(&file.file_id)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| TransferError::MissingPath {
                file_id: file.file_id.clone(),
            })?;
        dst.write_all(&content).await?;
        Ok(())
    }

    async fn upload(
        &self,
        session: SessionId,
        kind: MediaKind,
        path: &Path,
    ) -> Result<(), TransferError> {
        let content = tokio::fs::read(path).await?;
        self.uploads.lock().unwrap().push(Upload {
            session,
            kind,
            path: path.to_owned(),
            content,
        });
        Ok(())
    }
}

#[derive(Default)]
struct FakeNotifier {
    sent: Mutex<Vec<(SessionId, String)>>,
}

impl FakeNotifier {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    fn last(&self) -> Option<String> {
        self.texts().pop()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_text(&self, session: SessionId, text: &str) -> Result<(), TransferError> {
        self.sent.lock().unwrap().push((session, text.to_owned()));
        Ok(())
    }
}

/// Copies the source to the destination with the watermark bytes appended,
/// or exits non-zero without writing anything.
struct FakeCompositor {
    exit_code: i32,
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeCompositor {
    fn ok() -> Self {
        Self::with_exit(0)
    }

    fn with_exit(exit_code: i32) -> Self {
        Self {
            exit_code,
            delay: Duration::from_millis(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Compositor for FakeCompositor {
    async fn overlay(
        &self,
        source: &Path,
        watermark: &Path,
        dest: &Path,
    ) -> wmbot_compositor::Result<OverlayOutcome> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.exit_code != 0 {
            return Ok(OverlayOutcome {
                exit_code: self.exit_code,
                stderr_tail: "Invalid data found when processing input".into(),
            });
        }
        let mut out = tokio::fs::read(source).await?;
        out.extend_from_slice(&tokio::fs::read(watermark).await?);
        tokio::fs::write(dest, out).await?;
        Ok(OverlayOutcome {
            exit_code: 0,
            stderr_tail: String::new(),
        })
    }
}

// ── Harness ────────────────────────────────────────────────────────────

struct Harness {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    transfer: Arc<FakeTransfer>,
    notifier: Arc<FakeNotifier>,
    compositor: Arc<FakeCompositor>,
    ledger: Arc<UsageLedger>,
    dispatcher: Dispatcher,
}

impl Harness {
    fn new(compositor: FakeCompositor, workers: usize) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("storage");
        let layout = StorageLayout::new(&root);

        let conn = rusqlite::Connection::open_in_memory().unwrap();
        wmbot_usage::db::init_db(&conn).unwrap();
        let ledger = Arc::new(UsageLedger::new(conn));

        let transfer = Arc::new(FakeTransfer::default());
        let notifier = Arc::new(FakeNotifier::default());
        let compositor = Arc::new(compositor);

        let pipeline = Arc::new(Pipeline::new(
            WorkspaceManager::new(layout.clone()),
            Arc::new(WatermarkStore::new(layout)),
            compositor.clone(),
            transfer.clone(),
            Arc::clone(&ledger),
        ));
        let dispatcher = Dispatcher::new(
            pipeline,
            transfer.clone(),
            notifier.clone(),
            WorkerPool::new(workers),
        )
        .with_bot_name(BOT_NAME);

        Self {
            _tmp: tmp,
            root,
            transfer,
            notifier,
            compositor,
            ledger,
            dispatcher,
        }
    }

    async fn send(&self, payload: Payload) {
        if let Some(handle) = self
            .dispatcher
            .dispatch(InboundEvent::new(CHAT, payload))
            .await
        {
            handle.await.unwrap();
        }
    }

    async fn upload_watermark(&self, file_id: &str, name: &str, content: &[u8]) {
        self.transfer
            .add(file_id, &format!("documents/{file_id}.bin"), content);
        self.send(Payload::Document {
            file_id: file_id.into(),
            file_name: Some(name.into()),
        })
        .await;
    }

    fn photo(&self, file_id: &str, content: &[u8]) -> Payload {
        self.transfer
            .add(file_id, &format!("photos/{file_id}.jpg"), content);
        Payload::Photo {
            variants: vec![
                PhotoVariant {
                    file_id: format!("{file_id}-thumb"),
                    file_size: 10,
                    width: 90,
                    height: 90,
                },
                PhotoVariant {
                    file_id: file_id.into(),
                    file_size: content.len() as u32 + 100,
                    width: 1280,
                    height: 720,
                },
            ],
        }
    }

    fn session_dir(&self, child: &str) -> PathBuf {
        self.root.join(CHAT.to_string()).join(child)
    }

    fn watermark_files(&self) -> Vec<String> {
        match std::fs::read_dir(self.session_dir("watermark")) {
            Ok(read) => read
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    async fn assert_no_workspaces(&self) {
        assert_eq!(count_entries(&self.session_dir("source")).await.unwrap(), 0);
        assert_eq!(
            count_entries(&self.session_dir("processed")).await.unwrap(),
            0
        );
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_command_replies_with_usage() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.send(Payload::Text {
        text: "/start".into(),
    })
    .await;
    assert_eq!(h.notifier.last().as_deref(), Some(messages::START));
}

#[tokio::test]
async fn plain_text_is_ignored() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.send(Payload::Text {
        text: "hello there".into(),
    })
    .await;
    h.send(Payload::Other).await;
    assert!(h.notifier.texts().is_empty());
}

#[tokio::test]
async fn media_without_watermark_is_rejected_without_workspace() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    let photo = h.photo("p1", b"jpeg");
    let handle = h
        .dispatcher
        .dispatch(InboundEvent::new(CHAT, photo))
        .await;

    assert!(handle.is_none());
    assert_eq!(h.notifier.texts(), [messages::WATERMARK_NOT_SET]);
    assert!(!h.session_dir("source").exists());
    assert!(!h.session_dir("processed").exists());
    assert_eq!(h.transfer.resolved.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn png_upload_leaves_exactly_one_file() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.upload_watermark("w1", "first.png", PNG_BYTES).await;
    h.upload_watermark("w2", "second.PNG", PNG_BYTES).await;

    assert_eq!(h.watermark_files(), ["second.PNG"]);
    assert_eq!(
        h.notifier.texts(),
        [messages::WATERMARK_UPLOADED, messages::WATERMARK_UPLOADED]
    );
}

#[tokio::test]
async fn non_png_upload_is_rejected_before_download() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.upload_watermark("w1", "logo.png", PNG_BYTES).await;
    let resolved = h.transfer.resolved.load(Ordering::SeqCst);

    h.upload_watermark("w2", "logo.jpg", b"jpeg").await;

    assert_eq!(h.notifier.last().as_deref(), Some(messages::WATERMARK_NOT_PNG));
    assert_eq!(h.transfer.resolved.load(Ordering::SeqCst), resolved);
    assert_eq!(h.watermark_files(), ["logo.png"]);
    let kept = std::fs::read(h.session_dir("watermark").join("logo.png")).unwrap();
    assert_eq!(kept, PNG_BYTES);
}

#[tokio::test]
async fn unnamed_document_falls_back_to_remote_name() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.transfer.add("w1", "documents/file_3.png", PNG_BYTES);
    h.send(Payload::Document {
        file_id: "w1".into(),
        file_name: None,
    })
    .await;

    assert_eq!(h.watermark_files(), ["file_3.png"]);
    assert_eq!(h.notifier.last().as_deref(), Some(messages::WATERMARK_UPLOADED));
}

#[tokio::test]
async fn reset_empties_directory_and_blocks_media() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.upload_watermark("w1", "logo.png", PNG_BYTES).await;
    h.send(Payload::Text {
        text: "/reset".into(),
    })
    .await;

    assert_eq!(h.notifier.last().as_deref(), Some(messages::WATERMARK_REMOVED));
    assert!(h.session_dir("watermark").is_dir());
    assert!(h.watermark_files().is_empty());

    let photo = h.photo("p1", b"jpeg");
    h.send(photo).await;
    assert_eq!(h.notifier.last().as_deref(), Some(messages::WATERMARK_NOT_SET));
    assert!(h.transfer.uploads().is_empty());
}

#[tokio::test]
async fn reset_for_another_bot_keeps_watermark() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.upload_watermark("w1", "logo.png", PNG_BYTES).await;
    h.send(Payload::Text {
        text: "/reset@other_bot".into(),
    })
    .await;

    assert_eq!(h.watermark_files(), ["logo.png"]);
    assert_eq!(h.notifier.texts(), [messages::WATERMARK_UPLOADED]);

    h.send(Payload::Text {
        text: format!("/reset@{BOT_NAME}"),
    })
    .await;
    assert!(h.watermark_files().is_empty());
    assert_eq!(h.notifier.last().as_deref(), Some(messages::WATERMARK_REMOVED));
}

#[tokio::test]
async fn photo_is_watermarked_delivered_and_counted() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.upload_watermark("w1", "logo.png", PNG_BYTES).await;
    let photo = h.photo("p1", b"jpeg-bytes");
    h.send(photo).await;

    let uploads = h.transfer.uploads();
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert_eq!(upload.session, SessionId(CHAT));
    assert_eq!(upload.kind, MediaKind::Photo);
    assert_eq!(upload.path.file_name().unwrap(), "p1.jpg");
    assert_eq!(upload.content, [b"jpeg-bytes".as_slice(), PNG_BYTES].concat());

    assert_eq!(h.ledger.count(SessionId(CHAT)).unwrap(), 1);
    h.assert_no_workspaces().await;
    // Only the upload confirmation; success sends no text.
    assert_eq!(h.notifier.texts(), [messages::WATERMARK_UPLOADED]);
    assert_eq!(h.watermark_files(), ["logo.png"]);
}

#[tokio::test]
async fn video_keeps_its_media_kind() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.upload_watermark("w1", "logo.png", PNG_BYTES).await;
    h.transfer.add("v1", "videos/file_9.mp4", b"mp4");
    h.send(Payload::Video {
        file_id: "v1".into(),
        file_name: Some("holiday.mp4".into()),
    })
    .await;

    let uploads = h.transfer.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].kind, MediaKind::Video);
    assert_eq!(uploads[0].path.file_name().unwrap(), "file_9.mp4");
}

#[tokio::test]
async fn video_without_remote_name_uses_declared_name() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.upload_watermark("w1", "logo.png", PNG_BYTES).await;
    h.transfer.add("v1", "videos/", b"mp4");
    h.send(Payload::Video {
        file_id: "v1".into(),
        file_name: Some("holiday.mp4".into()),
    })
    .await;

    let uploads = h.transfer.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].path.file_name().unwrap(), "holiday.mp4");
    h.assert_no_workspaces().await;
}

#[tokio::test]
async fn concurrent_photos_get_distinct_workspaces_and_exact_count() {
    const N: usize = 12;
    const WORKERS: usize = 4;
    let h = Harness::new(FakeCompositor::ok().slow(Duration::from_millis(15)), WORKERS);
    h.upload_watermark("w1", "logo.png", PNG_BYTES).await;

    let mut handles = Vec::new();
    for i in 0..N {
        let photo = h.photo(&format!("p{i}"), format!("photo-{i}").as_bytes());
        let handle = h
            .dispatcher
            .dispatch(InboundEvent::new(CHAT, photo))
            .await
            .expect("media with a watermark is pooled");
        handles.push(handle);
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let uploads = h.transfer.uploads();
    assert_eq!(uploads.len(), N);
    let mut dirs: Vec<_> = uploads
        .iter()
        .map(|u| u.path.parent().unwrap().to_owned())
        .collect();
    dirs.sort();
    dirs.dedup();
    assert_eq!(dirs.len(), N, "every request had its own workspace");

    assert_eq!(h.ledger.count(SessionId(CHAT)).unwrap(), N as u64);
    assert!(h.compositor.peak.load(Ordering::SeqCst) <= WORKERS);
    h.assert_no_workspaces().await;
}

#[tokio::test]
async fn overlay_failure_notifies_and_cleans_up() {
    let h = Harness::new(FakeCompositor::with_exit(1), 2);
    h.upload_watermark("w1", "logo.png", PNG_BYTES).await;
    let photo = h.photo("p1", b"jpeg");
    h.send(photo).await;

    assert_eq!(h.notifier.last().as_deref(), Some(messages::OVERLAY_FAILED));
    assert!(h.transfer.uploads().is_empty());
    assert_eq!(h.ledger.count(SessionId(CHAT)).unwrap(), 0);
    h.assert_no_workspaces().await;
}

#[tokio::test]
async fn transfer_failure_notifies_and_cleans_up() {
    let h = Harness::new(FakeCompositor::ok(), 2);
    h.upload_watermark("w1", "logo.png", PNG_BYTES).await;
    // Never registered with the fake transport.
    h.send(Payload::Video {
        file_id: "missing".into(),
        file_name: None,
    })
    .await;

    assert_eq!(
        h.notifier.last().as_deref(),
        Some(messages::PROCESSING_FAILED)
    );
    assert!(h.transfer.uploads().is_empty());
    h.assert_no_workspaces().await;
}

#[tokio::test]
async fn watermark_replaced_mid_request_does_not_affect_it() {
    let h = Harness::new(FakeCompositor::ok().slow(Duration::from_millis(100)), 2);
    h.upload_watermark("w1", "old.png", b"old-mark").await;

    let photo = h.photo("p1", b"jpeg");
    let running = h
        .dispatcher
        .dispatch(InboundEvent::new(CHAT, photo))
        .await
        .unwrap();
    // Let the request pin its snapshot before replacing the watermark.
    tokio::time::sleep(Duration::from_millis(30)).await;
    h.upload_watermark("w2", "new.png", b"new-mark").await;
    running.await.unwrap();

    let uploads = h.transfer.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].content.ends_with(b"old-mark"));
    assert_eq!(h.watermark_files(), ["new.png"]);
}
