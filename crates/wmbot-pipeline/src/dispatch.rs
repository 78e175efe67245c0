//! Routes inbound events to commands, watermark uploads and the media pipeline.
//!
//! Channel adapters call [`Dispatcher::dispatch`] once per message. Cheap
//! replies are sent inline; anything touching the disk or the transport runs
//! on the [`WorkerPool`] and its handle is returned so callers can await it.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use wmbot_core::types::{InboundEvent, Payload, RequestId, SessionId};
use wmbot_storage::watermark::is_png;
use wmbot_storage::StorageError;

use crate::error::{CommandError, ErrorKind, FailureCause, PipelineError};
use crate::executor::Pipeline;
use crate::messages;
use crate::pool::WorkerPool;
use crate::request::ProcessingRequest;
use crate::stage::Stage;
use crate::transfer::{Notifier, TransferAdapter};

/// Text commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Reset,
}

impl Command {
    /// Parse `/start` or `/reset`, with or without a `@botname` suffix.
    /// Anything after the command word is ignored.
    ///
    /// A command addressed to a bot other than `bot_name` is not ours. When
    /// `bot_name` is unknown every suffix is accepted.
    pub fn parse(text: &str, bot_name: Option<&str>) -> Option<Command> {
        let word = text.split_whitespace().next()?;
        let (word, addressee) = match word.split_once('@') {
            Some((word, addressee)) => (word, Some(addressee)),
            None => (word, None),
        };
        if let (Some(addressee), Some(me)) = (addressee, bot_name) {
            if !addressee.eq_ignore_ascii_case(me) {
                return None;
            }
        }
        if word.eq_ignore_ascii_case("/start") {
            Some(Command::Start)
        } else if word.eq_ignore_ascii_case("/reset") {
            Some(Command::Reset)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Reset => "reset",
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    transfer: Arc<dyn TransferAdapter>,
    notifier: Arc<dyn Notifier>,
    pool: WorkerPool,
    bot_name: Option<String>,
}

impl Dispatcher {
    pub fn new(
        pipeline: Arc<Pipeline>,
        transfer: Arc<dyn TransferAdapter>,
        notifier: Arc<dyn Notifier>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            pipeline,
            transfer,
            notifier,
            pool,
            bot_name: None,
        }
    }

    /// Username commands must be addressed to, without the leading `@`.
    pub fn with_bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = Some(name.into());
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Handle one inbound event.
    ///
    /// Returns the handle of the pooled task when the event started one.
    pub async fn dispatch(&self, event: InboundEvent) -> Option<JoinHandle<()>> {
        let session = event.session;
        if event.media_kind().is_some() {
            return self.submit_media(&event).await;
        }
        match event.payload {
            Payload::Text { text } => match Command::parse(&text, self.bot_name.as_deref())? {
                Command::Start => {
                    self.reply(session, messages::START).await;
                    None
                }
                Command::Reset => {
                    let this = self.clone();
                    Some(self.pool.spawn(async move { this.reset(session).await }))
                }
            },
            Payload::Document { file_id, file_name } => {
                let this = self.clone();
                Some(self.pool.spawn(async move {
                    this.upload_watermark(session, file_id, file_name).await
                }))
            }
            Payload::Photo { .. } | Payload::Video { .. } | Payload::Other => {
                debug!(session = %session, "ignoring unsupported message");
                None
            }
        }
    }

    async fn submit_media(&self, event: &InboundEvent) -> Option<JoinHandle<()>> {
        let session = event.session;
        match self.pipeline.watermarks().has_watermark(session).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(session = %session, "media without watermark");
                self.reply(session, messages::WATERMARK_NOT_SET).await;
                return None;
            }
            Err(e) => {
                error!(session = %session, error = %e, "watermark lookup failed");
                self.reply(session, messages::PROCESSING_FAILED).await;
                return None;
            }
        }

        let request = ProcessingRequest::from_event(event)?;
        let this = self.clone();
        Some(self.pool.spawn(async move {
            match this.pipeline.run(request).await {
                Ok(report) => {
                    debug!(session = %report.session, request = %report.request, count = report.count, "media delivered");
                }
                Err(err) => this.pipeline_failed(err).await,
            }
        }))
    }

    async fn pipeline_failed(&self, err: PipelineError) {
        match err.kind() {
            ErrorKind::Validation => warn!(error = %err, stage = %err.at, "request rejected"),
            _ => error!(error = %err, stage = %err.at, "request failed"),
        }
        // Already delivered; log only.
        if err.at >= Stage::Delivered {
            return;
        }
        self.reply(err.session, messages::for_failure(&err.cause)).await;
    }

    async fn reset(&self, session: SessionId) {
        let request = RequestId::new();
        match self.pipeline.watermarks().reset(session).await {
            Ok(()) => self.reply(session, messages::WATERMARK_REMOVED).await,
            Err(e) => {
                self.command_failed(CommandError {
                    session,
                    request,
                    command: Command::Reset.name(),
                    cause: e.into(),
                })
                .await
            }
        }
    }

    async fn upload_watermark(&self, session: SessionId, file_id: String, file_name: Option<String>) {
        let request = RequestId::new();
        match self.store_watermark(session, &file_id, file_name).await {
            Ok(name) => {
                info!(session = %session, request = %request, file = %name, "watermark uploaded");
                self.reply(session, messages::WATERMARK_UPLOADED).await;
            }
            Err(cause) => {
                self.command_failed(CommandError {
                    session,
                    request,
                    command: "watermark upload",
                    cause,
                })
                .await
            }
        }
    }

    /// Check the name, fetch the file and replace the chat's watermark.
    /// The name is checked before anything is downloaded.
    async fn store_watermark(
        &self,
        session: SessionId,
        file_id: &str,
        declared: Option<String>,
    ) -> Result<String, FailureCause> {
        if let Some(name) = declared.as_deref() {
            ensure_png(name)?;
        }

        let remote = self.transfer.resolve(file_id).await?;
        let name = match declared {
            Some(name) => name,
            None => remote.file_name().unwrap_or_default().to_owned(),
        };
        ensure_png(&name)?;

        let mut content = Vec::with_capacity(remote.size as usize);
        self.transfer.download(&remote, &mut content).await?;
        self.pipeline
            .watermarks()
            .save(session, &name, &content)
            .await?;
        Ok(name)
    }

    async fn command_failed(&self, err: CommandError) {
        match err.kind() {
            ErrorKind::Validation => warn!(error = %err, "command rejected"),
            _ => error!(error = %err, "command failed"),
        }
        self.reply(err.session, messages::for_failure(&err.cause)).await;
    }

    async fn reply(&self, session: SessionId, text: &str) {
        if let Err(e) = self.notifier.send_text(session, text).await {
            warn!(session = %session, error = %e, "failed to send reply");
        }
    }
}

fn ensure_png(file_name: &str) -> Result<(), FailureCause> {
    if is_png(file_name) {
        Ok(())
    } else {
        Err(StorageError::InvalidWatermark {
            file_name: file_name.to_owned(),
        }
        .into())
    }
}
