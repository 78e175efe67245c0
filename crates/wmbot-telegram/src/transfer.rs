//! Bot API implementation of the pipeline's transfer and notification traits.

use std::path::Path;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

use wmbot_core::types::{MediaKind, SessionId};
use wmbot_pipeline::{Notifier, RemoteFile, TransferAdapter, TransferError};

use crate::activity::{upload_action, ActivityHandle};
use crate::error::TelegramError;

/// `get_file` + `download_file` for inbound media, `send_photo` /
/// `send_video` / `send_message` for replies.
#[derive(Clone)]
pub struct BotTransfer {
    bot: Bot,
}

impl BotTransfer {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn chat(session: SessionId) -> ChatId {
    ChatId(session.as_i64())
}

#[async_trait]
impl TransferAdapter for BotTransfer {
    async fn resolve(&self, file_id: &str) -> Result<RemoteFile, TransferError> {
        let file = self
            .bot
            .get_file(file_id)
            .await
            .map_err(TelegramError::from)?;
        if file.path.is_empty() {
            return Err(TransferError::MissingPath {
                file_id: file_id.to_owned(),
            });
        }
        debug!(file_id, path = %file.path, size = file.size, "Telegram: file resolved");
        Ok(RemoteFile {
            file_id: file_id.to_owned(),
            path: file.path.clone(),
            size: file.size,
        })
    }

    async fn download(
        &self,
        file: &RemoteFile,
        dst: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<(), TransferError> {
        self.bot
            .download_file(&file.path, dst)
            .await
            .map_err(TelegramError::from)?;
        Ok(())
    }

    async fn upload(
        &self,
        session: SessionId,
        kind: MediaKind,
        path: &Path,
    ) -> Result<(), TransferError> {
        let chat_id = chat(session);
        let activity = ActivityHandle::start(self.bot.clone(), chat_id, upload_action(kind));
        let input = InputFile::file(path.to_owned());
        let sent = match kind {
            MediaKind::Photo => self.bot.send_photo(chat_id, input).await,
            MediaKind::Video => self.bot.send_video(chat_id, input).await,
        };
        activity.stop();

        sent.map_err(|e| {
            warn!(session = %session, kind = %kind, error = %e, "Telegram: upload failed");
            TelegramError::from(e)
        })?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for BotTransfer {
    async fn send_text(&self, session: SessionId, text: &str) -> Result<(), TransferError> {
        self.bot
            .send_message(chat(session), text)
            .await
            .map_err(TelegramError::from)?;
        Ok(())
    }
}
