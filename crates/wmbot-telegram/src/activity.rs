//! Chat action indicator shown while a result is being uploaded.
//!
//! Telegram clears a chat action after ~5 seconds, so it is refreshed every
//! 4s until `stop()` is called.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;

use wmbot_core::types::MediaKind;

/// Handle to a background chat action task. Dropping it stops the task.
pub struct ActivityHandle(tokio::task::JoinHandle<()>);

impl ActivityHandle {
    /// Show `action` in `chat_id` now and keep it alive until stopped.
    pub fn start(bot: Bot, chat_id: ChatId, action: ChatAction) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                let _ = bot.send_chat_action(chat_id, action).await;
                tokio::time::sleep(Duration::from_secs(4)).await;
            }
        });
        ActivityHandle(handle)
    }

    pub fn stop(self) {
        self.0.abort();
    }
}

impl Drop for ActivityHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// "sending photo…" / "sending video…".
pub fn upload_action(kind: MediaKind) -> ChatAction {
    match kind {
        MediaKind::Photo => ChatAction::UploadPhoto,
        MediaKind::Video => ChatAction::UploadVideo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_follows_media_kind() {
        assert_eq!(upload_action(MediaKind::Photo), ChatAction::UploadPhoto);
        assert_eq!(upload_action(MediaKind::Video), ChatAction::UploadVideo);
    }
}
