//! Telegram message handler registered in the teloxide Dispatcher.

use teloxide::prelude::*;
use teloxide::types::PhotoSize;
use tracing::debug;

use wmbot_core::types::{InboundEvent, Payload, PhotoVariant};
use wmbot_pipeline::Dispatcher as EventDispatcher;

/// Main message handler registered in the teloxide Dispatcher.
///
/// Ignores other bots, classifies the message and hands it to the pipeline
/// dispatcher. Pooled work keeps running after this returns so the polling
/// loop is never blocked by a compositing run.
pub async fn handle_message(msg: Message, events: EventDispatcher) -> ResponseResult<()> {
    if is_from_bot(&msg) {
        return Ok(());
    }

    let event = to_event(&msg);
    debug!(chat = msg.chat.id.0, payload = payload_label(&event.payload), "Telegram: inbound message");

    // The worker pool tracks the task; the handle is not needed here.
    let _ = events.dispatch(event).await;
    Ok(())
}

/// Messages sent by bots, this one included, are never processed.
fn is_from_bot(msg: &Message) -> bool {
    msg.from.as_ref().is_some_and(|u| u.is_bot)
}

/// Classify a Telegram message. Media wins over text, so a captioned photo
/// is a photo.
pub fn to_event(msg: &Message) -> InboundEvent {
    let payload = if let Some(photos) = msg.photo() {
        Payload::Photo {
            variants: photos.iter().map(photo_variant).collect(),
        }
    } else if let Some(video) = msg.video() {
        Payload::Video {
            file_id: video.file.id.to_string(),
            file_name: video.file_name.clone(),
        }
    } else if let Some(doc) = msg.document() {
        Payload::Document {
            file_id: doc.file.id.to_string(),
            file_name: doc.file_name.clone(),
        }
    } else if let Some(text) = msg.text() {
        Payload::Text {
            text: text.to_owned(),
        }
    } else {
        Payload::Other
    };
    InboundEvent::new(msg.chat.id.0, payload)
}

fn photo_variant(photo: &PhotoSize) -> PhotoVariant {
    PhotoVariant {
        file_id: photo.file.id.to_string(),
        file_size: photo.file.size,
        width: photo.width,
        height: photo.height,
    }
}

fn payload_label(payload: &Payload) -> &'static str {
    match payload {
        Payload::Text { .. } => "text",
        Payload::Photo { .. } => "photo",
        Payload::Video { .. } => "video",
        Payload::Document { .. } => "document",
        Payload::Other => "other",
    }
}
