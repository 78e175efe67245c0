use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Chat the bot talks to. Telegram chat ids are signed 64-bit integers
/// (groups are negative), so the id is also safe to use as a directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

impl SessionId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of one processing request (random UUIDv4).
///
/// Keys the per-request workspace so concurrent submissions from the same
/// chat never share directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media the pipeline can watermark. Decides how the result is sent back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// File name used when the remote path carries none.
    pub fn fallback_file_name(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo.jpg",
            MediaKind::Video => "video.mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Photo => write!(f, "photo"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// One resolution of a photo as offered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoVariant {
    pub file_id: String,
    pub file_size: u32,
    pub width: u32,
    pub height: u32,
}

/// Pick the highest-resolution variant: largest file size, ties broken by
/// pixel area.
pub fn best_photo_variant(variants: &[PhotoVariant]) -> Option<&PhotoVariant> {
    variants
        .iter()
        .max_by_key(|v| (v.file_size, u64::from(v.width) * u64::from(v.height)))
}

/// Content of an inbound chat message, already classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Payload {
    Text {
        text: String,
    },
    Photo {
        variants: Vec<PhotoVariant>,
    },
    Video {
        file_id: String,
        file_name: Option<String>,
    },
    /// A file sent "as document". Used to upload the watermark.
    Document {
        file_id: String,
        file_name: Option<String>,
    },
    /// Anything else (stickers, voice, service messages). Ignored.
    Other,
}

/// A message received from the transport, bound to its chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub session: SessionId,
    pub payload: Payload,
}

impl InboundEvent {
    pub fn new(session: impl Into<SessionId>, payload: Payload) -> Self {
        Self {
            session: session.into(),
            payload,
        }
    }

    /// The media kind when this event should go through the pipeline.
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self.payload {
            Payload::Photo { .. } => Some(MediaKind::Photo),
            Payload::Video { .. } => Some(MediaKind::Video),
            _ => None,
        }
    }
}
