use std::path::Path;

use wmbot_core::types::{
    best_photo_variant, InboundEvent, MediaKind, Payload, PhotoVariant, RequestId, SessionId,
};

/// The media a request works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    Photo(Vec<PhotoVariant>),
    Video {
        file_id: String,
        file_name: Option<String>,
    },
}

impl MediaRef {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaRef::Photo(_) => MediaKind::Photo,
            MediaRef::Video { .. } => MediaKind::Video,
        }
    }

    /// File id to download: the largest photo variant, or the video itself.
    pub fn file_id(&self) -> Option<&str> {
        match self {
            MediaRef::Photo(variants) => best_photo_variant(variants).map(|v| v.file_id.as_str()),
            MediaRef::Video { file_id, .. } => Some(file_id.as_str()),
        }
    }

    /// Base name the sender attached to the media, if any. Photos never
    /// carry one.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            MediaRef::Photo(_) => None,
            MediaRef::Video { file_name, .. } => file_name
                .as_deref()
                .and_then(|name| Path::new(name).file_name())
                .and_then(|name| name.to_str()),
        }
    }
}

/// One photo or video submission moving through the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    pub id: RequestId,
    pub session: SessionId,
    pub media: MediaRef,
}

impl ProcessingRequest {
    pub fn new(session: SessionId, media: MediaRef) -> Self {
        Self {
            id: RequestId::new(),
            session,
            media,
        }
    }

    /// Build a request from a photo or video event; `None` for anything else.
    pub fn from_event(event: &InboundEvent) -> Option<Self> {
        let media = match &event.payload {
            Payload::Photo { variants } => MediaRef::Photo(variants.clone()),
            Payload::Video { file_id, file_name } => MediaRef::Video {
                file_id: file_id.clone(),
                file_name: file_name.clone(),
            },
            _ => return None,
        };
        Some(Self::new(event.session, media))
    }
}
