//! Texts sent back to the chat.

use crate::error::{ErrorKind, FailureCause};

pub const START: &str = "Hi! Send me a PNG image as a file (document) to set your watermark, \
then send photos or videos and I will return them watermarked.\n\
/reset removes the watermark.";
pub const WATERMARK_NOT_SET: &str = "Watermark is not set";
pub const WATERMARK_NOT_PNG: &str = "Watermark file must be a PNG image";
pub const WATERMARK_UPLOADED: &str = "Watermark uploaded";
pub const WATERMARK_REMOVED: &str = "Watermark removed";
pub const OVERLAY_FAILED: &str = "Failed to apply the watermark";
pub const PROCESSING_FAILED: &str = "Could not process the file, please try again later";

/// Reply for a failed request or command.
pub fn for_failure(cause: &FailureCause) -> &'static str {
    match cause {
        FailureCause::WatermarkMissing => WATERMARK_NOT_SET,
        FailureCause::Storage(wmbot_storage::StorageError::InvalidWatermark { .. }) => {
            WATERMARK_NOT_PNG
        }
        other if other.kind() == ErrorKind::Compositing => OVERLAY_FAILED,
        _ => PROCESSING_FAILED,
    }
}
