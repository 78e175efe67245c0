//! Shared building blocks for the watermark bot: configuration, identifiers,
//! the inbound event model and the top-level error type.

pub mod config;
pub mod error;
pub mod types;

pub use config::WmbotConfig;
pub use error::{Result, WmbotError};
pub use types::{InboundEvent, MediaKind, Payload, PhotoVariant, RequestId, SessionId};
