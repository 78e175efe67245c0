//! Request processing pipeline, independent of the chat transport.
//!
//! The transport adapter turns chat messages into [`InboundEvent`]s and hands
//! them to the [`Dispatcher`], which answers commands, stores watermarks and
//! runs the [`Pipeline`] for photos and videos on the bounded [`WorkerPool`].
//! Everything the pipeline needs from the outside world goes through the
//! [`TransferAdapter`] and [`Notifier`] traits.
//!
//! [`InboundEvent`]: wmbot_core::types::InboundEvent

pub mod dispatch;
pub mod error;
pub mod executor;
pub mod messages;
pub mod pool;
pub mod request;
pub mod stage;
pub mod transfer;

pub use dispatch::{Command, Dispatcher};
pub use error::{CommandError, ErrorKind, FailureCause, PipelineError, TransferError};
pub use executor::{Pipeline, PipelineReport};
pub use pool::WorkerPool;
pub use request::{MediaRef, ProcessingRequest};
pub use stage::Stage;
pub use transfer::{Notifier, RemoteFile, TransferAdapter};
