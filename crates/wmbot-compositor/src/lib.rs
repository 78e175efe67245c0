//! Runs the external overlay tool.
//!
//! The pipeline talks to the [`Compositor`] trait; [`FfmpegCompositor`] is
//! the production implementation. It spawns ffmpeg with a fixed filter graph
//! that blends the watermark at reduced opacity and centres it over the
//! source frame, streams ffmpeg's stderr into the log line by line and waits
//! for the exit code.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use wmbot_compositor::{Compositor, FfmpegCompositor};
//!
//! # async fn run() -> wmbot_compositor::Result<()> {
//! let ffmpeg = FfmpegCompositor::new("ffmpeg", 0.4);
//! let outcome = ffmpeg
//!     .overlay(Path::new("in.jpg"), Path::new("logo.png"), Path::new("out.jpg"))
//!     .await?;
//! assert!(outcome.success());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ffmpeg;
pub mod tail;

pub use error::{CompositorError, Result};
pub use ffmpeg::{overlay_args, Compositor, FfmpegCompositor, OverlayOutcome};
