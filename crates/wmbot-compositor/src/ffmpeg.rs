//! ffmpeg-backed [`Compositor`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use wmbot_core::config::CompositorConfig;

use crate::error::{CompositorError, Result};
use crate::tail::StderrTail;

/// Result of one overlay run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayOutcome {
    /// Process exit code; `-1` when the child was terminated by a signal.
    pub exit_code: i32,
    /// Last stderr lines, for error reporting.
    pub stderr_tail: String,
}

impl OverlayOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Overlays a watermark image onto a photo or video.
///
/// `dest` is overwritten if it exists. Callers must not use `dest` unless
/// the outcome reports success.
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn overlay(&self, source: &Path, watermark: &Path, dest: &Path)
        -> Result<OverlayOutcome>;
}

/// Build the fixed ffmpeg argument list.
///
/// The watermark (input 1) is converted to BGRA, its alpha channel scaled by
/// `alpha`, and it is overlaid centred on input 0.
pub fn overlay_args(source: &Path, watermark: &Path, dest: &Path, alpha: f32) -> Vec<OsString> {
    let filter = format!(
        "[1]format=bgra,colorchannelmixer=aa={alpha},rotate=0:c=black@0:ow=rotw(0):oh=roth(0)[image1];\
         [0][image1]overlay=(main_w-overlay_w)/2:(main_h-overlay_h)/2"
    );
    vec![
        "-y".into(),
        "-i".into(),
        source.as_os_str().to_owned(),
        "-i".into(),
        watermark.as_os_str().to_owned(),
        "-filter_complex".into(),
        filter.into(),
        dest.as_os_str().to_owned(),
    ]
}

/// Runs the configured ffmpeg binary from the user's home directory.
#[derive(Debug, Clone)]
pub struct FfmpegCompositor {
    binary: String,
    alpha: f32,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegCompositor {
    pub fn new(binary: impl Into<String>, alpha: f32) -> Self {
        Self {
            binary: binary.into(),
            alpha,
            working_dir: home_dir(),
            timeout: None,
        }
    }

    pub fn from_config(config: &CompositorConfig) -> Self {
        let mut compositor = Self::new(config.binary.clone(), config.alpha);
        compositor.timeout = config.timeout_secs.map(Duration::from_secs);
        compositor
    }

    /// Kill the child if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn overlay(
        &self,
        source: &Path,
        watermark: &Path,
        dest: &Path,
    ) -> Result<OverlayOutcome> {
        let args = overlay_args(source, watermark, dest, self.alpha);
        debug!(binary = %self.binary, source = %source.display(), dest = %dest.display(), "overlay: spawning");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CompositorError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let stderr = child.stderr.take();
        let mut tail = StderrTail::default();

        let run = async {
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    if reader.read_until(b'\n', &mut buf).await? == 0 {
                        break;
                    }
                    let line = strip_text(&buf);
                    debug!(target: "wmbot_compositor::ffmpeg::stderr", "{}", line.trim_end());
                    tail.push(&line);
                }
            }
            child.wait().await
        };

        let waited = match self.timeout {
            None => run.await,
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(waited) => waited,
                Err(_elapsed) => {
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "overlay: failed to kill timed-out child");
                    }
                    return Err(CompositorError::Timeout {
                        secs: limit.as_secs(),
                    });
                }
            },
        };

        let status = waited?;
        let exit_code = status.code().unwrap_or(-1);
        info!(exit_code, dest = %dest.display(), "overlay: finished");

        Ok(OverlayOutcome {
            exit_code,
            stderr_tail: tail.render(),
        })
    }
}

/// Strip ANSI escape codes and convert bytes to a UTF-8 string.
fn strip_text(raw: &[u8]) -> String {
    let clean = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&clean).into_owned()
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("/"))
}
