//! Bounded tail of a child's stderr.
//!
//! ffmpeg prints a banner, stream mapping and progress before the line that
//! explains a failure, and the useful part is at the end. [`StderrTail`] keeps
//! only the last few lines, each capped in length, so the error attached to
//! a failed overlay stays small.

use std::collections::VecDeque;

/// Default number of stderr lines kept.
pub const DEFAULT_MAX_LINES: usize = 8;
/// Default maximum characters kept per line.
pub const DEFAULT_MAX_LINE_CHARS: usize = 300;

/// Cut `line` to at most `max_chars` characters, on a char boundary.
pub fn truncate_line(line: &str, max_chars: usize) -> String {
    match line.char_indices().nth(max_chars) {
        None => line.to_owned(),
        Some((byte_idx, _)) => format!("{}…", &line[..byte_idx]),
    }
}

/// Ring buffer of the most recent stderr lines.
#[derive(Debug, Clone)]
pub struct StderrTail {
    lines: VecDeque<String>,
    max_lines: usize,
    max_line_chars: usize,
}

impl StderrTail {
    pub fn new(max_lines: usize, max_line_chars: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_lines),
            max_lines,
            max_line_chars,
        }
    }

    /// Record a line, evicting the oldest one when full. Blank lines are skipped.
    pub fn push(&mut self, line: &str) {
        let line = line.trim_end();
        if line.is_empty() || self.max_lines == 0 {
            return;
        }
        if self.lines.len() == self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(truncate_line(line, self.max_line_chars));
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Kept lines joined with `\n`, oldest first.
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for StderrTail {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES, DEFAULT_MAX_LINE_CHARS)
    }
}
