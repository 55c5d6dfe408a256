//! The include stack.
//!
//! Per-file position, line/col, and line-text context collapse into one
//! stack of records rather than several parallel vectors — adapted from a
//! byte-cursor that owned a single in-memory source string, generalized to
//! own a stack of them so `#include` can push and pop live file contents.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Span;
use crate::state::State;

/// One open input stream: its full contents (loaded up front — streaming
/// byte-by-byte from disk buys nothing once the whole file fits in memory,
/// and the Non-goals only rule out sources too large to buffer at all),
/// a cursor into those bytes, and enough bookkeeping to report errors.
pub struct SourceFrame {
    path: String,
    bytes: Vec<u8>,
    pos: usize,
    line: usize,
    col: usize,
    line_buf: Vec<u8>,
    /// The state the assembler should resume in once this frame is popped.
    /// `None` for the outermost file, which has nothing to resume into.
    pub resume_state: Option<State>,
}

impl SourceFrame {
    pub fn open(path: &Path, resume_state: Option<State>) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        Ok(Self {
            path: path.display().to_string(),
            bytes,
            pos: 0,
            line: 1,
            col: 1,
            line_buf: Vec::new(),
            resume_state,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Consume and return the next byte, updating line/column tracking and
    /// the current-line buffer used for diagnostics.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.pos)?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.col = 1;
            self.line_buf.clear();
        } else {
            self.col += 1;
            self.line_buf.push(byte);
        }
        Some(byte)
    }

    pub fn span(&self) -> Span {
        Span::new(self.path.clone(), self.line, self.col)
    }

    pub fn current_line_text(&self) -> String {
        String::from_utf8_lossy(&self.line_buf).into_owned()
    }
}

/// A stack of open source streams. `#include` pushes; end-of-file pops.
/// Assembly terminates when the stack is empty.
pub struct IncludeStack {
    frames: Vec<SourceFrame>,
}

impl IncludeStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: SourceFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<SourceFrame> {
        self.frames.pop()
    }

    pub fn top(&mut self) -> Option<&mut SourceFrame> {
        self.frames.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Resolve an `#include` path relative to the directory of the file
    /// that named it, falling back to the path as given for the root file.
    pub fn resolve_include_path(&self, raw: &str) -> PathBuf {
        match self.frames.last() {
            Some(frame) => {
                let base = Path::new(frame.path()).parent().map(Path::to_path_buf).unwrap_or_default();
                base.join(raw)
            }
            None => PathBuf::from(raw),
        }
    }
}

impl Default for IncludeStack {
    fn default() -> Self {
        Self::new()
    }
}
