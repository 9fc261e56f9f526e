use std::ops::Range;

use serde::Serialize;

/// A contiguous slice of the source file.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Zero-based position of this chunk in the upload.
    pub index: u64,
    /// Byte offset within the file.
    pub start: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.start + self.len()
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end()
    }
}

/// Lifecycle of a transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Hashing,
    Checking,
    /// The server already held the whole file.
    InstantComplete,
    Uploading,
    Merging,
    Done,
    /// Halted by `stop()` or a network failure; calling `upload()` again resumes.
    Stopped,
    /// A fatal error ended the attempt.
    Failed,
}

impl SessionState {
    /// Returns `true` for states in which the file is fully on the server.
    pub fn is_done(self) -> bool {
        matches!(self, SessionState::Done | SessionState::InstantComplete)
    }
}

/// How a finished `upload()` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Server reported the file complete before any chunk was sent.
    Instant,
    /// Every remaining chunk was sent and merged.
    Completed,
    /// `stop()` was observed; progress up to the last acknowledged chunk is kept.
    Stopped,
}

/// Snapshot of a session's progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub name: String,
    pub total_bytes: u64,
    pub sent_bytes: u64,
    pub next_chunk_index: u64,
    pub window_size: u64,
    pub state: SessionState,
    pub done: bool,
    pub bytes_per_second: f64,
    /// Estimated seconds until every byte is sent, once a speed is known.
    pub eta_secs: Option<u64>,
}

impl TransferProgress {
    /// Completion percentage (0.0 - 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.done { 100.0 } else { 0.0 };
        }
        self.sent_bytes as f64 / self.total_bytes as f64 * 100.0
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.sent_bytes)
    }
}
