use serde::{Deserialize, Serialize};

/// Stable identity of one file for the lifetime of an upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIdentity {
    pub name: String,
    /// Hex-encoded content digest.
    pub hash: String,
    pub total_size: u64,
}

impl FileIdentity {
    pub fn new(name: impl Into<String>, hash: impl Into<String>, total_size: u64) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            total_size,
        }
    }
}

/// What the server already holds for a `(name, hash, size)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The final artifact exists; nothing needs to be sent.
    Complete,
    /// Chunks `0..resume_index` totalling `uploaded_bytes` are stored.
    Partial {
        uploaded_bytes: u64,
        resume_index: u64,
    },
    /// No artifact and no stored chunks.
    NotFound,
}

impl CheckOutcome {
    /// Byte offset and chunk index to resume from.
    pub fn resume_point(&self) -> (u64, u64) {
        match *self {
            CheckOutcome::Partial {
                uploaded_bytes,
                resume_index,
            } => (uploaded_bytes, resume_index),
            CheckOutcome::Complete | CheckOutcome::NotFound => (0, 0),
        }
    }
}
