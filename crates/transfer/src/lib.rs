//! Resumable chunked upload engine.
//!
//! A [`TransferSession`] fingerprints a file, asks the server what it
//! already holds, then streams the remainder in chunks whose size is
//! steered by a slow-start [`WindowController`]. Chunk transfers go
//! through a shared [`RequestPool`] that bounds how many are in flight
//! across all sessions. The server side is reached only through the
//! [`UploadBackend`] trait.

mod backend;
mod chunked;
mod config;
mod fingerprint;
mod observer;
mod pool;
mod progress;
mod session;
mod types;
mod window;

pub use backend::{BackendFuture, ChunkUpload, UploadBackend};
pub use chunked::ChunkReader;
pub use config::{HashMode, TransferConfig, WindowConfig};
pub use fingerprint::{
    EXHAUSTIVE_BLOCK_SIZE, SAMPLE_BLOCK_SIZE, digest_bytes, exhaustive_digest, fingerprint,
    sampled_digest,
};
pub use observer::SessionObserver;
pub use pool::{RequestPool, Timed};
pub use progress::SpeedCalculator;
pub use session::{StopHandle, TransferSession};
pub use types::{Chunk, SessionState, TransferProgress, UploadOutcome};
pub use window::WindowController;

pub use ferryload_protocol::{CheckOutcome, FileIdentity};

/// Base chunk unit: 256 KiB.
pub const DEFAULT_BASE_CHUNK_SIZE: u64 = 256 * 1024;

/// Default ceiling for the slow-start window: 64 MiB.
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// A chunk round-trip under this many milliseconds counts as uncongested.
pub const DEFAULT_THRESHOLD_MS: u64 = 5000;

/// Default number of chunk transfers allowed in flight at once.
pub const DEFAULT_POOL_SIZE: usize = 6;

/// Errors produced by the transfer engine.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("hash failure: {0}")]
    Hash(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network failure: {0}")]
    Network(String),

    #[error("cancelled")]
    Cancelled,

    #[error("merge failure: {0}")]
    Merge(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ferryload_protocol::ProtocolError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("source changed: expected {expected} bytes, found {actual}")]
    SourceChanged { expected: u64, actual: u64 },

    #[error("server reports {uploaded} bytes received for a {total}-byte file")]
    ResumeMismatch { uploaded: u64, total: u64 },

    #[error("upload already running")]
    AlreadyRunning,
}

impl TransferError {
    /// Returns `true` when re-invoking the upload can pick up where this
    /// attempt left off.
    pub fn is_resumable(&self) -> bool {
        matches!(self, TransferError::Network(_) | TransferError::Cancelled)
    }
}
